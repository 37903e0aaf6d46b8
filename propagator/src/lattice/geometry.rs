// SPDX-License-Identifier: AGPL-3.0-only

//! Periodic 4D lattice geometry.
//!
//! Extents are `[L0, L1, L2, L3]` with direction 0 the time direction.
//! Index order: `x3` fastest, then `x2`, `x1`, and `x0` (time) slowest:
//!
//!   `ix = ((x0·L1 + x1)·L2 + x2)·L3 + x3`
//!
//! Neighbour tables and staggered phases are built once at construction; the
//! geometry is immutable afterwards and shared between fields via `Arc`.

use super::constants::N_DIM;

/// Immutable lattice geometry with precomputed periodic neighbour tables.
#[derive(Debug, PartialEq, Eq)]
pub struct Lattice {
    dims: [usize; N_DIM],
    volume: usize,
    /// `up[ix][mu]` = index of x + mu
    up: Vec<[usize; N_DIM]>,
    /// `dn[ix][mu]` = index of x - mu
    dn: Vec<[usize; N_DIM]>,
}

impl Lattice {
    /// Build the geometry for extents `[L0, L1, L2, L3]`.
    ///
    /// # Panics
    ///
    /// Panics if any extent is zero.
    #[must_use]
    pub fn new(dims: [usize; N_DIM]) -> Self {
        assert!(dims.iter().all(|&l| l > 0), "lattice extents must be positive: {dims:?}");
        let volume = dims.iter().product();
        let mut lattice = Self {
            dims,
            volume,
            up: Vec::with_capacity(volume),
            dn: Vec::with_capacity(volume),
        };
        for ix in 0..volume {
            let x = lattice.coords(ix);
            let mut fwd = [0; N_DIM];
            let mut bwd = [0; N_DIM];
            for mu in 0..N_DIM {
                fwd[mu] = lattice.coords_index(lattice.shift(x, mu, true));
                bwd[mu] = lattice.coords_index(lattice.shift(x, mu, false));
            }
            lattice.up.push(fwd);
            lattice.dn.push(bwd);
        }
        lattice
    }

    /// Hypercubic lattice `L⁴`.
    #[must_use]
    pub fn hypercubic(l: usize) -> Self {
        Self::new([l; N_DIM])
    }

    /// Extents `[L0, L1, L2, L3]`.
    #[must_use]
    pub const fn dims(&self) -> [usize; N_DIM] {
        self.dims
    }

    /// Total number of lattice sites.
    #[must_use]
    pub const fn volume(&self) -> usize {
        self.volume
    }

    /// Site index of `(t, x, y, z)`.
    #[must_use]
    pub const fn index(&self, t: usize, x: usize, y: usize, z: usize) -> usize {
        self.coords_index([t, x, y, z])
    }

    /// Site index of a coordinate tuple.
    #[must_use]
    pub const fn coords_index(&self, x: [usize; N_DIM]) -> usize {
        ((x[0] * self.dims[1] + x[1]) * self.dims[2] + x[2]) * self.dims[3] + x[3]
    }

    /// Coordinates `[t, x, y, z]` of site `ix`.
    #[must_use]
    pub const fn coords(&self, ix: usize) -> [usize; N_DIM] {
        let x3 = ix % self.dims[3];
        let rem = ix / self.dims[3];
        let x2 = rem % self.dims[2];
        let rem = rem / self.dims[2];
        let x1 = rem % self.dims[1];
        let x0 = rem / self.dims[1];
        [x0, x1, x2, x3]
    }

    /// Neighbouring site index `ix ± mu`.
    #[inline]
    #[must_use]
    pub fn neighbor(&self, ix: usize, mu: usize, forward: bool) -> usize {
        if forward {
            self.up[ix][mu]
        } else {
            self.dn[ix][mu]
        }
    }

    /// `ix + mu`
    #[inline]
    #[must_use]
    pub fn up(&self, ix: usize, mu: usize) -> usize {
        self.up[ix][mu]
    }

    /// `ix - mu`
    #[inline]
    #[must_use]
    pub fn dn(&self, ix: usize, mu: usize) -> usize {
        self.dn[ix][mu]
    }

    /// Staggered phase η_μ(x) = (-1)^{x_0 + ... + x_{μ-1}}.
    #[must_use]
    pub fn staggered_phase(&self, ix: usize, mu: usize) -> f64 {
        let x = self.coords(ix);
        if x[..mu].iter().sum::<usize>() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }

    const fn shift(&self, x: [usize; N_DIM], mu: usize, forward: bool) -> [usize; N_DIM] {
        let mut y = x;
        if forward {
            y[mu] = (x[mu] + 1) % self.dims[mu];
        } else {
            y[mu] = (x[mu] + self.dims[mu] - 1) % self.dims[mu];
        }
        y
    }
}
