// SPDX-License-Identifier: AGPL-3.0-only

//! SU(3) gauge field and its plaquette observables.
//!
//! The fundamental loop is the plaquette
//!
//!   `P_μν`(x) = `U_μ`(x) `U_ν`(x+μ) `U_μ`†(x+ν) `U_ν`†(x)
//!
//! whose normalized real trace, averaged over all sites and planes, is the
//! integrity checksum stored alongside gauge configurations on disk.
//!
//! # References
//!
//! - Wilson, PRD 10, 2445 (1974)
//! - Gattringer & Lang, "QCD on the Lattice" (2010), Ch. 3

use std::sync::Arc;

use rayon::prelude::*;

use super::constants::{HOT_START_EPSILON, N_COLORS, N_DIM};
use super::field::Field;
use super::geometry::Lattice;
use super::su3::Su3Matrix;

/// Links `U_μ(x)` for the four directions leaving each site.
pub type GaugeField = Field<[Su3Matrix; N_DIM]>;

impl Field<[Su3Matrix; N_DIM]> {
    /// Cold start: all links = identity.
    #[must_use]
    pub fn cold_start(grid: &Arc<Lattice>) -> Self {
        Self::filled(grid, [Su3Matrix::IDENTITY; N_DIM])
    }

    /// Hot start: random SU(3) links from the LCG stream seeded by `seed`.
    #[must_use]
    pub fn hot_start(grid: &Arc<Lattice>, seed: u64) -> Self {
        let mut rng = seed;
        let mut u = Self::cold_start(grid);
        for links in u.as_mut_slice() {
            for link in links.iter_mut() {
                *link = Su3Matrix::random_near_identity(&mut rng, HOT_START_EPSILON);
            }
        }
        u
    }

    /// `U_mu(ix)`
    #[inline]
    pub fn link(&self, ix: usize, mu: usize) -> Su3Matrix {
        self[ix][mu]
    }

    /// `U_nu(ix + mu)`: link `nu` at the forward neighbour in direction `mu`.
    #[inline]
    pub fn up(&self, ix: usize, mu: usize, nu: usize) -> Su3Matrix {
        self[self.grid().up(ix, mu)][nu]
    }

    /// `P_μν(ix)`
    pub fn plaquette(&self, ix: usize, mu: usize, nu: usize) -> Su3Matrix {
        (self.link(ix, mu) * self.up(ix, mu, nu)) * (self.link(ix, nu) * self.up(ix, nu, mu)).adjoint()
    }

    /// 2×1 rectangle extended twice along `mu` and once along `nu`.
    pub fn rectangle(&self, ix: usize, mu: usize, nu: usize) -> Su3Matrix {
        let grid = self.grid();
        let x_mu = grid.up(ix, mu);
        let x_nu = grid.up(ix, nu);
        let x_mu_nu = grid.up(x_mu, nu);
        let x_2mu = grid.up(x_mu, mu);
        let lower = self.link(ix, mu) * self.link(x_mu, mu) * self.link(x_2mu, nu);
        let upper = self.link(ix, nu) * self.link(x_nu, mu) * self.link(x_mu_nu, mu);
        lower * upper.adjoint()
    }

    fn plane_average<F>(&self, planes: &[(usize, usize)], loop_trace: F) -> f64
    where
        F: Fn(usize, usize, usize) -> f64 + Sync,
    {
        let vol = self.volume();
        let sum: f64 = (0..vol)
            .into_par_iter()
            .map(|ix| planes.iter().map(|&(mu, nu)| loop_trace(ix, mu, nu)).sum::<f64>())
            .sum();
        sum / (N_COLORS * planes.len() * vol) as f64
    }

    /// Average plaquette `<Re Tr P / 3>` over all six planes.
    ///
    /// Equal to 1 for a cold start. Used as the gauge file checksum.
    #[must_use]
    pub fn average_plaquette(&self) -> f64 {
        self.plane_average(&ALL_PLANES, |ix, mu, nu| self.plaquette(ix, mu, nu).re_trace())
    }

    /// Average over the three space–space planes.
    #[must_use]
    pub fn spatial_plaquette(&self) -> f64 {
        self.plane_average(&SPATIAL_PLANES, |ix, mu, nu| {
            self.plaquette(ix, mu, nu).re_trace()
        })
    }

    /// Average over the three time–space planes.
    #[must_use]
    pub fn timelike_plaquette(&self) -> f64 {
        self.plane_average(&TIMELIKE_PLANES, |ix, mu, nu| {
            self.plaquette(ix, mu, nu).re_trace()
        })
    }

    /// Average 1×2 rectangle over all twelve ordered direction pairs.
    #[must_use]
    pub fn rectangle_plaquette(&self) -> f64 {
        self.plane_average(&ORDERED_PAIRS, |ix, mu, nu| {
            self.rectangle(ix, mu, nu).re_trace()
        })
    }

    /// Largest `‖U U† − 1‖²` over all links.
    #[must_use]
    pub fn max_unitarity_violation(&self) -> f64 {
        self.as_slice()
            .par_iter()
            .flat_map_iter(|links| links.iter())
            .map(|u| (*u * u.adjoint() - Su3Matrix::IDENTITY).norm_sq())
            .reduce(|| 0.0, f64::max)
    }
}

const ALL_PLANES: [(usize, usize); 6] = [(1, 0), (2, 0), (3, 0), (2, 1), (3, 1), (3, 2)];
const SPATIAL_PLANES: [(usize, usize); 3] = [(2, 1), (3, 1), (3, 2)];
const TIMELIKE_PLANES: [(usize, usize); 3] = [(1, 0), (2, 0), (3, 0)];
const ORDERED_PAIRS: [(usize, usize); 12] = [
    (0, 1),
    (0, 2),
    (0, 3),
    (1, 0),
    (1, 2),
    (1, 3),
    (2, 0),
    (2, 1),
    (2, 3),
    (3, 0),
    (3, 1),
    (3, 2),
];

/// Checksum stored in gauge files: the average plaquette.
#[must_use]
pub fn checksum_plaquette(u: &GaugeField) -> f64 {
    u.average_plaquette()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tolerances::{LATTICE_COLD_PLAQUETTE_ABS, LATTICE_UNITARITY_MAX};

    #[test]
    fn cold_start_plaquettes_are_one() {
        let grid = Arc::new(Lattice::hypercubic(4));
        let u = GaugeField::cold_start(&grid);
        for p in [
            u.average_plaquette(),
            u.spatial_plaquette(),
            u.timelike_plaquette(),
            u.rectangle_plaquette(),
            checksum_plaquette(&u),
        ] {
            assert!((p - 1.0).abs() < LATTICE_COLD_PLAQUETTE_ABS, "cold plaquette = {p}");
        }
    }

    #[test]
    fn hot_start_plaquette_below_one() {
        let grid = Arc::new(Lattice::hypercubic(4));
        let u = GaugeField::hot_start(&grid, 42);
        let p = u.average_plaquette();
        assert!(p < 1.0 && p > -1.0, "hot plaquette = {p}");
        assert!(u.max_unitarity_violation() < LATTICE_UNITARITY_MAX);
    }

    #[test]
    fn average_is_mean_of_spatial_and_timelike() {
        let grid = Arc::new(Lattice::new([4, 2, 2, 2]));
        let u = GaugeField::hot_start(&grid, 7);
        let avg = u.average_plaquette();
        let split = 0.5 * (u.spatial_plaquette() + u.timelike_plaquette());
        assert!((avg - split).abs() < 1e-13);
    }

    #[test]
    fn plaquette_is_unitary() {
        let grid = Arc::new(Lattice::hypercubic(4));
        let u = GaugeField::hot_start(&grid, 99);
        let p = u.plaquette(0, 0, 1);
        assert!((p * p.adjoint() - Su3Matrix::IDENTITY).norm_sq() < LATTICE_UNITARITY_MAX);
    }
}
