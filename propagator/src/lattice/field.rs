// SPDX-License-Identifier: AGPL-3.0-only

//! Geometry-indexed field container.
//!
//! `Field<T>` owns one contiguous value per lattice site and keeps a shared
//! handle to the geometry it was built on. The element type is a colour
//! vector for fermion fields and four SU(3) links for gauge fields
//! (see [`super::gauge::GaugeField`]).
//!
//! Fermion reductions (`dot`, `norm_sq`) are rayon parallel sums. Their
//! result is reproducible to rounding only: the summation tree depends on
//! the thread count, so bit-identical results across thread counts are not
//! guaranteed.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use rayon::prelude::*;

use super::complex_f64::Complex64;
use super::constants::{lcg_gaussian, lcg_uniform_f64, N_COLORS};
use super::geometry::Lattice;
use super::su3::ColorVector;
use crate::error::{PropagatorError, Result};

/// Owned per-site values on a lattice.
#[derive(Clone, Debug)]
pub struct Field<T> {
    data: Vec<T>,
    grid: Arc<Lattice>,
}

impl<T: Copy> Field<T> {
    /// Field with every site set to `value`.
    #[must_use]
    pub fn filled(grid: &Arc<Lattice>, value: T) -> Self {
        Self {
            data: vec![value; grid.volume()],
            grid: Arc::clone(grid),
        }
    }

    /// Wrap existing site data; the length must equal the lattice volume.
    pub fn from_vec(grid: &Arc<Lattice>, data: Vec<T>) -> Result<Self> {
        if data.len() != grid.volume() {
            return Err(PropagatorError::VolumeMismatch {
                expected: grid.volume(),
                found: data.len(),
            });
        }
        Ok(Self {
            data,
            grid: Arc::clone(grid),
        })
    }
}

impl<T> Field<T> {
    /// Geometry this field lives on.
    #[must_use]
    pub fn grid(&self) -> &Arc<Lattice> {
        &self.grid
    }

    /// Number of sites.
    #[must_use]
    pub fn volume(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// `Err(VolumeMismatch)` unless `other` has the same volume.
    pub fn ensure_same_volume<U>(&self, other: &Field<U>) -> Result<()> {
        if self.volume() == other.volume() {
            Ok(())
        } else {
            Err(PropagatorError::VolumeMismatch {
                expected: self.volume(),
                found: other.volume(),
            })
        }
    }
}

impl<T> Index<usize> for Field<T> {
    type Output = T;
    #[inline]
    fn index(&self, ix: usize) -> &T {
        &self.data[ix]
    }
}

impl<T> IndexMut<usize> for Field<T> {
    #[inline]
    fn index_mut(&mut self, ix: usize) -> &mut T {
        &mut self.data[ix]
    }
}

/// Single-component staggered fermion field: one colour triplet per site.
pub type FermionField = Field<ColorVector>;

#[inline]
fn site_dot(a: &ColorVector, b: &ColorVector) -> Complex64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * *y).sum()
}

#[inline]
fn site_norm_sq(a: &ColorVector) -> f64 {
    a.iter().map(|z| z.abs_sq()).sum()
}

impl Field<ColorVector> {
    /// Zero fermion field.
    #[must_use]
    pub fn zeros(grid: &Arc<Lattice>) -> Self {
        Self::filled(grid, [Complex64::ZERO; N_COLORS])
    }

    /// Gaussian noise source: every real and imaginary component N(0, 1/2),
    /// so each complex component has unit variance.
    #[must_use]
    pub fn gaussian(grid: &Arc<Lattice>, seed: &mut u64) -> Self {
        let mut field = Self::zeros(grid);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        for site in &mut field.data {
            for c in site.iter_mut() {
                let re = lcg_gaussian(seed) * s;
                let im = lcg_gaussian(seed) * s;
                *c = Complex64::new(re, im);
            }
        }
        field
    }

    /// Uniform random components in [-0.5, 0.5).
    #[must_use]
    pub fn random(grid: &Arc<Lattice>, seed: u64) -> Self {
        let mut rng = seed;
        let mut field = Self::zeros(grid);
        for site in &mut field.data {
            for c in site.iter_mut() {
                let re = lcg_uniform_f64(&mut rng) - 0.5;
                let im = lcg_uniform_f64(&mut rng) - 0.5;
                *c = Complex64::new(re, im);
            }
        }
        field
    }

    /// Unit point source at site `ix`, colour `color`.
    #[must_use]
    pub fn point_source(grid: &Arc<Lattice>, ix: usize, color: usize) -> Self {
        let mut field = Self::zeros(grid);
        field.data[ix][color] = Complex64::ONE;
        field
    }

    /// Inner product `⟨self|other⟩ = Σ_x Σ_c conj(self(x,c)) other(x,c)`.
    #[must_use]
    pub fn dot(&self, other: &Self) -> Complex64 {
        debug_assert_eq!(self.volume(), other.volume());
        self.data
            .par_iter()
            .zip(other.data.par_iter())
            .map(|(a, b)| site_dot(a, b))
            .sum()
    }

    /// Squared norm `‖self‖²`.
    #[must_use]
    pub fn norm_sq(&self) -> f64 {
        self.data.par_iter().map(site_norm_sq).sum()
    }

    /// `self += a·x`
    pub fn axpy(&mut self, a: Complex64, x: &Self) {
        debug_assert_eq!(self.volume(), x.volume());
        self.data
            .par_iter_mut()
            .zip(x.data.par_iter())
            .for_each(|(si, xi)| {
                for c in 0..N_COLORS {
                    si[c] += a * xi[c];
                }
            });
    }

    /// `self = x + a·self`
    pub fn xpay(&mut self, x: &Self, a: Complex64) {
        debug_assert_eq!(self.volume(), x.volume());
        self.data
            .par_iter_mut()
            .zip(x.data.par_iter())
            .for_each(|(si, xi)| {
                for c in 0..N_COLORS {
                    si[c] = xi[c] + a * si[c];
                }
            });
    }

    /// `self *= a`
    pub fn scale_inplace(&mut self, a: f64) {
        self.data.par_iter_mut().for_each(|site| {
            for c in site.iter_mut() {
                *c = c.scale(a);
            }
        });
    }

    /// `self *= a` for complex `a`.
    pub fn scale_complex(&mut self, a: Complex64) {
        self.data.par_iter_mut().for_each(|site| {
            for c in site.iter_mut() {
                *c *= a;
            }
        });
    }

    /// `self += other`
    pub fn add_assign_field(&mut self, other: &Self) {
        self.axpy(Complex64::ONE, other);
    }

    /// `self -= other`
    pub fn sub_assign_field(&mut self, other: &Self) {
        self.axpy(-Complex64::ONE, other);
    }

    /// Zero all entries.
    pub fn set_zero(&mut self) {
        self.data
            .par_iter_mut()
            .for_each(|site| *site = [Complex64::ZERO; N_COLORS]);
    }

    /// Copy from another field of the same volume.
    pub fn copy_from(&mut self, other: &Self) {
        self.data.copy_from_slice(&other.data);
    }
}

/// `sqrt(Σ_x ‖lhs(x) − rhs(x)‖²)`; zero iff the fields are equal.
///
/// Fields of different volume are never equal: the distance is `+∞`.
#[must_use]
pub fn is_field_equal(lhs: &FermionField, rhs: &FermionField) -> f64 {
    if lhs.volume() != rhs.volume() {
        return f64::INFINITY;
    }
    lhs.data
        .par_iter()
        .zip(rhs.data.par_iter())
        .map(|(a, b)| {
            a.iter()
                .zip(b)
                .map(|(x, y)| (*x - *y).abs_sq())
                .sum::<f64>()
        })
        .sum::<f64>()
        .sqrt()
}
