// SPDX-License-Identifier: AGPL-3.0-only

//! Ordered block of fermion fields.
//!
//! Block Krylov methods move between lattice-sized columns and small dense
//! coefficient matrices. The two directions are
//!
//!   `gram`:    (X, Y) ↦ X†Y         (m×n dense)
//!   `combine`: (X, C) ↦ X C          (block of width C.ncols())
//!
//! and everything the block solver does is composed from them plus the
//! column-wise arithmetic on [`FermionField`].

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use super::complex_f64::Complex64;
use super::dense::{CMatrix, C64};
use super::field::FermionField;
use super::geometry::Lattice;

/// N fermion fields sharing a geometry.
#[derive(Clone, Debug)]
pub struct FermionBlock {
    columns: Vec<FermionField>,
    grid: Arc<Lattice>,
}

impl FermionBlock {
    /// `width` zero columns.
    #[must_use]
    pub fn zeros(grid: &Arc<Lattice>, width: usize) -> Self {
        Self {
            columns: vec![FermionField::zeros(grid); width],
            grid: Arc::clone(grid),
        }
    }

    /// Block owning copies of `columns`.
    #[must_use]
    pub fn from_slice(grid: &Arc<Lattice>, columns: &[FermionField]) -> Self {
        Self {
            columns: columns.to_vec(),
            grid: Arc::clone(grid),
        }
    }

    #[must_use]
    pub fn grid(&self) -> &Arc<Lattice> {
        &self.grid
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn columns(&self) -> &[FermionField] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [FermionField] {
        &mut self.columns
    }

    /// `self† other` (`self.width() × other.width()`).
    #[must_use]
    pub fn gram(&self, other: &Self) -> CMatrix {
        CMatrix::from_fn(self.width(), other.width(), |i, j| {
            self.columns[i].dot(&other.columns[j]).into()
        })
    }

    /// Hermitian `self† self`; only the upper triangle is computed.
    #[must_use]
    pub fn self_gram(&self) -> CMatrix {
        let n = self.width();
        let mut g = CMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let z: C64 = self.columns[i].dot(&self.columns[j]).into();
                g[(i, j)] = z;
                g[(j, i)] = z.conj();
            }
        }
        g
    }

    /// `‖x_i‖²` per column.
    #[must_use]
    pub fn column_norms_sq(&self) -> Vec<f64> {
        self.columns.iter().map(FermionField::norm_sq).collect()
    }

    /// `X C`: column `j` of the result is `Σ_i x_i C_ij`.
    #[must_use]
    pub fn combine(&self, coeffs: &CMatrix) -> Self {
        let mut out = Self::zeros(&self.grid, coeffs.ncols());
        out.add_combination(self, coeffs);
        out
    }

    /// `self += X C`
    pub fn add_combination(&mut self, x: &Self, coeffs: &CMatrix) {
        debug_assert_eq!(x.width(), coeffs.nrows());
        debug_assert_eq!(self.width(), coeffs.ncols());
        for (j, out) in self.columns.iter_mut().enumerate() {
            for (i, xi) in x.columns.iter().enumerate() {
                let c: Complex64 = coeffs[(i, j)].into();
                if c != Complex64::ZERO {
                    out.axpy(c, xi);
                }
            }
        }
    }

    /// `self −= X C`
    pub fn sub_combination(&mut self, x: &Self, coeffs: &CMatrix) {
        self.add_combination(x, &(-coeffs));
    }
}

impl Index<usize> for FermionBlock {
    type Output = FermionField;
    fn index(&self, i: usize) -> &FermionField {
        &self.columns[i]
    }
}

impl IndexMut<usize> for FermionBlock {
    fn index_mut(&mut self, i: usize) -> &mut FermionField {
        &mut self.columns[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::field::is_field_equal;

    fn random_block(grid: &Arc<Lattice>, width: usize, seed: u64) -> FermionBlock {
        let cols: Vec<FermionField> = (0..width as u64)
            .map(|k| FermionField::random(grid, seed + k))
            .collect();
        FermionBlock::from_slice(grid, &cols)
    }

    #[test]
    fn gram_matches_field_dots() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let x = random_block(&grid, 3, 10);
        let y = random_block(&grid, 2, 20);
        let g = x.gram(&y);
        assert_eq!((g.nrows(), g.ncols()), (3, 2));
        for i in 0..3 {
            for j in 0..2 {
                let direct = x[i].dot(&y[j]);
                assert!((Complex64::from(g[(i, j)]) - direct).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn self_gram_is_hermitian_with_norm_diagonal() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let x = random_block(&grid, 4, 3);
        let g = x.self_gram();
        assert!((&g - g.adjoint()).norm() < 1e-14);
        for (i, n) in x.column_norms_sq().iter().enumerate() {
            assert!((g[(i, i)].re - n).abs() < 1e-12);
        }
        assert!((&g - x.gram(&x)).norm() < 1e-12);
    }

    #[test]
    fn combine_with_identity_is_copy() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let x = random_block(&grid, 3, 7);
        let y = x.combine(&CMatrix::identity(3, 3));
        for i in 0..3 {
            assert_eq!(is_field_equal(&x[i], &y[i]), 0.0);
        }
    }

    #[test]
    fn combination_add_then_sub_restores() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let x = random_block(&grid, 2, 1);
        let mut y = random_block(&grid, 3, 5);
        let y0 = y.clone();
        let c = CMatrix::from_fn(2, 3, |i, j| C64::new(i as f64 + 0.5, j as f64 - 1.0));
        y.add_combination(&x, &c);
        y.sub_combination(&x, &c);
        for j in 0..3 {
            assert!(is_field_equal(&y[j], &y0[j]) < 1e-12);
        }
    }

    #[test]
    fn narrowing_combination_changes_width() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let x = random_block(&grid, 3, 11);
        let mut c = CMatrix::zeros(3, 1);
        c[(1, 0)] = C64::new(2.0, 0.0);
        let y = x.combine(&c);
        assert_eq!(y.width(), 1);
        assert!((y[0].norm_sq() - 4.0 * x[1].norm_sq()).abs() < 1e-12);
    }
}
