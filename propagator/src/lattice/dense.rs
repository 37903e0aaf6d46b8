// SPDX-License-Identifier: AGPL-3.0-only

//! Small dense complex linear algebra for block Krylov bookkeeping.
//!
//! Everything here works on N×N (or m×N) coefficient matrices, never on
//! lattice fields, so it can be tested independently of the lattice size.
//! Backed by `nalgebra`: Cholesky for Hermitian positive-definite systems,
//! LU for general square systems and `SymmetricEigen` for rank-revealing
//! orthonormalization.

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};

/// Complex scalar of the dense layer.
pub type C64 = nalgebra::Complex<f64>;

/// Dense complex matrix.
pub type CMatrix = DMatrix<C64>;

/// Numerical rank policy for [`orthonormalizer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeflationPolicy {
    /// Drop eigen-directions of the column-normalized Gram below this value.
    pub rank_tol: f64,
    /// Drop columns whose norm (square root of the Gram diagonal) is at or
    /// below this value before the eigen-decomposition.
    pub norm_floor: f64,
}

/// `(G + G†) / 2`
#[must_use]
pub fn hermitian_part(g: &CMatrix) -> CMatrix {
    (g + g.adjoint()).scale(0.5)
}

/// Solve `H X = B` for Hermitian positive-definite `H`.
///
/// Returns `None` when the Cholesky factorization fails.
#[must_use]
pub fn hermitian_solve(h: &CMatrix, rhs: &CMatrix) -> Option<CMatrix> {
    Cholesky::new(hermitian_part(h)).map(|chol| chol.solve(rhs))
}

/// Solve `A X = B` for a general square `A`. `None` if `A` is singular.
#[must_use]
pub fn general_solve(a: &CMatrix, rhs: &CMatrix) -> Option<CMatrix> {
    a.clone().lu().solve(rhs)
}

/// Transform `W` (m×k) with `W† G W = I_k` for the Gram matrix `G` of a
/// block `Y`, discarding numerically dependent or negligible directions.
///
/// `Y W` is then orthonormal in the inner product that produced `G` and spans
/// the significant part of `span(Y)`. `k = 0` when nothing survives. Columns
/// are normalized before the eigen-decomposition so the rank test detects
/// linear dependence rather than small norms.
///
/// Returns `None` only if the eigen-decomposition fails.
#[must_use]
pub fn orthonormalizer(gram: &CMatrix, policy: DeflationPolicy) -> Option<CMatrix> {
    let m = gram.nrows();
    let kept: Vec<usize> = (0..m)
        .filter(|&i| {
            let d = gram[(i, i)].re;
            d > 0.0 && d.sqrt() > policy.norm_floor
        })
        .collect();
    if kept.is_empty() {
        return Some(CMatrix::zeros(m, 0));
    }

    let inv_norms: Vec<f64> = kept.iter().map(|&i| 1.0 / gram[(i, i)].re.sqrt()).collect();
    let normalized = CMatrix::from_fn(kept.len(), kept.len(), |a, b| {
        gram[(kept[a], kept[b])] * (inv_norms[a] * inv_norms[b])
    });

    let eigen = SymmetricEigen::try_new(hermitian_part(&normalized), f64::EPSILON, 0)?;
    let significant: Vec<usize> = (0..kept.len())
        .filter(|&j| eigen.eigenvalues[j] > policy.rank_tol)
        .collect();

    let mut w = CMatrix::zeros(m, significant.len());
    for (col, &j) in significant.iter().enumerate() {
        let inv_sqrt_lambda = 1.0 / eigen.eigenvalues[j].sqrt();
        for (a, &row) in kept.iter().enumerate() {
            w[(row, col)] = eigen.eigenvectors[(a, j)] * (inv_norms[a] * inv_sqrt_lambda);
        }
    }
    Some(w)
}

/// Largest `|M_ij − δ_ij|`.
#[must_use]
pub fn max_deviation_from_identity(m: &CMatrix) -> f64 {
    let mut worst = 0.0_f64;
    for i in 0..m.nrows() {
        for j in 0..m.ncols() {
            let target = if i == j { C64::new(1.0, 0.0) } else { C64::new(0.0, 0.0) };
            worst = worst.max((m[(i, j)] - target).norm());
        }
    }
    worst
}
