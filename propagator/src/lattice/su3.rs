// SPDX-License-Identifier: AGPL-3.0-only

//! SU(3) matrix operations for lattice gauge fields.
//!
//! An SU(3) matrix is a 3×3 unitary matrix with determinant 1.
//! Each link variable `U_μ`(x) is an `SU(3)` matrix representing the
//! parallel transporter along direction μ from site x.
//!
//! Storage: row-major, 9 Complex64 values (18 f64). The type is `Pod`, so a
//! gauge field is byte-compatible with the (real, imaginary) row-major file
//! layout.
//!
//! # References
//!
//! - Gattringer & Lang, "QCD on the Lattice" (2010), Ch. 2

use std::ops::{Add, Mul, Sub};

use bytemuck::{Pod, Zeroable};

use super::complex_f64::Complex64;
use super::constants::{lcg_gaussian, LATTICE_DIVISION_GUARD, N_COLORS};

/// Colour vector at a single lattice site.
pub type ColorVector = [Complex64; N_COLORS];

/// 3×3 complex matrix: SU(3) link variable.
///
/// Row-major storage: `m[row][col]`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[must_use]
pub struct Su3Matrix {
    /// Matrix elements m[row][col].
    pub m: [[Complex64; 3]; 3],
}

impl Mul for Su3Matrix {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                let mut s = Complex64::ZERO;
                for k in 0..3 {
                    s += self.m[i][k] * rhs.m[k][j];
                }
                r.m[i][j] = s;
            }
        }
        r
    }
}

impl Add for Su3Matrix {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                r.m[i][j] = self.m[i][j] + rhs.m[i][j];
            }
        }
        r
    }
}

impl Sub for Su3Matrix {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                r.m[i][j] = self.m[i][j] - rhs.m[i][j];
            }
        }
        r
    }
}

impl Su3Matrix {
    /// 3×3 identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            [Complex64::ONE, Complex64::ZERO, Complex64::ZERO],
            [Complex64::ZERO, Complex64::ONE, Complex64::ZERO],
            [Complex64::ZERO, Complex64::ZERO, Complex64::ONE],
        ],
    };

    /// Zero matrix (all elements 0).
    pub const ZERO: Self = Self {
        m: [[Complex64::ZERO; 3]; 3],
    };

    /// Conjugate transpose (adjoint / dagger).
    pub fn adjoint(self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                r.m[i][j] = self.m[j][i].conj();
            }
        }
        r
    }

    /// Trace: Tr(U) = sum\_i `U_ii`
    pub fn trace(self) -> Complex64 {
        self.m[0][0] + self.m[1][1] + self.m[2][2]
    }

    /// Real part of trace.
    #[must_use]
    pub fn re_trace(self) -> f64 {
        self.m[0][0].re + self.m[1][1].re + self.m[2][2].re
    }

    /// Determinant of a 3×3 complex matrix.
    pub fn det(self) -> Complex64 {
        let m = &self.m;
        let a = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]);
        let b = m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0]);
        let c = m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        a - b + c
    }

    /// Frobenius norm squared: sum |`m_ij`|²
    #[must_use]
    pub fn norm_sq(self) -> f64 {
        self.m.iter().flatten().map(|z| z.abs_sq()).sum()
    }

    /// `U v`
    #[inline]
    #[must_use]
    pub fn mul_vec(&self, v: &ColorVector) -> ColorVector {
        let mut r = [Complex64::ZERO; 3];
        for (c, out) in r.iter_mut().enumerate() {
            for (cp, vc) in v.iter().enumerate() {
                *out += self.m[c][cp] * *vc;
            }
        }
        r
    }

    /// `U† v` without forming the adjoint.
    #[inline]
    #[must_use]
    pub fn adjoint_mul_vec(&self, v: &ColorVector) -> ColorVector {
        let mut r = [Complex64::ZERO; 3];
        for (c, out) in r.iter_mut().enumerate() {
            for (cp, vc) in v.iter().enumerate() {
                *out += self.m[cp][c].conj() * *vc;
            }
        }
        r
    }

    /// Project back onto SU(3) via modified Gram-Schmidt reunitarization.
    ///
    /// Orthonormalizes rows 0 and 1, then row 2 = conj(row 0 × row 1) so that
    /// det = 1.
    pub fn reunitarize(self) -> Self {
        let mut u = self;

        let n0 = row_norm(&u, 0);
        if n0 > LATTICE_DIVISION_GUARD {
            let inv = 1.0 / n0;
            for j in 0..3 {
                u.m[0][j] = u.m[0][j].scale(inv);
            }
        }

        let dot01 = row_dot(&u, 0, 1);
        for j in 0..3 {
            u.m[1][j] -= u.m[0][j] * dot01;
        }
        let n1 = row_norm(&u, 1);
        if n1 > LATTICE_DIVISION_GUARD {
            let inv = 1.0 / n1;
            for j in 0..3 {
                u.m[1][j] = u.m[1][j].scale(inv);
            }
        }

        u.m[2][0] = (u.m[0][1] * u.m[1][2] - u.m[0][2] * u.m[1][1]).conj();
        u.m[2][1] = (u.m[0][2] * u.m[1][0] - u.m[0][0] * u.m[1][2]).conj();
        u.m[2][2] = (u.m[0][0] * u.m[1][1] - u.m[0][1] * u.m[1][0]).conj();

        u
    }

    /// Random SU(3) matrix near the identity: reunitarized
    /// `I + iεH − ε²H²/2` for a random traceless Hermitian H.
    pub fn random_near_identity(seed: &mut u64, epsilon: f64) -> Self {
        let mut h = [[Complex64::ZERO; 3]; 3];
        let mut rand_gauss = || -> f64 { lcg_gaussian(seed) * epsilon };

        // Diagonal (traceless): a3 * λ3 + a8 * λ8
        let a3 = rand_gauss();
        let a8 = rand_gauss();
        let inv_sqrt3 = 1.0 / 3.0_f64.sqrt();
        h[0][0] = Complex64::new(a3 + a8 * inv_sqrt3, 0.0);
        h[1][1] = Complex64::new(-a3 + a8 * inv_sqrt3, 0.0);
        h[2][2] = Complex64::new(-2.0 * a8 * inv_sqrt3, 0.0);

        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            let re = rand_gauss();
            let im = rand_gauss();
            h[i][j] = Complex64::new(re, im);
            h[j][i] = Complex64::new(re, -im);
        }

        let mut result = Self::IDENTITY;
        for (i, row) in result.m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let h2_ij = (0..3).fold(Complex64::ZERO, |acc, k| acc + h[i][k] * h[k][j]);
                *cell += Complex64::I * h[i][j] - h2_ij.scale(0.5);
            }
        }

        result.reunitarize()
    }
}

fn row_norm(u: &Su3Matrix, row: usize) -> f64 {
    u.m[row].iter().map(|z| z.abs_sq()).sum::<f64>().sqrt()
}

fn row_dot(u: &Su3Matrix, r1: usize, r2: usize) -> Complex64 {
    let mut s = Complex64::ZERO;
    for j in 0..3 {
        s += u.m[r1][j].conj() * u.m[r2][j];
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unitary(u: Su3Matrix, tol: f64) {
        let prod = u * u.adjoint();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (prod.m[i][j].re - expected).abs() < tol && prod.m[i][j].im.abs() < tol,
                    "U U† not identity at ({i},{j}): {}",
                    prod.m[i][j]
                );
            }
        }
    }

    #[test]
    fn identity_properties() {
        let i = Su3Matrix::IDENTITY;
        assert!((i.det().re - 1.0).abs() < 1e-14);
        assert!(i.det().im.abs() < 1e-14);
        assert!((i.re_trace() - 3.0).abs() < 1e-14);
        assert!((i.norm_sq() - 3.0).abs() < 1e-14);
    }

    #[test]
    fn random_link_is_special_unitary() {
        let mut seed = 123u64;
        for _ in 0..20 {
            let u = Su3Matrix::random_near_identity(&mut seed, 1.5);
            assert_unitary(u, 1e-12);
            let d = u.det();
            assert!((d.re - 1.0).abs() < 1e-12 && d.im.abs() < 1e-12, "det = {d}");
        }
    }

    #[test]
    fn adjoint_mul_vec_matches_explicit_adjoint() {
        let mut seed = 7u64;
        let u = Su3Matrix::random_near_identity(&mut seed, 0.7);
        let v = [
            Complex64::new(0.3, -1.0),
            Complex64::new(2.0, 0.5),
            Complex64::new(-0.7, 0.1),
        ];
        let a = u.adjoint_mul_vec(&v);
        let b = u.adjoint().mul_vec(&v);
        for c in 0..3 {
            assert!((a[c] - b[c]).abs() < 1e-14);
        }
    }

    #[test]
    fn unitary_preserves_vector_norm() {
        let mut seed = 99u64;
        let u = Su3Matrix::random_near_identity(&mut seed, 1.0);
        let v = [Complex64::ONE, Complex64::I, Complex64::new(1.0, 1.0)];
        let uv = u.mul_vec(&v);
        let n_in: f64 = v.iter().map(|z| z.abs_sq()).sum();
        let n_out: f64 = uv.iter().map(|z| z.abs_sq()).sum();
        assert!((n_in - n_out).abs() < 1e-12);
    }

    #[test]
    fn reunitarize_fixes_drift() {
        let mut seed = 999u64;
        let mut u = Su3Matrix::random_near_identity(&mut seed, 0.5);
        u.m[0][0].re += 0.1;
        u.m[1][2].im -= 0.05;
        assert_unitary(u.reunitarize(), 1e-10);
    }
}
