// SPDX-License-Identifier: AGPL-3.0-only

//! Conjugate Gradient solver for A x = b on the lattice.
//!
//! The standard CG algorithm for positive-definite Hermitian systems, with
//! `A = DD†` in production (see [`super::operator::NormalOperator`]). CG is
//! the reference single-source inverter: it produces the cached `x0_star`
//! solution that the block solver is checked against.
//!
//! # Algorithm
//!
//! Standard CG with relative residual convergence criterion:
//!   ||r||² / ||b||² ≤ tol²
//!
//! After the loop the true residual `‖b − A x‖ / ‖b‖` is recomputed and
//! reported next to the recursive one.
//!
//! # References
//!
//! - Hestenes & Stiefel (1952), original CG
//! - Gattringer & Lang, "QCD on the Lattice" (2010), Ch. 8.4

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::complex_f64::Complex64;
use super::field::FermionField;
use super::operator::LinearOperator;
use crate::error::{PropagatorError, Result};
use crate::tolerances::{LATTICE_CG_TOLERANCE_STRICT, SOLVER_BREAKDOWN_GUARD};

/// Terminal state of an iterative solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Residual reached the tolerance.
    Converged,
    /// Iteration cap hit first.
    MaxIterationsExceeded,
    /// The Krylov recursion could not continue (vanishing curvature or an
    /// exhausted direction block) above the tolerance.
    Breakdown,
}

/// CG stopping criteria.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CgConfig {
    /// Relative residual `‖r‖/‖b‖` at which the solve stops.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            tolerance: LATTICE_CG_TOLERANCE_STRICT,
            max_iterations: 10_000,
        }
    }
}

/// CG solver result.
#[derive(Clone, Debug, Serialize)]
pub struct CgResult {
    pub status: SolveStatus,
    pub iterations: usize,
    /// Recursive relative residual at exit.
    pub final_residual: f64,
    pub initial_residual: f64,
    /// Recomputed `‖b − A x‖ / ‖b‖`.
    pub true_residual: f64,
}

impl CgResult {
    #[must_use]
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    /// `Err(NotConverged)` unless the solve converged.
    pub fn into_converged(self) -> Result<Self> {
        if self.converged() {
            Ok(self)
        } else {
            Err(PropagatorError::NotConverged {
                solver: "CG",
                iterations: self.iterations,
                residual: self.final_residual,
            })
        }
    }
}

/// `r = b − A x`; returns `‖r‖²`.
pub fn residual_into<A: LinearOperator + ?Sized>(
    op: &A,
    r: &mut FermionField,
    x: &FermionField,
    b: &FermionField,
) -> Result<f64> {
    op.apply(r, x)?;
    // r = b − A x
    r.xpay(b, -Complex64::ONE);
    Ok(r.norm_sq())
}

/// Solve A x = b using Conjugate Gradient.
///
/// `x` is modified in place and may carry an initial guess.
/// A zero right-hand side returns `x = 0` without applying the operator.
pub fn cg_solve<A: LinearOperator + ?Sized>(
    op: &A,
    x: &mut FermionField,
    b: &FermionField,
    config: &CgConfig,
) -> Result<CgResult> {
    let grid = op.grid();
    grid_check(grid.volume(), x)?;
    grid_check(grid.volume(), b)?;

    let b_norm_sq = b.norm_sq();
    if b_norm_sq == 0.0 {
        x.set_zero();
        return Ok(CgResult {
            status: SolveStatus::Converged,
            iterations: 0,
            final_residual: 0.0,
            initial_residual: 0.0,
            true_residual: 0.0,
        });
    }

    let mut r = FermionField::zeros(grid);
    let mut ap = FermionField::zeros(grid);
    let mut r_norm_sq = residual_into(op, &mut r, x, b)?;
    let initial_residual = (r_norm_sq / b_norm_sq).sqrt();
    let tol_sq = config.tolerance * config.tolerance * b_norm_sq;

    let mut status = SolveStatus::MaxIterationsExceeded;
    let mut iterations = 0;

    if r_norm_sq <= tol_sq {
        status = SolveStatus::Converged;
    } else {
        let mut p = r.clone();
        for iter in 1..=config.max_iterations {
            iterations = iter;

            op.apply(&mut ap, &p)?;

            // alpha = <r|r> / <p|Ap>
            let p_ap = p.dot(&ap).re;
            let curvature_bound = p.norm_sq().sqrt() * ap.norm_sq().sqrt();
            let curved = p_ap > SOLVER_BREAKDOWN_GUARD * curvature_bound;
            if !curved {
                status = SolveStatus::Breakdown;
                break;
            }
            let alpha = r_norm_sq / p_ap;

            x.axpy(Complex64::new(alpha, 0.0), &p);
            r.axpy(Complex64::new(-alpha, 0.0), &ap);

            let r_norm_sq_new = r.norm_sq();
            debug!(
                "CG iter {iter}: residual {:.6e}",
                (r_norm_sq_new / b_norm_sq).sqrt()
            );

            if r_norm_sq_new <= tol_sq {
                r_norm_sq = r_norm_sq_new;
                status = SolveStatus::Converged;
                break;
            }

            // beta = <r_new|r_new> / <r_old|r_old>
            let beta = r_norm_sq_new / r_norm_sq;
            r_norm_sq = r_norm_sq_new;

            // p = r + beta * p
            p.xpay(&r, Complex64::new(beta, 0.0));
        }
    }

    let final_residual = (r_norm_sq / b_norm_sq).sqrt();
    let true_residual = (residual_into(op, &mut ap, x, b)? / b_norm_sq).sqrt();

    match status {
        SolveStatus::Converged => info!(
            "CG converged in {iterations} iterations: residual {final_residual:.3e} (true {true_residual:.3e})"
        ),
        _ => warn!(
            "CG stopped ({status:?}) after {iterations} iterations: residual {final_residual:.3e}"
        ),
    }

    Ok(CgResult {
        status,
        iterations,
        final_residual,
        initial_residual,
        true_residual,
    })
}

fn grid_check(volume: usize, field: &FermionField) -> Result<()> {
    if field.volume() == volume {
        Ok(())
    } else {
        Err(PropagatorError::VolumeMismatch {
            expected: volume,
            found: field.volume(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::lattice::dirac::{DiracParams, StaggeredDirac};
    use crate::lattice::field::is_field_equal;
    use crate::lattice::gauge::GaugeField;
    use crate::lattice::geometry::Lattice;
    use crate::lattice::operator::NormalOperator;
    use crate::tolerances::LATTICE_CG_RESIDUAL;

    /// `A = s·1`, enough to exercise the recursion without a stencil.
    struct ScaledIdentity {
        grid: Arc<Lattice>,
        scale: f64,
    }

    impl LinearOperator for ScaledIdentity {
        fn grid(&self) -> &Arc<Lattice> {
            &self.grid
        }

        fn apply(&self, out: &mut FermionField, input: &FermionField) -> Result<()> {
            out.copy_from(input);
            out.scale_inplace(self.scale);
            Ok(())
        }
    }

    fn hot_setup(seed: u64) -> (Arc<Lattice>, GaugeField, StaggeredDirac) {
        let grid = Arc::new(Lattice::hypercubic(4));
        let u = GaugeField::hot_start(&grid, seed);
        let dirac = StaggeredDirac::new(&grid);
        (grid, u, dirac)
    }

    #[test]
    fn cg_cold_lattice() {
        let grid = Arc::new(Lattice::hypercubic(4));
        let u = GaugeField::cold_start(&grid);
        let dirac = StaggeredDirac::new(&grid);
        let op = NormalOperator::new(&dirac, &u, DiracParams::new(1.0, 0.0)).unwrap();
        let b = FermionField::random(&grid, 42);
        let mut x = FermionField::zeros(&grid);

        let config = CgConfig {
            tolerance: 1e-8,
            max_iterations: 500,
        };
        let result = cg_solve(&op, &mut x, &b, &config).unwrap();
        assert!(
            result.converged(),
            "CG should converge on cold lattice: residual={}",
            result.final_residual
        );
        assert!(result.final_residual <= 1e-8);
    }

    #[test]
    fn cg_zero_rhs() {
        let (grid, u, dirac) = hot_setup(1);
        let op = NormalOperator::new(&dirac, &u, DiracParams::new(0.1, 0.0)).unwrap();
        let b = FermionField::zeros(&grid);
        let mut x = FermionField::random(&grid, 9);

        let result = cg_solve(&op, &mut x, &b, &CgConfig::default()).unwrap();
        assert!(result.converged());
        assert_eq!(result.iterations, 0);
        assert_eq!(x.norm_sq(), 0.0);
    }

    #[test]
    fn cg_verify_solution() {
        let (grid, u, dirac) = hot_setup(42);
        let params = DiracParams::new(0.5, 0.2);
        let op = NormalOperator::new(&dirac, &u, params).unwrap();
        let b = FermionField::random(&grid, 99);
        let mut x = FermionField::zeros(&grid);

        let config = CgConfig {
            tolerance: LATTICE_CG_RESIDUAL,
            max_iterations: 1000,
        };
        let result = cg_solve(&op, &mut x, &b, &config).unwrap();
        assert!(result.converged(), "CG should converge");

        // Verify: A x ≈ b
        let mut ax = FermionField::zeros(&grid);
        op.apply(&mut ax, &x).unwrap();
        let rel_residual = is_field_equal(&ax, &b) / b.norm_sq().sqrt();
        assert!(
            rel_residual < 10.0 * LATTICE_CG_RESIDUAL,
            "Ax should ≈ b: relative residual = {rel_residual}"
        );
        assert!((rel_residual - result.true_residual).abs() < 1e-10);
    }

    #[test]
    fn cg_exact_initial_guess_needs_no_iterations() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let op = ScaledIdentity {
            grid: Arc::clone(&grid),
            scale: 2.0,
        };
        let b = FermionField::random(&grid, 3);
        let mut x = b.clone();
        x.scale_inplace(0.5);

        let result = cg_solve(&op, &mut x, &b, &CgConfig::default()).unwrap();
        assert!(result.converged());
        assert_eq!(result.iterations, 0);
        assert!(result.initial_residual < 1e-15);
    }

    #[test]
    fn cg_on_scaled_identity_converges_in_one_step() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let op = ScaledIdentity {
            grid: Arc::clone(&grid),
            scale: 4.0,
        };
        let b = FermionField::random(&grid, 5);
        let mut x = FermionField::zeros(&grid);
        let result = cg_solve(&op, &mut x, &b, &CgConfig::default()).unwrap();
        assert!(result.converged());
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn cg_reports_iteration_cap() {
        let (grid, u, dirac) = hot_setup(7);
        let op = NormalOperator::new(&dirac, &u, DiracParams::new(0.01, 0.0)).unwrap();
        let b = FermionField::random(&grid, 8);
        let mut x = FermionField::zeros(&grid);
        let config = CgConfig {
            tolerance: 1e-14,
            max_iterations: 3,
        };
        let result = cg_solve(&op, &mut x, &b, &config).unwrap();
        assert_eq!(result.status, SolveStatus::MaxIterationsExceeded);
        assert_eq!(result.iterations, 3);
        assert!(matches!(
            result.into_converged(),
            Err(PropagatorError::NotConverged { iterations: 3, .. })
        ));
    }

    #[test]
    fn cg_vanishing_curvature_is_breakdown() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let op = ScaledIdentity {
            grid: Arc::clone(&grid),
            scale: 0.0,
        };
        let b = FermionField::random(&grid, 1);
        let mut x = FermionField::zeros(&grid);
        let result = cg_solve(&op, &mut x, &b, &CgConfig::default()).unwrap();
        assert_eq!(result.status, SolveStatus::Breakdown);
        assert_eq!(result.iterations, 1);

        let indefinite = ScaledIdentity {
            grid: Arc::clone(&grid),
            scale: -1.0,
        };
        x.set_zero();
        let result = cg_solve(&indefinite, &mut x, &b, &CgConfig::default()).unwrap();
        assert_eq!(result.status, SolveStatus::Breakdown);
    }

    #[test]
    fn cg_tiny_source_converges_like_unit_source() {
        let (grid, u, dirac) = hot_setup(31);
        let op = NormalOperator::new(&dirac, &u, DiracParams::new(0.1, 0.0)).unwrap();
        let config = CgConfig {
            tolerance: 1e-10,
            max_iterations: 2000,
        };
        let b = FermionField::random(&grid, 32);
        let mut tiny_b = b.clone();
        tiny_b.scale_inplace(1e-16);

        let mut x = FermionField::zeros(&grid);
        let unit = cg_solve(&op, &mut x, &b, &config).unwrap();
        let mut tiny_x = FermionField::zeros(&grid);
        let tiny = cg_solve(&op, &mut tiny_x, &tiny_b, &config).unwrap();

        assert!(unit.converged());
        assert_eq!(tiny.status, SolveStatus::Converged);
        assert!(tiny.iterations.abs_diff(unit.iterations) <= 1);
        assert!(tiny.true_residual < 1e-8, "true residual {}", tiny.true_residual);
        tiny_x.scale_inplace(1e16);
        assert!(is_field_equal(&tiny_x, &x) / x.norm_sq().sqrt() < 1e-8);
    }

    #[test]
    fn cg_tiny_operator_scale_is_not_breakdown() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let op = ScaledIdentity {
            grid: Arc::clone(&grid),
            scale: 1e-40,
        };
        let b = FermionField::random(&grid, 6);
        let mut x = FermionField::zeros(&grid);
        let result = cg_solve(&op, &mut x, &b, &CgConfig::default()).unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn cg_rejects_mismatched_rhs() {
        let grid = Arc::new(Lattice::hypercubic(2));
        let other = Arc::new(Lattice::hypercubic(4));
        let op = ScaledIdentity {
            grid: Arc::clone(&grid),
            scale: 1.0,
        };
        let b = FermionField::random(&other, 1);
        let mut x = FermionField::zeros(&grid);
        assert!(matches!(
            cg_solve(&op, &mut x, &b, &CgConfig::default()),
            Err(PropagatorError::VolumeMismatch { expected: 16, found: 256 })
        ));
    }
}
