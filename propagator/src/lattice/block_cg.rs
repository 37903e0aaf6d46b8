// SPDX-License-Identifier: AGPL-3.0-only

//! Block Conjugate Gradient for A X = B with N right-hand sides.
//!
//! One Krylov recursion is shared by all sources: every iteration applies
//! `A = DD†` to a block of m ≤ N search directions and updates all N
//! solutions from the joint subspace. The dense m×N coefficient algebra
//! lives in [`super::dense`]; the lattice-sized columns in
//! [`super::block::FermionBlock`].
//!
//! # Algorithm
//!
//! ```text
//! R = B − A X,  P = R
//! loop
//!     AP = A P
//!     M  = P†AP                      (dQA: A-orthonormalize, M = 1)
//!     α  = M⁻¹ P†R
//!     X += P α,  R −= AP α          (rQ: periodically R = B − A X)
//!     stop when ‖r_i‖/‖b_i‖ ≤ tol for every i
//!     β  = (P†R_old)⁻† R†R          (BCGA: β = −M⁻¹ (AP)†R)
//!     P  = R + P β                  (dQ: orthonormalize and deflate)
//! ```
//!
//! The four stabilizations are independent toggles ([`Stabilization`]):
//!
//! | Flag | Effect |
//! |------|--------|
//! | BCGA | operator-conjugate β, no inversion of residual Grams |
//! | dQ   | Euclidean orthonormalization of P, drops converged/dependent directions |
//! | dQA  | A-orthonormalization of P and AP, drops A-dependent directions |
//! | rQ   | periodic residual replacement, convergence confirmed on the true residual |
//!
//! Under rQ a true residual that fails to improve on its best value for
//! [`BLOCK_CG_STAGNATION_LIMIT`] consecutive measurements ends the solve
//! with [`SolveStatus::Breakdown`]: the tolerance lies below the attainable
//! accuracy.
//!
//! Without dQ or dQA the block must stay numerically full rank; dependent
//! sources make `P†AP` singular and end the solve with
//! [`SolveStatus::Breakdown`].
//!
//! # References
//!
//! - O'Leary, Linear Algebra Appl. 29, 293 (1980), block CG
//! - Dubrulle, ETNA 12, 216 (2001), retooled block CG
//! - Ji & Li, Comput. Math. Appl. 73, 2296 (2017), breakdown-free block CG

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::block::FermionBlock;
use super::cg::SolveStatus;
use super::complex_f64::Complex64;
use super::dense::{
    general_solve, hermitian_part, hermitian_solve, orthonormalizer, CMatrix, DeflationPolicy,
};
use super::field::{is_field_equal, FermionField};
use super::operator::LinearOperator;
use crate::error::{PropagatorError, Result};
use crate::tolerances::{
    BLOCK_CG_REPLACEMENT_INTERVAL, BLOCK_CG_STAGNATION_LIMIT, DEFLATION_NORM_FACTOR,
    DEFLATION_RANK_TOL, LATTICE_CG_TOLERANCE_STRICT,
};

/// Independent Block CG stabilization toggles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stabilization {
    /// BCGA: operator-conjugate direction update.
    pub use_operator_conjugation: bool,
    /// dQ: orthonormalize and deflate the direction block.
    pub deflate_residual_space: bool,
    /// dQA: A-orthonormalize the direction block.
    pub deflate_operator_space: bool,
    /// rQ: residual replacement.
    pub use_residual_replacement: bool,
}

impl Stabilization {
    pub const PLAIN: Self = Self::from_flags(false, false, false, false);

    #[must_use]
    pub const fn from_flags(bcga: bool, dq: bool, dqa: bool, rq: bool) -> Self {
        Self {
            use_operator_conjugation: bcga,
            deflate_residual_space: dq,
            deflate_operator_space: dqa,
            use_residual_replacement: rq,
        }
    }

    /// All 16 flag combinations.
    pub fn all() -> impl Iterator<Item = Self> {
        (0u8..16).map(|bits| {
            Self::from_flags(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0)
        })
    }

    /// `"BCGA+dQ+dQA+rQ"` style label, `"plain"` when nothing is enabled.
    #[must_use]
    pub fn label(&self) -> String {
        let parts: Vec<&str> = [
            (self.use_operator_conjugation, "BCGA"),
            (self.deflate_residual_space, "dQ"),
            (self.deflate_operator_space, "dQA"),
            (self.use_residual_replacement, "rQ"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if parts.is_empty() {
            "plain".to_string()
        } else {
            parts.join("+")
        }
    }
}

/// Block CG stopping criteria and stabilization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockCgConfig {
    /// Per-column relative residual `‖r_i‖/‖b_i‖` at which the solve stops.
    pub tolerance: f64,
    pub max_iterations: usize,
    pub stabilization: Stabilization,
    /// Iterations between residual replacements under rQ (0: only when
    /// confirming convergence).
    pub replacement_interval: usize,
}

impl Default for BlockCgConfig {
    fn default() -> Self {
        Self {
            tolerance: LATTICE_CG_TOLERANCE_STRICT,
            max_iterations: 10_000,
            stabilization: Stabilization::PLAIN,
            replacement_interval: BLOCK_CG_REPLACEMENT_INTERVAL,
        }
    }
}

/// Convergence snapshot after one iteration.
#[derive(Clone, Debug, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub max_residual: f64,
    pub min_residual: f64,
    /// Direction block width m used in this iteration.
    pub width: usize,
    /// `‖x_0 − x0_star‖ / ‖x0_star‖` when a reference solution was given.
    pub x0_error: Option<f64>,
}

/// Block CG result.
#[derive(Clone, Debug, Serialize)]
pub struct BlockCgResult {
    pub status: SolveStatus,
    pub stabilization: Stabilization,
    pub iterations: usize,
    /// Relative residual per column as tracked by the solver at exit.
    pub residuals: Vec<f64>,
    /// Recomputed `‖b_i − A x_i‖ / ‖b_i‖` per column.
    pub true_residuals: Vec<f64>,
    pub history: Vec<IterationRecord>,
    /// Number of `R = B − A X` replacements performed.
    pub replacements: usize,
    /// Direction block width at exit.
    pub final_width: usize,
}

impl BlockCgResult {
    #[must_use]
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    #[must_use]
    pub fn max_residual(&self) -> f64 {
        max_of(&self.residuals)
    }

    #[must_use]
    pub fn max_true_residual(&self) -> f64 {
        max_of(&self.true_residuals)
    }

    /// `Err(NotConverged)` unless the solve converged.
    pub fn into_converged(self) -> Result<Self> {
        if self.converged() {
            Ok(self)
        } else {
            Err(PropagatorError::NotConverged {
                solver: "BlockCG",
                iterations: self.iterations,
                residual: self.max_residual(),
            })
        }
    }
}

/// dQ: Euclidean orthonormal basis of `span(P)`.
///
/// Directions with norm at or below `norm_floor` and numerically dependent
/// combinations are dropped, so the result can be narrower than `p`.
/// `None` if the eigen-decomposition of the Gram matrix fails.
#[must_use]
pub fn orthonormalize_directions(p: &FermionBlock, norm_floor: f64) -> Option<FermionBlock> {
    let policy = DeflationPolicy {
        rank_tol: DEFLATION_RANK_TOL,
        norm_floor,
    };
    let w = orthonormalizer(&p.self_gram(), policy)?;
    Some(p.combine(&w))
}

/// dQA: transform `(P, AP)` to `(P W, AP W)` with `(P W)† A (P W) = 1`.
///
/// A-dependent directions are dropped. `None` if the eigen-decomposition of
/// `P†AP` fails.
#[must_use]
pub fn a_orthonormalize_directions(
    p: &FermionBlock,
    ap: &FermionBlock,
) -> Option<(FermionBlock, FermionBlock)> {
    let policy = DeflationPolicy {
        rank_tol: DEFLATION_RANK_TOL,
        norm_floor: 0.0,
    };
    let w = orthonormalizer(&hermitian_part(&p.gram(ap)), policy)?;
    Some((p.combine(&w), ap.combine(&w)))
}

/// Coefficients β of the direction update `P' = R + P β`.
///
/// `operator_conjugate` selects `β = −M⁻¹ (AP)†R`; otherwise the
/// residual-conjugate form `(P†R_old)† β = R†R` is solved, which needs a
/// square `P†R_old` and falls back to the operator-conjugate form when the
/// direction block is narrower than the residual block or the system is
/// singular. `m = None` means `M = 1` (after A-orthonormalization).
#[must_use]
pub fn conjugation_step(
    operator_conjugate: bool,
    m: Option<&CMatrix>,
    p_r_old: &CMatrix,
    ap: &FermionBlock,
    r: &FermionBlock,
) -> Option<CMatrix> {
    if !operator_conjugate && p_r_old.is_square() {
        if let Some(beta) = general_solve(&p_r_old.adjoint(), &r.self_gram()) {
            return Some(beta);
        }
        debug!("BlockCG: residual-conjugate β singular, using operator-conjugate form");
    }
    let rhs = -ap.gram(r);
    match m {
        Some(m) => hermitian_solve(m, &rhs),
        None => Some(rhs),
    }
}

/// rQ: `R = B − A X` for every column.
pub fn replace_residual<A: LinearOperator + ?Sized>(
    op: &A,
    r: &mut FermionBlock,
    x: &FermionBlock,
    b: &FermionBlock,
) -> Result<()> {
    op.apply_block(r.columns_mut(), x.columns())?;
    for (ri, bi) in r.columns_mut().iter_mut().zip(b.columns()) {
        ri.xpay(bi, -Complex64::ONE);
    }
    Ok(())
}

/// Solve A X = B for all columns of `b` with Block CG.
///
/// `x` is updated in place and may carry initial guesses. Columns of `b`
/// that are identically zero are converged from the start with `x_i = 0`
/// and do not enter the Krylov block. `x0_star`, if given, is a reference
/// solution for column 0 whose distance is recorded in the history.
pub fn block_cg_solve<A: LinearOperator + ?Sized>(
    op: &A,
    x: &mut [FermionField],
    b: &[FermionField],
    config: &BlockCgConfig,
    x0_star: Option<&FermionField>,
) -> Result<BlockCgResult> {
    let n = b.len();
    if n == 0 {
        return Err(PropagatorError::EmptyBlock);
    }
    if x.len() != n {
        return Err(PropagatorError::BlockMismatch {
            expected: n,
            found: x.len(),
        });
    }
    let grid = op.grid();
    let volume = grid.volume();
    for field in b.iter().chain(x.iter()).chain(x0_star) {
        if field.volume() != volume {
            return Err(PropagatorError::VolumeMismatch {
                expected: volume,
                found: field.volume(),
            });
        }
    }

    let stab = config.stabilization;
    let tol = config.tolerance;
    let b_norms: Vec<f64> = b.iter().map(|f| f.norm_sq().sqrt()).collect();
    let active: Vec<usize> = (0..n).filter(|&i| b_norms[i] > 0.0).collect();
    for i in (0..n).filter(|&i| b_norms[i] == 0.0) {
        x[i].set_zero();
    }

    if active.is_empty() {
        info!("BlockCG: all {n} right-hand sides vanish");
        return Ok(BlockCgResult {
            status: SolveStatus::Converged,
            stabilization: stab,
            iterations: 0,
            residuals: vec![0.0; n],
            true_residuals: vec![0.0; n],
            history: Vec::new(),
            replacements: 0,
            final_width: 0,
        });
    }

    let na = active.len();
    let active_norms: Vec<f64> = active.iter().map(|&i| b_norms[i]).collect();
    let gather = |fields: &[FermionField]| -> Vec<FermionField> {
        active.iter().map(|&i| fields[i].clone()).collect()
    };
    let ba = FermionBlock::from_slice(grid, &gather(b));
    let mut xa = FermionBlock::from_slice(grid, &gather(&*x));
    let x0_column = active.iter().position(|&i| i == 0);
    let norm_floor = DEFLATION_NORM_FACTOR * tol * active_norms.iter().copied().fold(f64::INFINITY, f64::min);

    let mut r = FermionBlock::zeros(grid, na);
    replace_residual(op, &mut r, &xa, &ba)?;
    let mut rel = relative_residuals(&r, &active_norms);

    let mut history = Vec::new();
    let mut replacements = 0;
    let mut iterations = 0;
    let mut final_width = na;
    let mut status = SolveStatus::MaxIterationsExceeded;

    debug!(
        "BlockCG [{}]: {na} sources, initial max residual {:.6e}",
        stab.label(),
        max_of(&rel)
    );

    if max_of(&rel) <= tol {
        status = SolveStatus::Converged;
    } else {
        let initial = if stab.deflate_residual_space {
            orthonormalize_directions(&r, norm_floor)
        } else {
            Some(r.clone())
        };
        let mut p = initial.unwrap_or_else(|| FermionBlock::zeros(grid, 0));
        let mut ap = FermionBlock::zeros(grid, p.width());
        let mut best_true = f64::INFINITY;
        let mut stalls = 0;

        for iter in 1..=config.max_iterations {
            if p.is_empty() {
                status = exhausted(op, &mut r, &xa, &ba, &active_norms, tol, &mut rel)?;
                replacements += 1;
                break;
            }
            iterations = iter;

            if ap.width() != p.width() {
                ap = FermionBlock::zeros(grid, p.width());
            }
            op.apply_block(ap.columns_mut(), p.columns())?;

            let m = if stab.deflate_operator_space {
                match a_orthonormalize_directions(&p, &ap) {
                    Some((pw, apw)) => {
                        p = pw;
                        ap = apw;
                    }
                    None => {
                        warn!("BlockCG: A-orthonormalization failed at iteration {iter}");
                        status = SolveStatus::Breakdown;
                        break;
                    }
                }
                if p.is_empty() {
                    status = exhausted(op, &mut r, &xa, &ba, &active_norms, tol, &mut rel)?;
                    replacements += 1;
                    break;
                }
                None
            } else {
                Some(hermitian_part(&p.gram(&ap)))
            };

            let p_r = p.gram(&r);
            let alpha = match &m {
                None => p_r.clone(),
                Some(m) => match hermitian_solve(m, &p_r) {
                    Some(alpha) => alpha,
                    None => {
                        warn!("BlockCG: P†AP not positive definite at iteration {iter}");
                        status = SolveStatus::Breakdown;
                        break;
                    }
                },
            };

            xa.add_combination(&p, &alpha);
            r.sub_combination(&ap, &alpha);

            // Under rQ the residual is recomputed periodically and before
            // convergence is accepted; `rel` then holds true residuals.
            let mut true_measured = false;
            if stab.use_residual_replacement
                && config.replacement_interval > 0
                && iter % config.replacement_interval == 0
            {
                replace_residual(op, &mut r, &xa, &ba)?;
                replacements += 1;
                true_measured = true;
            }
            rel = relative_residuals(&r, &active_norms);
            if stab.use_residual_replacement && !true_measured && max_of(&rel) <= tol {
                replace_residual(op, &mut r, &xa, &ba)?;
                replacements += 1;
                true_measured = true;
                rel = relative_residuals(&r, &active_norms);
            }
            final_width = p.width();

            let x0_error = x0_star.and_then(|star| {
                let col0 = x0_column.map_or(&x[0], |k| &xa[k]);
                relative_distance(col0, star)
            });
            history.push(IterationRecord {
                iteration: iter,
                max_residual: max_of(&rel),
                min_residual: min_of(&rel),
                width: p.width(),
                x0_error,
            });
            debug!(
                "BlockCG iter {iter}: width {}, residual max {:.6e} min {:.6e}",
                p.width(),
                max_of(&rel),
                min_of(&rel)
            );

            let worst = max_of(&rel);
            if worst <= tol {
                status = SolveStatus::Converged;
                break;
            }
            if true_measured {
                if worst < best_true {
                    best_true = worst;
                    stalls = 0;
                } else {
                    stalls += 1;
                    if stalls >= BLOCK_CG_STAGNATION_LIMIT {
                        warn!(
                            "BlockCG: true residual stagnated at {best_true:.3e} after {iter} iterations"
                        );
                        status = SolveStatus::Breakdown;
                        break;
                    }
                }
            }

            let Some(beta) = conjugation_step(
                stab.use_operator_conjugation,
                m.as_ref(),
                &p_r,
                &ap,
                &r,
            ) else {
                warn!("BlockCG: direction update singular at iteration {iter}");
                status = SolveStatus::Breakdown;
                break;
            };

            let mut p_next = r.clone();
            p_next.add_combination(&p, &beta);
            p = if stab.deflate_residual_space {
                match orthonormalize_directions(&p_next, norm_floor) {
                    Some(q) => q,
                    None => {
                        warn!("BlockCG: orthonormalization failed at iteration {iter}");
                        status = SolveStatus::Breakdown;
                        break;
                    }
                }
            } else {
                p_next
            };
            if p.width() < na {
                debug!("BlockCG iter {iter}: deflated to width {}", p.width());
            }
        }
        if p.is_empty() {
            final_width = 0;
        }
    }

    let mut true_r = FermionBlock::zeros(grid, na);
    replace_residual(op, &mut true_r, &xa, &ba)?;
    let true_rel = relative_residuals(&true_r, &active_norms);

    let mut residuals = vec![0.0; n];
    let mut true_residuals = vec![0.0; n];
    for (k, &i) in active.iter().enumerate() {
        x[i].copy_from(&xa[k]);
        residuals[i] = rel[k];
        true_residuals[i] = true_rel[k];
    }

    let result = BlockCgResult {
        status,
        stabilization: stab,
        iterations,
        residuals,
        true_residuals,
        history,
        replacements,
        final_width,
    };
    match status {
        SolveStatus::Converged => info!(
            "BlockCG [{}] converged in {iterations} iterations: residual {:.3e} (true {:.3e})",
            stab.label(),
            result.max_residual(),
            result.max_true_residual()
        ),
        _ => warn!(
            "BlockCG [{}] stopped ({status:?}) after {iterations} iterations: residual {:.3e}",
            stab.label(),
            result.max_residual()
        ),
    }
    Ok(result)
}

/// Direction block exhausted: decide from the true residual.
fn exhausted<A: LinearOperator + ?Sized>(
    op: &A,
    r: &mut FermionBlock,
    x: &FermionBlock,
    b: &FermionBlock,
    b_norms: &[f64],
    tol: f64,
    rel: &mut Vec<f64>,
) -> Result<SolveStatus> {
    replace_residual(op, r, x, b)?;
    *rel = relative_residuals(r, b_norms);
    let worst = max_of(rel);
    if worst <= tol {
        debug!("BlockCG: direction block exhausted at residual {worst:.3e}");
        Ok(SolveStatus::Converged)
    } else {
        warn!("BlockCG: direction block exhausted above tolerance ({worst:.3e})");
        Ok(SolveStatus::Breakdown)
    }
}

fn relative_residuals(r: &FermionBlock, b_norms: &[f64]) -> Vec<f64> {
    r.column_norms_sq()
        .iter()
        .zip(b_norms)
        .map(|(rr, bn)| rr.sqrt() / bn)
        .collect()
}

fn relative_distance(x: &FermionField, reference: &FermionField) -> Option<f64> {
    let norm = reference.norm_sq().sqrt();
    (norm > 0.0).then(|| is_field_equal(x, reference) / norm)
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}
