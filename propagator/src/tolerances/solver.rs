// SPDX-License-Identifier: AGPL-3.0-only

//! Krylov solver policy and solver test tolerances.

// ═══════════════════════════════════════════════════════════════════
// Block CG policy
// ═══════════════════════════════════════════════════════════════════

/// Eigenvalue floor of the column-normalized Gram matrix used by the
/// (A-)orthonormalization steps.
///
/// The normalized Gram has unit diagonal, so its eigenvalues lie in
/// `[0, m]`; an eigenvalue below 1e-12 means the direction block has a
/// numerically dependent combination with a condition number beyond 1e6
/// in norm, which would otherwise poison the `M⁻¹` solve.
pub const DEFLATION_RANK_TOL: f64 = 1e-12;

/// Directions with `‖p‖ ≤ DEFLATION_NORM_FACTOR · eps · min_i ‖b_i‖` carry
/// only converged residual and are dropped by the residual-space deflation.
pub const DEFLATION_NORM_FACTOR: f64 = 0.1;

/// Iterations between residual replacements (`R ← B − A X`).
///
/// Recursive residuals drift from the true residual by O(ε_mach · κ) per
/// iteration; refreshing every 25 iterations keeps the drift below the
/// solver tolerance for κ ≲ 10⁶ at the cost of N extra operator
/// applications per 25 iterations.
pub const BLOCK_CG_REPLACEMENT_INTERVAL: usize = 25;

/// Curvature floor of the CG step, relative to its Cauchy-Schwarz bound.
///
/// A step breaks down when `⟨p, A p⟩ ≤ SOLVER_BREAKDOWN_GUARD · ‖p‖ ‖A p‖`.
/// The ratio is invariant under rescaling of `b` and of `A`; for a positive
/// definite `A` with condition number κ it stays above `2/√κ`, so only a
/// numerically singular or indefinite operator trips it.
pub const SOLVER_BREAKDOWN_GUARD: f64 = 1e-14;

/// Consecutive true-residual measurements under rQ without a new minimum
/// after which Block CG reports breakdown.
///
/// At the default replacement interval this is 75 iterations without
/// progress, far beyond the transient plateaus of a converging recursion.
pub const BLOCK_CG_STAGNATION_LIMIT: usize = 3;

// ═══════════════════════════════════════════════════════════════════
// Test and validation thresholds
// ═══════════════════════════════════════════════════════════════════

/// CG solver residual: upper bound for validation solves.
pub const LATTICE_CG_RESIDUAL: f64 = 1e-6;

/// Strict CG tolerance used when solutions are compared across solvers.
pub const LATTICE_CG_TOLERANCE_STRICT: f64 = 1e-10;

/// Relative agreement `‖X_a − X_b‖ / ‖X_b‖` between Block CG solutions
/// computed with different stabilization flags at
/// [`LATTICE_CG_TOLERANCE_STRICT`].
///
/// Each solution is within κ·1e-10 of the exact one; with κ ~ 10² on the
/// test lattices the difference is below 1e-7.
pub const BLOCK_CG_SOLUTION_PARITY: f64 = 1e-7;
