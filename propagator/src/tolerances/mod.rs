// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized numerical tolerances with justification.
//!
//! Every threshold used by the solvers, the I/O checksums, the validation
//! binary and the tests is defined here with documentation of its origin.
//! No ad-hoc magic numbers.
//!
//! # Tolerance categories
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Machine precision | IEEE 754 f64 | 1e-15 for the gauge checksum |
//! | Operator identities | rounding in stencil sums | 1e-12 for adjointness |
//! | Solver policy | Krylov convergence and deflation | 1e-12 rank threshold |

/// Gauge field, plaquette and Dirac operator tolerances.
pub mod lattice;
/// Krylov solver policy: deflation thresholds, residual replacement, test parity.
pub mod solver;

pub use lattice::{
    DIRAC_ADJOINT_REL, DIRAC_HERMITICITY_REL, DIRAC_ZERO_INPUT_ABS, FERMION_CHECKSUM_REL,
    GAUGE_CHECKSUM_ABS, LATTICE_COLD_PLAQUETTE_ABS, LATTICE_UNITARITY_MAX,
};
pub use solver::{
    BLOCK_CG_REPLACEMENT_INTERVAL, BLOCK_CG_SOLUTION_PARITY, BLOCK_CG_STAGNATION_LIMIT,
    DEFLATION_NORM_FACTOR, DEFLATION_RANK_TOL, LATTICE_CG_RESIDUAL, LATTICE_CG_TOLERANCE_STRICT,
    SOLVER_BREAKDOWN_GUARD,
};
