// SPDX-License-Identifier: AGPL-3.0-only

//! hotSpring propagators: staggered quark propagators by Block CG
//!
//! Solves `DD† x_i = χ_i` for a block of sources on one SU(3) gauge
//! configuration, where `D` is the staggered Dirac operator with bare mass
//! and isospin chemical potential. The block solver carries four
//! independent stabilizations (BCGA, dQ, dQA, rQ) and is checked against
//! single-source CG.
//!
//! ## Modules
//!   - `lattice`: geometry, fields, Dirac operator, CG, Block CG, file I/O
//!   - `config`: run parameters with JSON overrides
//!   - `error`: crate error type
//!   - `logging`: `# label value` run log and `env_logger` setup
//!   - `production`: the end-to-end propagator run behind the driver
//!   - `tolerances`: named numerical thresholds with provenance
//!   - `validation`: pass/fail harness for validation binaries
//!
//! ## Binaries
//!   - `block_cg_propagator`: production driver: gauge file in, Block CG out
//!   - `validate_block_cg`: self-contained checks on a small lattice

pub mod config;
pub mod error;
pub mod lattice;
pub mod logging;
pub mod production;
pub mod tolerances;
pub mod validation;
