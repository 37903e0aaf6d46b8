// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice QCD propagators: staggered fermions on SU(3) backgrounds.
//!
//! Quark propagators are solutions of `DD† x = χ` for many sources χ on a
//! fixed gauge configuration. The same operator is inverted N times, so the
//! sources are solved together by Block CG and checked against a
//! single-source CG reference.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `complex_f64` | Complex f64 arithmetic, `Pod` for binary I/O |
//! | `su3` | SU(3) 3×3 complex matrix operations |
//! | `constants` | LCG PRNG, lattice constants, numerical guards |
//! | `geometry` | Periodic 4D lattice: site indexing, neighbour tables, staggered phases |
//! | `field` | Site-indexed field container, fermion arithmetic and reductions |
//! | `gauge` | Gauge field starts and plaquette observables |
//! | `dirac` | Staggered Dirac operator `D`, `D†`, `DD†` with isospin chemical potential |
//! | `operator` | `LinearOperator` seam between solvers and stencil |
//! | `dense` | Small dense complex algebra (nalgebra) for block coefficients |
//! | `block` | Block of fermion fields, Gram products and combinations |
//! | `cg` | Single-source conjugate gradient |
//! | `block_cg` | Block conjugate gradient with BCGA/dQ/dQA/rQ stabilization |
//! | `io` | Gauge and fermion files with checksums |
//!
//! # References
//!
//! - Gattringer & Lang, "Quantum Chromodynamics on the Lattice" (2010)
//! - O'Leary, Linear Algebra Appl. 29, 293 (1980)

/// Block of fermion fields with Gram products and linear combinations.
pub mod block;
/// Block conjugate gradient with independent stabilizations.
pub mod block_cg;
/// Conjugate gradient solver for Hermitian positive-definite operators.
pub mod cg;
/// Complex f64 arithmetic (re, im), bit-castable.
pub mod complex_f64;
/// LCG PRNG, lattice constants, and shared numerical guards.
pub mod constants;
/// Dense complex linear algebra on block coefficient matrices.
pub mod dense;
/// Staggered Dirac operator with isospin chemical potential.
pub mod dirac;
/// Generic site field container and fermion field operations.
pub mod field;
/// SU(3) gauge field and plaquettes.
pub mod gauge;
/// Periodic 4D lattice geometry.
pub mod geometry;
/// Gauge and fermion field files.
pub mod io;
/// Linear-operator trait and the `DD†` binding.
pub mod operator;
/// SU(3) 3x3 complex matrix operations.
pub mod su3;
