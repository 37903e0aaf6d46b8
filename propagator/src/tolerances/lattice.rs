// SPDX-License-Identifier: AGPL-3.0-only

//! Gauge field, plaquette and Dirac operator tolerances.

// ═══════════════════════════════════════════════════════════════════
// Gauge field
// ═══════════════════════════════════════════════════════════════════

/// Cold plaquette: absolute error (should be exactly 1.0 for unit links).
///
/// On a cold-start lattice (all links = identity), the plaquette trace
/// is exactly 1. Machine-precision rounding gives ~1e-15 residual.
pub const LATTICE_COLD_PLAQUETTE_ABS: f64 = 1e-12;

/// Gauge file checksum: `|<P> − stored|` above this is a corrupt file.
///
/// The stored value is the average plaquette written from the same field,
/// so a faithful read reproduces it to the last few ulps of a sum of
/// O(10⁶) terms in [−1, 1].
pub const GAUGE_CHECKSUM_ABS: f64 = 1e-15;

/// Fermion file checksum: relative error of the stored `‖ψ‖²`.
///
/// The payload round-trips bit-exactly; only the order of the parallel
/// norm reduction can differ between writer and reader.
pub const FERMION_CHECKSUM_REL: f64 = 1e-12;

/// Largest allowed `‖U U† − 1‖²` for a freshly reunitarized link.
pub const LATTICE_UNITARITY_MAX: f64 = 1e-20;

// ═══════════════════════════════════════════════════════════════════
// Dirac operator
// ═══════════════════════════════════════════════════════════════════

/// `D ψ` for `ψ = 0` must vanish identically; rounding cannot enter.
pub const DIRAC_ZERO_INPUT_ABS: f64 = 1e-15;

/// `|⟨a, D b⟩ − ⟨D† a, b⟩| / (‖a‖‖D b‖)`.
///
/// Both sides are sums of 9·8·V products; 1e-12 leaves three orders of
/// magnitude above f64 rounding for lattices up to 24⁴.
pub const DIRAC_ADJOINT_REL: f64 = 1e-12;

/// `|⟨a, DD† b⟩ − ⟨DD† a, b⟩|` relative to the larger side.
pub const DIRAC_HERMITICITY_REL: f64 = 1e-12;
