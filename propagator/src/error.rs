// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for propagator runs.
//!
//! Every fallible library operation returns [`Result`]. Callers
//! pattern-match on the failure mode (volume mismatch, checksum, solver
//! status) instead of parsing strings; the driver decides which ones are
//! fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from field operations, file I/O and solvers.
#[derive(Debug, Error)]
pub enum PropagatorError {
    /// Two fields (or a field and a geometry) have different site counts.
    #[error("volume mismatch: expected {expected} sites, found {found}")]
    VolumeMismatch { expected: usize, found: usize },

    /// A block solver was handed zero right-hand sides.
    #[error("block solver needs at least one right-hand side")]
    EmptyBlock,

    /// Two blocks that must have the same width do not.
    #[error("block width mismatch: expected {expected}, found {found}")]
    BlockMismatch { expected: usize, found: usize },

    /// Underlying filesystem error.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored and recomputed checksums disagree.
    #[error(
        "checksum mismatch in {}: stored {stored:.17e}, measured {measured:.17e}",
        .path.display()
    )]
    ChecksumMismatch {
        path: PathBuf,
        stored: f64,
        measured: f64,
    },

    /// File ended before the expected payload.
    #[error("{} truncated: expected {expected} bytes, found {found}", .path.display())]
    Truncated {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// File is longer than its declared payload.
    #[error("{} has trailing data: expected {expected} bytes, found {found}", .path.display())]
    TrailingBytes {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// File does not start with the expected magic bytes.
    #[error("{} is not a verified field file", .path.display())]
    BadMagic { path: PathBuf },

    /// Solver stopped without reaching the tolerance.
    #[error("{solver} did not converge after {iterations} iterations (residual {residual:.3e})")]
    NotConverged {
        solver: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// Invalid or unreadable run configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PropagatorError {
    /// Attach a path to an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for the crate.
pub type Result<T> = std::result::Result<T, PropagatorError>;
