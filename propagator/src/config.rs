// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration for propagator runs.
//!
//! Defaults reproduce the production run: a 24⁴ lattice, bare mass 0.00227
//! at zero isospin chemical potential, solver tolerance 1e-15. A JSON file
//! may override any subset of fields; the driver's command-line options are
//! applied on top.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PropagatorError, Result};
use crate::lattice::block_cg::{BlockCgConfig, Stabilization};
use crate::lattice::cg::CgConfig;
use crate::lattice::constants::N_DIM;
use crate::lattice::dirac::DiracParams;
use crate::lattice::geometry::Lattice;
use crate::tolerances::BLOCK_CG_REPLACEMENT_INTERVAL;

/// Parameters of one propagator run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[must_use]
pub struct RunConfig {
    /// Lattice extents `[L0, L1, L2, L3]`, time first
    pub lattice: [usize; N_DIM],
    /// Bare staggered quark mass
    pub mass: f64,
    /// Isospin chemical potential
    pub mu_i: f64,
    /// Relative residual tolerance of both solvers
    pub eps: f64,
    pub max_iterations: usize,
    /// Seed of the gaussian source stream
    pub seed: u64,
    /// Configuration number `n` in `{base}_{n}.cnfg`
    pub config_number: usize,
    /// Unit point sources instead of gaussian noise
    pub point_source: bool,
    /// Replace each source χ by D χ
    pub source_multiplied_by_d: bool,
    /// Read the gauge field in the legacy Fortran layout
    pub legacy_gauge: bool,
    /// Iterations between Block CG residual replacements
    pub replacement_interval: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lattice: [24; N_DIM],
            mass: 0.00227,
            mu_i: 0.0,
            eps: 1e-15,
            max_iterations: 100_000,
            seed: 1234,
            config_number: 1,
            point_source: false,
            source_multiplied_by_d: true,
            legacy_gauge: false,
            replacement_interval: BLOCK_CG_REPLACEMENT_INTERVAL,
        }
    }
}

impl RunConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PropagatorError::io(path, e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| PropagatorError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the solvers cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.lattice.iter().any(|&l| l == 0) {
            return Err(PropagatorError::Config(format!(
                "lattice extents must be positive, got {:?}",
                self.lattice
            )));
        }
        if self.eps.is_nan() || self.eps <= 0.0 {
            return Err(PropagatorError::Config(format!("eps must be positive, got {}", self.eps)));
        }
        if self.max_iterations == 0 {
            return Err(PropagatorError::Config("max_iterations must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn grid(&self) -> Arc<Lattice> {
        Arc::new(Lattice::new(self.lattice))
    }

    #[must_use]
    pub const fn dirac_params(&self) -> DiracParams {
        DiracParams::new(self.mass, self.mu_i)
    }

    #[must_use]
    pub const fn cg_config(&self) -> CgConfig {
        CgConfig {
            tolerance: self.eps,
            max_iterations: self.max_iterations,
        }
    }

    #[must_use]
    pub const fn block_cg_config(&self, stabilization: Stabilization) -> BlockCgConfig {
        BlockCgConfig {
            tolerance: self.eps,
            max_iterations: self.max_iterations,
            stabilization,
            replacement_interval: self.replacement_interval,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_run() {
        let c = RunConfig::default();
        assert_eq!(c.lattice, [24, 24, 24, 24]);
        assert_eq!(c.mass, 0.00227);
        assert_eq!(c.mu_i, 0.0);
        assert_eq!(c.eps, 1e-15);
        assert_eq!(c.seed, 1234);
        assert!(c.source_multiplied_by_d);
        assert!(!c.point_source);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "lattice": [8, 4, 4, 4], "mass": 0.1 }"#).unwrap();
        let c = RunConfig::load(&path).unwrap();
        assert_eq!(c.lattice, [8, 4, 4, 4]);
        assert_eq!(c.mass, 0.1);
        assert_eq!(c.eps, 1e-15);
        assert_eq!(c.grid().volume(), 512);
    }

    #[test]
    fn malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, "{ mass: }").unwrap();
        assert!(matches!(RunConfig::load(&path), Err(PropagatorError::Config(_))));
    }

    #[test]
    fn zero_extent_is_rejected() {
        let c = RunConfig {
            lattice: [4, 0, 4, 4],
            ..RunConfig::default()
        };
        assert!(matches!(c.validate(), Err(PropagatorError::Config(_))));
    }

    #[test]
    fn solver_configs_follow_run() {
        let c = RunConfig {
            eps: 1e-8,
            max_iterations: 50,
            replacement_interval: 7,
            ..RunConfig::default()
        };
        let stab = Stabilization::from_flags(true, false, true, false);
        let b = c.block_cg_config(stab);
        assert_eq!(b.tolerance, 1e-8);
        assert_eq!(b.max_iterations, 50);
        assert_eq!(b.replacement_interval, 7);
        assert_eq!(b.stabilization, stab);
        assert_eq!(c.cg_config().tolerance, 1e-8);
    }
}
