// SPDX-License-Identifier: AGPL-3.0-only

//! Production propagator run: gauge file in, Block CG solutions out.
//!
//! The `block_cg_propagator` binary only parses its command line; the run
//! itself lives here so the integration tests drive the same code path on
//! small lattices.
//!
//! # Sequence
//!
//! 1. Read `{config_name}_{n}.cnfg` (native or legacy layout), checksum verified
//! 2. Log lattice extents, plaquettes and fermion parameters
//! 3. Build N sources (gaussian or point), optionally `χ ← D χ`
//! 4. Load the reference solution `x0_star` of source 0, or compute it by CG
//!    and persist it
//! 5. Block CG over all N sources, timed

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::config::RunConfig;
use crate::error::{PropagatorError, Result};
use crate::lattice::block_cg::{block_cg_solve, BlockCgResult, Stabilization};
use crate::lattice::cg::{cg_solve, residual_into, SolveStatus};
use crate::lattice::dirac::StaggeredDirac;
use crate::lattice::field::{is_field_equal, FermionField};
use crate::lattice::gauge::GaugeField;
use crate::lattice::geometry::Lattice;
use crate::lattice::io::{
    make_filename, read_fermion_field, read_gauge_field, read_legacy_gauge_field,
    write_fermion_field,
};
use crate::lattice::operator::{LinearOperator, NormalOperator};
use crate::logging::{log_kv, log_msg};

/// What the driver was asked to do, besides the physics parameters.
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// Gauge file base name; the file read is `{config_name}_{n}.cnfg`.
    pub config_name: String,
    /// Number of right-hand sides N.
    pub n_rhs: usize,
    pub stabilization: Stabilization,
    /// Cache for the CG solution of the first source.
    pub fermion_file: PathBuf,
}

// ═══════════════════════════════════════════════════════════════════
//  Reports
// ═══════════════════════════════════════════════════════════════════

/// Gauge observables logged at the start of a run.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct GaugeSummary {
    pub average: f64,
    pub spatial: f64,
    pub timelike: f64,
    /// 1×2 rectangle
    pub rectangle: f64,
}

impl GaugeSummary {
    #[must_use]
    pub fn measure(u: &GaugeField) -> Self {
        Self {
            average: u.average_plaquette(),
            spatial: u.spatial_plaquette(),
            timelike: u.timelike_plaquette(),
            rectangle: u.rectangle_plaquette(),
        }
    }
}

/// Where the reference solution came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReferenceOrigin {
    Loaded,
    Computed,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ReferenceSummary {
    pub origin: ReferenceOrigin,
    /// `‖DD† x0_star − χ_0‖ / ‖χ_0‖`
    pub residual: f64,
    /// CG iterations, when computed.
    pub cg_iterations: Option<usize>,
    pub cg_status: Option<SolveStatus>,
}

/// Machine-readable record of one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub config: RunConfig,
    pub config_file: String,
    pub n_rhs: usize,
    pub label: String,
    pub gauge: GaugeSummary,
    pub reference: ReferenceSummary,
    pub block_cg: BlockCgResult,
    /// `‖x_0 − x0_star‖ / ‖x0_star‖` after Block CG.
    pub x0_error: f64,
    pub block_cg_runtime_sec: f64,
}

impl RunReport {
    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PropagatorError::Config(format!("report serialization: {e}")))?;
        std::fs::write(path, json).map_err(|e| PropagatorError::io(path, e))
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Steps
// ═══════════════════════════════════════════════════════════════════

/// Read and verify the gauge configuration.
pub fn load_gauge(config: &RunConfig, grid: &Arc<Lattice>, path: &Path) -> Result<GaugeField> {
    if config.legacy_gauge {
        read_legacy_gauge_field(grid, path)
    } else {
        read_gauge_field(grid, path)
    }
}

/// N sources: unit point sources at sites `0..N` (colour 0) or gaussian
/// noise from one seeded stream, each optionally replaced by `D χ`.
pub fn make_sources(
    config: &RunConfig,
    dirac: &StaggeredDirac,
    u: &GaugeField,
    n_rhs: usize,
) -> Result<Vec<FermionField>> {
    let grid = dirac.grid();
    if config.point_source && n_rhs > grid.volume() {
        return Err(PropagatorError::Config(format!(
            "{n_rhs} point sources do not fit on {} sites",
            grid.volume()
        )));
    }
    let mut seed = config.seed;
    let mut sources = Vec::with_capacity(n_rhs);
    for i in 0..n_rhs {
        let source = if config.point_source {
            FermionField::point_source(grid, i, 0)
        } else {
            FermionField::gaussian(grid, &mut seed)
        };
        if config.source_multiplied_by_d {
            let mut chi = FermionField::zeros(grid);
            dirac.apply_d(&mut chi, &source, u, config.dirac_params())?;
            sources.push(chi);
        } else {
            sources.push(source);
        }
    }
    Ok(sources)
}

/// `‖b − A x‖ / ‖b‖`, or `‖A x‖` for a zero `b`.
pub fn relative_residual<A: LinearOperator + ?Sized>(
    op: &A,
    x: &FermionField,
    b: &FermionField,
) -> Result<f64> {
    let mut r = FermionField::zeros(op.grid());
    let r_sq = residual_into(op, &mut r, x, b)?;
    let b_sq = b.norm_sq();
    Ok(if b_sq > 0.0 { (r_sq / b_sq).sqrt() } else { r_sq.sqrt() })
}

/// Load `x0_star` from `path`, or solve for it with CG and write it there.
///
/// Any read failure (missing, truncated, wrong lattice, bad checksum) falls
/// back to recomputing. Only a converged CG solution is written; a write
/// failure is an error.
pub fn prepare_reference<A: LinearOperator + ?Sized>(
    op: &A,
    chi0: &FermionField,
    path: &Path,
    config: &RunConfig,
) -> Result<(FermionField, ReferenceSummary)> {
    match read_fermion_field(op.grid(), path) {
        Ok(x0_star) => {
            let residual = relative_residual(op, &x0_star, chi0)?;
            log_kv("Residual of x0_star:", residual);
            let summary = ReferenceSummary {
                origin: ReferenceOrigin::Loaded,
                residual,
                cg_iterations: None,
                cg_status: None,
            };
            Ok((x0_star, summary))
        }
        Err(e) => {
            log::info!("no usable reference solution: {e}");
            log_msg("Inverting first source using CG...");
            let mut x0_star = FermionField::zeros(op.grid());
            let result = cg_solve(op, &mut x0_star, chi0, &config.cg_config())?;
            log_kv("CG_iterations", result.iterations);
            log_kv("CG_residual", result.true_residual);
            if result.converged() {
                write_fermion_field(&x0_star, path)?;
            } else {
                log::warn!(
                    "reference CG stopped with {:?} after {} iterations (residual {:.3e}), not cached",
                    result.status,
                    result.iterations,
                    result.final_residual
                );
            }
            let summary = ReferenceSummary {
                origin: ReferenceOrigin::Computed,
                residual: result.true_residual,
                cg_iterations: Some(result.iterations),
                cg_status: Some(result.status),
            };
            Ok((x0_star, summary))
        }
    }
}

fn log_header(config: &RunConfig, gauge: &GaugeSummary, n_rhs: usize) {
    log_msg("Block CG propagator");
    for (mu, l) in config.lattice.iter().enumerate() {
        log_kv(&format!("L{mu}"), l);
    }
    log_kv("Average plaquette", gauge.average);
    log_kv("Spatial plaquette", gauge.spatial);
    log_kv("Timelike plaquette", gauge.timelike);
    log_kv("1x2 plaquette", gauge.rectangle);
    log_kv("mass", config.mass);
    log_kv("mu_I", config.mu_i);
    log_kv("eps", config.eps);
    log_kv("N_block", n_rhs);
}

// ═══════════════════════════════════════════════════════════════════
//  Run
// ═══════════════════════════════════════════════════════════════════

/// Full production run. Fails on unreadable or corrupted gauge files and on
/// volume mismatches; solver non-convergence is reported, not raised.
pub fn run(config: &RunConfig, request: &RunRequest) -> Result<RunReport> {
    config.validate()?;
    if request.n_rhs == 0 {
        return Err(PropagatorError::EmptyBlock);
    }
    let grid = config.grid();
    let config_file = make_filename(&request.config_name, config.config_number);
    let u = load_gauge(config, &grid, Path::new(&config_file))?;
    let gauge = GaugeSummary::measure(&u);
    log_header(config, &gauge, request.n_rhs);

    let dirac = StaggeredDirac::new(&grid);
    let op = NormalOperator::new(&dirac, &u, config.dirac_params())?;
    let chi = make_sources(config, &dirac, &u, request.n_rhs)?;
    let (x0_star, reference) = prepare_reference(&op, &chi[0], &request.fermion_file, config)?;

    let label = request.stabilization.label();
    log_kv("stabilization", &label);
    let block_config = config.block_cg_config(request.stabilization);
    let mut x: Vec<FermionField> = (0..request.n_rhs)
        .map(|_| FermionField::zeros(&grid))
        .collect();

    let t0 = Instant::now();
    let block_cg = block_cg_solve(&op, &mut x, &chi, &block_config, Some(&x0_star))?;
    let runtime = t0.elapsed().as_secs_f64();

    let x0_norm = x0_star.norm_sq().sqrt();
    let x0_error = if x0_norm > 0.0 {
        is_field_equal(&x[0], &x0_star) / x0_norm
    } else {
        is_field_equal(&x[0], &x0_star)
    };

    log_kv("BlockCG_runtime_sec", runtime);
    log_kv("BlockCG_iterations", block_cg.iterations);
    log_kv("BlockCG_status", format!("{:?}", block_cg.status));
    log_kv("max_residual", block_cg.max_true_residual());
    log_kv("x0_error", x0_error);
    if !block_cg.converged() {
        log::warn!(
            "Block CG ({label}) stopped with {:?} after {} iterations",
            block_cg.status,
            block_cg.iterations
        );
    }

    Ok(RunReport {
        config: config.clone(),
        config_file,
        n_rhs: request.n_rhs,
        label,
        gauge,
        reference,
        block_cg,
        x0_error,
        block_cg_runtime_sec: runtime,
    })
}
