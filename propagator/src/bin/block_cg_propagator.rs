// SPDX-License-Identifier: AGPL-3.0-only

//! Block CG propagator driver.
//!
//! ```text
//! block_cg_propagator <config_name> <n_RHS> <BCGA> <dQ> <dQA> <rQ> <fermion_filename> [options]
//! ```
//!
//! Reads `{config_name}_{n}.cnfg`, builds `n_RHS` sources and solves
//! `DD† X = χ` with Block CG under the given stabilization flags (0 or 1).
//! The CG solution of the first source is cached in `fermion_filename`.
//! A corrupted gauge file aborts the run with exit code 1.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use hotspring_propagator::config::RunConfig;
use hotspring_propagator::error::{PropagatorError, Result};
use hotspring_propagator::lattice::block_cg::Stabilization;
use hotspring_propagator::logging;
use hotspring_propagator::production::{run, RunRequest};

#[derive(Parser, Debug)]
#[command(
    name = "block_cg_propagator",
    about = "Staggered quark propagators by Block CG on one gauge configuration"
)]
struct Cli {
    /// Gauge configuration base name (reads `{config_name}_{n}.cnfg`)
    config_name: String,

    /// Number of right-hand sides
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    n_rhs: u32,

    /// Operator-conjugate direction update (0 or 1)
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    bcga: u8,

    /// Orthonormalize and deflate the direction block (0 or 1)
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    dq: u8,

    /// A-orthonormalize the direction block (0 or 1)
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    dqa: u8,

    /// Residual replacement (0 or 1)
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    rq: u8,

    /// Cache file for the CG solution of the first source
    fermion_filename: PathBuf,

    /// JSON run configuration; the options below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration number n
    #[arg(long)]
    config_number: Option<usize>,

    /// Lattice extents L0,L1,L2,L3
    #[arg(long, value_delimiter = ',')]
    lattice: Option<Vec<usize>>,

    /// Bare quark mass
    #[arg(long)]
    mass: Option<f64>,

    /// Isospin chemical potential
    #[arg(long)]
    mu_i: Option<f64>,

    /// Relative residual tolerance
    #[arg(long)]
    eps: Option<f64>,

    /// Iteration cap for both solvers
    #[arg(long)]
    max_iter: Option<usize>,

    /// Seed of the gaussian sources
    #[arg(long)]
    seed: Option<u64>,

    /// Unit point sources instead of gaussian noise
    #[arg(long)]
    point_source: bool,

    /// Use the sources as given instead of D χ
    #[arg(long)]
    no_source_d: bool,

    /// Read the gauge file in the legacy Fortran layout
    #[arg(long)]
    legacy_gauge: bool,

    /// Write a JSON run report here
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(n) = self.config_number {
            config.config_number = n;
        }
        if let Some(dims) = &self.lattice {
            config.lattice = dims.as_slice().try_into().map_err(|_| {
                PropagatorError::Config(format!("--lattice needs 4 extents, got {dims:?}"))
            })?;
        }
        if let Some(m) = self.mass {
            config.mass = m;
        }
        if let Some(mu) = self.mu_i {
            config.mu_i = mu;
        }
        if let Some(eps) = self.eps {
            config.eps = eps;
        }
        if let Some(n) = self.max_iter {
            config.max_iterations = n;
        }
        if let Some(s) = self.seed {
            config.seed = s;
        }
        config.point_source |= self.point_source;
        if self.no_source_d {
            config.source_multiplied_by_d = false;
        }
        config.legacy_gauge |= self.legacy_gauge;
        config.validate()?;
        Ok(config)
    }

    fn request(&self) -> RunRequest {
        RunRequest {
            config_name: self.config_name.clone(),
            n_rhs: self.n_rhs as usize,
            stabilization: Stabilization::from_flags(
                self.bcga == 1,
                self.dq == 1,
                self.dqa == 1,
                self.rq == 1,
            ),
            fermion_file: self.fermion_filename.clone(),
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let config = match cli.run_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let report = match run(&config, &cli.request()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    if let Some(path) = &cli.output {
        if let Err(e) = report.write_json(path) {
            eprintln!("error: {e}");
            process::exit(1);
        }
        log::info!("report written to {}", path.display());
    }
}
