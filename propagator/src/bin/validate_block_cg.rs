// SPDX-License-Identifier: AGPL-3.0-only

//! Block CG validation on a 4⁴ lattice.
//!
//! Self-contained: builds its own gauge fields, needs no input files and
//! exits 0 only if every check passes.
//!
//! # Validation targets
//!
//! | Check | Expected | Tolerance | Basis |
//! |-------|----------|-----------|-------|
//! | Cold plaquette | 1.0 | 1e-12 | Definition |
//! | Hot-start unitarity | 0 | 1e-20 | SU(3) projection |
//! | ⟨φ, Dψ⟩ = ⟨D†φ, ψ⟩ | equal | 1e-12 rel | Adjointness of the stencil |
//! | CG true residual | < 1e-6 | upper bound | Algorithm correctness |
//! | Block CG, 16 flag sets | CG solutions | 1e-7 rel | Same linear system |
//! | Duplicate sources under dQ | width 1 | exact | Deflation |
//! | Gauge and fermion file round trip | bit-exact | checksum | I/O |

use std::process;
use std::sync::Arc;

use hotspring_propagator::lattice::block_cg::{block_cg_solve, BlockCgConfig, Stabilization};
use hotspring_propagator::lattice::cg::{cg_solve, CgConfig};
use hotspring_propagator::lattice::dirac::{DiracParams, StaggeredDirac};
use hotspring_propagator::lattice::field::{is_field_equal, FermionField};
use hotspring_propagator::lattice::gauge::GaugeField;
use hotspring_propagator::lattice::geometry::Lattice;
use hotspring_propagator::lattice::io::{
    read_fermion_field, read_gauge_field, write_fermion_field, write_gauge_field,
};
use hotspring_propagator::lattice::operator::NormalOperator;
use hotspring_propagator::logging;
use hotspring_propagator::tolerances;
use hotspring_propagator::validation::ValidationHarness;

const N_RHS: usize = 4;

fn relative_error(x: &FermionField, reference: &FermionField) -> f64 {
    is_field_equal(x, reference) / reference.norm_sq().sqrt()
}

fn main() {
    logging::init();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Block CG Validation: staggered DD† on 4⁴                   ║");
    println!("║  CG reference, 16 stabilization sets, file round trips     ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut harness = ValidationHarness::new("block_cg");
    let grid = Arc::new(Lattice::hypercubic(4));
    let params = DiracParams::new(0.5, 0.1);
    let dirac = StaggeredDirac::new(&grid);

    println!("═══ Gauge field ═══");
    let cold = GaugeField::cold_start(&grid);
    let hot = GaugeField::hot_start(&grid, 42);
    println!("  cold plaquette: {:.12}", cold.average_plaquette());
    println!("  hot plaquette:  {:.12}", hot.average_plaquette());
    harness.check_abs(
        "cold plaquette",
        cold.average_plaquette(),
        1.0,
        tolerances::LATTICE_COLD_PLAQUETTE_ABS,
    );
    harness.check_upper(
        "hot unitarity",
        hot.max_unitarity_violation(),
        tolerances::LATTICE_UNITARITY_MAX,
    );

    println!("═══ Dirac operator ═══");
    {
        let phi = FermionField::random(&grid, 1);
        let psi = FermionField::random(&grid, 2);
        let mut d_psi = FermionField::zeros(&grid);
        let mut ddag_phi = FermionField::zeros(&grid);
        let applied = dirac
            .apply_d(&mut d_psi, &psi, &hot, params)
            .and_then(|()| dirac.apply_d_dagger(&mut ddag_phi, &phi, &hot, params));
        if let Err(e) = applied {
            eprintln!("error: {e}");
            process::exit(1);
        }
        let lhs = phi.dot(&d_psi);
        let rhs = ddag_phi.dot(&psi);
        let rel = (lhs - rhs).abs() / lhs.abs();
        println!("  ⟨φ,Dψ⟩ = {lhs}, ⟨D†φ,ψ⟩ = {rhs}");
        harness.check_upper("dirac adjointness", rel, tolerances::DIRAC_ADJOINT_REL);
    }

    let op = match NormalOperator::new(&dirac, &hot, params) {
        Ok(op) => op,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let mut seed = 1234u64;
    let sources: Vec<FermionField> = (0..N_RHS)
        .map(|_| FermionField::gaussian(&grid, &mut seed))
        .collect();
    let tolerance = tolerances::LATTICE_CG_TOLERANCE_STRICT;

    println!("═══ CG reference ═══");
    let cg_config = CgConfig {
        tolerance,
        max_iterations: 5000,
    };
    let mut reference = Vec::with_capacity(N_RHS);
    let mut cg_iterations = 0;
    for (i, b) in sources.iter().enumerate() {
        let mut x = FermionField::zeros(&grid);
        match cg_solve(&op, &mut x, b, &cg_config) {
            Ok(r) => {
                println!(
                    "  source {i}: {:?} in {} iterations, true residual {:.2e}",
                    r.status, r.iterations, r.true_residual
                );
                harness.check_bool(&format!("CG source {i} converged"), r.converged());
                harness.check_upper(
                    &format!("CG source {i} true residual"),
                    r.true_residual,
                    tolerances::LATTICE_CG_RESIDUAL,
                );
                cg_iterations = cg_iterations.max(r.iterations);
            }
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
        reference.push(x);
    }

    println!("═══ Block CG, all stabilization sets ═══");
    for stabilization in Stabilization::all() {
        let label = stabilization.label();
        let config = BlockCgConfig {
            tolerance,
            max_iterations: 5000,
            stabilization,
            ..BlockCgConfig::default()
        };
        let mut x: Vec<FermionField> = (0..N_RHS).map(|_| FermionField::zeros(&grid)).collect();
        let result = match block_cg_solve(&op, &mut x, &sources, &config, Some(&reference[0])) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error ({label}): {e}");
                process::exit(1);
            }
        };
        let parity = x
            .iter()
            .zip(&reference)
            .map(|(xi, ri)| relative_error(xi, ri))
            .fold(0.0, f64::max);
        println!(
            "  {label:<16} {:?} in {:>3} iterations, max true residual {:.2e}, vs CG {parity:.2e}",
            result.status,
            result.iterations,
            result.max_true_residual()
        );
        harness.check_bool(&format!("{label} converged"), result.converged());
        harness.check_upper(
            &format!("{label} agrees with CG"),
            parity,
            tolerances::BLOCK_CG_SOLUTION_PARITY,
        );
        harness.check_bool(
            &format!("{label} iterations ≤ CG"),
            result.iterations <= cg_iterations,
        );
    }

    println!("═══ Deflation of duplicate sources ═══");
    {
        let b = vec![sources[0].clone(), sources[0].clone()];
        let mut x = vec![FermionField::zeros(&grid), FermionField::zeros(&grid)];
        let config = BlockCgConfig {
            tolerance,
            max_iterations: 5000,
            stabilization: Stabilization::from_flags(false, true, false, false),
            ..BlockCgConfig::default()
        };
        match block_cg_solve(&op, &mut x, &b, &config, None) {
            Ok(r) => {
                let first_width = r.history.first().map_or(0, |h| h.width);
                println!("  {:?}, first block width {first_width}", r.status);
                harness.check_bool("duplicate sources converged", r.converged());
                harness.check_bool("duplicate sources deflated", first_width == 1);
            }
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
    }

    println!("═══ File round trips ═══");
    {
        let dir = std::env::temp_dir().join(format!("validate_block_cg_{}", process::id()));
        let gauge_file = dir.join("hot_1.cnfg");
        let fermion_file = dir.join("x0.fermion");
        let round_trip = std::fs::create_dir_all(&dir)
            .map_err(|e| hotspring_propagator::error::PropagatorError::io(&dir, e))
            .and_then(|()| write_gauge_field(&hot, &gauge_file))
            .and_then(|_| read_gauge_field(&grid, &gauge_file))
            .and_then(|u| {
                write_fermion_field(&reference[0], &fermion_file)?;
                let psi = read_fermion_field(&grid, &fermion_file)?;
                Ok((u, psi))
            });
        match round_trip {
            Ok((u, psi)) => {
                harness.check_abs(
                    "gauge file plaquette",
                    u.average_plaquette(),
                    hot.average_plaquette(),
                    tolerances::GAUGE_CHECKSUM_ABS,
                );
                harness.check_bool(
                    "fermion file bit-exact",
                    is_field_equal(&psi, &reference[0]) == 0.0,
                );
            }
            Err(e) => {
                println!("  round trip failed: {e}");
                harness.check_bool("file round trip", false);
            }
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    harness.finish();
}
