// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: gauge and fermion files as the driver sees them.

use std::path::Path;
use std::sync::Arc;

use hotspring_propagator::config::RunConfig;
use hotspring_propagator::error::PropagatorError;
use hotspring_propagator::lattice::constants::N_DIM;
use hotspring_propagator::lattice::field::{is_field_equal, FermionField};
use hotspring_propagator::lattice::gauge::GaugeField;
use hotspring_propagator::lattice::geometry::Lattice;
use hotspring_propagator::lattice::io::{
    gauge_path, make_filename, read_fermion_field, read_gauge_field, write_fermion_field,
    write_gauge_field, LEGACY_HEADER_BYTES,
};
use hotspring_propagator::production::{load_gauge, GaugeSummary};
use hotspring_propagator::tolerances;

/// Lay `u` out the way the legacy Fortran writer does: header, then t
/// slowest and x fastest, directions x, y, z, t per site.
fn write_legacy(u: &GaugeField, path: &Path) {
    let grid = u.grid();
    let [l0, l1, l2, l3] = grid.dims();
    let mut bytes = vec![0u8; LEGACY_HEADER_BYTES];
    for t in 0..l0 {
        for z in 0..l3 {
            for y in 0..l2 {
                for x in 0..l1 {
                    let ix = grid.index(t, x, y, z);
                    for mu_file in 0..N_DIM {
                        let link = u.link(ix, (mu_file + 1) % N_DIM);
                        for row in &link.m {
                            for c in row {
                                bytes.extend_from_slice(&c.re.to_ne_bytes());
                                bytes.extend_from_slice(&c.im.to_ne_bytes());
                            }
                        }
                    }
                }
            }
        }
    }
    std::fs::write(path, bytes).expect("write legacy file");
}

fn small_grid() -> Arc<Lattice> {
    Arc::new(Lattice::new([4, 2, 4, 2]))
}

#[test]
fn legacy_and_native_files_agree() {
    let grid = small_grid();
    let u = GaugeField::hot_start(&grid, 31);
    let dir = tempfile::tempdir().expect("tempdir");
    let native = gauge_path(dir.path(), "conf", 1);
    let legacy = dir.path().join("conf_legacy.dat");
    write_gauge_field(&u, &native).expect("write native");
    write_legacy(&u, &legacy);

    let native_config = RunConfig {
        lattice: grid.dims(),
        ..RunConfig::default()
    };
    let legacy_config = RunConfig {
        legacy_gauge: true,
        ..native_config.clone()
    };
    let a = load_gauge(&native_config, &grid, &native).expect("native");
    let b = load_gauge(&legacy_config, &grid, &legacy).expect("legacy");
    assert_eq!(a.as_slice(), b.as_slice());

    let sa = GaugeSummary::measure(&a);
    let sb = GaugeSummary::measure(&b);
    assert!((sa.average - sb.average).abs() < tolerances::GAUGE_CHECKSUM_ABS);
    assert!((sa.rectangle - sb.rectangle).abs() < tolerances::GAUGE_CHECKSUM_ABS);
}

#[test]
fn flipped_link_fails_checksum() {
    let grid = small_grid();
    let u = GaugeField::hot_start(&grid, 2);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(make_filename("conf", 7));
    write_gauge_field(&u, &path).expect("write");

    let mut bytes = std::fs::read(&path).expect("read back");
    // real part of U_0(0)[0][0]
    let offset = 8;
    let v = f64::from_ne_bytes(bytes[offset..offset + 8].try_into().expect("8 bytes"));
    bytes[offset..offset + 8].copy_from_slice(&(-v).to_ne_bytes());
    std::fs::write(&path, &bytes).expect("rewrite");

    match read_gauge_field(&grid, &path) {
        Err(PropagatorError::ChecksumMismatch { stored, measured, .. }) => {
            assert!((stored - measured).abs() > tolerances::GAUGE_CHECKSUM_ABS);
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[test]
fn gauge_file_for_other_lattice_is_truncated() {
    let small = small_grid();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("small_1.cnfg");
    write_gauge_field(&GaugeField::cold_start(&small), &path).expect("write");
    let large = Arc::new(Lattice::hypercubic(4));
    assert!(matches!(
        read_gauge_field(&large, &path),
        Err(PropagatorError::Truncated { .. })
    ));
}

#[test]
fn fermion_cache_survives_round_trip_and_rejects_tampering() {
    let grid = small_grid();
    let mut seed = 5;
    let psi = FermionField::gaussian(&grid, &mut seed);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("x0.fermion");
    write_fermion_field(&psi, &path).expect("write");
    let back = read_fermion_field(&grid, &path).expect("read");
    assert_eq!(is_field_equal(&psi, &back), 0.0);

    let mut bytes = std::fs::read(&path).expect("read back");
    let last = bytes.len() - 8;
    bytes[last..].copy_from_slice(&1.0e3_f64.to_ne_bytes());
    std::fs::write(&path, &bytes).expect("rewrite");
    assert!(read_fermion_field(&grid, &path).is_err());
}
