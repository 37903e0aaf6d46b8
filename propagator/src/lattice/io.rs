// SPDX-License-Identifier: AGPL-3.0-only

//! Binary field files with integrity checks.
//!
//! | Format | Layout | Check |
//! |--------|--------|-------|
//! | Native gauge `{base}_{n}.cnfg` | f64 plaquette, then `V × 4 × 3×3` complex | exact size, plaquette within [`GAUGE_CHECKSUM_ABS`] |
//! | Legacy gauge | 44-byte record header, then x-fastest sites, directions x,y,z,t | plaquette logged |
//! | Verified blob (fermions) | magic, u64 volume, f64 checksum, payload | magic, volume, checksum |
//!
//! Native formats use native-endian doubles and are written straight from
//! the `Pod` field storage with `bytemuck`, so a file written and read on the
//! same machine round-trips bit-exactly.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use super::complex_f64::Complex64;
use super::constants::{N_COLORS, N_DIM};
use super::field::FermionField;
use super::gauge::{checksum_plaquette, GaugeField};
use super::geometry::Lattice;
use super::su3::{ColorVector, Su3Matrix};
use crate::error::{PropagatorError, Result};
use crate::tolerances::{FERMION_CHECKSUM_REL, GAUGE_CHECKSUM_ABS};

/// Fortran unformatted header: 2 doubles, 2 ints and 5 record markers.
pub const LEGACY_HEADER_BYTES: usize = 2 * 8 + 2 * 4 + 5 * 4;

/// Magic prefix of fermion field files.
pub const FERMION_MAGIC: [u8; 8] = *b"HSFERM01";

const BLOB_HEADER_BYTES: usize = 8 + 8 + 8;
const LINK_BYTES: usize = std::mem::size_of::<[Su3Matrix; N_DIM]>();

/// `{base}_{n}.cnfg`
#[must_use]
pub fn make_filename(base_name: &str, config_number: usize) -> String {
    format!("{base_name}_{config_number}.cnfg")
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| PropagatorError::io(path, e))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| PropagatorError::io(path, e))
}

fn check_len(path: &Path, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() < expected {
        return Err(PropagatorError::Truncated {
            path: path.to_path_buf(),
            expected,
            found: bytes.len(),
        });
    }
    Ok(())
}

fn check_exact_len(path: &Path, bytes: &[u8], expected: usize) -> Result<()> {
    check_len(path, bytes, expected)?;
    if bytes.len() > expected {
        return Err(PropagatorError::TrailingBytes {
            path: path.to_path_buf(),
            expected,
            found: bytes.len(),
        });
    }
    Ok(())
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    bytemuck::pod_read_unaligned(&bytes[offset..offset + 8])
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    bytemuck::pod_read_unaligned(&bytes[offset..offset + 8])
}

/// `Ok` only when `stored` is finite and `|measured − stored| ≤ tolerance`.
///
/// A NaN anywhere in the comparison is a mismatch.
pub fn verify_checksum(path: &Path, stored: f64, measured: f64, tolerance: f64) -> Result<()> {
    let within = (measured - stored).abs() <= tolerance;
    if !(stored.is_finite() && within) {
        return Err(PropagatorError::ChecksumMismatch {
            path: path.to_path_buf(),
            stored,
            measured,
        });
    }
    Ok(())
}

/// Write `u` with its average plaquette as checksum. Returns the checksum.
pub fn write_gauge_field(u: &GaugeField, path: &Path) -> Result<f64> {
    let plaq = checksum_plaquette(u);
    let mut out = create(path)?;
    out.write_all(&plaq.to_ne_bytes())
        .and_then(|()| out.write_all(bytemuck::cast_slice(u.as_slice())))
        .and_then(|()| out.flush())
        .map_err(|e| PropagatorError::io(path, e))?;
    info!("Gauge field [{}] written with plaquette {plaq:.17}", path.display());
    Ok(plaq)
}

/// Read a native gauge file and verify its plaquette checksum.
pub fn read_gauge_field(grid: &Arc<Lattice>, path: &Path) -> Result<GaugeField> {
    let bytes = read_all(path)?;
    let expected = 8 + grid.volume() * LINK_BYTES;
    check_exact_len(path, &bytes, expected)?;

    let stored = read_f64(&bytes, 0);
    let links: Vec<[Su3Matrix; N_DIM]> = bytemuck::pod_collect_to_vec(&bytes[8..expected]);
    let u = GaugeField::from_vec(grid, links)?;

    let plaq = checksum_plaquette(&u);
    verify_checksum(path, stored, plaq, GAUGE_CHECKSUM_ABS)?;
    info!("Gauge field [{}] read with plaquette {plaq:.17}", path.display());
    Ok(u)
}

/// Read a legacy (Fortran unformatted) gauge file.
///
/// Sites are stored with x fastest and t slowest; per site the four
/// directions come in the order x, y, z, t and are mapped to the native
/// t, x, y, z ordering. No checksum is stored, so the plaquette is only
/// logged.
pub fn read_legacy_gauge_field(grid: &Arc<Lattice>, path: &Path) -> Result<GaugeField> {
    let bytes = read_all(path)?;
    let expected = LEGACY_HEADER_BYTES + grid.volume() * LINK_BYTES;
    check_len(path, &bytes, expected)?;
    let values: Vec<f64> = bytemuck::pod_collect_to_vec(&bytes[LEGACY_HEADER_BYTES..expected]);

    let [l0, l1, l2, l3] = grid.dims();
    let mut u = GaugeField::cold_start(grid);
    let mut cursor = values.chunks_exact(2);
    for t in 0..l0 {
        for z in 0..l3 {
            for y in 0..l2 {
                for x in 0..l1 {
                    let ix = grid.index(t, x, y, z);
                    for mu_file in 0..N_DIM {
                        let mu = (mu_file + 1) % N_DIM;
                        let mut link = Su3Matrix::ZERO;
                        for row in &mut link.m {
                            for entry in row.iter_mut() {
                                if let Some(pair) = cursor.next() {
                                    *entry = Complex64::new(pair[0], pair[1]);
                                }
                            }
                        }
                        u[ix][mu] = link;
                    }
                }
            }
        }
    }
    info!(
        "Legacy gauge field [{}] read with plaquette {:.17}",
        path.display(),
        checksum_plaquette(&u)
    );
    Ok(u)
}

/// Payload of a verified blob.
#[derive(Clone, Debug)]
pub struct VerifiedBlob {
    pub volume: u64,
    pub checksum: f64,
    pub payload: Vec<u8>,
}

/// Write `magic | volume (u64 LE) | checksum (f64 LE) | payload`.
pub fn write_verified_blob(
    path: &Path,
    magic: &[u8; 8],
    volume: u64,
    checksum: f64,
    payload: &[u8],
) -> Result<()> {
    let mut out = create(path)?;
    out.write_all(magic)
        .and_then(|()| out.write_all(&volume.to_le_bytes()))
        .and_then(|()| out.write_all(&checksum.to_le_bytes()))
        .and_then(|()| out.write_all(payload))
        .and_then(|()| out.flush())
        .map_err(|e| PropagatorError::io(path, e))
}

/// Read a blob written by [`write_verified_blob`] and check its magic.
///
/// The checksum is returned for the caller to verify against the decoded
/// payload.
pub fn read_verified_blob(path: &Path, magic: &[u8; 8]) -> Result<VerifiedBlob> {
    let bytes = read_all(path)?;
    check_len(path, &bytes, BLOB_HEADER_BYTES)?;
    if &bytes[..8] != magic {
        return Err(PropagatorError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    let volume = u64::from_le(read_u64(&bytes, 8));
    let checksum = f64::from_bits(u64::from_le(read_u64(&bytes, 16)));
    Ok(VerifiedBlob {
        volume,
        checksum,
        payload: bytes[BLOB_HEADER_BYTES..].to_vec(),
    })
}

/// Write a fermion field as a verified blob (checksum: `‖ψ‖²`).
pub fn write_fermion_field(psi: &FermionField, path: &Path) -> Result<()> {
    write_verified_blob(
        path,
        &FERMION_MAGIC,
        psi.volume() as u64,
        psi.norm_sq(),
        bytemuck::cast_slice(psi.as_slice()),
    )?;
    info!("Fermion field [{}] written", path.display());
    Ok(())
}

/// Read a fermion field written by [`write_fermion_field`].
///
/// Any error (missing file, wrong magic or volume, truncated payload,
/// checksum mismatch) means the file cannot be trusted.
pub fn read_fermion_field(grid: &Arc<Lattice>, path: &Path) -> Result<FermionField> {
    let blob = read_verified_blob(path, &FERMION_MAGIC)?;
    let volume = usize::try_from(blob.volume).unwrap_or(usize::MAX);
    if volume != grid.volume() {
        return Err(PropagatorError::VolumeMismatch {
            expected: grid.volume(),
            found: volume,
        });
    }
    let expected = volume * std::mem::size_of::<ColorVector>();
    if blob.payload.len() != expected {
        return Err(PropagatorError::Truncated {
            path: path.to_path_buf(),
            expected: BLOB_HEADER_BYTES + expected,
            found: BLOB_HEADER_BYTES + blob.payload.len(),
        });
    }
    let sites: Vec<[Complex64; N_COLORS]> = bytemuck::pod_collect_to_vec(&blob.payload);
    let psi = FermionField::from_vec(grid, sites)?;
    let norm = psi.norm_sq();
    verify_checksum(
        path,
        blob.checksum,
        norm,
        FERMION_CHECKSUM_REL * blob.checksum.abs().max(f64::MIN_POSITIVE),
    )?;
    info!("Fermion field [{}] read", path.display());
    Ok(psi)
}

/// `dir/{base}_{n}.cnfg`
#[must_use]
pub fn gauge_path(dir: &Path, base_name: &str, config_number: usize) -> PathBuf {
    dir.join(make_filename(base_name, config_number))
}
