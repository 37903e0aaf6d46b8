// SPDX-License-Identifier: AGPL-3.0-only

//! Staggered Dirac operator with isospin chemical potential.
//!
//! The staggered (Kogut-Susskind) operator acts on a single colour triplet
//! per site:
//!
//!   (D ψ)(x) = m ψ(x) + ½ Σ_ν η_ν(x) [ e^{+μ_I/2 δ_ν0} U_ν(x) ψ(x+ν)
//!                                      − e^{−μ_I/2 δ_ν0} U_ν†(x−ν) ψ(x−ν) ]
//!
//! with η_ν(x) = (−1)^{x_0 + … + x_{ν−1}}. The chemical potential weights the
//! forward and backward time hops. The adjoint is the same stencil with the
//! hop sign and the sign of μ_I reflected:
//!
//!   (D† ψ)(x) = m ψ(x) − ½ Σ_ν η_ν(x) [ e^{−μ_I/2 δ_ν0} U_ν(x) ψ(x+ν)
//!                                      − e^{+μ_I/2 δ_ν0} U_ν†(x−ν) ψ(x−ν) ]
//!
//! `DD†` is Hermitian and, for m > 0, positive definite: it is the operator
//! inverted by [`super::cg`] and [`super::block_cg`].
//!
//! # References
//!
//! - Kogut & Susskind, PRD 11, 395 (1975)
//! - Kogut & Sinclair, PRD 66, 034505 (2002), isospin chemical potential

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::complex_f64::Complex64;
use super::constants::{N_COLORS, N_DIM};
use super::field::FermionField;
use super::gauge::GaugeField;
use super::geometry::Lattice;
use crate::error::{PropagatorError, Result};

/// Fermion parameters of the Dirac operator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiracParams {
    /// Bare staggered quark mass
    pub mass: f64,
    /// Isospin chemical potential μ_I
    pub mu_i: f64,
}

impl DiracParams {
    #[must_use]
    pub const fn new(mass: f64, mu_i: f64) -> Self {
        Self { mass, mu_i }
    }
}

/// Staggered Dirac operator bound to a lattice geometry.
///
/// Holds only the precomputed staggered phases; gauge field and parameters
/// are passed to every application.
#[derive(Debug)]
pub struct StaggeredDirac {
    grid: Arc<Lattice>,
    eta: Vec<[f64; N_DIM]>,
}

impl StaggeredDirac {
    #[must_use]
    pub fn new(grid: &Arc<Lattice>) -> Self {
        let eta = (0..grid.volume())
            .map(|ix| std::array::from_fn(|mu| grid.staggered_phase(ix, mu)))
            .collect();
        Self {
            grid: Arc::clone(grid),
            eta,
        }
    }

    #[must_use]
    pub fn grid(&self) -> &Arc<Lattice> {
        &self.grid
    }

    fn check_volumes(&self, out: &FermionField, input: &FermionField, u: &GaugeField) -> Result<()> {
        let vol = self.grid.volume();
        if u.volume() != vol {
            return Err(PropagatorError::VolumeMismatch {
                expected: vol,
                found: u.volume(),
            });
        }
        u.ensure_same_volume(out)?;
        u.ensure_same_volume(input)
    }

    /// `out = m·in + sign·½ Σ η [e^{sign·a} U in(x+ν) − e^{−sign·a} U† in(x−ν)]`,
    /// `a = μ_I/2` on time links. `sign = +1` is D, `sign = −1` is D†.
    fn apply_stencil(
        &self,
        out: &mut FermionField,
        input: &FermionField,
        u: &GaugeField,
        params: DiracParams,
        sign: f64,
    ) {
        let grid = &*self.grid;
        let fwd_time = (sign * 0.5 * params.mu_i).exp();
        let bwd_time = (-sign * 0.5 * params.mu_i).exp();

        out.as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(ix, site)| {
                let mut acc = [Complex64::ZERO; N_COLORS];
                for c in 0..N_COLORS {
                    acc[c] = input[ix][c].scale(params.mass);
                }
                for nu in 0..N_DIM {
                    let (w_fwd, w_bwd) = if nu == 0 {
                        (fwd_time, bwd_time)
                    } else {
                        (1.0, 1.0)
                    };
                    let half_eta = sign * 0.5 * self.eta[ix][nu];

                    let ix_fwd = grid.up(ix, nu);
                    let fwd = u.link(ix, nu).mul_vec(&input[ix_fwd]);

                    let ix_bwd = grid.dn(ix, nu);
                    let bwd = u.link(ix_bwd, nu).adjoint_mul_vec(&input[ix_bwd]);

                    for c in 0..N_COLORS {
                        acc[c] += (fwd[c].scale(w_fwd) - bwd[c].scale(w_bwd)).scale(half_eta);
                    }
                }
                *site = acc;
            });
    }

    /// `out = D in`
    pub fn apply_d(
        &self,
        out: &mut FermionField,
        input: &FermionField,
        u: &GaugeField,
        params: DiracParams,
    ) -> Result<()> {
        self.check_volumes(out, input, u)?;
        self.apply_stencil(out, input, u, params, 1.0);
        Ok(())
    }

    /// `out = D† in`
    pub fn apply_d_dagger(
        &self,
        out: &mut FermionField,
        input: &FermionField,
        u: &GaugeField,
        params: DiracParams,
    ) -> Result<()> {
        self.check_volumes(out, input, u)?;
        self.apply_stencil(out, input, u, params, -1.0);
        Ok(())
    }

    /// `out = D D† in`, using `tmp` for the intermediate `D† in`.
    pub fn apply_dd_dagger_with(
        &self,
        out: &mut FermionField,
        input: &FermionField,
        u: &GaugeField,
        params: DiracParams,
        tmp: &mut FermionField,
    ) -> Result<()> {
        self.check_volumes(out, input, u)?;
        self.check_volumes(tmp, input, u)?;
        self.apply_stencil(tmp, input, u, params, -1.0);
        self.apply_stencil(out, tmp, u, params, 1.0);
        Ok(())
    }

    /// `out = D D† in`
    pub fn apply_dd_dagger(
        &self,
        out: &mut FermionField,
        input: &FermionField,
        u: &GaugeField,
        params: DiracParams,
    ) -> Result<()> {
        let mut tmp = FermionField::zeros(&self.grid);
        self.apply_dd_dagger_with(out, input, u, params, &mut tmp)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lattice::field::is_field_equal;
    use crate::tolerances::{DIRAC_ADJOINT_REL, DIRAC_HERMITICITY_REL, DIRAC_ZERO_INPUT_ABS};

    fn setup(seed: u64) -> (Arc<Lattice>, GaugeField, StaggeredDirac) {
        let grid = Arc::new(Lattice::hypercubic(4));
        let u = GaugeField::hot_start(&grid, seed);
        let d = StaggeredDirac::new(&grid);
        (grid, u, d)
    }

    #[test]
    fn dirac_on_zero_field_is_zero() {
        let (grid, u, d) = setup(1);
        let psi = FermionField::zeros(&grid);
        let mut out = FermionField::random(&grid, 3);
        d.apply_d(&mut out, &psi, &u, DiracParams::new(0.1, 0.3)).unwrap();
        assert!(out.norm_sq() < DIRAC_ZERO_INPUT_ABS);
    }

    #[test]
    fn dirac_is_linear() {
        let (grid, u, d) = setup(2);
        let params = DiracParams::new(0.05, 0.2);
        let a = FermionField::random(&grid, 10);
        let b = FermionField::random(&grid, 11);
        let c1 = Complex64::new(0.7, -1.3);
        let c2 = Complex64::new(-2.0, 0.4);

        let mut combo = a.clone();
        combo.scale_complex(c1);
        combo.axpy(c2, &b);
        let mut lhs = FermionField::zeros(&grid);
        d.apply_d(&mut lhs, &combo, &u, params).unwrap();

        let mut da = FermionField::zeros(&grid);
        let mut db = FermionField::zeros(&grid);
        d.apply_d(&mut da, &a, &u, params).unwrap();
        d.apply_d(&mut db, &b, &u, params).unwrap();
        da.scale_complex(c1);
        da.axpy(c2, &db);

        assert!(is_field_equal(&lhs, &da) < 1e-12 * lhs.norm_sq().sqrt());
    }

    #[test]
    fn d_dagger_is_adjoint_of_d() {
        for mu_i in [0.0, 0.35] {
            let (grid, u, d) = setup(3);
            let params = DiracParams::new(0.1, mu_i);
            let a = FermionField::random(&grid, 20);
            let b = FermionField::random(&grid, 21);
            let mut db = FermionField::zeros(&grid);
            let mut dda = FermionField::zeros(&grid);
            d.apply_d(&mut db, &b, &u, params).unwrap();
            d.apply_d_dagger(&mut dda, &a, &u, params).unwrap();
            let lhs = a.dot(&db);
            let rhs = dda.dot(&b);
            assert!(
                (lhs - rhs).abs() < DIRAC_ADJOINT_REL * lhs.abs().max(1.0),
                "mu_i={mu_i}: {lhs} vs {rhs}"
            );
        }
    }

    #[test]
    fn normal_operator_is_hermitian_positive() {
        let (grid, u, d) = setup(4);
        let params = DiracParams::new(0.02, 0.1);
        let a = FermionField::random(&grid, 30);
        let b = FermionField::random(&grid, 31);
        let mut ab = FermionField::zeros(&grid);
        let mut aa = FermionField::zeros(&grid);
        d.apply_dd_dagger(&mut ab, &b, &u, params).unwrap();
        d.apply_dd_dagger(&mut aa, &a, &u, params).unwrap();

        let lhs = a.dot(&ab);
        let rhs = aa.dot(&b);
        assert!(
            (lhs - rhs).abs() < DIRAC_HERMITICITY_REL * lhs.abs().max(1.0),
            "{lhs} vs {rhs}"
        );

        let quad = a.dot(&aa);
        assert!(quad.im.abs() < DIRAC_HERMITICITY_REL * quad.re);
        assert!(quad.re > 0.0);

        // For μ_I = 0, ⟨a|DD†|a⟩ = m²‖a‖² + ‖Ha‖² ≥ m²‖a‖².
        let free = DiracParams::new(0.02, 0.0);
        d.apply_dd_dagger(&mut aa, &a, &u, free).unwrap();
        assert!(a.dot(&aa).re >= free.mass * free.mass * a.norm_sq() * (1.0 - 1e-12));
    }

    #[test]
    fn zero_chemical_potential_operator_is_normal() {
        // D = m + H with H anti-Hermitian, so D†D = DD†.
        let (grid, u, d) = setup(5);
        let params = DiracParams::new(0.3, 0.0);
        let psi = FermionField::random(&grid, 40);
        let mut tmp = FermionField::zeros(&grid);
        let mut dd_dag = FermionField::zeros(&grid);
        let mut d_dag_d = FermionField::zeros(&grid);
        d.apply_dd_dagger(&mut dd_dag, &psi, &u, params).unwrap();
        d.apply_d(&mut tmp, &psi, &u, params).unwrap();
        d.apply_d_dagger(&mut d_dag_d, &tmp, &u, params).unwrap();
        assert!(is_field_equal(&dd_dag, &d_dag_d) < DIRAC_HERMITICITY_REL * dd_dag.norm_sq().sqrt());
    }

    #[test]
    fn mass_term_on_cold_constant_field() {
        // Constant field on a cold lattice: forward and backward hops cancel.
        let grid = Arc::new(Lattice::hypercubic(4));
        let u = GaugeField::cold_start(&grid);
        let d = StaggeredDirac::new(&grid);
        let psi = FermionField::filled(&grid, [Complex64::ONE; N_COLORS]);
        let mut out = FermionField::zeros(&grid);
        d.apply_d(&mut out, &psi, &u, DiracParams::new(0.5, 0.0)).unwrap();
        let mut expected = psi.clone();
        expected.scale_inplace(0.5);
        assert!(is_field_equal(&out, &expected) < 1e-14);
    }

    #[test]
    fn volume_mismatch_is_rejected() {
        let (grid, u, d) = setup(6);
        let other = Arc::new(Lattice::new([2, 2, 2, 2]));
        let psi = FermionField::random(&other, 1);
        let mut out = FermionField::zeros(&grid);
        let err = d.apply_d(&mut out, &psi, &u, DiracParams::new(0.1, 0.0));
        assert!(matches!(
            err,
            Err(PropagatorError::VolumeMismatch { expected: 256, found: 16 })
        ));
    }
}
