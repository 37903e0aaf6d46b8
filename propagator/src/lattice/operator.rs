// SPDX-License-Identifier: AGPL-3.0-only

//! Linear-operator seam between the Krylov solvers and the stencil.
//!
//! The solvers only need `y = A x` for a Hermitian positive-definite `A`.
//! [`NormalOperator`] binds `DD†` to a gauge field and fixed parameters;
//! tests can substitute any other implementation.

use std::sync::Arc;

use super::dirac::{DiracParams, StaggeredDirac};
use super::field::FermionField;
use super::gauge::GaugeField;
use super::geometry::Lattice;
use crate::error::{PropagatorError, Result};

/// Hermitian positive-definite operator on fermion fields.
pub trait LinearOperator: Sync {
    /// Geometry of the fields the operator acts on.
    fn grid(&self) -> &Arc<Lattice>;

    /// `out = A input`
    fn apply(&self, out: &mut FermionField, input: &FermionField) -> Result<()>;

    /// `out[i] = A input[i]` for every column of a block.
    fn apply_block(&self, out: &mut [FermionField], input: &[FermionField]) -> Result<()> {
        if out.len() != input.len() {
            return Err(PropagatorError::BlockMismatch {
                expected: input.len(),
                found: out.len(),
            });
        }
        for (o, i) in out.iter_mut().zip(input) {
            self.apply(o, i)?;
        }
        Ok(())
    }
}

/// `DD†` under a fixed gauge background and fermion parameters.
#[derive(Debug)]
pub struct NormalOperator<'a> {
    dirac: &'a StaggeredDirac,
    gauge: &'a GaugeField,
    params: DiracParams,
}

impl<'a> NormalOperator<'a> {
    pub fn new(dirac: &'a StaggeredDirac, gauge: &'a GaugeField, params: DiracParams) -> Result<Self> {
        if gauge.volume() != dirac.grid().volume() {
            return Err(PropagatorError::VolumeMismatch {
                expected: dirac.grid().volume(),
                found: gauge.volume(),
            });
        }
        Ok(Self {
            dirac,
            gauge,
            params,
        })
    }

    #[must_use]
    pub const fn params(&self) -> DiracParams {
        self.params
    }
}

impl LinearOperator for NormalOperator<'_> {
    fn grid(&self) -> &Arc<Lattice> {
        self.dirac.grid()
    }

    fn apply(&self, out: &mut FermionField, input: &FermionField) -> Result<()> {
        self.dirac.apply_dd_dagger(out, input, self.gauge, self.params)
    }

    /// Shares one scratch field across all columns.
    fn apply_block(&self, out: &mut [FermionField], input: &[FermionField]) -> Result<()> {
        if out.len() != input.len() {
            return Err(PropagatorError::BlockMismatch {
                expected: input.len(),
                found: out.len(),
            });
        }
        let mut tmp = FermionField::zeros(self.dirac.grid());
        for (o, i) in out.iter_mut().zip(input) {
            self.dirac.apply_dd_dagger_with(o, i, self.gauge, self.params, &mut tmp)?;
        }
        Ok(())
    }
}
