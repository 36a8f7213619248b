// mpdata - a Rust implementation of the MPDATA advection algorithm
// Copyright (C) 2026 the mpdata developers

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Run-time solver configuration

use std::collections::BTreeMap;

use crate::bcond::BcondKind;
use crate::error::{Result, SolverError};

/// Numerical option flags selecting the MPDATA variant.
///
/// All options default to off, which yields the basic positive-definite
/// scheme. The flags only affect runs with `n_iters > 1` (except `nug`,
/// which also weights the donor-cell pass).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Opts {
    /// Flux-corrected transport: derate antidiffusive velocities so the
    /// solution stays within the local extrema of the previous step.
    pub fct: bool,
    /// Infinite-gauge variant (for variable-sign fields).
    pub iga: bool,
    /// Third-order accurate correction terms.
    pub tot: bool,
    /// Divergence-form correction for non-solenoidal Courant fields.
    pub dfl: bool,
    /// Non-unit Jacobian / density weight `G`.
    pub nug: bool,
}

impl Opts {
    /// Halo width implied by the selected variant. The FCT limiters and the
    /// third-order terms read 2-wide stencils of values that themselves read
    /// 1-wide stencils.
    pub fn halo(&self) -> usize {
        if self.fct || self.tot {
            2
        } else {
            1
        }
    }
}

/// Time integration scheme for the forcing terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhsScheme {
    /// Whole-`dt` forcings applied after advection, using the advected state.
    EulerA,
    /// Whole-`dt` forcings applied before advection, using the pre-step state.
    EulerB,
    /// Half the contribution before advection (from the pre-step state), the
    /// other half after (from the advected state). Second-order in time;
    /// implicit couplings are expressed as algebraic closed forms inside the
    /// user forcing.
    Trapez,
}

/// Elliptic solver variant for the pressure projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrsScheme {
    /// No projection; the Courant field is prescribed by the user.
    None,
    /// Conjugate gradient.
    Cg,
    /// Conjugate residual.
    Cr,
    /// Minimum residual (Richardson iteration with optimal step).
    Mr,
}

/// Name and unit of an output variable, keyed by equation index in
/// [`Params::outvars`].
#[derive(Clone, Debug)]
pub struct OutVar {
    pub name: String,
    pub unit: String,
}

impl OutVar {
    pub fn new(name: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// Run-time parameters of a [`Solver`](crate::Solver).
#[derive(Clone, Debug)]
pub struct Params {
    /// Number of spatial dimensions (1, 2 or 3).
    pub n_dims: usize,
    /// Number of prognostic equations.
    pub n_eqns: usize,
    /// Cell counts per axis; `grid_size.len() == n_dims`.
    pub grid_size: Vec<usize>,
    /// Cell spacing along axis 0.
    pub di: f64,
    /// Cell spacing along axis 1 (ignored in 1D).
    pub dj: f64,
    /// Cell spacing along axis 2 (ignored in 1D/2D).
    pub dk: f64,
    /// Time step.
    pub dt: f64,
    /// Number of MPDATA passes (1 = plain donor-cell).
    pub n_iters: usize,
    /// Numerical option flags.
    pub opts: Opts,
    /// Forcing integration scheme.
    pub rhs_scheme: RhsScheme,
    /// Pressure projection variant.
    pub prs_scheme: PrsScheme,
    /// Convergence threshold for the max-norm of the divergence residual.
    pub prs_tol: f64,
    /// Iteration bound for the pressure solver; exhaustion is non-fatal.
    pub prs_maxiter: usize,
    /// Boundary condition per axis and side (`bcond[axis][0]` = low side).
    pub bcond: [[BcondKind; 2]; 3],
    /// Output cadence in steps; 0 disables output.
    pub outfreq: usize,
    /// Equations to hand to the output adapter.
    pub outvars: BTreeMap<usize, OutVar>,
    /// Worker count for the stripe decomposition.
    pub n_threads: usize,
    /// Equation indices of the prognosed velocity components, one per axis.
    /// When set, the Courant field is re-derived from these equations every
    /// step; required for `prs_scheme != None`.
    pub vip: Option<Vec<usize>>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            n_dims: 1,
            n_eqns: 1,
            grid_size: vec![],
            di: 1.0,
            dj: 1.0,
            dk: 1.0,
            dt: 1.0,
            n_iters: 2,
            opts: Opts::default(),
            rhs_scheme: RhsScheme::EulerA,
            prs_scheme: PrsScheme::None,
            prs_tol: 1e-7,
            prs_maxiter: 1000,
            bcond: [[BcondKind::Cyclic; 2]; 3],
            outfreq: 0,
            outvars: BTreeMap::new(),
            n_threads: 1,
            vip: None,
        }
    }
}

impl Params {
    /// Interior cell counts padded to three axes (unused axes have extent 1).
    pub(crate) fn span(&self) -> [usize; 3] {
        let mut span = [1, 1, 1];
        for (d, &n) in self.grid_size.iter().enumerate() {
            span[d] = n;
        }
        span
    }

    /// Cell spacings padded to three axes.
    pub(crate) fn spacing(&self) -> [f64; 3] {
        [self.di, self.dj, self.dk]
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SolverError::Config(msg));
        if self.n_dims < 1 || self.n_dims > 3 {
            return fail(format!("n_dims must be 1, 2 or 3 (got {})", self.n_dims));
        }
        if self.grid_size.len() != self.n_dims {
            return fail(format!(
                "grid_size has {} entries for {} dimensions",
                self.grid_size.len(),
                self.n_dims
            ));
        }
        if self.n_eqns == 0 {
            return fail("n_eqns must be positive".to_string());
        }
        if self.n_iters == 0 {
            return fail("n_iters must be at least 1".to_string());
        }
        if self.opts.fct && self.n_iters < 2 {
            return fail("fct requires the MPDATA corrector (n_iters >= 2)".to_string());
        }
        // the infinite-gauge ratios linearize around a single corrective
        // pass and are unbounded, so further passes are not defined
        if self.opts.iga && self.n_iters > 2 {
            return fail("iga supports at most one corrective pass (n_iters <= 2)".to_string());
        }
        let min_span = 2 * self.opts.halo();
        for (d, &n) in self.grid_size.iter().enumerate() {
            if n < min_span {
                return fail(format!(
                    "axis {} has {} cells but the stencil needs at least {}",
                    d, n, min_span
                ));
            }
        }
        if !(self.dt > 0.0) || !(self.di > 0.0) || !(self.dj > 0.0) || !(self.dk > 0.0) {
            return fail("dt and cell spacings must be positive".to_string());
        }
        if self.n_threads == 0 {
            return fail("n_threads must be at least 1".to_string());
        }
        match &self.vip {
            Some(ixs) => {
                if ixs.len() != self.n_dims {
                    return fail(format!(
                        "vip names {} velocity equations for {} dimensions",
                        ixs.len(),
                        self.n_dims
                    ));
                }
                for &e in ixs {
                    if e >= self.n_eqns {
                        return fail(format!("vip equation index {} out of range", e));
                    }
                }
            }
            None => {
                if self.prs_scheme != PrsScheme::None {
                    return fail(
                        "pressure projection requires prognosed velocities (vip)".to_string(),
                    );
                }
            }
        }
        if self.prs_scheme != PrsScheme::None {
            if !(self.prs_tol > 0.0) {
                return fail("prs_tol must be positive".to_string());
            }
            if self.prs_maxiter == 0 {
                return fail("prs_maxiter must be at least 1".to_string());
            }
        }
        for e in self.outvars.keys() {
            if *e >= self.n_eqns {
                return fail(format!("outvars equation index {} out of range", e));
            }
        }
        for d in 0..self.n_dims {
            for side in 0..2 {
                if self.bcond[d][side] == BcondKind::Polar {
                    let tr = (d + 1) % self.n_dims;
                    if tr == d {
                        return fail("polar bcond needs a transverse axis".to_string());
                    }
                    if self.grid_size[tr] % 2 != 0 {
                        return fail(format!(
                            "polar bcond on axis {} needs an even extent on axis {}",
                            d, tr
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Params {
        Params {
            n_dims: 1,
            n_eqns: 1,
            grid_size: vec![16],
            ..Params::default()
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn fct_needs_corrector() {
        let mut p = base();
        p.n_iters = 1;
        p.opts.fct = true;
        assert!(p.validate().is_err());
    }

    #[test]
    fn iga_is_limited_to_one_corrective_pass() {
        let mut p = base();
        p.opts.iga = true;
        p.n_iters = 3;
        assert!(p.validate().is_err());
        p.n_iters = 2;
        assert!(p.validate().is_ok());
        // the other variants compose for any pass count
        p.opts.iga = false;
        p.opts.tot = true;
        p.n_iters = 4;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn pressure_needs_velocities() {
        let mut p = base();
        p.prs_scheme = PrsScheme::Cg;
        assert!(p.validate().is_err());
        p.n_eqns = 1;
        p.vip = Some(vec![0]);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn halo_widens_for_fct() {
        let mut o = Opts::default();
        assert_eq!(o.halo(), 1);
        o.fct = true;
        assert_eq!(o.halo(), 2);
        o = Opts::default();
        o.tot = true;
        assert_eq!(o.halo(), 2);
    }

    #[test]
    fn polar_requires_even_transverse_extent() {
        let mut p = base();
        p.n_dims = 2;
        // polar on axis 1 wraps the transverse axis 0, whose extent must be even
        p.grid_size = vec![15, 16];
        p.bcond[1] = [BcondKind::Polar; 2];
        assert!(p.validate().is_err());
        p.grid_size = vec![16, 16];
        assert!(p.validate().is_ok());
    }
}
