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

//! The stepping state machine
//!
//! One step runs, per equation:
//!
//! ```text
//! (derive Courant from vip) -> CFL check -> pre-forcings ->
//!   n_iters advection passes (halo fill, antidiffusive velocities,
//!   optional FCT derating, donor-cell, ring advance) ->
//! pressure projection -> post-forcings -> output?
//! ```
//!
//! Pass 1 is donor-cell with the physical Courant field; every later pass
//! advects the latest estimate with the antidiffusive velocity derived from
//! it and the previous pass' velocities. The ring advance after each pass
//! realizes the time-level rotation; `advance` is re-entrant and resumes
//! where the previous call stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use crate::arr::Field;
use crate::bcond::fill_halos;
use crate::concurr::Concurr;
use crate::error::{Result, SolverError};
use crate::formulae::{donorcell, fct, mpdata};
use crate::mem::Mem;
use crate::output::OutputAdapter;
use crate::params::{Params, PrsScheme, RhsScheme};
use crate::prs::PrsSolver;
use crate::rhs::{Forcings, RhsStage};

/// Velocity set driving a donor-cell pass.
#[derive(Clone, Copy, PartialEq, Eq)]
enum VelSet {
    Physical,
    Corr(usize),
    Mono,
}

/// An MPDATA solver bound to one grid, its buffers and its worker pool.
pub struct Solver {
    prm: Params,
    mem: Mem,
    concurr: Concurr,
    prs: Option<PrsSolver>,
    forcings: Option<Box<dyn Forcings>>,
    output: Option<Box<dyn OutputAdapter>>,
    step: u64,
    out_started: bool,
    cancel: Arc<AtomicBool>,
}

impl Solver {
    /// Validate the configuration and allocate every grid buffer.
    pub fn new(prm: Params) -> Result<Self> {
        prm.validate()?;
        let mem = Mem::new(&prm);
        let concurr = Concurr::new(prm.span()[0], prm.n_threads);
        let prs = if prm.prs_scheme != PrsScheme::None {
            Some(PrsSolver::new(&prm))
        } else {
            None
        };
        Ok(Self {
            prm,
            mem,
            concurr,
            prs,
            forcings: None,
            output: None,
            step: 0,
            out_started: false,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Writable initial-condition view of equation `e`.
    pub fn advectee_mut(&mut self, e: usize) -> &mut Field {
        self.mem.state_mut(e)
    }

    /// Read-only view of equation `e` at the current time level.
    pub fn state(&self, e: usize) -> &Field {
        self.mem.state(e)
    }

    /// Writable Courant component normal to `axis` (ignored between steps
    /// when velocities are prognosed through `vip`).
    pub fn courant_mut(&mut self, axis: usize) -> &mut Field {
        &mut self.mem.gc[axis]
    }

    /// Writable density / Jacobian weight (present with the `nug` option).
    pub fn g_mut(&mut self) -> Option<&mut Field> {
        self.mem.g.as_mut()
    }

    pub fn set_forcings(&mut self, f: Box<dyn Forcings>) {
        self.forcings = Some(f);
    }

    pub fn set_output(&mut self, out: Box<dyn OutputAdapter>) {
        self.output = Some(out);
    }

    /// Cooperative cancellation flag, checked at step boundaries.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Completed steps since construction.
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Simulated time.
    pub fn time(&self) -> f64 {
        self.step as f64 * self.prm.dt
    }

    /// Number of pressure solves that exhausted `prs_maxiter`.
    pub fn prs_fail_count(&self) -> u64 {
        self.prs.as_ref().map_or(0, |p| p.fail_count())
    }

    /// Iterations and residual of the most recent pressure solve.
    pub fn prs_last(&self) -> (usize, f64) {
        self.prs
            .as_ref()
            .map_or((0, 0.0), |p| (p.last_iters(), p.last_err()))
    }

    /// Run `nt` steps synchronously.
    pub fn advance(&mut self, nt: usize) -> Result<()> {
        if self.prm.outfreq > 0 && !self.out_started {
            self.record_output();
            self.out_started = true;
        }
        for _ in 0..nt {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(SolverError::Cancelled { step: self.step });
            }
            self.step_once()?;
            self.step += 1;
            if self.prm.outfreq > 0 && self.step % self.prm.outfreq as u64 == 0 {
                self.record_output();
            }
        }
        Ok(())
    }

    fn step_once(&mut self) -> Result<()> {
        if self.prm.vip.is_some() {
            self.derive_courant();
        }
        self.fill_courant_halos();
        self.cfl_check()?;
        self.apply_forcings(true);
        for e in 0..self.prm.n_eqns {
            self.advop(e);
        }
        if let Some(prs) = self.prs.as_mut() {
            let vip = self.prm.vip.as_ref().unwrap();
            prs.project(&mut self.mem, &mut self.concurr, vip);
        }
        self.apply_forcings(false);
        Ok(())
    }

    /// Interpolate the prognosed cell-centred velocities to the Courant
    /// faces: `C_d = Δt/Δ_d · ½(u_d(i−1) + u_d(i))`.
    fn derive_courant(&mut self) {
        let Self {
            prm, mem, concurr, ..
        } = self;
        let vip = prm.vip.as_ref().unwrap();
        let nd = prm.n_dims;
        let span = mem.span();
        let (ny, nz) = (span[1] as isize, span[2] as isize);
        let spacing = prm.spacing();
        for &e in vip {
            fill_halos(mem.state_mut(e), nd, &prm.bcond, None);
        }
        for d in 0..nd {
            let u = &mem.psi[vip[d]][mem.n[vip[d]]];
            let coef = prm.dt / spacing[d];
            let rows = if d == 0 {
                concurr.face_stripes()
            } else {
                concurr.stripes().to_vec()
            };
            let bands = mem.gc[d].bands_mut(&rows);
            concurr.for_bands(bands, |_, band| match d {
                0 => {
                    for i in band.rows().iter() {
                        for j in 0..ny {
                            for k in 0..nz {
                                band.set(i, j, k, 0.5 * (u.at(i - 1, j, k) + u.at(i, j, k)) * coef);
                            }
                        }
                    }
                }
                1 => {
                    for i in band.rows().iter() {
                        for j in 0..=ny {
                            for k in 0..nz {
                                band.set(i, j, k, 0.5 * (u.at(i, j - 1, k) + u.at(i, j, k)) * coef);
                            }
                        }
                    }
                }
                _ => {
                    for i in band.rows().iter() {
                        for j in 0..ny {
                            for k in 0..=nz {
                                band.set(i, j, k, 0.5 * (u.at(i, j, k - 1) + u.at(i, j, k)) * coef);
                            }
                        }
                    }
                }
            });
        }
    }

    fn fill_courant_halos(&mut self) {
        let Self { prm, mem, .. } = self;
        for d in 0..prm.n_dims {
            fill_halos(&mut mem.gc[d], prm.n_dims, &prm.bcond, Some(d));
        }
    }

    /// Scan every interior face for `|C| > 1` before touching the fields.
    fn cfl_check(&mut self) -> Result<()> {
        let Self {
            prm, mem, concurr, ..
        } = self;
        let span = mem.span();
        let (ny, nz) = (span[1] as isize, span[2] as isize);
        for d in 0..prm.n_dims {
            let gc = &mem.gc[d];
            let rows = if d == 0 {
                concurr.face_stripes()
            } else {
                concurr.stripes().to_vec()
            };
            let parts = concurr.map_rows(&rows, (0.0f64, [0isize; 3]), |_, rows| {
                let mut worst = (0.0f64, [0isize; 3]);
                let (jhi, khi) = match d {
                    0 => (ny - 1, nz - 1),
                    1 => (ny, nz - 1),
                    _ => (ny - 1, nz),
                };
                for i in rows.iter() {
                    for j in 0..=jhi {
                        for k in 0..=khi {
                            let c = gc.at(i, j, k).abs();
                            if c > worst.0 {
                                worst = (c, [i, j, k]);
                            }
                        }
                    }
                }
                worst
            });
            for (c, cell) in parts {
                if c > 1.0 {
                    return Err(SolverError::CflViolation {
                        axis: d,
                        i: cell[0],
                        j: cell[1],
                        k: cell[2],
                        courant: c,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_forcings(&mut self, pre: bool) {
        let Self { prm, mem, forcings, .. } = self;
        let f = match forcings {
            Some(f) => f,
            None => return,
        };
        let dt = match (prm.rhs_scheme, pre) {
            (RhsScheme::EulerB, true) | (RhsScheme::EulerA, false) => prm.dt,
            (RhsScheme::Trapez, _) => 0.5 * prm.dt,
            _ => return,
        };
        let stage = if pre { RhsStage::Pre } else { RhsStage::Post };
        let mut fields = mem.states_mut();
        f.apply(stage, dt, &mut fields);
    }

    /// Advect equation `e`: the full `n_iters`-pass MPDATA update. Each
    /// pass ends with a ring advance, so after the call `state(e)` is the
    /// new time level.
    fn advop(&mut self, e: usize) {
        let Self {
            prm, mem, concurr, ..
        } = self;
        let nd = prm.n_dims;
        let span = mem.span();
        let (ny, nz) = (span[1], span[2]);
        let o = prm.opts;

        if o.fct {
            // neighbourhood extrema of the entry state, kept for the whole
            // advection of this equation
            fill_halos(mem.state_mut(e), nd, &prm.bcond, None);
            let rows = concurr.expanded_stripes(1);
            let psi = &mem.psi[e][mem.n[e]];
            let pmin = mem.psi_min.as_mut().unwrap();
            let pmax = mem.psi_max.as_mut().unwrap();
            let bmin = pmin.bands_mut(&rows);
            let bmax = pmax.bands_mut(&rows);
            concurr.for_band_pairs(bmin, bmax, |_, a, b| {
                fct::extrema(a, b, psi, nd, ny, nz);
            });
        }

        for iter in 0..prm.n_iters {
            fill_halos(mem.state_mut(e), nd, &prm.bcond, None);

            let vel = if iter == 0 {
                VelSet::Physical
            } else {
                let parity = iter % 2;
                Self::antidiff(prm, mem, concurr, e, iter, parity);
                if o.fct {
                    Self::fct_derate(prm, mem, concurr, e, parity);
                    VelSet::Mono
                } else {
                    VelSet::Corr(parity)
                }
            };

            // donor-cell pass with the selected velocity set
            {
                let lvl = mem.n[e];
                let (head, tail) = mem.psi[e].split_at_mut(1);
                let (src, dst) = if lvl == 0 {
                    (&head[0], &mut tail[0])
                } else {
                    (&tail[0], &mut head[0])
                };
                let vels: &[Field] = match vel {
                    VelSet::Physical => &mem.gc,
                    VelSet::Corr(p) => &mem.gc_corr[p],
                    VelSet::Mono => &mem.gc_mono,
                };
                let g = mem.g.as_ref();
                let bands = dst.bands_mut(concurr.stripes());
                concurr.for_bands(bands, |_, b| match nd {
                    1 => donorcell::op_1d(b, src, &vels[0], g),
                    2 => donorcell::op_2d(b, src, &vels[0], &vels[1], g, ny),
                    _ => donorcell::op_3d(b, src, &vels[0], &vels[1], &vels[2], g, ny, nz),
                });
            }
            mem.cycle(e);
        }
    }

    /// Fill `gc_corr[parity]` from the current ψ estimate and the previous
    /// pass' velocities, then exchange its halos.
    fn antidiff(
        prm: &Params,
        mem: &mut Mem,
        concurr: &mut Concurr,
        e: usize,
        iter: usize,
        parity: usize,
    ) {
        let nd = prm.n_dims;
        let span = mem.span();
        let (ny, nz) = (span[1], span[2]);
        let o = prm.opts;
        {
            let psi = &mem.psi[e][mem.n[e]];
            let g = mem.g.as_ref();
            let [corr_even, corr_odd] = &mut mem.gc_corr;
            let (cur, other) = if parity == 0 {
                (corr_even, corr_odd)
            } else {
                (corr_odd, corr_even)
            };
            let prev: &[Field] = if iter == 1 { &mem.gc } else { other };
            for d in 0..nd {
                let rows = if d == 0 {
                    concurr.face_stripes()
                } else {
                    concurr.stripes().to_vec()
                };
                let bands = cur[d].bands_mut(&rows);
                concurr.for_bands(bands, |_, b| match (nd, d) {
                    (1, _) => mpdata::antidiff_1d(b, psi, &prev[0], g, o),
                    (2, 0) => mpdata::antidiff_2d_axis0(b, psi, &prev[0], &prev[1], g, ny, o),
                    (2, _) => mpdata::antidiff_2d_axis1(b, psi, &prev[0], &prev[1], g, ny, o),
                    (_, 0) => {
                        mpdata::antidiff_3d_axis0(b, psi, &prev[0], &prev[1], &prev[2], g, ny, nz, o)
                    }
                    (_, 1) => {
                        mpdata::antidiff_3d_axis1(b, psi, &prev[0], &prev[1], &prev[2], g, ny, nz, o)
                    }
                    _ => {
                        mpdata::antidiff_3d_axis2(b, psi, &prev[0], &prev[1], &prev[2], g, ny, nz, o)
                    }
                });
            }
        }
        for d in 0..nd {
            fill_halos(&mut mem.gc_corr[parity][d], nd, &prm.bcond, Some(d));
        }
    }

    /// β limiters over the expanded interior, then the monotone velocities.
    fn fct_derate(prm: &Params, mem: &mut Mem, concurr: &mut Concurr, e: usize, parity: usize) {
        let nd = prm.n_dims;
        let span = mem.span();
        let (ny, nz) = (span[1], span[2]);
        {
            let psi = &mem.psi[e][mem.n[e]];
            let pmin = mem.psi_min.as_ref().unwrap();
            let pmax = mem.psi_max.as_ref().unwrap();
            let v = &mem.gc_corr[parity];
            let g = mem.g.as_ref();
            let bup = mem.beta_up.as_mut().unwrap();
            let bdn = mem.beta_dn.as_mut().unwrap();
            let rows = concurr.expanded_stripes(1);
            let up = bup.bands_mut(&rows);
            let dn = bdn.bands_mut(&rows);
            concurr.for_band_pairs(up, dn, |_, a, b| {
                fct::betas(a, b, psi, pmin, pmax, v, g, nd, ny, nz, prm.opts.iga);
            });
        }
        {
            let corr = &mem.gc_corr[parity];
            let bup = mem.beta_up.as_ref().unwrap();
            let bdn = mem.beta_dn.as_ref().unwrap();
            for d in 0..nd {
                let rows = if d == 0 {
                    concurr.face_stripes()
                } else {
                    concurr.stripes().to_vec()
                };
                let bands = mem.gc_mono[d].bands_mut(&rows);
                concurr.for_bands(bands, |_, b| match d {
                    0 => fct::mono_axis0(b, &corr[0], bup, bdn, nd, ny, nz),
                    1 => fct::mono_axis1(b, &corr[1], bup, bdn, nd, ny, nz),
                    _ => fct::mono_axis2(b, &corr[2], bup, bdn, ny, nz),
                });
            }
        }
    }

    fn record_output(&mut self) {
        let Self {
            prm,
            mem,
            output,
            step,
            ..
        } = self;
        let out = match output {
            Some(out) => out,
            None => return,
        };
        let time = *step as f64 * prm.dt;
        for (&e, var) in prm.outvars.iter() {
            let data = mem.state(e).interior_to_vec();
            if let Err(err) = out.record(*step, time, e, var, mem.span(), &data) {
                warn!("output adapter failed at step {}: {}", step, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryOutput;
    use crate::params::{OutVar, Opts};

    fn params_1d(n: usize) -> Params {
        Params {
            n_dims: 1,
            n_eqns: 1,
            grid_size: vec![n],
            ..Params::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut p = params_1d(8);
        p.n_iters = 0;
        assert!(matches!(Solver::new(p), Err(SolverError::Config(_))));
    }

    #[test]
    fn zero_step_advances_leave_the_state_untouched() {
        let mut s = Solver::new(params_1d(8)).unwrap();
        s.advectee_mut(0).assign_interior(|i, _, _| i as f64);
        s.advance(0).unwrap();
        s.advance(0).unwrap();
        assert_eq!(s.state(0).at(3, 0, 0), 3.0);
        assert_eq!(s.step_count(), 0);
    }

    #[test]
    fn donorcell_unit_courant_shifts_through_the_solver() {
        let mut p = params_1d(10);
        p.n_iters = 1;
        let mut s = Solver::new(p).unwrap();
        s.advectee_mut(0)
            .assign_interior(|i, _, _| if i == 4 { 2.0 } else { 0.0 });
        s.courant_mut(0).fill(1.0);
        s.advance(3).unwrap();
        assert_eq!(s.state(0).at(7, 0, 0), 2.0);
        assert_eq!(s.state(0).at(4, 0, 0), 0.0);
    }

    #[test]
    fn cfl_violation_reports_the_offending_face() {
        let mut s = Solver::new(params_1d(8)).unwrap();
        s.courant_mut(0).fill(0.5);
        s.courant_mut(0).set(3, 0, 0, -1.5);
        match s.advance(1) {
            Err(SolverError::CflViolation { axis, i, courant, .. }) => {
                assert_eq!(axis, 0);
                assert_eq!(i, 3);
                assert!((courant - 1.5).abs() < 1e-15);
            }
            other => panic!("expected a CFL violation, got {:?}", other.err()),
        }
    }

    #[test]
    fn cancellation_stops_before_the_next_step() {
        let mut s = Solver::new(params_1d(8)).unwrap();
        s.courant_mut(0).fill(0.1);
        s.cancel_flag().store(true, Ordering::Relaxed);
        assert!(matches!(
            s.advance(5),
            Err(SolverError::Cancelled { step: 0 })
        ));
    }

    #[test]
    fn output_cadence_records_initial_and_periodic_steps() {
        let mut p = params_1d(8);
        p.n_iters = 1;
        p.outfreq = 2;
        p.outvars.insert(0, OutVar::new("psi", "1"));
        let rec = MemoryOutput::new();
        let mut s = Solver::new(p).unwrap();
        s.courant_mut(0).fill(0.2);
        s.set_output(Box::new(rec.clone()));
        s.advance(5).unwrap();
        let steps: Vec<u64> = rec.snapshots().iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![0, 2, 4]);
    }

    struct Decay(f64);
    impl Forcings for Decay {
        fn apply(&mut self, _stage: RhsStage, dt: f64, fields: &mut [&mut Field]) {
            let f = &mut fields[0];
            let fac = 1.0 - self.0 * dt;
            for i in f.rng(0).iter() {
                let v = f.at(i, 0, 0);
                f.set(i, 0, 0, v * fac);
            }
        }
    }

    #[test]
    fn euler_forcings_apply_once_per_step() {
        let mut p = params_1d(8);
        p.n_iters = 1;
        p.dt = 0.5;
        let mut s = Solver::new(p).unwrap();
        s.advectee_mut(0).fill(2.0);
        s.courant_mut(0).fill(0.0);
        s.set_forcings(Box::new(Decay(0.1)));
        s.advance(1).unwrap();
        // psi * (1 - 0.1 * 0.5)
        assert!((s.state(0).at(3, 0, 0) - 2.0 * 0.95).abs() < 1e-14);
    }

    #[test]
    fn mpdata_keeps_positivity_and_mass_on_a_square_wave() {
        let mut p = params_1d(32);
        p.n_iters = 3;
        let mut s = Solver::new(p).unwrap();
        s.advectee_mut(0)
            .assign_interior(|i, _, _| if (8..16).contains(&i) { 1.0 } else { 0.0 });
        s.courant_mut(0).fill(0.4);
        let mass0 = s.state(0).interior_sum();
        s.advance(40).unwrap();
        let mass = s.state(0).interior_sum();
        assert!((mass - mass0).abs() < 1e-12);
        for i in 0..32 {
            assert!(s.state(0).at(i, 0, 0) >= 0.0);
        }
    }

    #[test]
    fn fct_run_in_two_dimensions_is_monotone_for_one_step() {
        let mut p = Params {
            n_dims: 2,
            n_eqns: 1,
            grid_size: vec![12, 12],
            n_iters: 2,
            n_threads: 3,
            ..Params::default()
        };
        p.opts = Opts {
            fct: true,
            ..Opts::default()
        };
        let mut s = Solver::new(p).unwrap();
        s.advectee_mut(0).assign_interior(|i, j, _| {
            let r2 = (i - 6) * (i - 6) + (j - 6) * (j - 6);
            (-(r2 as f64) / 8.0).exp()
        });
        s.courant_mut(0).fill(0.3);
        s.courant_mut(1).fill(-0.2);
        let before = s.state(0).clone();
        s.advance(1).unwrap();
        for i in 0..12isize {
            for j in 0..12isize {
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                for (di, dj) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)].iter() {
                    let ii = (i + di).rem_euclid(12);
                    let jj = (j + dj).rem_euclid(12);
                    lo = lo.min(before.at(ii, jj, 0));
                    hi = hi.max(before.at(ii, jj, 0));
                }
                let v = s.state(0).at(i, j, 0);
                assert!(
                    v >= lo - 1e-12 && v <= hi + 1e-12,
                    "cell ({}, {}): {} not in [{}, {}]",
                    i,
                    j,
                    v,
                    lo,
                    hi
                );
            }
        }
    }
}
