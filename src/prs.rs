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

//! Elliptic pressure projection
//!
//! Solves `∇²φ = ∇·u⃗` for the prognosed cell-centred velocities and
//! corrects `u⃗ ← u⃗ − ∇φ`. Divergence and gradient are centred cell
//! differences and the Laplacian is their composition (with halo fills
//! between the stages), so the converged residual bounds the
//! post-projection divergence in exactly the norm the iteration reduced.
//! The velocities are corrected in place, which makes φ the per-step
//! increment; it restarts from zero every solve and only the small
//! divergence produced within one step has to be removed.
//!
//! Every inner product and norm fans out over the worker stripes and is
//! combined after the join. Exhausting `prs_maxiter` is non-fatal: it is
//! logged, counted and the step continues with the partial correction.

use log::{debug, warn};

use crate::arr::Field;
use crate::bcond::{fill_halos, BcondKind};
use crate::concurr::Concurr;
use crate::mem::Mem;
use crate::params::{Params, PrsScheme};

/// Shift cell coordinates by `s` along axis `d`.
#[inline(always)]
fn sh(i: isize, j: isize, k: isize, d: usize, s: isize) -> (isize, isize, isize) {
    match d {
        0 => (i + s, j, k),
        1 => (i, j + s, k),
        _ => (i, j, k + s),
    }
}

/// Assign `f(i, j, k)` to every interior cell of `dst`, one stripe per
/// worker.
fn par_assign<F>(concurr: &mut Concurr, dst: &mut Field, f: F)
where
    F: Fn(isize, isize, isize) -> f64 + Sync,
{
    let span = dst.span();
    let (ny, nz) = (span[1] as isize, span[2] as isize);
    let bands = dst.bands_mut(concurr.stripes());
    concurr.for_bands(bands, |_, band| {
        for i in band.rows().iter() {
            for j in 0..ny {
                for k in 0..nz {
                    band.set(i, j, k, f(i, j, k));
                }
            }
        }
    });
}

/// In-place interior update `dst(p) <- f(dst(p), p)`.
fn par_update<F>(concurr: &mut Concurr, dst: &mut Field, f: F)
where
    F: Fn(f64, isize, isize, isize) -> f64 + Sync,
{
    let span = dst.span();
    let (ny, nz) = (span[1] as isize, span[2] as isize);
    let bands = dst.bands_mut(concurr.stripes());
    concurr.for_bands(bands, |_, band| {
        for i in band.rows().iter() {
            for j in 0..ny {
                for k in 0..nz {
                    let cur = band.at(i, j, k);
                    band.set(i, j, k, f(cur, i, j, k));
                }
            }
        }
    });
}

fn par_dot(concurr: &mut Concurr, a: &Field, b: &Field) -> f64 {
    let span = a.span();
    let (ny, nz) = (span[1] as isize, span[2] as isize);
    concurr
        .map_ranks(0.0f64, |_, rows| {
            let mut acc = 0.0;
            for i in rows.iter() {
                for j in 0..ny {
                    for k in 0..nz {
                        acc += a.at(i, j, k) * b.at(i, j, k);
                    }
                }
            }
            acc
        })
        .iter()
        .sum()
}

fn par_norm_inf(concurr: &mut Concurr, a: &Field) -> f64 {
    let span = a.span();
    let (ny, nz) = (span[1] as isize, span[2] as isize);
    concurr
        .map_ranks(0.0f64, |_, rows| {
            let mut acc = 0.0f64;
            for i in rows.iter() {
                for j in 0..ny {
                    for k in 0..nz {
                        acc = acc.max(a.at(i, j, k).abs());
                    }
                }
            }
            acc
        })
        .iter()
        .cloned()
        .fold(0.0, f64::max)
}

/// `dst = div(grad(src))` with halo fills between the stages.
fn lap_of(
    concurr: &mut Concurr,
    dst: &mut Field,
    src: &mut Field,
    grad: &mut [Field],
    bc: &[[BcondKind; 2]; 3],
    n_dims: usize,
    spacing: [f64; 3],
) {
    fill_halos(src, n_dims, bc, None);
    for (d, gfld) in grad.iter_mut().enumerate() {
        let delta = 2.0 * spacing[d];
        let srcref = &*src;
        par_assign(concurr, gfld, |i, j, k| {
            let (ip, jp, kp) = sh(i, j, k, d, 1);
            let (im, jm, km) = sh(i, j, k, d, -1);
            (srcref.at(ip, jp, kp) - srcref.at(im, jm, km)) / delta
        });
        fill_halos(gfld, n_dims, bc, None);
    }
    let gradref = &*grad;
    par_assign(concurr, dst, |i, j, k| {
        let mut acc = 0.0;
        for (d, gfld) in gradref.iter().enumerate() {
            let (ip, jp, kp) = sh(i, j, k, d, 1);
            let (im, jm, km) = sh(i, j, k, d, -1);
            acc += (gfld.at(ip, jp, kp) - gfld.at(im, jm, km)) / (2.0 * spacing[d]);
        }
        acc
    });
}

pub(crate) struct PrsSolver {
    scheme: PrsScheme,
    tol: f64,
    maxiter: usize,
    n_dims: usize,
    spacing: [f64; 3],
    /// Domain bcond, used for the velocity halo refresh.
    bc_vel: [[BcondKind; 2]; 3],
    /// Elliptic-field bcond: rigid walls degrade to zero-gradient.
    bc_phi: [[BcondKind; 2]; 3],
    phi: Field,
    r: Field,
    p: Field,
    ap: Field,
    ar: Field,
    grad: Vec<Field>,
    /// Number of solves that hit `prs_maxiter`.
    fail_count: u64,
    last_iters: usize,
    last_err: f64,
}

impl PrsSolver {
    pub(crate) fn new(prm: &Params) -> Self {
        let span = prm.span();
        let nd = prm.n_dims;
        let scalar = || Field::scalar(span, nd, 1);
        let mut bc_phi = prm.bcond;
        for ax in bc_phi.iter_mut() {
            for side in ax.iter_mut() {
                if *side == BcondKind::Rigid {
                    *side = BcondKind::Open;
                }
            }
        }
        Self {
            scheme: prm.prs_scheme,
            tol: prm.prs_tol,
            maxiter: prm.prs_maxiter,
            n_dims: nd,
            spacing: prm.spacing(),
            bc_vel: prm.bcond,
            bc_phi,
            phi: scalar(),
            r: scalar(),
            p: scalar(),
            ap: scalar(),
            ar: scalar(),
            grad: (0..nd).map(|_| scalar()).collect(),
            fail_count: 0,
            last_iters: 0,
            last_err: 0.0,
        }
    }

    pub(crate) fn fail_count(&self) -> u64 {
        self.fail_count
    }

    pub(crate) fn last_iters(&self) -> usize {
        self.last_iters
    }

    pub(crate) fn last_err(&self) -> f64 {
        self.last_err
    }

    /// Project the velocity equations `vip` onto a divergence-free field.
    pub(crate) fn project(&mut self, mem: &mut Mem, concurr: &mut Concurr, vip: &[usize]) {
        let nd = self.n_dims;
        // refresh velocity halos, then take the divergence of the trial
        // field as the initial residual (phi starts from zero)
        for &e in vip {
            fill_halos(mem.state_mut(e), nd, &self.bc_vel, None);
        }
        self.phi.fill(0.0);
        {
            let vels: Vec<&Field> = vip.iter().map(|&e| mem.state(e)).collect();
            let spacing = self.spacing;
            par_assign(concurr, &mut self.r, |i, j, k| {
                let mut acc = 0.0;
                for (d, u) in vels.iter().enumerate() {
                    let (ip, jp, kp) = sh(i, j, k, d, 1);
                    let (im, jm, km) = sh(i, j, k, d, -1);
                    acc += (u.at(ip, jp, kp) - u.at(im, jm, km)) / (2.0 * spacing[d]);
                }
                acc
            });
        }

        match self.scheme {
            PrsScheme::None => unreachable!("projection disabled"),
            PrsScheme::Mr => self.solve_mr(concurr),
            PrsScheme::Cg => self.solve_cg(concurr),
            PrsScheme::Cr => self.solve_cr(concurr),
        }

        // u -= grad(phi)
        fill_halos(&mut self.phi, nd, &self.bc_phi, None);
        for (d, &e) in vip.iter().enumerate() {
            let delta = 2.0 * self.spacing[d];
            let phi = &self.phi;
            par_update(concurr, mem.state_mut(e), |cur, i, j, k| {
                let (ip, jp, kp) = sh(i, j, k, d, 1);
                let (im, jm, km) = sh(i, j, k, d, -1);
                cur - (phi.at(ip, jp, kp) - phi.at(im, jm, km)) / delta
            });
        }
    }

    fn converged(&mut self, concurr: &mut Concurr, iters: usize) -> bool {
        let err = par_norm_inf(concurr, &self.r);
        self.last_err = err;
        self.last_iters = iters;
        if err <= self.tol {
            debug!("pressure solve converged: {} iters, err = {:e}", iters, err);
            return true;
        }
        if iters >= self.maxiter {
            self.fail_count += 1;
            warn!(
                "pressure solver hit the iteration bound ({}) with err = {:e} > {:e}",
                self.maxiter, err, self.tol
            );
            return true;
        }
        false
    }

    fn solve_mr(&mut self, concurr: &mut Concurr) {
        let mut iters = 0;
        loop {
            if self.converged(concurr, iters) {
                return;
            }
            lap_of(
                concurr,
                &mut self.ar,
                &mut self.r,
                &mut self.grad,
                &self.bc_phi,
                self.n_dims,
                self.spacing,
            );
            let num = par_dot(concurr, &self.r, &self.ar);
            let den = par_dot(concurr, &self.ar, &self.ar);
            if den == 0.0 {
                return;
            }
            let beta = num / den;
            let r = &self.r;
            par_update(concurr, &mut self.phi, |cur, i, j, k| {
                cur + beta * r.at(i, j, k)
            });
            let ar = &self.ar;
            par_update(concurr, &mut self.r, |cur, i, j, k| {
                cur - beta * ar.at(i, j, k)
            });
            iters += 1;
        }
    }

    fn solve_cg(&mut self, concurr: &mut Concurr) {
        {
            let r = &self.r;
            par_assign(concurr, &mut self.p, |i, j, k| r.at(i, j, k));
        }
        let mut rr = par_dot(concurr, &self.r, &self.r);
        let mut iters = 0;
        loop {
            if self.converged(concurr, iters) {
                return;
            }
            lap_of(
                concurr,
                &mut self.ap,
                &mut self.p,
                &mut self.grad,
                &self.bc_phi,
                self.n_dims,
                self.spacing,
            );
            let pap = par_dot(concurr, &self.p, &self.ap);
            if pap == 0.0 {
                return;
            }
            let alpha = rr / pap;
            let p = &self.p;
            par_update(concurr, &mut self.phi, |cur, i, j, k| {
                cur + alpha * p.at(i, j, k)
            });
            let ap = &self.ap;
            par_update(concurr, &mut self.r, |cur, i, j, k| {
                cur - alpha * ap.at(i, j, k)
            });
            let rr_new = par_dot(concurr, &self.r, &self.r);
            let beta = rr_new / rr;
            rr = rr_new;
            let r = &self.r;
            par_update(concurr, &mut self.p, |cur, i, j, k| {
                r.at(i, j, k) + beta * cur
            });
            iters += 1;
        }
    }

    fn solve_cr(&mut self, concurr: &mut Concurr) {
        {
            let r = &self.r;
            par_assign(concurr, &mut self.p, |i, j, k| r.at(i, j, k));
        }
        lap_of(
            concurr,
            &mut self.ar,
            &mut self.r,
            &mut self.grad,
            &self.bc_phi,
            self.n_dims,
            self.spacing,
        );
        {
            let ar = &self.ar;
            par_assign(concurr, &mut self.ap, |i, j, k| ar.at(i, j, k));
        }
        let mut rar = par_dot(concurr, &self.r, &self.ar);
        let mut iters = 0;
        loop {
            if self.converged(concurr, iters) {
                return;
            }
            let apap = par_dot(concurr, &self.ap, &self.ap);
            if apap == 0.0 || rar == 0.0 {
                return;
            }
            let alpha = rar / apap;
            let p = &self.p;
            par_update(concurr, &mut self.phi, |cur, i, j, k| {
                cur + alpha * p.at(i, j, k)
            });
            let ap = &self.ap;
            par_update(concurr, &mut self.r, |cur, i, j, k| {
                cur - alpha * ap.at(i, j, k)
            });
            lap_of(
                concurr,
                &mut self.ar,
                &mut self.r,
                &mut self.grad,
                &self.bc_phi,
                self.n_dims,
                self.spacing,
            );
            let rar_new = par_dot(concurr, &self.r, &self.ar);
            let beta = rar_new / rar;
            rar = rar_new;
            let r = &self.r;
            par_update(concurr, &mut self.p, |cur, i, j, k| {
                r.at(i, j, k) + beta * cur
            });
            let ar = &self.ar;
            par_update(concurr, &mut self.ap, |cur, i, j, k| {
                ar.at(i, j, k) + beta * cur
            });
            iters += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    // lap of a plane wave on a cyclic grid is a negative multiple of itself
    #[test]
    fn laplacian_of_plane_wave_has_known_eigenvalue() {
        let n = 32;
        let mut concurr = Concurr::new(n, 2);
        let bc = [[BcondKind::Cyclic; 2]; 3];
        let dx = 1.0;
        let mut src = Field::scalar([n, 1, 1], 1, 1);
        let kx = 2.0 * PI / n as f64;
        src.assign_interior(|i, _, _| (kx * i as f64).sin());
        let mut dst = Field::scalar([n, 1, 1], 1, 1);
        let mut grad = vec![Field::scalar([n, 1, 1], 1, 1)];
        lap_of(&mut concurr, &mut dst, &mut src, &mut grad, &bc, 1, [dx, 1.0, 1.0]);
        // centred-of-centred stencil eigenvalue: -(sin(k)/1)^2
        let ev = -(kx.sin() / dx).powi(2);
        for i in 0..n as isize {
            let want = ev * (kx * i as f64).sin();
            assert!((dst.at(i, 0, 0) - want).abs() < 1e-12, "cell {}", i);
        }
    }

    #[test]
    fn reductions_match_serial_sums() {
        let n = 48;
        let mut concurr = Concurr::new(n, 5);
        let mut a = Field::scalar([n, 1, 1], 1, 1);
        let mut b = Field::scalar([n, 1, 1], 1, 1);
        a.assign_interior(|i, _, _| i as f64);
        b.assign_interior(|i, _, _| 2.0);
        assert_eq!(par_dot(&mut concurr, &a, &b), (0..48).sum::<i64>() as f64 * 2.0);
        assert_eq!(par_norm_inf(&mut concurr, &a), 47.0);
    }
}
