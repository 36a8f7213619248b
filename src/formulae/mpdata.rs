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

//! Antidiffusive pseudo-velocities of the MPDATA corrector
//!
//! Each pass derives a face velocity from the current ψ estimate and the
//! previous pass' velocity field. The main term is axis-aligned; in 2D/3D
//! every face additionally carries one cross term per transverse axis,
//! built from the 4-point average of the neighbour-axis Courant component.
//! Optional terms: third-order (`tot`, axis-aligned), divergence form
//! (`dfl`) and the non-unit-Jacobian weighting (`nug`).
//!
//! One loop instance is compiled per `(iga, tot, dfl)` combination and
//! picked by a single dispatch per kernel call; a new variant slots in as
//! another const parameter without touching the stepping loop.

use crate::arr::{Band, Field};
use crate::params::Opts;

use super::{ratio2, ratio4};

/// Expand to the monomorphized loop instance matching the option set.
macro_rules! dispatch_opts {
    ($o:expr, $f:ident($($arg:expr),*)) => {
        match ($o.iga, $o.tot, $o.dfl) {
            (false, false, false) => $f::<false, false, false>($($arg),*),
            (false, false, true) => $f::<false, false, true>($($arg),*),
            (false, true, false) => $f::<false, true, false>($($arg),*),
            (false, true, true) => $f::<false, true, true>($($arg),*),
            (true, false, false) => $f::<true, false, false>($($arg),*),
            (true, false, true) => $f::<true, false, true>($($arg),*),
            (true, true, false) => $f::<true, true, false>($($arg),*),
            (true, true, true) => $f::<true, true, true>($($arg),*),
        }
    };
}

/// Axis-aligned antidiffusive term `(|C| − C²/Ḡ)·A`.
#[inline(always)]
fn main_term<const IGA: bool>(c: f64, psi_l: f64, psi_r: f64, gbar: f64) -> f64 {
    (c.abs() - c * c / gbar) * ratio2::<IGA>(psi_r - psi_l, psi_r + psi_l)
}

/// Cross term `−½·C·C̄_t·B_t` for one transverse axis. The four ψ values
/// are the upwind/downwind pairs shifted one cell along the transverse
/// axis.
#[inline(always)]
fn cross_term<const IGA: bool>(
    c: f64,
    vbar: f64,
    psi_lp: f64,
    psi_rp: f64,
    psi_lm: f64,
    psi_rm: f64,
    gbar: f64,
) -> f64 {
    let num = psi_lp + psi_rp - psi_lm - psi_rm;
    let den = psi_lp + psi_rp + psi_lm + psi_rm;
    -0.5 * c * vbar * ratio4::<IGA>(num, den) / gbar
}

/// Axis-aligned third-order correction; `m2, m1, p0, p1` are the four ψ
/// values centred on the face (between `m1` and `p0`).
#[inline(always)]
fn tot_term<const IGA: bool>(c: f64, m2: f64, m1: f64, p0: f64, p1: f64, gbar: f64) -> f64 {
    let c3 = (3.0 * c * c.abs() / gbar - 2.0 * c * c * c / (gbar * gbar) - c) / 6.0;
    c3 * 2.0 * ratio4::<IGA>(p1 - p0 - m1 + m2, p1 + p0 + m1 + m2)
}

#[inline(always)]
fn gbar_at(g: Option<&Field>, il: isize, ir: isize, j: isize, k: isize, axis: usize) -> f64 {
    match g {
        None => 1.0,
        Some(g) => match axis {
            0 => 0.5 * (g.at(il, j, k) + g.at(ir, j, k)),
            1 => 0.5 * (g.at(j, il, k) + g.at(j, ir, k)),
            _ => 0.5 * (g.at(j, k, il) + g.at(j, k, ir)),
        },
    }
}

pub(crate) fn antidiff_1d(dst: &mut Band<'_>, psi: &Field, vx: &Field, g: Option<&Field>, o: Opts) {
    dispatch_opts!(o, antidiff_1d_loop(dst, psi, vx, g))
}

fn antidiff_1d_loop<const IGA: bool, const TOT: bool, const DFL: bool>(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    g: Option<&Field>,
) {
    for i in dst.rows().iter() {
        let c = vx.at(i, 0, 0);
        let gbar = gbar_at(g, i - 1, i, 0, 0, 0);
        let (l, r) = (psi.at(i - 1, 0, 0), psi.at(i, 0, 0));
        let mut corr = main_term::<IGA>(c, l, r, gbar);
        if TOT {
            corr += tot_term::<IGA>(c, psi.at(i - 2, 0, 0), l, r, psi.at(i + 1, 0, 0), gbar);
        }
        if DFL {
            corr -= 0.5 * c * 0.5 * (vx.at(i + 1, 0, 0) - vx.at(i - 1, 0, 0)) / gbar;
        }
        dst.set(i, 0, 0, corr);
    }
}

/// Axis-0 component in 2D; `dst` bands run over face rows.
pub(crate) fn antidiff_2d_axis0(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    g: Option<&Field>,
    ny: usize,
    o: Opts,
) {
    dispatch_opts!(o, antidiff_2d_axis0_loop(dst, psi, vx, vy, g, ny))
}

fn antidiff_2d_axis0_loop<const IGA: bool, const TOT: bool, const DFL: bool>(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    g: Option<&Field>,
    ny: usize,
) {
    for i in dst.rows().iter() {
        for j in 0..ny as isize {
            let c = vx.at(i, j, 0);
            let gbar = gbar_at(g, i - 1, i, j, 0, 0);
            let (l, r) = (psi.at(i - 1, j, 0), psi.at(i, j, 0));
            let mut corr = main_term::<IGA>(c, l, r, gbar);
            let vbar = 0.25
                * (vy.at(i - 1, j, 0) + vy.at(i - 1, j + 1, 0) + vy.at(i, j, 0) + vy.at(i, j + 1, 0));
            corr += cross_term::<IGA>(
                c,
                vbar,
                psi.at(i - 1, j + 1, 0),
                psi.at(i, j + 1, 0),
                psi.at(i - 1, j - 1, 0),
                psi.at(i, j - 1, 0),
                gbar,
            );
            if TOT {
                corr += tot_term::<IGA>(c, psi.at(i - 2, j, 0), l, r, psi.at(i + 1, j, 0), gbar);
            }
            if DFL {
                let div = 0.5 * (vx.at(i + 1, j, 0) - vx.at(i - 1, j, 0))
                    + 0.5
                        * (vy.at(i - 1, j + 1, 0) - vy.at(i - 1, j, 0) + vy.at(i, j + 1, 0)
                            - vy.at(i, j, 0));
                corr -= 0.5 * c * div / gbar;
            }
            dst.set(i, j, 0, corr);
        }
    }
}

/// Axis-1 component in 2D; `dst` bands run over cell rows, the inner loop
/// over face columns.
pub(crate) fn antidiff_2d_axis1(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    g: Option<&Field>,
    ny: usize,
    o: Opts,
) {
    dispatch_opts!(o, antidiff_2d_axis1_loop(dst, psi, vx, vy, g, ny))
}

fn antidiff_2d_axis1_loop<const IGA: bool, const TOT: bool, const DFL: bool>(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    g: Option<&Field>,
    ny: usize,
) {
    for i in dst.rows().iter() {
        for j in 0..=ny as isize {
            let c = vy.at(i, j, 0);
            let gbar = gbar_at(g, j - 1, j, i, 0, 1);
            let (l, r) = (psi.at(i, j - 1, 0), psi.at(i, j, 0));
            let mut corr = main_term::<IGA>(c, l, r, gbar);
            let vbar = 0.25
                * (vx.at(i, j - 1, 0) + vx.at(i + 1, j - 1, 0) + vx.at(i, j, 0) + vx.at(i + 1, j, 0));
            corr += cross_term::<IGA>(
                c,
                vbar,
                psi.at(i + 1, j - 1, 0),
                psi.at(i + 1, j, 0),
                psi.at(i - 1, j - 1, 0),
                psi.at(i - 1, j, 0),
                gbar,
            );
            if TOT {
                corr += tot_term::<IGA>(c, psi.at(i, j - 2, 0), l, r, psi.at(i, j + 1, 0), gbar);
            }
            if DFL {
                let div = 0.5 * (vy.at(i, j + 1, 0) - vy.at(i, j - 1, 0))
                    + 0.5
                        * (vx.at(i + 1, j - 1, 0) - vx.at(i, j - 1, 0) + vx.at(i + 1, j, 0)
                            - vx.at(i, j, 0));
                corr -= 0.5 * c * div / gbar;
            }
            dst.set(i, j, 0, corr);
        }
    }
}

pub(crate) fn antidiff_3d_axis0(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    vz: &Field,
    g: Option<&Field>,
    ny: usize,
    nz: usize,
    o: Opts,
) {
    dispatch_opts!(o, antidiff_3d_axis0_loop(dst, psi, vx, vy, vz, g, ny, nz))
}

fn antidiff_3d_axis0_loop<const IGA: bool, const TOT: bool, const DFL: bool>(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    vz: &Field,
    g: Option<&Field>,
    ny: usize,
    nz: usize,
) {
    for i in dst.rows().iter() {
        for j in 0..ny as isize {
            for k in 0..nz as isize {
                let c = vx.at(i, j, k);
                let gbar = gbar_at(g, i - 1, i, j, k, 0);
                let (l, r) = (psi.at(i - 1, j, k), psi.at(i, j, k));
                let mut corr = main_term::<IGA>(c, l, r, gbar);
                let vbar_y = 0.25
                    * (vy.at(i - 1, j, k)
                        + vy.at(i - 1, j + 1, k)
                        + vy.at(i, j, k)
                        + vy.at(i, j + 1, k));
                corr += cross_term::<IGA>(
                    c,
                    vbar_y,
                    psi.at(i - 1, j + 1, k),
                    psi.at(i, j + 1, k),
                    psi.at(i - 1, j - 1, k),
                    psi.at(i, j - 1, k),
                    gbar,
                );
                let vbar_z = 0.25
                    * (vz.at(i - 1, j, k)
                        + vz.at(i - 1, j, k + 1)
                        + vz.at(i, j, k)
                        + vz.at(i, j, k + 1));
                corr += cross_term::<IGA>(
                    c,
                    vbar_z,
                    psi.at(i - 1, j, k + 1),
                    psi.at(i, j, k + 1),
                    psi.at(i - 1, j, k - 1),
                    psi.at(i, j, k - 1),
                    gbar,
                );
                if TOT {
                    corr +=
                        tot_term::<IGA>(c, psi.at(i - 2, j, k), l, r, psi.at(i + 1, j, k), gbar);
                }
                if DFL {
                    let div = 0.5 * (vx.at(i + 1, j, k) - vx.at(i - 1, j, k))
                        + 0.5
                            * (vy.at(i - 1, j + 1, k) - vy.at(i - 1, j, k) + vy.at(i, j + 1, k)
                                - vy.at(i, j, k))
                        + 0.5
                            * (vz.at(i - 1, j, k + 1) - vz.at(i - 1, j, k) + vz.at(i, j, k + 1)
                                - vz.at(i, j, k));
                    corr -= 0.5 * c * div / gbar;
                }
                dst.set(i, j, k, corr);
            }
        }
    }
}

pub(crate) fn antidiff_3d_axis1(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    vz: &Field,
    g: Option<&Field>,
    ny: usize,
    nz: usize,
    o: Opts,
) {
    dispatch_opts!(o, antidiff_3d_axis1_loop(dst, psi, vx, vy, vz, g, ny, nz))
}

fn antidiff_3d_axis1_loop<const IGA: bool, const TOT: bool, const DFL: bool>(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    vz: &Field,
    g: Option<&Field>,
    ny: usize,
    nz: usize,
) {
    for i in dst.rows().iter() {
        for j in 0..=ny as isize {
            for k in 0..nz as isize {
                let c = vy.at(i, j, k);
                let gbar = gbar_at(g, j - 1, j, i, k, 1);
                let (l, r) = (psi.at(i, j - 1, k), psi.at(i, j, k));
                let mut corr = main_term::<IGA>(c, l, r, gbar);
                let vbar_x = 0.25
                    * (vx.at(i, j - 1, k)
                        + vx.at(i + 1, j - 1, k)
                        + vx.at(i, j, k)
                        + vx.at(i + 1, j, k));
                corr += cross_term::<IGA>(
                    c,
                    vbar_x,
                    psi.at(i + 1, j - 1, k),
                    psi.at(i + 1, j, k),
                    psi.at(i - 1, j - 1, k),
                    psi.at(i - 1, j, k),
                    gbar,
                );
                let vbar_z = 0.25
                    * (vz.at(i, j - 1, k)
                        + vz.at(i, j - 1, k + 1)
                        + vz.at(i, j, k)
                        + vz.at(i, j, k + 1));
                corr += cross_term::<IGA>(
                    c,
                    vbar_z,
                    psi.at(i, j - 1, k + 1),
                    psi.at(i, j, k + 1),
                    psi.at(i, j - 1, k - 1),
                    psi.at(i, j, k - 1),
                    gbar,
                );
                if TOT {
                    corr +=
                        tot_term::<IGA>(c, psi.at(i, j - 2, k), l, r, psi.at(i, j + 1, k), gbar);
                }
                if DFL {
                    let div = 0.5 * (vy.at(i, j + 1, k) - vy.at(i, j - 1, k))
                        + 0.5
                            * (vx.at(i + 1, j - 1, k) - vx.at(i, j - 1, k) + vx.at(i + 1, j, k)
                                - vx.at(i, j, k))
                        + 0.5
                            * (vz.at(i, j - 1, k + 1) - vz.at(i, j - 1, k) + vz.at(i, j, k + 1)
                                - vz.at(i, j, k));
                    corr -= 0.5 * c * div / gbar;
                }
                dst.set(i, j, k, corr);
            }
        }
    }
}

pub(crate) fn antidiff_3d_axis2(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    vz: &Field,
    g: Option<&Field>,
    ny: usize,
    nz: usize,
    o: Opts,
) {
    dispatch_opts!(o, antidiff_3d_axis2_loop(dst, psi, vx, vy, vz, g, ny, nz))
}

fn antidiff_3d_axis2_loop<const IGA: bool, const TOT: bool, const DFL: bool>(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    vz: &Field,
    g: Option<&Field>,
    ny: usize,
    nz: usize,
) {
    for i in dst.rows().iter() {
        for j in 0..ny as isize {
            for k in 0..=nz as isize {
                let c = vz.at(i, j, k);
                let gbar = gbar_at(g, k - 1, k, i, j, 2);
                let (l, r) = (psi.at(i, j, k - 1), psi.at(i, j, k));
                let mut corr = main_term::<IGA>(c, l, r, gbar);
                let vbar_x = 0.25
                    * (vx.at(i, j, k - 1)
                        + vx.at(i + 1, j, k - 1)
                        + vx.at(i, j, k)
                        + vx.at(i + 1, j, k));
                corr += cross_term::<IGA>(
                    c,
                    vbar_x,
                    psi.at(i + 1, j, k - 1),
                    psi.at(i + 1, j, k),
                    psi.at(i - 1, j, k - 1),
                    psi.at(i - 1, j, k),
                    gbar,
                );
                let vbar_y = 0.25
                    * (vy.at(i, j, k - 1)
                        + vy.at(i, j + 1, k - 1)
                        + vy.at(i, j, k)
                        + vy.at(i, j + 1, k));
                corr += cross_term::<IGA>(
                    c,
                    vbar_y,
                    psi.at(i, j + 1, k - 1),
                    psi.at(i, j + 1, k),
                    psi.at(i, j - 1, k - 1),
                    psi.at(i, j - 1, k),
                    gbar,
                );
                if TOT {
                    corr +=
                        tot_term::<IGA>(c, psi.at(i, j, k - 2), l, r, psi.at(i, j, k + 1), gbar);
                }
                if DFL {
                    let div = 0.5 * (vz.at(i, j, k + 1) - vz.at(i, j, k - 1))
                        + 0.5
                            * (vx.at(i + 1, j, k - 1) - vx.at(i, j, k - 1) + vx.at(i + 1, j, k)
                                - vx.at(i, j, k))
                        + 0.5
                            * (vy.at(i, j + 1, k - 1) - vy.at(i, j, k - 1) + vy.at(i, j + 1, k)
                                - vy.at(i, j, k));
                    corr -= 0.5 * c * div / gbar;
                }
                dst.set(i, j, k, corr);
            }
        }
    }
}
