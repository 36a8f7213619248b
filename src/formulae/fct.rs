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

//! Flux-corrected transport limiters
//!
//! The extrema fields are taken over each cell's 1-neighbourhood at the
//! start of the advection of an equation; the β ratios bound the admissible
//! antidiffusive in/outflux of every cell, and the face velocities are
//! derated by the donor/acceptor β pair. Everything here is evaluated on
//! the interior expanded by one (`i^1`), which is why FCT needs halo 2.

use crate::arr::{Band, Field};

/// Guard against division by zero on flat fields.
pub(crate) const EPS: f64 = 1e-15;

#[inline(always)]
fn pos(c: f64) -> f64 {
    c.max(0.0)
}

#[inline(always)]
fn neg(c: f64) -> f64 {
    c.min(0.0)
}

/// ψ weight in the β fluxes; the infinite-gauge limit advects "1 + ψ'", so
/// its flux weights are unity. Resolved per monomorphized instance, not per
/// cell.
#[inline(always)]
fn w<const IGA: bool>(psi: f64) -> f64 {
    if IGA {
        1.0
    } else {
        psi
    }
}

/// Fill `psi_min` / `psi_max` with the axis-neighbourhood extrema of `psi`
/// over the expanded interior. Band rows must cover `i^1`.
pub(crate) fn extrema(
    bmin: &mut Band<'_>,
    bmax: &mut Band<'_>,
    psi: &Field,
    n_dims: usize,
    ny: usize,
    nz: usize,
) {
    let rj = if n_dims >= 2 {
        -1..=ny as isize
    } else {
        0..=0
    };
    let rk = if n_dims >= 3 {
        -1..=nz as isize
    } else {
        0..=0
    };
    for i in bmin.rows().iter() {
        for j in rj.clone() {
            for k in rk.clone() {
                let c = psi.at(i, j, k);
                let mut mn = c.min(psi.at(i - 1, j, k)).min(psi.at(i + 1, j, k));
                let mut mx = c.max(psi.at(i - 1, j, k)).max(psi.at(i + 1, j, k));
                if n_dims >= 2 {
                    mn = mn.min(psi.at(i, j - 1, k)).min(psi.at(i, j + 1, k));
                    mx = mx.max(psi.at(i, j - 1, k)).max(psi.at(i, j + 1, k));
                }
                if n_dims >= 3 {
                    mn = mn.min(psi.at(i, j, k - 1)).min(psi.at(i, j, k + 1));
                    mx = mx.max(psi.at(i, j, k - 1)).max(psi.at(i, j, k + 1));
                }
                bmin.set(i, j, k, mn);
                bmax.set(i, j, k, mx);
            }
        }
    }
}

/// β↑ / β↓ ratios over the expanded interior from the candidate
/// antidiffusive velocities `v[0..n_dims]`. Dispatches once on the gauge.
#[allow(clippy::too_many_arguments)]
pub(crate) fn betas(
    bup: &mut Band<'_>,
    bdn: &mut Band<'_>,
    psi: &Field,
    psi_min: &Field,
    psi_max: &Field,
    v: &[Field],
    g: Option<&Field>,
    n_dims: usize,
    ny: usize,
    nz: usize,
    iga: bool,
) {
    if iga {
        betas_loop::<true>(bup, bdn, psi, psi_min, psi_max, v, g, n_dims, ny, nz)
    } else {
        betas_loop::<false>(bup, bdn, psi, psi_min, psi_max, v, g, n_dims, ny, nz)
    }
}

#[allow(clippy::too_many_arguments)]
fn betas_loop<const IGA: bool>(
    bup: &mut Band<'_>,
    bdn: &mut Band<'_>,
    psi: &Field,
    psi_min: &Field,
    psi_max: &Field,
    v: &[Field],
    g: Option<&Field>,
    n_dims: usize,
    ny: usize,
    nz: usize,
) {
    let rj = if n_dims >= 2 {
        -1..=ny as isize
    } else {
        0..=0
    };
    let rk = if n_dims >= 3 {
        -1..=nz as isize
    } else {
        0..=0
    };
    for i in bup.rows().iter() {
        for j in rj.clone() {
            for k in rk.clone() {
                let gi = g.map_or(1.0, |g| g.at(i, j, k));
                let mut influx = pos(v[0].at(i, j, k)) * w::<IGA>(psi.at(i - 1, j, k))
                    - neg(v[0].at(i + 1, j, k)) * w::<IGA>(psi.at(i + 1, j, k));
                let mut outflux = pos(v[0].at(i + 1, j, k)) * w::<IGA>(psi.at(i, j, k))
                    - neg(v[0].at(i, j, k)) * w::<IGA>(psi.at(i, j, k));
                if n_dims >= 2 {
                    influx += pos(v[1].at(i, j, k)) * w::<IGA>(psi.at(i, j - 1, k))
                        - neg(v[1].at(i, j + 1, k)) * w::<IGA>(psi.at(i, j + 1, k));
                    outflux += pos(v[1].at(i, j + 1, k)) * w::<IGA>(psi.at(i, j, k))
                        - neg(v[1].at(i, j, k)) * w::<IGA>(psi.at(i, j, k));
                }
                if n_dims >= 3 {
                    influx += pos(v[2].at(i, j, k)) * w::<IGA>(psi.at(i, j, k - 1))
                        - neg(v[2].at(i, j, k + 1)) * w::<IGA>(psi.at(i, j, k + 1));
                    outflux += pos(v[2].at(i, j, k + 1)) * w::<IGA>(psi.at(i, j, k))
                        - neg(v[2].at(i, j, k)) * w::<IGA>(psi.at(i, j, k));
                }
                bup.set(
                    i,
                    j,
                    k,
                    (psi_max.at(i, j, k) - psi.at(i, j, k)) * gi / (influx + EPS),
                );
                bdn.set(
                    i,
                    j,
                    k,
                    (psi.at(i, j, k) - psi_min.at(i, j, k)) * gi / (outflux + EPS),
                );
            }
        }
    }
}

/// Donor/acceptor limiter factor for one face: `min(1, β↓(donor),
/// β↑(acceptor))`, clamped below by 0 so the derated velocity keeps the
/// candidate's sign and never exceeds its magnitude.
#[inline(always)]
fn limit(c: f64, b_dn_l: f64, b_up_l: f64, b_dn_r: f64, b_up_r: f64) -> f64 {
    let lim = if c > 0.0 {
        b_dn_l.min(b_up_r)
    } else {
        b_up_l.min(b_dn_r)
    };
    c * lim.min(1.0).max(0.0)
}

/// Monotone axis-0 velocities; band rows cover face rows.
pub(crate) fn mono_axis0(
    dst: &mut Band<'_>,
    corr: &Field,
    beta_up: &Field,
    beta_dn: &Field,
    n_dims: usize,
    ny: usize,
    nz: usize,
) {
    let (rj, rk) = cell_ranges(n_dims, ny, nz);
    for i in dst.rows().iter() {
        for j in rj.clone() {
            for k in rk.clone() {
                let c = corr.at(i, j, k);
                dst.set(
                    i,
                    j,
                    k,
                    limit(
                        c,
                        beta_dn.at(i - 1, j, k),
                        beta_up.at(i - 1, j, k),
                        beta_dn.at(i, j, k),
                        beta_up.at(i, j, k),
                    ),
                );
            }
        }
    }
}

/// Monotone axis-1 velocities; band rows cover cell rows, the inner loop
/// runs over face columns.
pub(crate) fn mono_axis1(
    dst: &mut Band<'_>,
    corr: &Field,
    beta_up: &Field,
    beta_dn: &Field,
    n_dims: usize,
    ny: usize,
    nz: usize,
) {
    let (_, rk) = cell_ranges(n_dims, ny, nz);
    for i in dst.rows().iter() {
        for j in 0..=ny as isize {
            for k in rk.clone() {
                let c = corr.at(i, j, k);
                dst.set(
                    i,
                    j,
                    k,
                    limit(
                        c,
                        beta_dn.at(i, j - 1, k),
                        beta_up.at(i, j - 1, k),
                        beta_dn.at(i, j, k),
                        beta_up.at(i, j, k),
                    ),
                );
            }
        }
    }
}

/// Monotone axis-2 velocities.
pub(crate) fn mono_axis2(
    dst: &mut Band<'_>,
    corr: &Field,
    beta_up: &Field,
    beta_dn: &Field,
    ny: usize,
    nz: usize,
) {
    for i in dst.rows().iter() {
        for j in 0..ny as isize {
            for k in 0..=nz as isize {
                let c = corr.at(i, j, k);
                dst.set(
                    i,
                    j,
                    k,
                    limit(
                        c,
                        beta_dn.at(i, j, k - 1),
                        beta_up.at(i, j, k - 1),
                        beta_dn.at(i, j, k),
                        beta_up.at(i, j, k),
                    ),
                );
            }
        }
    }
}

fn cell_ranges(
    n_dims: usize,
    ny: usize,
    nz: usize,
) -> (
    std::ops::RangeInclusive<isize>,
    std::ops::RangeInclusive<isize>,
) {
    let rj = if n_dims >= 2 {
        0..=ny as isize - 1
    } else {
        0..=0
    };
    let rk = if n_dims >= 3 {
        0..=nz as isize - 1
    } else {
        0..=0
    };
    (rj, rk)
}
