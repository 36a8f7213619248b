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

//! Donor-cell (first-order upwind) advection
//!
//! One fused assignment per cell: the divergence of the upwind face fluxes
//! along every axis, weighted by `G` for non-unit Jacobians. Positive
//! definite and monotone for `|C| <= 1`.

use crate::arr::{Band, Field};

/// Upwind flux through a face with Courant number `gc`:
/// `½(gc+|gc|)·ψ_L + ½(gc−|gc|)·ψ_R`.
#[inline(always)]
pub(crate) fn flux(psi_l: f64, psi_r: f64, gc: f64) -> f64 {
    0.5 * ((gc + gc.abs()) * psi_l + (gc - gc.abs()) * psi_r)
}

pub(crate) fn op_1d(dst: &mut Band<'_>, psi: &Field, vx: &Field, g: Option<&Field>) {
    for i in dst.rows().iter() {
        let gi = g.map_or(1.0, |g| g.at(i, 0, 0));
        let div = flux(psi.at(i, 0, 0), psi.at(i + 1, 0, 0), vx.at(i + 1, 0, 0))
            - flux(psi.at(i - 1, 0, 0), psi.at(i, 0, 0), vx.at(i, 0, 0));
        dst.set(i, 0, 0, psi.at(i, 0, 0) - div / gi);
    }
}

pub(crate) fn op_2d(
    dst: &mut Band<'_>,
    psi: &Field,
    vx: &Field,
    vy: &Field,
    g: Option<&Field>,
    ny: usize,
) {
    for i in dst.rows().iter() {
        for j in 0..ny as isize {
            let gi = g.map_or(1.0, |g| g.at(i, j, 0));
            let div = flux(psi.at(i, j, 0), psi.at(i + 1, j, 0), vx.at(i + 1, j, 0))
                - flux(psi.at(i - 1, j, 0), psi.at(i, j, 0), vx.at(i, j, 0))
                + flux(psi.at(i, j, 0), psi.at(i, j + 1, 0), vy.at(i, j + 1, 0))
                - flux(psi.at(i, j - 1, 0), psi.at(i, j, 0), vy.at(i, j, 0));
            dst.set(i, j, 0, psi.at(i, j, 0) - div / gi);
        }
    }
}

pub(crate) fn op_3d(
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
                let gi = g.map_or(1.0, |g| g.at(i, j, k));
                let div = flux(psi.at(i, j, k), psi.at(i + 1, j, k), vx.at(i + 1, j, k))
                    - flux(psi.at(i - 1, j, k), psi.at(i, j, k), vx.at(i, j, k))
                    + flux(psi.at(i, j, k), psi.at(i, j + 1, k), vy.at(i, j + 1, k))
                    - flux(psi.at(i, j - 1, k), psi.at(i, j, k), vy.at(i, j, k))
                    + flux(psi.at(i, j, k), psi.at(i, j, k + 1), vz.at(i, j, k + 1))
                    - flux(psi.at(i, j, k - 1), psi.at(i, j, k), vz.at(i, j, k));
                dst.set(i, j, k, psi.at(i, j, k) - div / gi);
            }
        }
    }
}
