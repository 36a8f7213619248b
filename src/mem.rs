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

//! Grid buffer pool
//!
//! Owns every array the solver touches: the per-equation time-level ring of
//! advectees, the Courant faces, the per-iteration corrective velocities and
//! the FCT work arrays. Everything is allocated once at construction; the
//! stepping loop never allocates.

use crate::arr::Field;
use crate::params::Params;

/// Number of time levels in the advectee ring.
pub(crate) const N_TLEV: usize = 2;

/// The buffer pool shared by all phases of a solver.
pub struct Mem {
    pub(crate) span: [usize; 3],
    /// Advectee ring: `psi[e][l]` for time level `l`. Accessed directly by
    /// the stepping loop to split borrows across ring levels.
    pub(crate) psi: Vec<Vec<Field>>,
    /// Active ring index per equation.
    pub(crate) n: Vec<usize>,
    /// Physical Courant field, one staggered component per axis.
    pub(crate) gc: Vec<Field>,
    /// Antidiffusive velocities, double-buffered by iteration parity so a
    /// pass never reads the faces it is writing.
    pub(crate) gc_corr: [Vec<Field>; 2],
    /// FCT-derated velocities.
    pub(crate) gc_mono: Vec<Field>,
    /// Density / Jacobian weight (allocated with the `nug` option).
    pub(crate) g: Option<Field>,
    pub(crate) psi_min: Option<Field>,
    pub(crate) psi_max: Option<Field>,
    pub(crate) beta_up: Option<Field>,
    pub(crate) beta_dn: Option<Field>,
}

impl Mem {
    pub(crate) fn new(p: &Params) -> Self {
        let span = p.span();
        let halo = p.opts.halo();
        let nd = p.n_dims;
        let scalar = || Field::scalar(span, nd, halo);
        let faces = || -> Vec<Field> {
            (0..nd)
                .map(|d| Field::staggered(span, d, nd, halo))
                .collect()
        };
        let corr = p.n_iters > 1;
        Self {
            span,
            psi: (0..p.n_eqns)
                .map(|_| (0..N_TLEV).map(|_| scalar()).collect())
                .collect(),
            n: vec![0; p.n_eqns],
            gc: faces(),
            gc_corr: if corr {
                [faces(), faces()]
            } else {
                [vec![], vec![]]
            },
            gc_mono: if p.opts.fct { faces() } else { vec![] },
            g: if p.opts.nug {
                let mut g = scalar();
                g.fill(1.0);
                Some(g)
            } else {
                None
            },
            psi_min: if p.opts.fct { Some(scalar()) } else { None },
            psi_max: if p.opts.fct { Some(scalar()) } else { None },
            beta_up: if p.opts.fct { Some(scalar()) } else { None },
            beta_dn: if p.opts.fct { Some(scalar()) } else { None },
        }
    }

    /// Interior cell counts per axis.
    pub fn span(&self) -> [usize; 3] {
        self.span
    }

    /// Advance the ring of equation `e` by one level.
    pub(crate) fn cycle(&mut self, e: usize) {
        self.n[e] = (self.n[e] + 1) % N_TLEV;
    }

    /// Current-level advectee of equation `e`.
    pub fn state(&self, e: usize) -> &Field {
        &self.psi[e][self.n[e]]
    }

    pub fn state_mut(&mut self, e: usize) -> &mut Field {
        let l = self.n[e];
        &mut self.psi[e][l]
    }

    /// Current-level advectees of every equation, mutably.
    pub(crate) fn states_mut(&mut self) -> Vec<&mut Field> {
        self.psi
            .iter_mut()
            .zip(self.n.iter())
            .map(|(ring, &l)| &mut ring[l])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Opts, Params};

    fn params() -> Params {
        Params {
            n_dims: 2,
            n_eqns: 2,
            grid_size: vec![6, 4],
            ..Params::default()
        }
    }

    #[test]
    fn ring_cycles_modulo_two() {
        let mut m = Mem::new(&params());
        assert_eq!(m.n[0], 0);
        m.cycle(0);
        assert_eq!(m.n[0], 1);
        assert_eq!(m.n[1], 0);
        m.cycle(0);
        assert_eq!(m.n[0], 0);
    }

    #[test]
    fn ring_levels_are_independent_buffers() {
        let mut m = Mem::new(&params());
        m.state_mut(0).set(0, 0, 0, 5.0);
        m.cycle(0);
        m.state_mut(0).set(0, 0, 0, 6.0);
        assert_eq!(m.state(0).at(0, 0, 0), 6.0);
        m.cycle(0);
        assert_eq!(m.state(0).at(0, 0, 0), 5.0);
    }

    #[test]
    fn fct_buffers_follow_the_option() {
        let mut p = params();
        assert!(Mem::new(&p).psi_min.is_none());
        p.opts = Opts {
            fct: true,
            ..Opts::default()
        };
        let m = Mem::new(&p);
        assert!(m.psi_min.is_some());
        assert_eq!(m.gc_mono.len(), 2);
        // fct widens the halo
        assert_eq!(m.state(0).halo(), [2, 2, 0]);
    }

    #[test]
    fn courant_faces_are_staggered() {
        let m = Mem::new(&params());
        assert_eq!(m.gc[0].span(), [7, 4, 1]);
        assert_eq!(m.gc[1].span(), [6, 5, 1]);
    }

    #[test]
    fn nug_allocates_unit_weight() {
        let mut p = params();
        p.opts.nug = true;
        let m = Mem::new(&p);
        assert_eq!(m.g.as_ref().unwrap().at(3, 2, 0), 1.0);
    }
}
