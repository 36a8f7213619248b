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

//! User-supplied forcing terms
//!
//! The solver polymorphs over this seam: depending on the configured
//! [`RhsScheme`](crate::RhsScheme) the forcing is applied before advection
//! (on ψⁿ), after it (on the advected ψⁿ⁺¹), or half-and-half around it.
//! The trapezoidal scheme passes the stage so stiff couplings can treat
//! the pre-half explicitly and solve the post-half with an algebraic
//! closed form of `(I − dt·L)ψ = rhs`. A coupled oscillator
//! ψ̇ = ωφ, φ̇ = −ωψ divides by `1 + (ω·dt)²` in the post stage, which
//! keeps the rotation non-dissipative.

use crate::arr::Field;

/// Which side of the advection step a forcing call belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhsStage {
    /// Before advection, acting on ψⁿ (the explicit half under `Trapez`).
    Pre,
    /// After advection, acting on ψⁿ⁺¹ (the implicit half under `Trapez`).
    Post,
}

/// Forcing hook invoked around the advection step.
///
/// `fields[e]` is the current writable interior of equation `e`; halo
/// values are refreshed by the solver afterwards, so implementations only
/// need to touch interior cells. `dt` already carries the scheme's
/// fraction of the time step.
pub trait Forcings: Send {
    fn apply(&mut self, stage: RhsStage, dt: f64, fields: &mut [&mut Field]);
}

/// Zero forcing (pure advection).
pub struct NoForcings;

impl Forcings for NoForcings {
    fn apply(&mut self, _stage: RhsStage, _dt: f64, _fields: &mut [&mut Field]) {}
}
