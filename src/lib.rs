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

//! This crate solves generalized transport equations
//! `∂ₜψ + ∇·(u⃗ψ) = R` on structured Cartesian grids in one, two or three
//! dimensions with the Multidimensional Positive-Definite Advection
//! Transport Algorithm (MPDATA): an iterative antidiffusive correction of
//! the donor-cell scheme, optionally made strictly monotone by a
//! flux-corrected-transport limiter, with cyclic / open / rigid / polar
//! boundaries, user-supplied forcings around the advection step, an
//! elliptic pressure projection for incompressible flows and shared-memory
//! parallel stepping over stripe subdomains.
//!
//! Usage
//! -----
//! Every setup follows the same pattern:
//!
//! ```
//! use mpdata::{Params, Solver};
//!
//! // Configure the grid and the scheme
//! let params = Params {
//!     n_dims: 1,
//!     n_eqns: 1,
//!     grid_size: vec![20],
//!     n_iters: 2,
//!     ..Params::default()
//! };
//! // Construct the solver and set the initial condition
//! let mut solver = Solver::new(params).unwrap();
//! solver.advectee_mut(0).assign_interior(|i, _, _| if i < 10 { 1.0 } else { 0.0 });
//! solver.courant_mut(0).fill(0.5);
//! // Integrate for some steps and retrieve the result
//! solver.advance(10).unwrap();
//! let psi = solver.state(0).interior_to_vec();
//! assert_eq!(psi.len(), 20);
//! ```

mod arr;
mod bcond;
mod concurr;
mod error;
mod formulae;
mod mem;
mod output;
mod params;
mod prs;
mod rhs;
mod solver;

pub use arr::{Field, Range};
pub use bcond::{BcondKind, Side};
pub use error::{Result, SolverError};
pub use output::{MemoryOutput, OutputAdapter, OutputError, Snapshot};
pub use params::{OutVar, Opts, Params, PrsScheme, RhsScheme};
pub use rhs::{Forcings, NoForcings, RhsStage};
pub use solver::Solver;
