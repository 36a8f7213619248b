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

//! Error types of the solver core
//!
//! Fatal conditions surface as [`SolverError`]; non-fatal diagnostics
//! (pressure solver exhaustion, output adapter failures) are reported
//! through the `log` crate and per-solver counters instead.

use thiserror::Error;

/// Fatal errors raised by solver construction or stepping.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Inconsistent or unsupported combination of [`Params`](crate::Params)
    /// fields, detected at construction.
    #[error("inconsistent configuration: {0}")]
    Config(String),

    /// The Courant number exceeded 1 in magnitude at some face at step
    /// entry. Stepping stops; the grid state is left as of the previous
    /// completed step.
    #[error("CFL violation on axis {axis}: |C| = {courant} at face ({i}, {j}, {k})")]
    CflViolation {
        /// Axis the offending face is normal to
        axis: usize,
        /// Face index along `axis` (face `i` sits between cells `i-1` and `i`)
        i: isize,
        j: isize,
        k: isize,
        /// Offending Courant number magnitude
        courant: f64,
    },

    /// `advance` observed the cancellation flag at a step boundary and
    /// stopped before starting the next step.
    #[error("advance cancelled at step {step}")]
    Cancelled {
        /// Number of completed steps at the time of cancellation
        step: u64,
    },
}

pub type Result<T> = std::result::Result<T, SolverError>;
