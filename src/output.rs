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

//! Output adapter seam
//!
//! The solver invokes the adapter after step 0 and then after every
//! `outfreq`-th step with read-only interior snapshots of the equations
//! listed in `outvars`. Format-specific writers (HDF5, gnuplot, ...) are
//! external collaborators implementing [`OutputAdapter`]; the in-memory
//! recorder below serves tests and embedders. Adapter failures are
//! reported and skipped, they never invalidate the grid state.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::params::OutVar;

/// Failure inside an output adapter; surfaced through `log::warn!` by the
/// solver and otherwise ignored.
#[derive(Debug, Error)]
#[error("output failure: {0}")]
pub struct OutputError(pub String);

/// Receiver for periodic field snapshots.
pub trait OutputAdapter: Send {
    /// Record one `(step, equation)` snapshot. `data` holds the interior
    /// values in row-major order (axis 0 slowest) with extents `span`.
    fn record(
        &mut self,
        step: u64,
        time: f64,
        eqn: usize,
        var: &OutVar,
        span: [usize; 3],
        data: &[f64],
    ) -> Result<(), OutputError>;
}

/// One recorded snapshot of [`MemoryOutput`].
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub step: u64,
    pub time: f64,
    pub eqn: usize,
    pub name: String,
    pub span: [usize; 3],
    pub data: Vec<f64>,
}

/// In-core recorder keeping every snapshot in a shared vector. Clones share
/// the storage, so a test can keep one handle and hand the other to the
/// solver.
#[derive(Clone, Default)]
pub struct MemoryOutput {
    inner: Arc<Mutex<Vec<Snapshot>>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.inner.lock().unwrap().clone()
    }

    /// Latest snapshot recorded for equation `e`, if any.
    pub fn last_for(&self, e: usize) -> Option<Snapshot> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.eqn == e)
            .cloned()
    }
}

impl OutputAdapter for MemoryOutput {
    fn record(
        &mut self,
        step: u64,
        time: f64,
        eqn: usize,
        var: &OutVar,
        span: [usize; 3],
        data: &[f64],
    ) -> Result<(), OutputError> {
        self.inner.lock().unwrap().push(Snapshot {
            step,
            time,
            eqn,
            name: var.name.clone(),
            span,
            data: data.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_output_shares_storage_between_clones() {
        let mut a = MemoryOutput::new();
        let b = a.clone();
        let var = OutVar::new("psi", "1");
        a.record(0, 0.0, 0, &var, [4, 1, 1], &[1.0, 2.0, 3.0, 4.0])
            .unwrap();
        a.record(10, 5.0, 0, &var, [4, 1, 1], &[4.0, 3.0, 2.0, 1.0])
            .unwrap();
        assert_eq!(b.snapshots().len(), 2);
        let last = b.last_for(0).unwrap();
        assert_eq!(last.step, 10);
        assert_eq!(last.data[0], 4.0);
        assert!(b.last_for(1).is_none());
    }
}
