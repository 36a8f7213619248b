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

//! Stripe decomposition and the worker pool
//!
//! The outermost axis is cut into contiguous stripes, one per worker. Every
//! phase dispatches one job per stripe with the rank and row range passed
//! explicitly; the end of the scoped dispatch is the barrier, so a phase
//! only ever reads fields written in *earlier* phases. Mutable outputs are
//! handed out as disjoint [`Band`]s, shared inputs as `&Field` borrows.

use itertools::izip;
use scoped_threadpool::Pool;

use crate::arr::{Band, Range};

// Calculates ceil(x/y) for x > 0
pub(crate) fn ceil_div(x: usize, y: usize) -> usize {
    assert!(x > 0);
    1 + (x - 1) / y
}

pub(crate) struct Concurr {
    pool: Pool,
    stripes: Vec<Range>,
}

impl Concurr {
    /// Cut `span0` rows into at most `n_threads` stripes and spin up one
    /// worker per stripe. Workers live until the solver is dropped.
    pub(crate) fn new(span0: usize, n_threads: usize) -> Self {
        let chunk = ceil_div(span0, n_threads);
        let mut stripes = Vec::new();
        let mut lo = 0usize;
        while lo < span0 {
            let hi = (lo + chunk).min(span0);
            stripes.push(Range::new(lo as isize, hi as isize - 1));
            lo = hi;
        }
        Self {
            pool: Pool::new(stripes.len() as u32),
            stripes,
        }
    }

    pub(crate) fn stripes(&self) -> &[Range] {
        &self.stripes
    }

    /// Stripes for an axis-0 face field: the last stripe also owns the
    /// closing face row.
    pub(crate) fn face_stripes(&self) -> Vec<Range> {
        let mut s = self.stripes.clone();
        let last = s.len() - 1;
        s[last].hi += 1;
        s
    }

    /// Stripes widened by `k` rows at the domain ends only (interior stripe
    /// boundaries stay put, so the union is `i^k` without overlap).
    pub(crate) fn expanded_stripes(&self, k: isize) -> Vec<Range> {
        let mut s = self.stripes.clone();
        let last = s.len() - 1;
        s[0].lo -= k;
        s[last].hi += k;
        s
    }

    /// Run one job per band; returns when all jobs finished (the barrier).
    pub(crate) fn for_bands<F>(&mut self, bands: Vec<Band<'_>>, f: F)
    where
        F: Fn(usize, &mut Band<'_>) + Sync,
    {
        let fr = &f;
        self.pool.scoped(|s| {
            for (rank, mut band) in bands.into_iter().enumerate() {
                s.execute(move || fr(rank, &mut band));
            }
        });
    }

    /// Like [`for_bands`](Self::for_bands) for phases that fill two fields
    /// at once (e.g. the FCT extrema or β pairs).
    pub(crate) fn for_band_pairs<F>(&mut self, a: Vec<Band<'_>>, b: Vec<Band<'_>>, f: F)
    where
        F: Fn(usize, &mut Band<'_>, &mut Band<'_>) + Sync,
    {
        let fr = &f;
        let ranks = a.len();
        self.pool.scoped(|s| {
            for (rank, mut ba, mut bb) in izip!(0..ranks, a, b) {
                s.execute(move || fr(rank, &mut ba, &mut bb));
            }
        });
    }

    /// Per-rank reduction: every worker computes a value over its stripe,
    /// the caller combines the slots after the join.
    pub(crate) fn map_ranks<T, F>(&mut self, init: T, f: F) -> Vec<T>
    where
        T: Clone + Send,
        F: Fn(usize, Range) -> T + Sync,
    {
        let rows = self.stripes.clone();
        self.map_rows(&rows, init, f)
    }

    /// Like [`map_ranks`](Self::map_ranks) over caller-supplied row ranges
    /// (face rows, expanded rows).
    pub(crate) fn map_rows<T, F>(&mut self, rows: &[Range], init: T, f: F) -> Vec<T>
    where
        T: Clone + Send,
        F: Fn(usize, Range) -> T + Sync,
    {
        let mut out = vec![init; rows.len()];
        let fr = &f;
        self.pool.scoped(|s| {
            for (slot, (rank, rng)) in out.iter_mut().zip(rows.iter().enumerate()) {
                let rng = *rng;
                s.execute(move || {
                    *slot = fr(rank, rng);
                });
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arr::Field;

    #[test]
    fn stripes_tile_the_axis() {
        let c = Concurr::new(10, 4);
        let s = c.stripes();
        assert_eq!(s[0].lo, 0);
        assert_eq!(s.last().unwrap().hi, 9);
        let total: usize = s.iter().map(|r| r.len()).sum();
        assert_eq!(total, 10);
        for w in s.windows(2) {
            assert_eq!(w[0].hi + 1, w[1].lo);
        }
    }

    #[test]
    fn more_threads_than_rows_leaves_no_empty_stripes() {
        let c = Concurr::new(3, 8);
        assert!(c.stripes().len() <= 3);
        assert!(c.stripes().iter().all(|r| !r.is_empty()));
    }

    #[test]
    fn face_and_expanded_stripes_extend_the_ends() {
        let c = Concurr::new(8, 2);
        let f = c.face_stripes();
        assert_eq!(f.last().unwrap().hi, 8);
        let e = c.expanded_stripes(1);
        assert_eq!(e[0].lo, -1);
        assert_eq!(e.last().unwrap().hi, 8);
        // interior boundaries untouched
        assert_eq!(e[0].hi + 1, e[1].lo);
    }

    #[test]
    fn parallel_band_writes_land_in_the_field() {
        let mut c = Concurr::new(16, 4);
        let mut fld = Field::scalar([16, 3, 1], 2, 1);
        let bands = fld.bands_mut(c.stripes());
        c.for_bands(bands, |rank, band| {
            for i in band.rows().iter() {
                for j in 0..3 {
                    band.set(i, j, 0, (rank * 1000) as f64 + (i * 10 + j) as f64);
                }
            }
        });
        assert_eq!(fld.at(0, 0, 0), 0.0);
        assert_eq!(fld.at(5, 2, 0), 1052.0);
        assert_eq!(fld.at(15, 1, 0), 3151.0);
    }

    #[test]
    fn rank_reduction_combines_after_the_join() {
        let mut c = Concurr::new(100, 7);
        let parts = c.map_ranks(0.0f64, |_, rng| rng.iter().map(|i| i as f64).sum());
        let total: f64 = parts.iter().sum();
        assert_eq!(total, 4950.0);
    }
}
