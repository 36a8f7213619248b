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

//! 1D solid-body advection on a cyclic grid

use mpdata::{Opts, Params, Solver};

fn params(n: usize, n_iters: usize) -> Params {
    Params {
        n_dims: 1,
        n_eqns: 1,
        grid_size: vec![n],
        n_iters,
        ..Params::default()
    }
}

/// A square wave travelling at C = 0.5 returns to its starting position
/// after one revolution with bounded deformation and exact mass.
#[test]
fn square_wave_returns_after_one_revolution() {
    let n = 100;
    let mut solver = Solver::new(params(n, 2)).unwrap();
    let ic = |i: isize| if (40..60).contains(&i) { 1.0 } else { 0.0 };
    solver.advectee_mut(0).assign_interior(|i, _, _| ic(i));
    solver.courant_mut(0).fill(0.5);
    let mass0 = solver.state(0).interior_sum();

    // C = 0.5 and 200 steps move the wave exactly once around the domain
    solver.advance(200).unwrap();

    let mass = solver.state(0).interior_sum();
    assert!(
        ((mass - mass0) / mass0).abs() < 1e-12,
        "mass drifted: {} -> {}",
        mass0,
        mass
    );
    let mut linf: f64 = 0.0;
    for i in 0..n as isize {
        linf = linf.max((solver.state(0).at(i, 0, 0) - ic(i)).abs());
    }
    assert!(linf <= 0.2, "L-inf error after one revolution: {}", linf);
}

/// Donor-cell at the CFL boundary |C| = 1 is an exact translation, so a
/// constant field is preserved exactly.
#[test]
fn donorcell_at_unit_courant_preserves_a_constant_exactly() {
    let n = 64;
    for &c in &[1.0, -1.0] {
        let mut solver = Solver::new(params(n, 1)).unwrap();
        solver.advectee_mut(0).fill(1.0);
        solver.courant_mut(0).fill(c);
        solver.advance(100).unwrap();
        for i in 0..n as isize {
            assert_eq!(solver.state(0).at(i, 0, 0), 1.0, "cell {} with C = {}", i, c);
        }
    }
}

/// Positivity of the basic scheme for any iteration count.
#[test]
fn nonnegative_fields_stay_nonnegative() {
    for n_iters in 1..=3 {
        let n = 50;
        let mut solver = Solver::new(params(n, n_iters)).unwrap();
        solver.advectee_mut(0).assign_interior(|i, _, _| {
            let x = (i - 25) as f64 / 4.0;
            (-x * x).exp()
        });
        solver.courant_mut(0).fill(0.8);
        solver.advance(120).unwrap();
        for i in 0..n as isize {
            let v = solver.state(0).at(i, 0, 0);
            assert!(v >= 0.0, "negative value {} at cell {} ({} iters)", v, i, n_iters);
        }
    }
}

/// The FCT option keeps every step inside the previous step's local
/// extrema, also in 1D.
#[test]
fn fct_square_wave_never_over_or_undershoots() {
    let n = 80;
    let mut p = params(n, 2);
    p.opts = Opts {
        fct: true,
        ..Opts::default()
    };
    let mut solver = Solver::new(p).unwrap();
    solver
        .advectee_mut(0)
        .assign_interior(|i, _, _| if (20..40).contains(&i) { 1.0 } else { 0.0 });
    solver.courant_mut(0).fill(0.3);
    for _ in 0..150 {
        solver.advance(1).unwrap();
        for i in 0..n as isize {
            let v = solver.state(0).at(i, 0, 0);
            assert!(
                (-1e-12..=1.0 + 1e-12).contains(&v),
                "value {} at cell {} left [0, 1]",
                v,
                i
            );
        }
    }
}

/// Re-entrant advance: stepping 2 x 100 equals stepping 200.
#[test]
fn advance_is_reentrant() {
    let n = 100;
    let ic = |i: isize| if (40..60).contains(&i) { 1.0 } else { 0.0 };

    let mut once = Solver::new(params(n, 2)).unwrap();
    once.advectee_mut(0).assign_interior(|i, _, _| ic(i));
    once.courant_mut(0).fill(0.5);
    once.advance(200).unwrap();

    let mut twice = Solver::new(params(n, 2)).unwrap();
    twice.advectee_mut(0).assign_interior(|i, _, _| ic(i));
    twice.courant_mut(0).fill(0.5);
    twice.advance(100).unwrap();
    twice.advance(100).unwrap();

    for i in 0..n as isize {
        assert_eq!(once.state(0).at(i, 0, 0), twice.state(0).at(i, 0, 0));
    }
}
