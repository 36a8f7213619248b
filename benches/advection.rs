/// Stepping throughput of the 2D FCT-limited solver

use criterion::{criterion_group, criterion_main, Criterion};

use mpdata::{Opts, Params, Solver};

fn integrate() {
    const N: usize = 128;
    let mut params = Params {
        n_dims: 2,
        n_eqns: 1,
        grid_size: vec![N, N],
        n_iters: 2,
        n_threads: 4,
        ..Params::default()
    };
    params.opts = Opts {
        fct: true,
        ..Opts::default()
    };
    let mut solver = Solver::new(params).unwrap();
    let c = (N as f64 - 1.0) / 2.0;
    solver.advectee_mut(0).assign_interior(|i, j, _| {
        let dx = i as f64 - c - 20.0;
        let dy = j as f64 - c;
        (-(dx * dx + dy * dy) / 60.0).exp()
    });
    let omega = 0.4 / c;
    {
        let gc0 = solver.courant_mut(0);
        for i in 0..=N as isize {
            for j in 0..N as isize {
                gc0.set(i, j, 0, -omega * (j as f64 - c));
            }
        }
    }
    {
        let gc1 = solver.courant_mut(1);
        for i in 0..N as isize {
            for j in 0..=N as isize {
                gc1.set(i, j, 0, omega * (i as f64 - c));
            }
        }
    }
    solver.advance(10).unwrap();
}

fn my_benchmark(c: &mut Criterion) {
    c.bench_function("advect_fct_2d", |b| b.iter(|| integrate()));
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = my_benchmark
}
criterion_main!(benches);
