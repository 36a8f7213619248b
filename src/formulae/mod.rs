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

//! Stencil formulae evaluated over stripe bands
//!
//! The kernels are written per dimension; the solver dispatches on the
//! dimensionality once per phase, never inside the cell loops. Variant
//! flags (`iga`, `tot`, `dfl`) select a monomorphized instance of each
//! kernel once per call, so the compiled cell loops carry no runtime
//! option tests.

pub(crate) mod donorcell;
pub(crate) mod fct;
pub(crate) mod mpdata;

/// Guarded ratio: `num / den` on positive-definite fields, 0 on flat
/// (zero-sum) neighbourhoods.
#[inline(always)]
pub(crate) fn frac(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Two-point ψ ratio across a face; the infinite-gauge instance replaces
/// the denominator by 2 at compile time.
#[inline(always)]
pub(crate) fn ratio2<const IGA: bool>(num: f64, den: f64) -> f64 {
    if IGA {
        0.5 * num
    } else {
        frac(num, den)
    }
}

/// Four-point ψ ratio (cross terms, third-order terms); the infinite-gauge
/// denominator is 4.
#[inline(always)]
pub(crate) fn ratio4<const IGA: bool>(num: f64, den: f64) -> f64 {
    if IGA {
        0.25 * num
    } else {
        frac(num, den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frac_guards_flat_fields() {
        assert_eq!(frac(1.0, 2.0), 0.5);
        assert_eq!(frac(1.0, 0.0), 0.0);
        assert_eq!(frac(-1.0, -3.0), 0.0);
    }

    #[test]
    fn iga_ratios_use_constant_denominators() {
        assert_eq!(ratio2::<true>(3.0, 100.0), 1.5);
        assert_eq!(ratio2::<false>(3.0, 4.0), 0.75);
        assert_eq!(ratio4::<true>(8.0, 100.0), 2.0);
        assert_eq!(ratio4::<false>(1.0, 4.0), 0.25);
    }
}
