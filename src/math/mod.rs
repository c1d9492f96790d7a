// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


use std::collections::HashMap;

use marlu::c64;
use ndarray::prelude::*;

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
#[inline]
pub(crate) fn cexp(x: f64) -> c64 {
    let (im, re) = x.sin_cos();
    c64::new(re, im)
}

/// The number of baselines formed by `num_antennas` antennas, including
/// auto-correlations.
#[inline]
pub(crate) fn num_baselines(num_antennas: usize) -> usize {
    num_antennas * (num_antennas + 1) / 2
}

/// Maps between antenna pairs and baseline indices. Auto-correlations are
/// included, and an antenna pair is always ordered such that the first antenna
/// index is less than or equal to the second; (0, 0) is baseline 0, (0, 1) is
/// baseline 1, etc.
#[derive(Debug, Clone)]
pub(crate) struct AntennaBaselineMaps {
    pub(crate) antenna_to_baseline_map: HashMap<(usize, usize), usize>,
    pub(crate) baseline_to_antenna_map: Vec<(usize, usize)>,
}

impl AntennaBaselineMaps {
    pub(crate) fn new(num_antennas: usize) -> AntennaBaselineMaps {
        let mut antenna_to_baseline_map = HashMap::with_capacity(num_baselines(num_antennas));
        let mut baseline_to_antenna_map = Vec::with_capacity(num_baselines(num_antennas));
        for ant1 in 0..num_antennas {
            for ant2 in ant1..num_antennas {
                antenna_to_baseline_map.insert((ant1, ant2), baseline_to_antenna_map.len());
                baseline_to_antenna_map.push((ant1, ant2));
            }
        }

        Self {
            antenna_to_baseline_map,
            baseline_to_antenna_map,
        }
    }

    /// Get the baseline index of an antenna pair, regardless of the order the
    /// antennas are given in.
    pub(crate) fn baseline(&self, ant1: usize, ant2: usize) -> Option<usize> {
        let pair = if ant1 <= ant2 {
            (ant1, ant2)
        } else {
            (ant2, ant1)
        };
        self.antenna_to_baseline_map.get(&pair).copied()
    }
}

/// Solve the square linear system `a x = b` with Gaussian elimination and
/// partial pivoting. `a` and `b` are used as scratch space. `None` is returned
/// if the system is singular (or numerically close to it).
pub(crate) fn solve_linear_system(mut a: ArrayViewMut2<f64>, mut b: ArrayViewMut1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    assert_eq!(a.dim(), (n, n));

    // Scale the singularity threshold by the largest element so that the test
    // doesn't depend on the units of the system.
    let max_abs = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max_abs == 0.0 || !max_abs.is_finite() {
        return None;
    }
    let tiny = max_abs * 1e-14;

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[(i, col)].abs().total_cmp(&a[(j, col)].abs()))
            .unwrap_or(col);
        if a[(pivot_row, col)].abs() <= tiny {
            return None;
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap((pivot_row, k), (col, k));
            }
            b.swap(pivot_row, col);
        }

        for row in col + 1..n {
            let factor = a[(row, col)] / a[(col, col)];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[(row, k)] -= factor * a[(col, k)];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[(row, k)] * x[k];
        }
        x[row] = sum / a[(row, row)];
    }
    if x.iter().any(|v: &f64| !v.is_finite()) {
        return None;
    }
    Some(x)
}

/// Given sorted `values` (ascending or descending), get the index of the value
/// closest to `target`. `values` must not be empty.
pub(crate) fn nearest_index(values: &[f64], target: f64) -> usize {
    let descending = values.len() > 1 && values[0] > values[values.len() - 1];
    let search = if descending {
        values.binary_search_by(|v| target.total_cmp(v))
    } else {
        values.binary_search_by(|v| v.total_cmp(&target))
    };
    match search {
        Ok(i) => i,
        Err(0) => 0,
        Err(i) if i == values.len() => values.len() - 1,
        Err(i) => {
            if (target - values[i - 1]).abs() <= (values[i] - target).abs() {
                i - 1
            } else {
                i
            }
        }
    }
}

/// Are the values strictly ascending?
pub(crate) fn is_strictly_ascending(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] > w[0])
}

/// Are the values strictly ascending or strictly descending?
pub(crate) fn is_strictly_monotonic(values: &[f64]) -> bool {
    is_strictly_ascending(values) || values.windows(2).all(|w| w[1] < w[0])
}
