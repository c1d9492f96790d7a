// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use hifitime::Epoch;
use marlu::c32;
use vec1::vec1;

use super::*;
use crate::{context::MetaContext, vis::Correlation};

#[test]
fn test_freq_scaling() {
    let s = FreqScaling::from_freqs(&[300e6, 100e6, 200e6]);
    assert_abs_diff_eq!(s.mid, 200e6);
    assert_abs_diff_eq!(s.scale, 100e6);
    assert_abs_diff_eq!(s.scaled(300e6), 1.0);
    assert_abs_diff_eq!(s.scaled(100e6), -1.0);

    // A single frequency doesn't divide by zero.
    let s = FreqScaling::from_freqs(&[150e6]);
    assert_abs_diff_eq!(s.scale, 1.0);
    assert_abs_diff_eq!(s.scaled(150e6), 0.0);
}

#[test]
fn test_fit_line() {
    let x = [-1.0, 0.0, 1.0];
    let y: Vec<f64> = x.iter().map(|x| 2.0 + 3.0 * x).collect();
    let w = [1.0; 3];
    let fit = fit_polynomial(&x, &y, &w, 1);
    assert!(fit.is_ok());
    assert_eq!(fit.n_points, 3);
    assert_abs_diff_eq!(fit.coeffs[0], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.coeffs[1], 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.evaluate(0.5), 3.5, epsilon = 1e-12);

    // Fitting is deterministic.
    assert_eq!(fit, fit_polynomial(&x, &y, &w, 1));
}

#[test]
fn test_order_is_clamped_to_the_points() {
    let x = [-1.0, 0.0, 1.0];
    let y = [-1.0, 2.0, 5.0];
    let fit = fit_polynomial(&x, &y, &[1.0; 3], 3);
    assert_eq!(fit.coeffs.len(), 4);
    assert_eq!(fit.ok, vec![true, true, true, false]);
    assert_abs_diff_eq!(fit.coeffs[0], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.coeffs[1], 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.coeffs[2], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.coeffs[3], 0.0);

    // A single point gives a constant.
    let fit = fit_polynomial(&[0.3], &[7.0], &[2.0], 2);
    assert_eq!(fit.ok, vec![true, false, false]);
    assert_abs_diff_eq!(fit.coeffs[0], 7.0, epsilon = 1e-12);
}

#[test]
fn test_weight_sanitisation() {
    // NaN and huge weights become 1; zero and negative weights exclude their
    // samples.
    let x = [-1.0, 0.0, 1.0, 0.5];
    let y = [0.0, 100.0, 2.0, -50.0];
    let w = [f64::NAN, 0.0, 1e25, -5.0];
    let fit = fit_polynomial(&x, &y, &w, 1);
    assert!(fit.is_ok());
    assert_eq!(fit.n_points, 2);
    assert!(fit.coeffs.iter().all(|c| c.is_finite()));
    assert_abs_diff_eq!(fit.coeffs[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.coeffs[1], 1.0, epsilon = 1e-12);

    let bounds = WeightBounds::default();
    assert_eq!(bounds.sanitise(f64::NAN), Some(1.0));
    assert_eq!(bounds.sanitise(0.0), None);
    assert_eq!(bounds.sanitise(-5.0), None);
    assert_eq!(bounds.sanitise(1e25), Some(1.0));
    assert_eq!(bounds.sanitise(1e-30), Some(1.0));
    assert_eq!(bounds.sanitise(4.0), Some(4.0));
}

#[test]
fn test_failed_fits() {
    let fit = fit_polynomial(&[0.0, 1.0], &[1.0, 2.0], &[0.0, -1.0], 1);
    assert!(!fit.is_ok());
    assert_eq!(fit.n_points, 0);
    assert_eq!(fit.coeffs, vec![0.0, 0.0]);

    // Two points at the same place can't define a line.
    let fit = fit_polynomial(&[0.5, 0.5], &[1.0, 2.0], &[1.0, 1.0], 1);
    assert!(!fit.is_ok());
    assert_eq!(fit.n_points, 2);
}

#[test]
fn test_complex_fit() {
    let x = [-1.0, -0.5, 0.0, 0.5, 1.0];
    let c0 = c64::new(1.0, 2.0);
    let c1 = c64::new(0.5, -1.0);
    let mut y: Vec<c64> = x.iter().map(|&x| c0 + c1 * x).collect();
    // This sample is flagged, so it can't hurt.
    y[2] = c64::new(1e6, -1e6);
    let flags = [false, false, true, false, false];
    let fit = fit_complex_polynomial(&x, &y, &[1.0; 5], &flags, 1);
    assert!(fit.is_ok());
    assert_eq!(fit.n_points, 4);
    assert_abs_diff_eq!(fit.coeffs[0], c0, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.coeffs[1], c1, epsilon = 1e-12);
    assert_abs_diff_eq!(fit.evaluate(0.0), c0, epsilon = 1e-12);

    let fit = fit_complex_polynomial(&x, &y, &[1.0; 5], &[true; 5], 1);
    assert!(!fit.is_ok());
    assert_eq!(fit.ok, vec![false, false]);
}

/// One correlation, five channels spanning 100-500 MHz (scaled x of -1 to 1)
/// and two rows. The first row is the line (1 + i) x + 1; the second is
/// entirely flagged.
fn buffer() -> VisBuffer {
    let meta = MetaContext {
        spw: 0,
        time: Epoch::from_gpst_seconds(1090008640.0),
        scan: 0,
        field: 0,
        freqs: vec1![100e6, 200e6, 300e6, 400e6, 500e6],
    };
    let x = [-1.0_f32, -0.5, 0.0, 0.5, 1.0];
    let mut data = Array3::zeros((1, 5, 2));
    for (i, &x) in x.iter().enumerate() {
        data[(0, i, 0)] = c32::new(1.0 + x, x);
        data[(0, i, 1)] = c32::new(5.0, 5.0);
    }
    let mut flags = Array3::from_elem((1, 5, 2), false);
    flags.slice_mut(s![0, .., 1]).fill(true);
    VisBuffer::new(
        meta,
        vec![Correlation::XX],
        data,
        flags,
        Array2::ones((1, 2)),
        vec![0, 0],
        vec![1, 2],
    )
    .unwrap()
}

#[test]
fn test_continuum_subtraction() {
    let mut vis = buffer();
    let mut fitter = ContinuumFitter::new(&FitConfig::default()).unwrap();
    let solution = fitter.fit(&vis).unwrap();
    assert_eq!(solution.coeffs.dim(), (1, 2, 2));
    assert!(solution.is_ok(0, 0));
    assert!(!solution.is_ok(0, 1));
    assert_eq!(solution.n_points[(0, 0)], 5);
    assert_eq!(solution.n_points[(0, 1)], 0);
    assert_eq!(fitter.n_failed_fits, 1);
    assert_abs_diff_eq!(
        solution.coeffs[(0, 0, 0)],
        c64::new(1.0, 0.0),
        epsilon = 1e-6
    );
    assert_abs_diff_eq!(
        solution.coeffs[(0, 1, 0)],
        c64::new(1.0, 1.0),
        epsilon = 1e-6
    );

    let num_flagged = solution.subtract(&mut vis).unwrap();
    assert_eq!(num_flagged, 1);
    for d in vis.data.slice(s![0, .., 0]) {
        assert_abs_diff_eq!(*d, c32::new(0.0, 0.0), epsilon = 1e-5);
    }
    assert!(vis.flags.slice(s![0, .., 1]).iter().all(|&f| f));
    // The unfitted row's data is left alone.
    assert_abs_diff_eq!(vis.data[(0, 0, 1)], c32::new(5.0, 5.0));

    // The failure count keeps running.
    fitter.fit(&vis).unwrap();
    assert_eq!(fitter.n_failed_fits, 2);
}

#[test]
fn test_flagged_rows_are_not_failures() {
    let mut vis = buffer();
    // The second row's samples are fine, but the whole row is flagged.
    vis.flags.fill(false);
    vis.row_flags[1] = true;
    let mut fitter = ContinuumFitter::new(&FitConfig::default()).unwrap();
    let solution = fitter.fit(&vis).unwrap();
    assert!(solution.is_ok(0, 0));
    assert!(!solution.is_ok(0, 1));
    assert_eq!(solution.n_points[(0, 1)], 0);
    assert_eq!(fitter.n_failed_fits, 0);

    // The row can't be subtracted, so it stays flagged.
    let num_flagged = solution.subtract(&mut vis).unwrap();
    assert_eq!(num_flagged, 1);
    assert_abs_diff_eq!(vis.data[(0, 0, 1)], c32::new(5.0, 5.0));
}

#[test]
fn test_fit_channel_ranges() {
    let mut vis = buffer();
    // Put a line in the last channel; it isn't part of the continuum fit.
    vis.data[(0, 4, 0)] += c32::new(10.0, 0.0);
    let config = FitConfig {
        fit_chans: vec![[0, 2], [3, 3]],
        ..Default::default()
    };
    let mut fitter = ContinuumFitter::new(&config).unwrap();
    let solution = fitter.fit(&vis).unwrap();
    assert_eq!(solution.n_points[(0, 0)], 4);

    let model = solution.evaluate(&vis.meta.freqs);
    assert_abs_diff_eq!(model[(0, 4, 0)], c64::new(2.0, 1.0), epsilon = 1e-6);
    assert_abs_diff_eq!(model[(0, 4, 1)], c64::default());

    let mut residual = vis.clone();
    solution.subtract(&mut residual).unwrap();
    assert_abs_diff_eq!(residual.data[(0, 4, 0)], c32::new(10.0, 0.0), epsilon = 1e-5);

    solution.replace_with_model(&mut vis).unwrap();
    assert_abs_diff_eq!(vis.data[(0, 4, 0)], c32::new(2.0, 1.0), epsilon = 1e-5);

    let config = FitConfig {
        fit_chans: vec![[3, 10]],
        ..Default::default()
    };
    let mut fitter = ContinuumFitter::new(&config).unwrap();
    assert!(matches!(
        fitter.fit(&vis),
        Err(FitError::BadFitRange {
            first: 3,
            last: 10,
            num_chans: 5
        })
    ));
}

#[test]
fn test_coefficient_shapes() {
    let scaling = FreqScaling::new(100e6, 500e6);
    let result = ContinuumSolution::new(
        1,
        scaling,
        Array3::zeros((1, 3, 2)),
        Array3::from_elem((1, 3, 2), true),
    );
    assert!(matches!(result, Err(FitError::CoefficientShape { .. })));

    let result = ContinuumSolution::new(
        1,
        scaling,
        Array3::zeros((1, 2, 2)),
        Array3::from_elem((1, 2, 3), true),
    );
    assert!(matches!(result, Err(FitError::OkShape { .. })));

    // Coefficients for three rows don't fit a buffer with two.
    let solution = ContinuumSolution::new(
        1,
        scaling,
        Array3::zeros((1, 2, 3)),
        Array3::from_elem((1, 2, 3), true),
    )
    .unwrap();
    let mut vis = buffer();
    assert!(matches!(
        solution.subtract(&mut vis),
        Err(FitError::CoefficientShape { .. })
    ));
}

#[test]
fn test_bad_weight_bounds() {
    let config = FitConfig {
        min_weight: 10.0,
        max_weight: 1.0,
        ..Default::default()
    };
    assert!(matches!(
        ContinuumFitter::new(&config),
        Err(FitError::BadWeightBounds { .. })
    ));
}
