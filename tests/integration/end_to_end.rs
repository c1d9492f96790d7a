// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibrate, fit and transform a small buffer through the public API.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use vec1::Vec1;

use viscal::{
    apply_cal,
    fit::FitConfig,
    transform::{AverageKernel, TransformConfig},
    ApplyDirection, ApplyOptions, CalContext, CalType, CalibrationParameterSet, ChannelTransform,
    ContinuumFitter, Correlation, Epoch, MetaContext, TimeInterval, VisBuffer, c32, c64,
};

const NUM_CHANS: usize = 4;
const BASELINES: [(usize, usize); 2] = [(0, 1), (0, 2)];

fn vis_buffer(value: c32) -> VisBuffer {
    let num_rows = BASELINES.len();
    let freqs: Vec<f64> = (0..NUM_CHANS).map(|i| 150e6 + i as f64 * 40e3).collect();
    let meta = MetaContext {
        spw: 0,
        time: Epoch::from_gpst_seconds(1090008642.0),
        scan: 0,
        field: 0,
        freqs: Vec1::try_from_vec(freqs).unwrap(),
    };
    VisBuffer::new(
        meta,
        vec![Correlation::XX],
        Array3::from_elem((1, NUM_CHANS, num_rows), value),
        Array3::from_elem((1, NUM_CHANS, num_rows), false),
        Array2::ones((1, num_rows)),
        BASELINES.iter().map(|&(a, _)| a).collect(),
        BASELINES.iter().map(|&(_, a)| a).collect(),
    )
    .unwrap()
}

/// A G context with one gain per antenna, valid from the start of time.
fn gain_context(gains: &[c64], ok: &[bool]) -> CalContext {
    let num_antennas = gains.len();
    let mut params = Array3::zeros((2, 1, num_antennas));
    let mut params_ok = Array3::from_elem((2, 1, num_antennas), true);
    for (i_ant, (&g, &ok)) in gains.iter().zip(ok).enumerate() {
        params.slice_mut(s![.., 0, i_ant]).fill(g);
        params_ok.slice_mut(s![.., 0, i_ant]).fill(ok);
    }
    let set = CalibrationParameterSet::new(
        0,
        TimeInterval::open_ended(Epoch::from_gpst_seconds(0.0)),
        params,
        params_ok,
    )
    .unwrap();
    let mut ctx = CalContext::new(CalType::G, num_antennas);
    ctx.add_parameters(set).unwrap();
    ctx
}

const GAINS: [c64; 3] = [
    c64::new(2.0, 0.0),
    c64::new(0.5, 0.0),
    c64::new(1.0, 1.0),
];

#[test]
fn test_gain_correction() {
    let mut vis = vis_buffer(c32::new(1.0, 0.0));
    let mut ctx = gain_context(&GAINS, &[true; 3]);
    let stats = apply_cal(
        &mut vis,
        &mut ctx,
        &[],
        ApplyDirection::Correct,
        ApplyOptions::default(),
    )
    .unwrap();
    assert_eq!(stats.n_applied, NUM_CHANS * BASELINES.len());
    assert_eq!(stats.n_flagged_by_cal, 0);

    // 1 / (2 * 0.5)
    for d in vis.data.slice(s![0, .., 0]) {
        assert_abs_diff_eq!(*d, c32::new(1.0, 0.0), epsilon = 1e-6);
    }
    // 1 / (2 * (1 - i))
    for d in vis.data.slice(s![0, .., 1]) {
        assert_abs_diff_eq!(*d, c32::new(0.25, 0.25), epsilon = 1e-6);
    }
    assert!(vis.flags.iter().all(|&f| !f));

    // Corrupting the corrected data gets back to where we started.
    apply_cal(
        &mut vis,
        &mut ctx,
        &[],
        ApplyDirection::Corrupt,
        ApplyOptions::default(),
    )
    .unwrap();
    for d in vis.data.iter() {
        assert_abs_diff_eq!(*d, c32::new(1.0, 0.0), epsilon = 1e-6);
    }
}

#[test]
fn test_bad_antenna_is_flagged() {
    let v = c32::new(3.0, -1.0);
    let mut vis = vis_buffer(v);
    let mut ctx = gain_context(&GAINS, &[true, false, true]);
    let stats = apply_cal(
        &mut vis,
        &mut ctx,
        &[],
        ApplyDirection::Correct,
        ApplyOptions::default(),
    )
    .unwrap();
    assert_eq!(stats.n_flagged_by_cal, NUM_CHANS);
    assert_eq!(stats.n_applied, NUM_CHANS);

    // Every channel of the row with antenna 1 is flagged and untouched.
    for (d, &f) in vis
        .data
        .slice(s![0, .., 0])
        .iter()
        .zip(vis.flags.slice(s![0, .., 0]))
    {
        assert!(f);
        assert_eq!(*d, v);
    }
    // The other row is corrected as normal; (3 - i) / (2 - 2i).
    for (d, &f) in vis
        .data
        .slice(s![0, .., 1])
        .iter()
        .zip(vis.flags.slice(s![0, .., 1]))
    {
        assert!(!f);
        assert_abs_diff_eq!(*d, c32::new(1.0, 0.5), epsilon = 1e-6);
    }
}

#[test]
fn test_calibrate_fit_and_average() {
    let mut vis = vis_buffer(c32::new(1.0, 0.0));
    let mut ctx = gain_context(&GAINS, &[true, false, true]);
    apply_cal(
        &mut vis,
        &mut ctx,
        &[],
        ApplyDirection::Correct,
        ApplyOptions::default(),
    )
    .unwrap();

    // The corrected row is flat, so the continuum is everything.
    let mut fitter = ContinuumFitter::new(&FitConfig::default()).unwrap();
    let solution = fitter.fit(&vis).unwrap();
    assert!(!solution.is_ok(0, 0));
    assert!(solution.is_ok(0, 1));
    assert_eq!(fitter.n_failed_fits, 1);
    let num_flagged = solution.subtract(&mut vis).unwrap();
    assert_eq!(num_flagged, 1);
    for d in vis.data.slice(s![0, .., 1]) {
        assert_abs_diff_eq!(*d, c32::new(0.0, 0.0), epsilon = 1e-5);
    }

    let transform = ChannelTransform::from_config(&TransformConfig {
        chan_average: Some(2),
        average_kernel: AverageKernel::FlagWeight,
        ..Default::default()
    })
    .unwrap();
    let averaged = transform.transform_buffer(&vis).unwrap();
    assert_eq!(averaged.num_chans(), 2);
    assert_eq!(averaged.num_rows(), 2);
    assert_abs_diff_eq!(averaged.meta.freqs[0], 150.02e6, epsilon = 1e-3);
    assert_abs_diff_eq!(averaged.meta.freqs[1], 150.1e6, epsilon = 1e-3);
    assert!(averaged.flags.slice(s![0, .., 0]).iter().all(|&f| f));
    assert!(averaged.flags.slice(s![0, .., 1]).iter().all(|&f| !f));
}
