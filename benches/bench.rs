// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::*;
use ndarray::prelude::*;
use vec1::Vec1;

use viscal::{
    apply_cal,
    transform::{average, hanning_smooth, regrid, AverageKernel, InterpolationMethod, Stripe},
    ApplyDirection, ApplyOptions, CalContext, CalType, CalibrationParameterSet, Correlation,
    Epoch, MetaContext, TimeInterval, VisBuffer, c32, c64,
};

const NUM_ANTENNAS: usize = 32;
const NUM_CHANS: usize = 64;

fn stripe() -> Stripe<c32> {
    let data = Array1::from_shape_fn(NUM_CHANS * 16, |i| c32::new(i as f32, -(i as f32)));
    let mut flags = Array1::from_elem(data.len(), false);
    flags.slice_mut(s![..;7]).fill(true);
    let weights = Array1::ones(data.len());
    Stripe::new(data, flags, weights).unwrap()
}

fn channel_transforms(c: &mut Criterion) {
    let stripe = stripe();
    let freqs: Vec<f64> = (0..stripe.len()).map(|i| 150e6 + i as f64 * 10e3).collect();
    let out_freqs: Vec<f64> = (0..stripe.len() / 3)
        .map(|i| 150.001e6 + i as f64 * 30e3)
        .collect();

    c.bench_function("average 4 channels", |b| {
        b.iter(|| average(&stripe, 4, AverageKernel::FlagWeight))
    });
    c.bench_function("hanning smooth", |b| b.iter(|| hanning_smooth(&stripe)));
    c.bench_function("regrid cubic", |b| {
        b.iter(|| regrid(&stripe, &freqs, &out_freqs, InterpolationMethod::Cubic))
    });
}

fn apply_bandpass(c: &mut Criterion) {
    let baselines: Vec<(usize, usize)> = (0..NUM_ANTENNAS)
        .flat_map(|a1| (a1..NUM_ANTENNAS).map(move |a2| (a1, a2)))
        .collect();
    let num_rows = baselines.len();
    let correlations = vec![
        Correlation::XX,
        Correlation::XY,
        Correlation::YX,
        Correlation::YY,
    ];
    let freqs: Vec<f64> = (0..NUM_CHANS).map(|i| 150e6 + i as f64 * 40e3).collect();
    let meta = MetaContext {
        spw: 0,
        time: Epoch::from_gpst_seconds(1090008642.0),
        scan: 0,
        field: 0,
        freqs: Vec1::try_from_vec(freqs).unwrap(),
    };
    let vis = VisBuffer::new(
        meta,
        correlations,
        Array3::from_elem((4, NUM_CHANS, num_rows), c32::new(1.0, 1.0)),
        Array3::from_elem((4, NUM_CHANS, num_rows), false),
        Array2::ones((4, num_rows)),
        baselines.iter().map(|&(a, _)| a).collect(),
        baselines.iter().map(|&(_, a)| a).collect(),
    )
    .unwrap();

    let params = Array3::from_shape_fn((2, NUM_CHANS, NUM_ANTENNAS), |(p, ch, a)| {
        c64::new(1.0 + a as f64 * 0.01, p as f64 * 0.1 - ch as f64 * 0.001)
    });
    let set = CalibrationParameterSet::new(
        0,
        TimeInterval::open_ended(Epoch::from_gpst_seconds(0.0)),
        params,
        Array3::from_elem((2, NUM_CHANS, NUM_ANTENNAS), true),
    )
    .unwrap();
    let mut ctx = CalContext::new(CalType::B, NUM_ANTENNAS);
    ctx.add_parameters(set).unwrap();

    for (name, via_mueller) in [
        ("apply bandpass", false),
        ("apply bandpass via Mueller", true),
    ] {
        let options = ApplyOptions {
            update_weights: true,
            via_mueller,
        };
        c.bench_function(name, |b| {
            b.iter_batched(
                || vis.clone(),
                |mut vis| apply_cal(&mut vis, &mut ctx, &[], ApplyDirection::Correct, options),
                BatchSize::LargeInput,
            )
        });
    }
}

criterion_group!(benches, channel_transforms, apply_bandpass);
criterion_main!(benches);
