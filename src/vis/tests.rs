// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use hifitime::Epoch;
use vec1::{vec1, Vec1};

use super::*;

fn meta(num_chans: usize) -> MetaContext {
    let freqs: Vec<f64> = (0..num_chans).map(|i| 150e6 + i as f64 * 40e3).collect();
    MetaContext {
        spw: 0,
        time: Epoch::from_gpst_seconds(1090008640.0),
        scan: 0,
        field: 0,
        freqs: Vec1::try_from_vec(freqs).unwrap(),
    }
}

#[test]
fn test_correlation_parsing() {
    assert_eq!(Correlation::from_str("xx"), Ok(Correlation::XX));
    assert_eq!(Correlation::from_str("Rl"), Ok(Correlation::RL));
    assert!(Correlation::from_str("XR").is_err());
    assert_eq!(Correlation::LR.to_string(), "LR");
}

#[test]
fn test_pol_basis() {
    use Correlation::*;
    assert_eq!(PolBasis::of(&[XX, XY, YX, YY]), PolBasis::Linear);
    assert_eq!(PolBasis::of(&[RR, LL]), PolBasis::Circular);
    assert_eq!(PolBasis::of(&[]), PolBasis::Linear);
}

#[test]
fn test_polzn_switch() {
    use Correlation::*;
    assert!(needs_polzn_switch(&[XX, YY, XY, YX]));
    assert!(needs_polzn_switch(&[RR, LL, RL, LR]));
    assert!(!needs_polzn_switch(&[XX, XY, YX, YY]));
    assert!(!needs_polzn_switch(&[XX, YY]));

    let mapped = polzn_map([XX, YY, XY, YX]);
    assert_eq!(mapped, [XX, XY, YX, YY]);
    assert_eq!(polzn_unmap(mapped), [XX, YY, XY, YX]);
}

#[test]
fn test_new_buffer_checks_shapes() {
    let (num_corrs, num_chans, num_rows) = (2, 3, 4);
    let data = Array3::<c32>::zeros((num_corrs, num_chans, num_rows));
    let flags = Array3::from_elem((num_corrs, num_chans, num_rows), false);
    let weights = Array2::ones((num_corrs, num_rows));
    let ants = vec![0, 0, 1, 2];

    let vis = VisBuffer::new(
        meta(num_chans),
        vec![Correlation::XX, Correlation::YY],
        data.clone(),
        flags.clone(),
        weights.clone(),
        ants.clone(),
        ants.clone(),
    )
    .unwrap();
    assert_eq!(vis.num_corrs(), 2);
    assert_eq!(vis.num_chans(), 3);
    assert_eq!(vis.num_rows(), 4);
    assert_eq!(vis.num_antennas(), 3);
    assert_eq!(vis.row_flags, vec![false; 4]);

    let result = VisBuffer::new(
        meta(num_chans),
        vec![Correlation::XX],
        data.clone(),
        flags.clone(),
        weights.clone(),
        ants.clone(),
        ants.clone(),
    );
    assert!(matches!(
        result,
        Err(VisBufferError::BadArrayShape {
            array: "correlations",
            ..
        })
    ));

    let result = VisBuffer::new(
        meta(num_chans),
        vec![Correlation::XX, Correlation::YY],
        data.clone(),
        Array3::from_elem((num_corrs, num_chans, 1), false),
        weights.clone(),
        ants.clone(),
        ants.clone(),
    );
    assert!(matches!(
        result,
        Err(VisBufferError::BadArrayShape { array: "flags", .. })
    ));

    let result = VisBuffer::new(
        meta(num_chans + 1),
        vec![Correlation::XX, Correlation::YY],
        data,
        flags,
        weights,
        ants.clone(),
        ants,
    );
    assert!(matches!(
        result,
        Err(VisBufferError::FreqCountMismatch {
            num_freqs: 4,
            num_chans: 3
        })
    ));

    let result = VisBuffer::new(
        meta(1),
        vec![Correlation::XX; 3],
        Array3::zeros((3, 1, 1)),
        Array3::from_elem((3, 1, 1), false),
        Array2::ones((3, 1)),
        vec![0],
        vec![1],
    );
    assert!(matches!(result, Err(VisBufferError::BadCorrelationCount(3))));
}

#[test]
fn test_channel_weights() {
    let weights = array![[2.0, 3.0]];
    let vis = VisBuffer::new(
        meta(3),
        vec![Correlation::XX],
        Array3::zeros((1, 3, 2)),
        Array3::from_elem((1, 3, 2), false),
        weights,
        vec![0, 0],
        vec![1, 2],
    )
    .unwrap();
    assert_eq!(vis.channel_weights(0, 1), array![3.0, 3.0, 3.0]);

    let mut spectrum = Array3::ones((1, 3, 2));
    spectrum[(0, 1, 1)] = 0.5;
    let vis = vis.with_weight_spectrum(spectrum).unwrap();
    assert_eq!(vis.channel_weights(0, 1), array![1.0, 0.5, 1.0]);

    let result = vis.with_weight_spectrum(Array3::ones((1, 2, 2)));
    assert!(matches!(
        result,
        Err(VisBufferError::BadArrayShape {
            array: "weight spectrum",
            ..
        })
    ));
}

#[test]
fn test_meta_context() {
    let m = MetaContext {
        freqs: vec1![1.0, 2.0],
        ..meta(1)
    };
    assert_eq!(m.num_chans(), 2);
}
