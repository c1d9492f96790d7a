// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to apply calibration to (or corrupt) visibilities.

mod error;

pub use error::ApplyError;

use std::ops::AddAssign;

use log::trace;
use marlu::{c32, c64};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    context::CalContext,
    matrix::{apply_jones, apply_mueller, AntennaGeometry, MATRIX_ORDER},
    vis::{needs_polzn_switch, polzn_map, polzn_unmap, Correlation, PolBasis, VisBuffer},
};

/// Are we removing the effects the calibration describes, or putting them in?
#[derive(
    Debug,
    Display,
    EnumIter,
    EnumString,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ApplyDirection {
    /// Multiply by the inverse matrices.
    #[default]
    Correct,

    /// Multiply by the matrices.
    Corrupt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    /// Scale the data weights by the calibration's weight-scale factors.
    pub update_weights: bool,

    /// Apply antenna-based calibration through per-baseline Mueller matrices.
    pub via_mueller: bool,
}

/// What happened during an application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyStats {
    /// The number of (channel, row) samples that had calibration applied.
    pub n_applied: usize,

    /// The number of visibilities that weren't flagged, but were flagged
    /// because their calibration wasn't ok.
    pub n_flagged_by_cal: usize,

    /// The number of rows skipped because they were flagged.
    pub n_rows_skipped: usize,

    /// The weight-scale matrix of the spectral window, if weights were
    /// updated. See [`crate::context::SyncedMatrices::weight_scale`].
    pub weight_scale: Option<Array2<f64>>,
}

impl AddAssign for ApplyStats {
    fn add_assign(&mut self, rhs: ApplyStats) {
        self.n_applied += rhs.n_applied;
        self.n_flagged_by_cal += rhs.n_flagged_by_cal;
        self.n_rows_skipped += rhs.n_rows_skipped;
        if rhs.weight_scale.is_some() {
            self.weight_scale = rhs.weight_scale;
        }
    }
}

/// The matrix-order position of a correlation.
fn matrix_position(corr: Correlation) -> usize {
    use Correlation::*;
    match corr {
        XX | RR => 0,
        XY | RL => 1,
        YX | LR => 2,
        YY | LL => 3,
    }
}

/// Apply (or corrupt) the visibilities of a buffer with the calibration of
/// `ctx`. The context is synced to the buffer's metadata first.
///
/// Samples whose calibration isn't ok are flagged and otherwise left alone;
/// already-flagged samples are never touched, and neither are rows that are
/// flagged.
pub fn apply_cal(
    vis: &mut VisBuffer,
    ctx: &mut CalContext,
    geometry: &[AntennaGeometry],
    direction: ApplyDirection,
    options: ApplyOptions,
) -> Result<ApplyStats, ApplyError> {
    let num_corrs = vis.num_corrs();
    let switch = needs_polzn_switch(&vis.correlations);
    // The positions of the correlations after any switch.
    let positions: Vec<usize> = if switch {
        MATRIX_ORDER.to_vec()
    } else {
        vis.correlations.iter().copied().map(matrix_position).collect()
    };
    let mixed_bases = vis.correlations.iter().any(|c| c.is_circular())
        && !vis.correlations.iter().all(|c| c.is_circular());
    if mixed_bases || (num_corrs == 4 && positions != MATRIX_ORDER) {
        return Err(ApplyError::CorrelationOrder(vis.correlations.clone()));
    }
    // Weight scales are indexed by matrix position, but weights are stored in
    // the buffer's order.
    let weight_positions: Vec<usize> = vis
        .correlations
        .iter()
        .copied()
        .map(matrix_position)
        .collect();

    let spw = vis.meta.spw;
    ctx.sync(
        &vis.meta,
        geometry,
        PolBasis::of(&vis.correlations),
        direction,
        options.via_mueller,
    )?;
    let num_antennas = ctx.num_antennas();
    let synced = ctx.synced(spw).ok_or(ApplyError::NotSynced(spw))?;

    let mut stats = ApplyStats::default();
    let mut weight_sums = vec![0.0; num_corrs];
    for i_row in 0..vis.num_rows() {
        if vis.row_flags[i_row] {
            stats.n_rows_skipped += 1;
            continue;
        }
        let (ant1, ant2) = (vis.antenna1[i_row], vis.antenna2[i_row]);
        for antenna in [ant1, ant2] {
            if antenna >= num_antennas {
                return Err(ApplyError::AntennaOutOfRange {
                    row: i_row,
                    antenna,
                    num_antennas,
                });
            }
        }
        weight_sums.fill(0.0);
        let mut num_weighted = 0;
        for i_chan in 0..vis.num_chans() {
            let i_mat = synced.mat_chan(i_chan);
            let mueller = synced
                .via_mueller
                .then(|| synced.row_mueller(i_mat, ant1, ant2));
            let ok = match mueller {
                Some((_, ok)) => ok,
                None => synced.jones_ok[(i_mat, ant1)] && synced.jones_ok[(i_mat, ant2)],
            };

            let mut flags = vis.flags.slice_mut(s![.., i_chan, i_row]);
            if !ok {
                for flag in flags.iter_mut().filter(|f| !**f) {
                    *flag = true;
                    stats.n_flagged_by_cal += 1;
                }
                continue;
            }
            if flags.iter().all(|&f| f) {
                continue;
            }

            let mut data = vis.data.slice_mut(s![.., i_chan, i_row]);
            let mut v = [c64::default(); 4];
            for (v, d) in v.iter_mut().zip(data.iter()) {
                *v = c64::new(d.re.into(), d.im.into());
            }
            if switch {
                v = polzn_map(v);
            }
            match mueller {
                Some((m, _)) => apply_mueller(&m, &mut v[..num_corrs], &positions),
                None => apply_jones(
                    &synced.jones[(i_mat, ant1)],
                    &mut v[..num_corrs],
                    &positions,
                    &synced.jones[(i_mat, ant2)],
                ),
            }
            if switch {
                v = polzn_unmap(v);
            }
            for ((d, v), &flag) in data.iter_mut().zip(v).zip(flags.iter()) {
                if !flag {
                    *d = c32::new(v.re as f32, v.im as f32);
                }
            }
            stats.n_applied += 1;

            if options.update_weights {
                let ws = synced
                    .baseline_weight_scale(i_mat, ant1, ant2)
                    .unwrap_or([1.0; 4]);
                for (i_corr, &pos) in weight_positions.iter().enumerate() {
                    weight_sums[i_corr] += ws[pos];
                    if let Some(spectrum) = vis.weight_spectrum.as_mut() {
                        let w = &mut spectrum[(i_corr, i_chan, i_row)];
                        *w = scale_weight(*w, ws[pos], direction);
                    }
                }
                num_weighted += 1;
            }
        }

        if num_weighted > 0 {
            for (i_corr, sum) in weight_sums.iter().enumerate() {
                let w = &mut vis.weights[(i_corr, i_row)];
                *w = scale_weight(*w, sum / num_weighted as f64, direction);
            }
        }
    }

    if options.update_weights {
        stats.weight_scale = Some(synced.weight_scale());
    }
    trace!(
        "Applied {} to spw {spw}: {} samples, {} newly flagged, {} rows skipped",
        ctx.cal_type(),
        stats.n_applied,
        stats.n_flagged_by_cal,
        stats.n_rows_skipped
    );
    Ok(stats)
}

/// Correcting data divides it by the gains, so the weights (inverse variances)
/// go up by the weight scale; corrupting does the opposite.
fn scale_weight(weight: f32, scale: f64, direction: ApplyDirection) -> f32 {
    let weight = f64::from(weight);
    let scaled = match direction {
        ApplyDirection::Correct => weight * scale,
        ApplyDirection::Corrupt if scale > 0.0 => weight / scale,
        ApplyDirection::Corrupt => 0.0,
    };
    scaled as f32
}
