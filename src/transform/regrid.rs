// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Regridding spectra onto new channelisations.

use log::debug;
use ndarray::prelude::*;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use vec1::Vec1;

use super::{Sample, Stripe, TransformError};
use crate::{constants::VEL_C, math::nearest_index};

/// Fractional slack used when deciding if a target channel lies within the
/// input band.
const EDGE_TOLERANCE: f64 = 1e-6;

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
pub enum InterpolationMethod {
    Nearest,

    #[default]
    Linear,

    /// Catmull-Rom cubic interpolation. Linear interpolation is used next to
    /// the band edges.
    Cubic,
}

/// The units of a [`RegridSpec`]'s start and width.
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
pub enum RegridMode {
    /// Input channel indices.
    Channel,

    /// Hz.
    #[default]
    Frequency,

    /// m/s, with the radio convention.
    Velocity,
}

/// A target channelisation. Anything not specified is derived from the input
/// channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegridSpec {
    pub mode: RegridMode,

    /// The centre of the first output channel. For [`RegridMode::Channel`],
    /// this is the first input channel index used.
    pub start: Option<f64>,

    pub width: Option<f64>,

    pub nchan: Option<usize>,

    /// \[Hz\] Needed for [`RegridMode::Velocity`].
    pub rest_freq: Option<f64>,
}

impl RegridSpec {
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.width == Some(0.0) {
            return Err(TransformError::ZeroRegridWidth);
        }
        if self.nchan == Some(0) {
            return Err(TransformError::EmptyGrid);
        }
        if self.mode == RegridMode::Velocity && self.rest_freq.is_none() {
            return Err(TransformError::MissingRestFreq);
        }
        Ok(())
    }

    /// Get the target channel frequencies given the input channel frequencies.
    pub fn target_freqs(&self, input: &[f64]) -> Result<Vec1<f64>, TransformError> {
        self.validate()?;
        let n = input.len();
        if n == 0 {
            return Err(TransformError::EmptyStripe);
        }
        if monotonic_direction(input).is_none() {
            return Err(TransformError::NonMonotonicFreqs);
        }

        let freqs: Vec<f64> = match self.mode {
            RegridMode::Frequency => {
                let start = self.start.unwrap_or(input[0]);
                let width = self
                    .width
                    .unwrap_or(if n > 1 { input[1] - input[0] } else { 1.0 });
                let nchan = match self.nchan {
                    Some(nchan) => nchan,
                    None => fitting_chans(start, width, input[n - 1])?,
                };
                (0..nchan).map(|k| start + k as f64 * width).collect()
            }

            RegridMode::Channel => {
                let start = self.start.unwrap_or(0.0);
                let width = self.width.unwrap_or(1.0);
                let nchan = match self.nchan {
                    Some(nchan) => nchan,
                    None => {
                        let nchan = ((n as f64 - start) / width + EDGE_TOLERANCE).floor();
                        if nchan < 1.0 {
                            return Err(TransformError::EmptyGrid);
                        }
                        nchan as usize
                    }
                };
                (0..nchan)
                    .map(|k| {
                        let pos = start + (width - 1.0) / 2.0 + k as f64 * width;
                        freq_at_index(input, pos)
                    })
                    .collect()
            }

            RegridMode::Velocity => {
                // Validation guarantees a rest frequency.
                let rest_freq = self.rest_freq.ok_or(TransformError::MissingRestFreq)?;
                let vel = |f: f64| VEL_C * (1.0 - f / rest_freq);
                let start = self.start.unwrap_or_else(|| vel(input[0]));
                let width = self.width.unwrap_or(if n > 1 {
                    vel(input[1]) - vel(input[0])
                } else {
                    -VEL_C / rest_freq
                });
                let nchan = match self.nchan {
                    Some(nchan) => nchan,
                    None => fitting_chans(start, width, vel(input[n - 1]))?,
                };
                (0..nchan)
                    .map(|k| rest_freq * (1.0 - (start + k as f64 * width) / VEL_C))
                    .collect()
            }
        };

        if freqs.iter().any(|f| !f.is_finite()) {
            return Err(TransformError::BadGrid);
        }
        Vec1::try_from_vec(freqs).map_err(|_| TransformError::EmptyGrid)
    }
}

/// The number of channels of `width` starting at `start` that fit before
/// `last`.
fn fitting_chans(start: f64, width: f64, last: f64) -> Result<usize, TransformError> {
    let span = (last - start) / width;
    if !span.is_finite() {
        return Err(TransformError::BadGrid);
    }
    if span < -EDGE_TOLERANCE {
        return Err(TransformError::EmptyGrid);
    }
    Ok((span + EDGE_TOLERANCE).floor() as usize + 1)
}

/// Linearly interpolate (or extrapolate) the frequency at a fractional channel
/// index.
fn freq_at_index(freqs: &[f64], pos: f64) -> f64 {
    let n = freqs.len();
    if n == 1 {
        return freqs[0];
    }
    let i = (pos.floor().max(0.0) as usize).min(n - 2);
    let t = pos - i as f64;
    freqs[i] + t * (freqs[i + 1] - freqs[i])
}

/// `Some(true)` if ascending, `Some(false)` if descending, `None` if neither.
/// A single frequency counts as ascending.
fn monotonic_direction(freqs: &[f64]) -> Option<bool> {
    if freqs.iter().any(|f| !f.is_finite()) {
        return None;
    }
    if freqs.windows(2).all(|w| w[1] > w[0]) {
        Some(true)
    } else if freqs.windows(2).all(|w| w[1] < w[0]) {
        Some(false)
    } else {
        None
    }
}

/// Interpolate a stripe with channel frequencies `in_freqs` onto `out_freqs`.
/// Output channels outside the input band are flagged with zero weight.
pub fn regrid<T: Sample>(
    stripe: &Stripe<T>,
    in_freqs: &[f64],
    out_freqs: &[f64],
    method: InterpolationMethod,
) -> Result<Stripe<T>, TransformError> {
    let n = stripe.len();
    if in_freqs.len() != n {
        return Err(TransformError::StripeLength {
            data: stripe.data.len(),
            flags: stripe.flags.len(),
            weights: stripe.weights.len(),
            freqs: in_freqs.len(),
        });
    }
    if n == 0 {
        return Err(TransformError::EmptyStripe);
    }
    let ascending = monotonic_direction(in_freqs).ok_or(TransformError::NonMonotonicFreqs)?;

    // Work with ascending frequencies; `idx` maps back to stripe indices.
    let xs: Vec<f64> = if ascending {
        in_freqs.to_vec()
    } else {
        in_freqs.iter().rev().copied().collect()
    };
    let idx = |j: usize| if ascending { j } else { n - 1 - j };
    let (lo, hi) = (xs[0], xs[n - 1]);
    let tol = if n > 1 {
        EDGE_TOLERANCE * (xs[1] - xs[0])
    } else {
        EDGE_TOLERANCE * lo.abs().max(1.0)
    };

    let num_out = out_freqs.len();
    let mut data = Array1::default(num_out);
    let mut flags = Array1::from_elem(num_out, true);
    let mut weights = Array1::zeros(num_out);
    let mut num_outside = 0;
    for (i_out, &f) in out_freqs.iter().enumerate() {
        if f < lo - tol || f > hi + tol {
            num_outside += 1;
            continue;
        }
        if n == 1 {
            data[i_out] = stripe.data[0];
            flags[i_out] = stripe.flags[0];
            weights[i_out] = stripe.weights[0];
            continue;
        }

        let j = xs.partition_point(|&x| x <= f).saturating_sub(1).min(n - 2);
        let t = ((f - xs[j]) / (xs[j + 1] - xs[j])).clamp(0.0, 1.0);
        let (a, b) = (idx(j), idx(j + 1));

        let method = match method {
            InterpolationMethod::Cubic if j == 0 || j + 2 >= n => InterpolationMethod::Linear,
            m => m,
        };
        let (value, flag) = match method {
            InterpolationMethod::Nearest => {
                let k = idx(nearest_index(&xs, f));
                data[i_out] = stripe.data[k];
                flags[i_out] = stripe.flags[k];
                weights[i_out] = stripe.weights[k];
                continue;
            }

            InterpolationMethod::Linear => {
                let value = stripe.data[a].promote() * (1.0 - t) + stripe.data[b].promote() * t;
                let flag = (stripe.flags[a] && t < 1.0) || (stripe.flags[b] && t > 0.0);
                (value, flag)
            }

            InterpolationMethod::Cubic => {
                let support = [idx(j - 1), a, b, idx(j + 2)];
                let coeffs = catmull_rom(t);
                let mut value = T::Acc::zero();
                for (&k, c) in support.iter().zip(coeffs) {
                    value += stripe.data[k].promote() * c;
                }
                let flag = support.iter().any(|&k| stripe.flags[k]);
                (value, flag)
            }
        };
        data[i_out] = T::demote(value);
        flags[i_out] = flag;
        weights[i_out] = (f64::from(stripe.weights[a]) * (1.0 - t)
            + f64::from(stripe.weights[b]) * t) as f32;
    }

    if num_outside > 0 {
        debug!("{num_outside} of {num_out} regridded channels are outside the input band");
    }
    Ok(Stripe {
        data,
        flags,
        weights,
    })
}

/// The Catmull-Rom weights of the four samples around a point a fraction `t`
/// of the way between the middle two.
fn catmull_rom(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t + 2.0 * t2 - t3),
        0.5 * (2.0 - 5.0 * t2 + 3.0 * t3),
        0.5 * (t + 4.0 * t2 - 3.0 * t3),
        0.5 * (-t2 + t3),
    ]
}
