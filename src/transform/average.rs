// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Channel averaging.

use itertools::izip;
use ndarray::prelude::*;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::{Sample, Stripe, TransformError};

/// How the samples of a group of channels are combined.
///
/// The "flag" kernels leave flagged samples out. The "non-zero" kernels do too,
/// unless every sample in the group is flagged, in which case all of them are
/// used (and the output is still flagged). Weighted kernels leave out samples
/// with zero or negative weights.
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
pub enum AverageKernel {
    /// The mean of all samples.
    Simple,

    /// The mean of unflagged samples.
    Flag,

    /// The weighted mean of all samples.
    Weight,

    /// The sum of all samples.
    CumSum,

    /// The weighted mean of unflagged samples.
    #[default]
    FlagWeight,

    /// The sum of unflagged samples.
    FlagCumSum,

    FlagNonZero,

    FlagWeightNonZero,

    FlagCumSumNonZero,
}

impl AverageKernel {
    fn uses_flags(self) -> bool {
        !matches!(
            self,
            AverageKernel::Simple | AverageKernel::Weight | AverageKernel::CumSum
        )
    }

    fn uses_weights(self) -> bool {
        matches!(
            self,
            AverageKernel::Weight | AverageKernel::FlagWeight | AverageKernel::FlagWeightNonZero
        )
    }

    fn sums(self) -> bool {
        matches!(
            self,
            AverageKernel::CumSum | AverageKernel::FlagCumSum | AverageKernel::FlagCumSumNonZero
        )
    }

    fn non_zero(self) -> bool {
        matches!(
            self,
            AverageKernel::FlagNonZero
                | AverageKernel::FlagWeightNonZero
                | AverageKernel::FlagCumSumNonZero
        )
    }

    /// Combine a group of samples into a value, a flag and a weight. The output
    /// weight is the sum of the positive weights of the samples used.
    fn combine<T: Sample>(
        self,
        data: ArrayView1<T>,
        flags: ArrayView1<bool>,
        weights: ArrayView1<f32>,
    ) -> (T, bool, f32) {
        let all_flagged = flags.iter().all(|&f| f);
        let use_flagged = !self.uses_flags() || (self.non_zero() && all_flagged);

        let mut acc = T::Acc::zero();
        let mut norm = 0.0;
        let mut weight_sum = 0.0;
        for (&d, &f, &w) in izip!(data, flags, weights) {
            if f && !use_flagged {
                continue;
            }
            let w = f64::from(w);
            if self.uses_weights() {
                if w <= 0.0 {
                    continue;
                }
                acc += d.promote() * w;
                norm += w;
            } else {
                acc += d.promote();
                norm += 1.0;
            }
            weight_sum += w.max(0.0);
        }

        let value = if self.sums() {
            acc
        } else if norm > 0.0 {
            acc / norm
        } else {
            T::Acc::zero()
        };
        (T::demote(value), all_flagged || norm <= 0.0, weight_sum as f32)
    }
}

/// Average every `width` channels of a stripe into one. If `width` doesn't
/// divide the number of channels, the remaining channels are averaged into a
/// last, narrower channel.
pub fn average<T: Sample>(
    stripe: &Stripe<T>,
    width: usize,
    kernel: AverageKernel,
) -> Result<Stripe<T>, TransformError> {
    if width == 0 {
        return Err(TransformError::ZeroWidth);
    }

    let num_out = (stripe.len() + width - 1) / width;
    let mut data = Array1::default(num_out);
    let mut flags = Array1::from_elem(num_out, true);
    let mut weights = Array1::zeros(num_out);
    for (d, f, w, out_d, out_f, out_w) in izip!(
        stripe.data.axis_chunks_iter(Axis(0), width),
        stripe.flags.axis_chunks_iter(Axis(0), width),
        stripe.weights.axis_chunks_iter(Axis(0), width),
        data.iter_mut(),
        flags.iter_mut(),
        weights.iter_mut(),
    ) {
        (*out_d, *out_f, *out_w) = kernel.combine(d, f, w);
    }

    Ok(Stripe {
        data,
        flags,
        weights,
    })
}

/// The centroid frequencies of channels averaged `width` at a time.
pub fn average_freqs(freqs: &[f64], width: usize) -> Result<Vec<f64>, TransformError> {
    if width == 0 {
        return Err(TransformError::ZeroWidth);
    }
    Ok(freqs
        .chunks(width)
        .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
        .collect())
}
