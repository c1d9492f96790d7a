// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Channel transforms; averaging, Hanning smoothing and regridding of spectra.

Each transform operates on a "stripe", the spectrum of a single correlation
of a single row, along with its flags and weights. [`ChannelTransform`] chains
the transforms (always in the order average, smooth, regrid) and applies them
to every stripe of a [`VisBuffer`].
 */

mod average;
mod error;
mod regrid;
mod smooth;

pub use average::{average, average_freqs, AverageKernel};
pub use error::TransformError;
pub use regrid::{regrid, InterpolationMethod, RegridMode, RegridSpec};
pub use smooth::hanning_smooth;

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul};

use log::debug;
use marlu::{c32, c64};
use ndarray::prelude::*;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use vec1::Vec1;

use crate::{context::MetaContext, vis::VisBuffer};

/// A type that can be channel transformed. All arithmetic is done on a wider
/// accumulator type.
pub trait Sample: Copy + Default + PartialEq + Debug {
    type Acc: Copy
        + Zero
        + AddAssign
        + Add<Output = Self::Acc>
        + Mul<f64, Output = Self::Acc>
        + Div<f64, Output = Self::Acc>;

    fn promote(self) -> Self::Acc;

    fn demote(acc: Self::Acc) -> Self;
}

impl Sample for f32 {
    type Acc = f64;

    fn promote(self) -> f64 {
        f64::from(self)
    }

    fn demote(acc: f64) -> f32 {
        acc as f32
    }
}

impl Sample for c32 {
    type Acc = c64;

    fn promote(self) -> c64 {
        c64::new(self.re.into(), self.im.into())
    }

    fn demote(acc: c64) -> c32 {
        c32::new(acc.re as f32, acc.im as f32)
    }
}

/// The spectrum of one correlation of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Stripe<T: Sample> {
    pub data: Array1<T>,
    pub flags: Array1<bool>,
    pub weights: Array1<f32>,
}

impl<T: Sample> Stripe<T> {
    pub fn new(
        data: Array1<T>,
        flags: Array1<bool>,
        weights: Array1<f32>,
    ) -> Result<Stripe<T>, TransformError> {
        if data.len() != flags.len() || data.len() != weights.len() {
            return Err(TransformError::StripeLength {
                data: data.len(),
                flags: flags.len(),
                weights: weights.len(),
                freqs: data.len(),
            });
        }
        if data.is_empty() {
            return Err(TransformError::EmptyStripe);
        }
        Ok(Stripe {
            data,
            flags,
            weights,
        })
    }

    /// A stripe with unit weights and nothing flagged.
    pub fn unflagged(data: Array1<T>) -> Result<Stripe<T>, TransformError> {
        let n = data.len();
        Stripe::new(data, Array1::from_elem(n, false), Array1::ones(n))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// How the channels of every stripe should be transformed. Deserialises from
/// configuration files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// The number of input channels to average into each output channel.
    pub chan_average: Option<usize>,

    pub average_kernel: AverageKernel,

    /// Hanning smooth the (possibly averaged) channels.
    pub hanning: bool,

    pub interpolation: InterpolationMethod,

    /// Regrid onto this channelisation.
    pub regrid: Option<RegridSpec>,
}

/// The transforms that a [`ChannelTransform`] runs.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "camelCase")]
pub enum Composition {
    Identity,
    Average,
    Smooth,
    Regrid,
    AverageSmooth,
    AverageRegrid,
    SmoothRegrid,
    AverageSmoothRegrid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTransform {
    average: Option<(usize, AverageKernel)>,
    hanning: bool,
    regrid: Option<(RegridSpec, InterpolationMethod)>,
}

impl ChannelTransform {
    pub fn from_config(config: &TransformConfig) -> Result<ChannelTransform, TransformError> {
        let average = match config.chan_average {
            Some(0) => return Err(TransformError::ZeroWidth),
            Some(width) => Some((width, config.average_kernel)),
            None => None,
        };
        if let Some(spec) = config.regrid.as_ref() {
            spec.validate()?;
        }

        let transform = ChannelTransform {
            average,
            hanning: config.hanning,
            regrid: config
                .regrid
                .clone()
                .map(|spec| (spec, config.interpolation)),
        };
        debug!("Channel transform: {}", transform.composition());
        Ok(transform)
    }

    pub fn composition(&self) -> Composition {
        use Composition::*;
        match (self.average.is_some(), self.hanning, self.regrid.is_some()) {
            (false, false, false) => Identity,
            (true, false, false) => Average,
            (false, true, false) => Smooth,
            (false, false, true) => Regrid,
            (true, true, false) => AverageSmooth,
            (true, false, true) => AverageRegrid,
            (false, true, true) => SmoothRegrid,
            (true, true, true) => AverageSmoothRegrid,
        }
    }

    /// The channel frequencies that the transform produces from `freqs`.
    pub fn output_freqs(&self, freqs: &[f64]) -> Result<Vec1<f64>, TransformError> {
        let (_, out) = self.plan(freqs)?;
        Ok(out)
    }

    /// Get the frequencies going into the regridding stage (if any) and the
    /// output frequencies.
    fn plan(&self, freqs: &[f64]) -> Result<(Vec<f64>, Vec1<f64>), TransformError> {
        let averaged = match self.average {
            Some((width, _)) => average_freqs(freqs, width)?,
            None => freqs.to_vec(),
        };
        let out = match self.regrid.as_ref() {
            Some((spec, _)) => spec.target_freqs(&averaged)?,
            None => Vec1::try_from_vec(averaged.clone()).map_err(|_| TransformError::EmptyStripe)?,
        };
        Ok((averaged, out))
    }

    /// Transform a single stripe with channel frequencies `freqs`, also
    /// returning the output channel frequencies.
    pub fn transform_stripe<T: Sample>(
        &self,
        freqs: &[f64],
        stripe: &Stripe<T>,
    ) -> Result<(Stripe<T>, Vec1<f64>), TransformError> {
        if freqs.len() != stripe.len() {
            return Err(TransformError::StripeLength {
                data: stripe.data.len(),
                flags: stripe.flags.len(),
                weights: stripe.weights.len(),
                freqs: freqs.len(),
            });
        }
        let (averaged_freqs, out_freqs) = self.plan(freqs)?;
        let out = self.run_stages(stripe, &averaged_freqs, &out_freqs)?;
        Ok((out, out_freqs))
    }

    fn run_stages<T: Sample>(
        &self,
        stripe: &Stripe<T>,
        averaged_freqs: &[f64],
        out_freqs: &[f64],
    ) -> Result<Stripe<T>, TransformError> {
        let mut stripe = match self.average {
            Some((width, kernel)) => average(stripe, width, kernel)?,
            None => stripe.clone(),
        };
        if self.hanning {
            stripe = hanning_smooth(&stripe);
        }
        if let Some((_, method)) = self.regrid.as_ref() {
            stripe = regrid(&stripe, averaged_freqs, out_freqs, *method)?;
        }
        Ok(stripe)
    }

    /// Transform every stripe of a buffer. The new buffer's weights are the
    /// mean output channel weights of unflagged channels (or the input weight
    /// if everything is flagged); it only has a weight spectrum if the input
    /// did.
    pub fn transform_buffer(&self, vis: &VisBuffer) -> Result<VisBuffer, TransformError> {
        let (num_corrs, num_rows) = (vis.num_corrs(), vis.num_rows());
        let (averaged_freqs, out_freqs) = self.plan(&vis.meta.freqs)?;
        let num_out_chans = out_freqs.len();

        let mut data = Array3::default((num_corrs, num_out_chans, num_rows));
        let mut flags = Array3::from_elem((num_corrs, num_out_chans, num_rows), true);
        let mut weight_spectrum = Array3::zeros((num_corrs, num_out_chans, num_rows));
        let mut weights = Array2::zeros((num_corrs, num_rows));
        for i_corr in 0..num_corrs {
            for i_row in 0..num_rows {
                let stripe = Stripe::new(
                    vis.data.slice(s![i_corr, .., i_row]).to_owned(),
                    vis.flags.slice(s![i_corr, .., i_row]).to_owned(),
                    vis.channel_weights(i_corr, i_row),
                )?;
                let out = self.run_stages(&stripe, &averaged_freqs, &out_freqs)?;

                data.slice_mut(s![i_corr, .., i_row]).assign(&out.data);
                flags.slice_mut(s![i_corr, .., i_row]).assign(&out.flags);
                weight_spectrum
                    .slice_mut(s![i_corr, .., i_row])
                    .assign(&out.weights);

                let (sum, count) = out
                    .weights
                    .iter()
                    .zip(out.flags.iter())
                    .filter(|&(_, &f)| !f)
                    .fold((0.0_f64, 0), |(sum, count), (&w, _)| {
                        (sum + f64::from(w), count + 1)
                    });
                weights[(i_corr, i_row)] = if count > 0 {
                    (sum / count as f64) as f32
                } else {
                    vis.weights[(i_corr, i_row)]
                };
            }
        }

        debug!(
            "Transformed {} channels into {num_out_chans} ({}) for {num_rows} rows",
            vis.num_chans(),
            self.composition()
        );
        let meta = MetaContext {
            freqs: out_freqs,
            ..vis.meta.clone()
        };
        let mut out = VisBuffer::new(
            meta,
            vis.correlations.clone(),
            data,
            flags,
            weights,
            vis.antenna1.clone(),
            vis.antenna2.clone(),
        )?;
        out.row_flags = vis.row_flags.clone();
        if vis.weight_spectrum.is_some() {
            out = out.with_weight_spectrum(weight_spectrum)?;
        }
        Ok(out)
    }
}
