// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Low-order polynomial fits across channels, and continuum subtraction built on
them.

Frequencies are always scaled into \[-1, 1\] over the band before fitting
(see [`FreqScaling`]), and the real and imaginary parts of complex data are
fitted independently with the same (real) weights. A fit that can't be done
(no usable points, or a singular system) isn't an error; its coefficients
are zero and marked not ok.
 */

mod error;
#[cfg(test)]
mod tests;

pub use error::FitError;

use itertools::izip;
use log::{debug, trace};
use marlu::c64;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_FIT_ORDER, DEFAULT_MAX_FIT_WEIGHT, DEFAULT_MIN_FIT_WEIGHT},
    math::solve_linear_system,
    vis::VisBuffer,
};

/// Maps frequencies \[Hz\] onto \[-1, 1\] over a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqScaling {
    pub mid: f64,
    pub scale: f64,
}

impl FreqScaling {
    pub fn new(lo: f64, hi: f64) -> FreqScaling {
        let scale = 0.5 * (hi - lo);
        FreqScaling {
            mid: 0.5 * (lo + hi),
            scale: if scale > 0.0 { scale } else { 1.0 },
        }
    }

    /// The scaling over the extent of `freqs`, which needn't be sorted.
    pub fn from_freqs(freqs: &[f64]) -> FreqScaling {
        let (lo, hi) = freqs
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| {
                (lo.min(f), hi.max(f))
            });
        if lo.is_finite() && hi.is_finite() {
            FreqScaling::new(lo, hi)
        } else {
            FreqScaling::new(0.0, 0.0)
        }
    }

    #[inline]
    pub fn scaled(&self, freq: f64) -> f64 {
        (freq - self.mid) / self.scale
    }
}

/// Fit weights outside these bounds (and NaNs) aren't trusted; they're
/// replaced by 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for WeightBounds {
    fn default() -> Self {
        WeightBounds {
            min: DEFAULT_MIN_FIT_WEIGHT,
            max: DEFAULT_MAX_FIT_WEIGHT,
        }
    }
}

impl WeightBounds {
    /// The weight to use for a sample, or `None` if the sample should be
    /// left out.
    pub fn sanitise(&self, weight: f64) -> Option<f64> {
        if weight.is_nan() {
            Some(1.0)
        } else if weight <= 0.0 {
            None
        } else if weight < self.min || weight > self.max {
            Some(1.0)
        } else {
            Some(weight)
        }
    }
}

/// The result of fitting a real polynomial. `coeffs[k]` multiplies `x^k`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyFit {
    pub coeffs: Vec<f64>,
    pub ok: Vec<bool>,

    /// The number of samples that went into the fit.
    pub n_points: usize,
}

impl PolyFit {
    fn failed(order: usize, n_points: usize) -> PolyFit {
        PolyFit {
            coeffs: vec![0.0; order + 1],
            ok: vec![false; order + 1],
            n_points,
        }
    }

    /// Was anything fitted?
    pub fn is_ok(&self) -> bool {
        self.ok[0]
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }
}

/// [`PolyFit`], but for complex data.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexPolyFit {
    pub coeffs: Vec<c64>,
    pub ok: Vec<bool>,
    pub n_points: usize,
}

impl ComplexPolyFit {
    pub fn is_ok(&self) -> bool {
        self.ok[0]
    }

    pub fn evaluate(&self, x: f64) -> c64 {
        evaluate(&self.coeffs, x)
    }
}

fn evaluate<'a, I>(coeffs: I, x: f64) -> c64
where
    I: IntoIterator<Item = &'a c64>,
    I::IntoIter: DoubleEndedIterator,
{
    coeffs
        .into_iter()
        .rev()
        .fold(c64::default(), |acc, &c| acc * x + c)
}

/// Weighted least-squares fit of a polynomial of order `order` to the
/// (`x`, `y`, `w`) samples. If there are fewer than `order + 1` usable
/// samples, the order is lowered to fit them exactly; the coefficients above
/// that order are zero and not ok.
pub fn fit_polynomial(x: &[f64], y: &[f64], w: &[f64], order: usize) -> PolyFit {
    fit_real(x, y, w, order, WeightBounds::default())
}

/// Fit the real and imaginary parts of `y` independently. Flagged samples
/// are left out.
pub fn fit_complex_polynomial(
    x: &[f64],
    y: &[c64],
    w: &[f64],
    flags: &[bool],
    order: usize,
) -> ComplexPolyFit {
    fit_complex(x, y, w, flags, order, WeightBounds::default())
}

fn fit_complex(
    x: &[f64],
    y: &[c64],
    w: &[f64],
    flags: &[bool],
    order: usize,
    bounds: WeightBounds,
) -> ComplexPolyFit {
    let mut xs = Vec::with_capacity(x.len());
    let mut re = Vec::with_capacity(x.len());
    let mut im = Vec::with_capacity(x.len());
    let mut ws = Vec::with_capacity(x.len());
    for (&x, &y, &w, _) in izip!(x, y, w, flags).filter(|&(_, _, _, &f)| !f) {
        xs.push(x);
        re.push(y.re);
        im.push(y.im);
        ws.push(w);
    }

    let fit_re = fit_real(&xs, &re, &ws, order, bounds);
    let fit_im = fit_real(&xs, &im, &ws, order, bounds);
    ComplexPolyFit {
        coeffs: fit_re
            .coeffs
            .iter()
            .zip(fit_im.coeffs.iter())
            .map(|(&re, &im)| c64::new(re, im))
            .collect(),
        ok: fit_re
            .ok
            .iter()
            .zip(fit_im.ok.iter())
            .map(|(&a, &b)| a && b)
            .collect(),
        n_points: fit_re.n_points,
    }
}

fn fit_real(x: &[f64], y: &[f64], w: &[f64], order: usize, bounds: WeightBounds) -> PolyFit {
    let points: Vec<(f64, f64, f64)> = izip!(x, y, w)
        .filter(|(x, y, _)| x.is_finite() && y.is_finite())
        .filter_map(|(&x, &y, &w)| bounds.sanitise(w).map(|w| (x, y, w)))
        .collect();
    let n_points = points.len();
    if n_points == 0 {
        return PolyFit::failed(order, 0);
    }

    let num_terms = order.min(n_points - 1) + 1;
    let mut a = Array2::zeros((num_terms, num_terms));
    let mut b = Array1::zeros(num_terms);
    let mut powers = vec![1.0; 2 * num_terms - 1];
    for (x, y, w) in points {
        for k in 1..powers.len() {
            powers[k] = powers[k - 1] * x;
        }
        for j in 0..num_terms {
            for k in 0..num_terms {
                a[(j, k)] += w * powers[j + k];
            }
            b[j] += w * y * powers[j];
        }
    }

    match solve_linear_system(a.view_mut(), b.view_mut()) {
        Some(solution) => {
            let mut fit = PolyFit::failed(order, n_points);
            for (k, c) in solution.into_iter().enumerate() {
                fit.coeffs[k] = c;
                fit.ok[k] = true;
            }
            fit
        }
        None => {
            trace!("Singular fit with {n_points} points");
            PolyFit::failed(order, n_points)
        }
    }
}

/// How continua are fitted. Deserialises from configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// The polynomial order.
    pub order: usize,

    /// Inclusive channel ranges to fit. If empty, all channels are used.
    pub fit_chans: Vec<[usize; 2]>,

    pub min_weight: f64,

    pub max_weight: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            order: DEFAULT_FIT_ORDER,
            fit_chans: vec![],
            min_weight: DEFAULT_MIN_FIT_WEIGHT,
            max_weight: DEFAULT_MAX_FIT_WEIGHT,
        }
    }
}

/// Fits continua to every (correlation, row) spectrum of visibility buffers.
#[derive(Debug, Clone)]
pub struct ContinuumFitter {
    order: usize,
    fit_chans: Vec<[usize; 2]>,
    bounds: WeightBounds,

    /// The number of spectra that couldn't be fitted so far. Spectra of
    /// flagged rows aren't counted.
    pub n_failed_fits: usize,
}

impl ContinuumFitter {
    pub fn new(config: &FitConfig) -> Result<ContinuumFitter, FitError> {
        let (min, max) = (config.min_weight, config.max_weight);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(FitError::BadWeightBounds { min, max });
        }
        Ok(ContinuumFitter {
            order: config.order,
            fit_chans: config.fit_chans.clone(),
            bounds: WeightBounds { min, max },
            n_failed_fits: 0,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Which channels take part in the fit.
    fn channel_mask(&self, num_chans: usize) -> Result<Vec<bool>, FitError> {
        if self.fit_chans.is_empty() {
            return Ok(vec![true; num_chans]);
        }
        let mut mask = vec![false; num_chans];
        for &[first, last] in &self.fit_chans {
            if first > last || last >= num_chans {
                return Err(FitError::BadFitRange {
                    first,
                    last,
                    num_chans,
                });
            }
            mask[first..=last].fill(true);
        }
        Ok(mask)
    }

    /// Fit the continuum of every spectrum in the buffer. Flagged samples and
    /// channels outside the fit ranges take no part; flagged rows aren't
    /// fitted and their solutions are not ok.
    pub fn fit(&mut self, vis: &VisBuffer) -> Result<ContinuumSolution, FitError> {
        let (num_corrs, num_chans, num_rows) = vis.data.dim();
        let mask = self.channel_mask(num_chans)?;
        let scaling = FreqScaling::from_freqs(&vis.meta.freqs);
        let fit_chans: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m)
            .map(|(i, _)| i)
            .collect();
        if fit_chans.is_empty() {
            return Err(FitError::NoChannels(num_chans));
        }
        let x: Vec<f64> = fit_chans
            .iter()
            .map(|&i| scaling.scaled(vis.meta.freqs[i]))
            .collect();

        let mut solution = ContinuumSolution {
            order: self.order,
            scaling,
            coeffs: Array3::zeros((num_corrs, self.order + 1, num_rows)),
            ok: Array3::from_elem((num_corrs, self.order + 1, num_rows), false),
            n_points: Array2::zeros((num_corrs, num_rows)),
        };
        let mut n_failed = 0;
        for i_corr in 0..num_corrs {
            for i_row in 0..num_rows {
                // Flagged rows aren't fitted, and aren't failures either.
                if vis.row_flags[i_row] {
                    continue;
                }
                let weights = vis.channel_weights(i_corr, i_row);
                let mut y = Vec::with_capacity(fit_chans.len());
                let mut w = Vec::with_capacity(fit_chans.len());
                let mut flags = Vec::with_capacity(fit_chans.len());
                for &i_chan in &fit_chans {
                    let d = vis.data[(i_corr, i_chan, i_row)];
                    y.push(c64::new(d.re.into(), d.im.into()));
                    w.push(f64::from(weights[i_chan]));
                    flags.push(vis.flags[(i_corr, i_chan, i_row)]);
                }

                let fit = fit_complex(&x, &y, &w, &flags, self.order, self.bounds);
                if !fit.is_ok() {
                    n_failed += 1;
                }
                for (k, (c, ok)) in fit.coeffs.into_iter().zip(fit.ok).enumerate() {
                    solution.coeffs[(i_corr, k, i_row)] = c;
                    solution.ok[(i_corr, k, i_row)] = ok;
                }
                solution.n_points[(i_corr, i_row)] = fit.n_points;
            }
        }

        if n_failed > 0 {
            debug!(
                "{n_failed} of {} spectra couldn't be fitted for spw {}",
                num_corrs * num_rows,
                vis.meta.spw
            );
        }
        self.n_failed_fits += n_failed;
        Ok(solution)
    }
}

/// Polynomial continuum coefficients for every spectrum of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuumSolution {
    pub order: usize,
    pub scaling: FreqScaling,

    /// The dimensions are \[correlation\]\[order + 1\]\[row\].
    pub coeffs: Array3<c64>,

    /// Same shape as `coeffs`.
    pub ok: Array3<bool>,

    /// The number of samples fitted, per \[correlation\]\[row\].
    pub n_points: Array2<usize>,
}

impl ContinuumSolution {
    /// Assemble a solution from existing coefficients.
    pub fn new(
        order: usize,
        scaling: FreqScaling,
        coeffs: Array3<c64>,
        ok: Array3<bool>,
    ) -> Result<ContinuumSolution, FitError> {
        let (num_corrs, num_coeffs, num_rows) = coeffs.dim();
        if num_coeffs != order + 1 {
            return Err(FitError::CoefficientShape {
                expected: vec![num_corrs, order + 1, num_rows],
                got: coeffs.shape().to_vec(),
            });
        }
        if ok.dim() != coeffs.dim() {
            return Err(FitError::OkShape {
                coeffs: coeffs.shape().to_vec(),
                ok: ok.shape().to_vec(),
            });
        }
        Ok(ContinuumSolution {
            order,
            scaling,
            coeffs,
            ok,
            n_points: Array2::zeros((num_corrs, num_rows)),
        })
    }

    pub fn is_ok(&self, i_corr: usize, i_row: usize) -> bool {
        self.ok[(i_corr, 0, i_row)]
    }

    /// The model at `freqs`, with dimensions \[correlation\]\[channel\]\[row\].
    /// Spectra that weren't fitted are zero.
    pub fn evaluate(&self, freqs: &[f64]) -> Array3<c64> {
        let (num_corrs, _, num_rows) = self.coeffs.dim();
        let mut model = Array3::zeros((num_corrs, freqs.len(), num_rows));
        for ((i_corr, i_chan, i_row), m) in model.indexed_iter_mut() {
            if self.is_ok(i_corr, i_row) {
                let x = self.scaling.scaled(freqs[i_chan]);
                *m = evaluate(self.coeffs.slice(s![i_corr, .., i_row]), x);
            }
        }
        model
    }

    fn check_buffer(&self, vis: &VisBuffer) -> Result<(), FitError> {
        let expected = [vis.num_corrs(), self.order + 1, vis.num_rows()];
        if self.coeffs.shape() != expected {
            return Err(FitError::CoefficientShape {
                expected: expected.to_vec(),
                got: self.coeffs.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Replace the buffer's visibilities with the residuals after removing the
    /// continuum. Spectra that weren't fitted are flagged. Returns the number
    /// of spectra flagged.
    pub fn subtract(&self, vis: &mut VisBuffer) -> Result<usize, FitError> {
        self.write(vis, |d, m| d - m)
    }

    /// Replace the buffer's visibilities with the continuum model. Spectra
    /// that weren't fitted are flagged. Returns the number of spectra
    /// flagged.
    pub fn replace_with_model(&self, vis: &mut VisBuffer) -> Result<usize, FitError> {
        self.write(vis, |_, m| m)
    }

    fn write<F>(&self, vis: &mut VisBuffer, op: F) -> Result<usize, FitError>
    where
        F: Fn(c64, c64) -> c64,
    {
        self.check_buffer(vis)?;
        let model = self.evaluate(&vis.meta.freqs);

        let mut num_flagged = 0;
        for i_corr in 0..vis.num_corrs() {
            for i_row in 0..vis.num_rows() {
                if !self.is_ok(i_corr, i_row) {
                    vis.flags.slice_mut(s![i_corr, .., i_row]).fill(true);
                    num_flagged += 1;
                    continue;
                }
                for (d, &m) in vis
                    .data
                    .slice_mut(s![i_corr, .., i_row])
                    .iter_mut()
                    .zip(model.slice(s![i_corr, .., i_row]))
                {
                    let v = op(c64::new(d.re.into(), d.im.into()), m);
                    d.re = v.re as f32;
                    d.im = v.im as f32;
                }
            }
        }
        Ok(num_flagged)
    }
}
