// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Continuum coefficients should have shape {expected:?} ([corr][order+1][row]), but got {got:?}")]
    CoefficientShape { expected: Vec<usize>, got: Vec<usize> },

    #[error("Continuum coefficients and their ok flags have different shapes: {coeffs:?} vs. {ok:?}")]
    OkShape { coeffs: Vec<usize>, ok: Vec<usize> },

    #[error("Fit channel range {first}..={last} is invalid for {num_chans} channels")]
    BadFitRange {
        first: usize,
        last: usize,
        num_chans: usize,
    },

    #[error("Fit weight bounds [{min}, {max}] are not a valid range")]
    BadWeightBounds { min: f64, max: f64 },

    #[error("Can't fit a continuum over {0} channels")]
    NoChannels(usize),
}
