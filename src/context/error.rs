// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{matrix::CalType, matrix::MatrixError, ordering::OrderingError};

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Calibration parameters and their ok flags have different shapes: {params:?} vs. {params_ok:?}")]
    OkShape {
        params: Vec<usize>,
        params_ok: Vec<usize>,
    },

    #[error("{cal_type} calibration parameters should have shape {expected:?} ([par][chan][element]), but got {got:?}")]
    ParameterShape {
        cal_type: CalType,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("{cal_type} parameters don't depend on frequency, but {num_chans} parameter channels were supplied")]
    NotFreqDependent { cal_type: CalType, num_chans: usize },

    #[error("{num_freqs} parameter frequencies were supplied for {num_chans} parameter channels")]
    ParameterFreqCount { num_freqs: usize, num_chans: usize },

    #[error("Parameter frequencies must be strictly ascending or strictly descending")]
    NonMonotonicParameterFreqs,

    #[error("There are {par_chans} parameter channels without frequencies, but the data has {data_chans} channels")]
    ChannelMismatch { par_chans: usize, data_chans: usize },

    #[error("{cal_type} matrices need the geometry of {expected} antennas, but {got} were supplied")]
    GeometryCount {
        cal_type: CalType,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}
