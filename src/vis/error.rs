// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisBufferError {
    #[error("The {array} array has shape {got:?}, but the visibilities need {expected:?}")]
    BadArrayShape {
        array: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("There are {num_freqs} channel frequencies, but the visibilities have {num_chans} channels")]
    FreqCountMismatch { num_freqs: usize, num_chans: usize },

    #[error("Visibilities must have 1, 2 or 4 correlations; got {0}")]
    BadCorrelationCount(usize),
}
