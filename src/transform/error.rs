// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::vis::VisBufferError;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("A channel-averaging width of 0 was requested; this is not permitted")]
    ZeroWidth,

    #[error("The regridding channel width is zero; this is not permitted")]
    ZeroRegridWidth,

    #[error("The regridding target grid is empty")]
    EmptyGrid,

    #[error("The regridding target grid has non-finite frequencies")]
    BadGrid,

    #[error("Velocity regridding needs a rest frequency")]
    MissingRestFreq,

    #[error("Input channel frequencies aren't strictly monotonic; can't regrid")]
    NonMonotonicFreqs,

    #[error("Stripe arrays have different lengths: {data} data, {flags} flags, {weights} weights, {freqs} frequencies")]
    StripeLength {
        data: usize,
        flags: usize,
        weights: usize,
        freqs: usize,
    },

    #[error("Can't transform an empty stripe")]
    EmptyStripe,

    #[error(transparent)]
    VisBuffer(#[from] VisBufferError),
}
