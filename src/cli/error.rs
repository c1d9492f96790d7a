// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanArgsError {
    #[error("The number of input channels must be at least 1")]
    NoChannels,

    #[error("The first channel frequency ({0} Hz) must be finite")]
    BadFirstFreq(f64),

    #[error("The channel resolution ({0} Hz) must be finite and non-zero")]
    BadFreqRes(f64),
}
