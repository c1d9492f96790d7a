// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{context::ContextError, vis::Correlation};

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Row {row} refers to antenna {antenna}, but the calibration only knows about {num_antennas} antennas")]
    AntennaOutOfRange {
        row: usize,
        antenna: usize,
        num_antennas: usize,
    },

    #[error("Can't apply calibration to correlations {0:?}; 4 correlations must be in (XX, XY, YX, YY) or (XX, YY, XY, YX) order (or the circular equivalents)")]
    CorrelationOrder(Vec<Correlation>),

    #[error("Calibration matrices for spw {0} aren't available after syncing")]
    NotSynced(usize),

    #[error(transparent)]
    Context(#[from] ContextError),
}
