// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use super::CalType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("{cal_type} calibration takes {expected} parameters per element, but {got} were supplied")]
    ParameterCount {
        cal_type: CalType,
        expected: usize,
        got: usize,
    },

    #[error("{cal_type} matrices are {kind} matrices and can't be composed as {requested} matrices")]
    WrongElementKind {
        cal_type: CalType,
        kind: &'static str,
        requested: &'static str,
    },
}
