// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::{fit::FitError, transform::TransformError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {file:?} doesn't have a recognised file extension! Valid extensions are: {valid}")]
    UnknownExtension { file: PathBuf, valid: String },

    #[error("Couldn't decode toml structure from {file:?}:\n{err}")]
    Toml { file: PathBuf, err: String },

    #[error("Couldn't decode json structure from {file:?}:\n{err}")]
    Json { file: PathBuf, err: String },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
