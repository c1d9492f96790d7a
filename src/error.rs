// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all viscal-related errors. This should be the *only* error
//! enum that is publicly visible at the crate root.

use thiserror::Error;

use crate::{
    apply::ApplyError, cli::PlanArgsError, config::ConfigError, context::ContextError,
    fit::FitError, matrix::MatrixError, ordering::OrderingError, transform::TransformError,
    vis::VisBufferError,
};

#[derive(Error, Debug)]
pub enum ViscalError {
    #[error("{0}")]
    Apply(#[from] ApplyError),

    #[error("{0}")]
    Context(#[from] ContextError),

    #[error("{0}")]
    Matrix(#[from] MatrixError),

    #[error("{0}")]
    Ordering(#[from] OrderingError),

    #[error("{0}")]
    Transform(#[from] TransformError),

    #[error("{0}")]
    Fit(#[from] FitError),

    #[error("{0}")]
    VisBuffer(#[from] VisBufferError),

    #[error("{0}\n\nAll configuration may be specified in a toml or json file; everything not specified takes its default value")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    PlanArgs(#[from] PlanArgsError),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

impl From<std::io::Error> for ViscalError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
