// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Calibration-matrix application and channel transforms for radio-interferometer
visibilities.

Visibilities arrive as [`VisBuffer`]s (correlation x channel x row cubes with
flags and weights). Calibration parameters are turned into Jones or Mueller
matrices, cached per spectral window in a [`CalContext`], and applied to the
buffers by [`apply_cal`]. Independently, [`ChannelTransform`] averages, smooths
and regrids the channel axis, and [`ContinuumFitter`] fits low-order
polynomials across channels.
 */

pub mod apply;
pub mod barrier;
pub mod cli;
pub mod config;
pub mod constants;
pub mod context;
mod error;
pub mod fit;
pub(crate) mod math;
pub mod matrix;
pub mod ordering;
pub mod transform;
pub mod vis;

// Re-exports.
pub use apply::{apply_cal, ApplyDirection, ApplyOptions, ApplyStats};
pub use barrier::SharedComputation;
pub use config::ViscalConfig;
pub use context::{CalContext, CalibrationParameterSet, MetaContext};
pub use error::ViscalError;
pub use fit::{ContinuumFitter, ContinuumSolution};
pub use matrix::{CalType, Mueller};
pub use ordering::{OrderedTable, TimeIndexed, TimeInterval};
pub use transform::ChannelTransform;
pub use vis::{Correlation, VisBuffer};

// External re-exports.
pub use hifitime::{Duration, Epoch};
pub use marlu::{c32, c64, Jones};
