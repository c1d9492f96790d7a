// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. Sums over channels and matrix
products are done in double precision before converting back to the sample
precision.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Fit weights smaller than this are not trusted and are replaced by 1.
pub const DEFAULT_MIN_FIT_WEIGHT: f64 = 1e-20;

/// Fit weights larger than this are not trusted and are replaced by 1.
pub const DEFAULT_MAX_FIT_WEIGHT: f64 = 1e20;

/// The default polynomial order used for continuum fits.
pub const DEFAULT_FIT_ORDER: usize = 1;

/// Speed of light \[m/s\].
pub const VEL_C: f64 = marlu::constants::VEL_C;
