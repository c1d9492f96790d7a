// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Buffers of visibilities, as handed to us by whatever reads a measurement
//! set.

mod error;
#[cfg(test)]
mod tests;

pub use error::VisBufferError;

use marlu::c32;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::context::MetaContext;

/// A correlation (polarisation product) type.
#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Correlation {
    XX,
    XY,
    YX,
    YY,
    RR,
    RL,
    LR,
    LL,
}

impl Correlation {
    pub fn is_circular(self) -> bool {
        matches!(
            self,
            Correlation::RR | Correlation::RL | Correlation::LR | Correlation::LL
        )
    }
}

/// The polarisation basis of the feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolBasis {
    Linear,
    Circular,
}

impl PolBasis {
    pub fn of(correlations: &[Correlation]) -> PolBasis {
        if correlations.iter().any(|c| c.is_circular()) {
            PolBasis::Circular
        } else {
            PolBasis::Linear
        }
    }
}

/// Do four correlations arrive with the parallel hands first, i.e. (XX, YY,
/// XY, YX) or (RR, LL, RL, LR)? If so, they must be put into matrix order (XX,
/// XY, YX, YY) before any matrix is applied.
pub fn needs_polzn_switch(correlations: &[Correlation]) -> bool {
    use Correlation::*;

    correlations.len() == 4
        && matches!(
            (correlations[0], correlations[1]),
            (XX, YY) | (RR, LL)
        )
}

/// Parallel-hands-first order to matrix order.
#[inline]
pub fn polzn_map<T: Copy>(v: [T; 4]) -> [T; 4] {
    [v[0], v[2], v[3], v[1]]
}

/// Matrix order back to parallel-hands-first order.
#[inline]
pub fn polzn_unmap<T: Copy>(v: [T; 4]) -> [T; 4] {
    [v[0], v[3], v[1], v[2]]
}

/// One buffer of visibilities. All visibilities in a buffer share the same
/// [`MetaContext`] (spectral window, time, etc.).
#[derive(Debug, Clone)]
pub struct VisBuffer {
    pub meta: MetaContext,

    /// The correlation types of the first axis of `data`.
    pub correlations: Vec<Correlation>,

    /// The visibilities. The dimensions are \[correlation\]\[channel\]\[row\].
    pub data: Array3<c32>,

    /// Flags with the same shape as `data`. `true` means flagged.
    pub flags: Array3<bool>,

    /// Whole-row flags.
    pub row_flags: Vec<bool>,

    /// Weights per \[correlation\]\[row\].
    pub weights: Array2<f32>,

    /// Optional weights per \[correlation\]\[channel\]\[row\]. If this is
    /// available, it takes precedence over `weights`.
    pub weight_spectrum: Option<Array3<f32>>,

    pub antenna1: Vec<usize>,
    pub antenna2: Vec<usize>,
}

impl VisBuffer {
    /// Assemble a buffer, checking that everything is shape-conformant with
    /// the visibilities.
    pub fn new(
        meta: MetaContext,
        correlations: Vec<Correlation>,
        data: Array3<c32>,
        flags: Array3<bool>,
        weights: Array2<f32>,
        antenna1: Vec<usize>,
        antenna2: Vec<usize>,
    ) -> Result<VisBuffer, VisBufferError> {
        let (num_corrs, num_chans, num_rows) = data.dim();
        if ![1, 2, 4].contains(&num_corrs) {
            return Err(VisBufferError::BadCorrelationCount(num_corrs));
        }
        check_shape("correlations", &[correlations.len()], &[num_corrs])?;
        check_shape("flags", flags.shape(), data.shape())?;
        check_shape("weights", weights.shape(), &[num_corrs, num_rows])?;
        check_shape("antenna1", &[antenna1.len()], &[num_rows])?;
        check_shape("antenna2", &[antenna2.len()], &[num_rows])?;
        if meta.freqs.len() != num_chans {
            return Err(VisBufferError::FreqCountMismatch {
                num_freqs: meta.freqs.len(),
                num_chans,
            });
        }

        Ok(VisBuffer {
            meta,
            correlations,
            data,
            flags,
            row_flags: vec![false; num_rows],
            weights,
            weight_spectrum: None,
            antenna1,
            antenna2,
        })
    }

    /// Attach per-channel weights.
    pub fn with_weight_spectrum(
        mut self,
        weight_spectrum: Array3<f32>,
    ) -> Result<VisBuffer, VisBufferError> {
        check_shape(
            "weight spectrum",
            weight_spectrum.shape(),
            self.data.shape(),
        )?;
        self.weight_spectrum = Some(weight_spectrum);
        Ok(self)
    }

    pub fn num_corrs(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn num_chans(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn num_rows(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// One more than the largest antenna index in the buffer.
    pub fn num_antennas(&self) -> usize {
        self.antenna1
            .iter()
            .chain(self.antenna2.iter())
            .max()
            .map(|&a| a + 1)
            .unwrap_or(0)
    }

    /// The per-channel weights of a stripe. Without a weight spectrum, the
    /// row's weight is used for every channel.
    pub fn channel_weights(&self, i_corr: usize, i_row: usize) -> Array1<f32> {
        match self.weight_spectrum.as_ref() {
            Some(ws) => ws.slice(s![i_corr, .., i_row]).to_owned(),
            None => Array1::from_elem(self.num_chans(), self.weights[(i_corr, i_row)]),
        }
    }
}

fn check_shape(
    array: &'static str,
    got: &[usize],
    expected: &[usize],
) -> Result<(), VisBufferError> {
    if got == expected {
        Ok(())
    } else {
        Err(VisBufferError::BadArrayShape {
            array,
            expected: expected.to_vec(),
            got: got.to_vec(),
        })
    }
}
