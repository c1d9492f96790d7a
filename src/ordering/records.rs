// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Concrete time-indexed records.

use serde::{Deserialize, Serialize};

use super::{TimeIndexed, TimeInterval};

/// The non-temporal key shared by per-antenna records: which antenna, spectral
/// window and feed a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AntennaFeedKey {
    pub antenna_id: usize,
    pub spectral_window_id: usize,
    pub feed_id: usize,
}

/// Gain-tracking information of an antenna's signal path (attenuators and
/// delays) for a spectral window and feed.
#[derive(Debug, Clone, PartialEq)]
pub struct GainTrackingRow {
    pub antenna_id: usize,
    pub spectral_window_id: usize,
    pub feed_id: usize,
    pub interval: TimeInterval,

    /// Attenuator settings, one per receptor \[dB\].
    pub attenuator: Vec<f32>,

    /// \[s\]
    pub cable_delay: f64,

    /// \[s\]
    pub cross_polarization_delay: f64,

    /// One per local oscillator \[s\].
    pub lo_propagation_delay: Vec<f64>,

    /// One per receptor \[s\].
    pub receiver_delay: Vec<f64>,
}

impl TimeIndexed for GainTrackingRow {
    type Key = AntennaFeedKey;

    const TABLE_NAME: &'static str = "GainTracking";

    fn key(&self) -> AntennaFeedKey {
        AntennaFeedKey {
            antenna_id: self.antenna_id,
            spectral_window_id: self.spectral_window_id,
            feed_id: self.feed_id,
        }
    }

    fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    fn interval_mut(&mut self) -> &mut TimeInterval {
        &mut self.interval
    }

    fn equal_by_required_value(&self, other: &Self) -> bool {
        self.attenuator == other.attenuator
            && self.cable_delay == other.cable_delay
            && self.cross_polarization_delay == other.cross_polarization_delay
            && self.lo_propagation_delay == other.lo_propagation_delay
            && self.receiver_delay == other.receiver_delay
    }
}

/// A frequency offset applied to an antenna's spectral window.
#[derive(Debug, Clone, PartialEq)]
pub struct FreqOffsetRow {
    pub antenna_id: usize,
    pub spectral_window_id: usize,
    pub feed_id: usize,
    pub interval: TimeInterval,

    /// \[Hz\]
    pub offset: f64,
}

impl TimeIndexed for FreqOffsetRow {
    type Key = AntennaFeedKey;

    const TABLE_NAME: &'static str = "FreqOffset";

    fn key(&self) -> AntennaFeedKey {
        AntennaFeedKey {
            antenna_id: self.antenna_id,
            spectral_window_id: self.spectral_window_id,
            feed_id: self.feed_id,
        }
    }

    fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    fn interval_mut(&mut self) -> &mut TimeInterval {
        &mut self.interval
    }

    fn equal_by_required_value(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}
