// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Calibration contexts.

A [`CalContext`] holds the solved parameters of one calibration type and
caches the Jones/Mueller matrices derived from them, per spectral window. The
cached matrices are only valid for a particular channelisation, parameter set
(i.e. solution interval) and, for time-dependent types, a particular time;
[`CalContext::check_curr_cal`] works out when they need to be rebuilt and
[`CalContext::sync`] rebuilds them.
 */

mod error;

pub use error::ContextError;

use hifitime::Epoch;
use indexmap::IndexMap;
use log::{debug, trace, warn};
use marlu::{c64, Jones};
use ndarray::prelude::*;
use vec1::Vec1;

use crate::{
    apply::ApplyDirection,
    math::{is_strictly_monotonic, nearest_index, num_baselines, AntennaBaselineMaps},
    matrix::{
        compose_jones, compose_mueller, invert_jones, invert_mueller, jones_weight_scale,
        mueller_weight_scale, set_jones_by_ok, set_mueller_by_ok, AntennaGeometry, CalType,
        CalTypeProperties, ElementKind, Mueller,
    },
    ordering::{Insertion, OrderedTable, TimeIndexed, TimeInterval},
    vis::PolBasis,
};

/// The metadata shared by all visibilities in a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaContext {
    /// The spectral window ID.
    pub spw: usize,

    /// The (centroid) time of the visibilities.
    pub time: Epoch,

    pub scan: i32,

    pub field: i32,

    /// The channel frequencies of the spectral window \[Hz\].
    pub freqs: Vec1<f64>,
}

impl MetaContext {
    pub fn num_chans(&self) -> usize {
        self.freqs.len()
    }
}

/// Solved calibration parameters for one spectral window, valid over a time
/// interval.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParameterSet {
    pub spw: usize,

    pub interval: TimeInterval,

    /// The dimensions are \[parameter\]\[channel\]\[element\], where an element
    /// is an antenna or a baseline (autos included) depending on the
    /// calibration type.
    pub params: Array3<c64>,

    /// Same shape as `params`; `false` means the parameter couldn't be solved
    /// for.
    pub params_ok: Array3<bool>,

    /// The frequencies of the parameter channels \[Hz\], if known. With
    /// these, frequency-dependent parameters are mapped onto data channels by
    /// nearest frequency.
    pub freqs: Option<Vec1<f64>>,
}

impl CalibrationParameterSet {
    pub fn new(
        spw: usize,
        interval: TimeInterval,
        params: Array3<c64>,
        params_ok: Array3<bool>,
    ) -> Result<CalibrationParameterSet, ContextError> {
        if params.shape() != params_ok.shape() {
            return Err(ContextError::OkShape {
                params: params.shape().to_vec(),
                params_ok: params_ok.shape().to_vec(),
            });
        }
        Ok(CalibrationParameterSet {
            spw,
            interval,
            params,
            params_ok,
            freqs: None,
        })
    }

    pub fn with_freqs(mut self, freqs: Vec1<f64>) -> Result<Self, ContextError> {
        if freqs.len() != self.num_chans() {
            return Err(ContextError::ParameterFreqCount {
                num_freqs: freqs.len(),
                num_chans: self.num_chans(),
            });
        }
        if !is_strictly_monotonic(&freqs) {
            return Err(ContextError::NonMonotonicParameterFreqs);
        }
        self.freqs = Some(freqs);
        Ok(self)
    }

    pub fn num_pars(&self) -> usize {
        self.params.len_of(Axis(0))
    }

    pub fn num_chans(&self) -> usize {
        self.params.len_of(Axis(1))
    }

    pub fn num_elements(&self) -> usize {
        self.params.len_of(Axis(2))
    }
}

impl TimeIndexed for CalibrationParameterSet {
    type Key = usize;
    const TABLE_NAME: &'static str = "CalibrationParameters";

    fn key(&self) -> usize {
        self.spw
    }

    fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    fn interval_mut(&mut self) -> &mut TimeInterval {
        &mut self.interval
    }

    fn equal_by_required_value(&self, other: &Self) -> bool {
        self.params == other.params && self.params_ok == other.params_ok && self.freqs == other.freqs
    }
}

/// The cached matrices of a spectral window.
#[derive(Debug)]
struct SpwCache {
    /// The channelisation the cache is shaped for.
    freqs: Vec1<f64>,

    /// The index of the parameter set the matrices were made from.
    params_index: Option<usize>,

    last_time: Option<Epoch>,

    direction: Option<ApplyDirection>,
    via_mueller: bool,

    jm_valid: bool,
    mm_valid: bool,

    /// \[matrix channel\]\[antenna\]. Matrix channels are the data channels
    /// for frequency-dependent types, otherwise there's only one.
    jones: Array2<Jones<f64>>,
    jones_ok: Array2<bool>,
    jones_weight_scale: Array2<[f64; 2]>,

    /// \[matrix channel\]\[baseline\].
    mueller: Array2<Mueller>,
    mueller_ok: Array2<bool>,
    mueller_weight_scale: Array2<[f64; 4]>,
}

impl SpwCache {
    fn new(freqs: Vec1<f64>, num_mat_chans: usize, num_antennas: usize, num_baselines: usize) -> Self {
        SpwCache {
            freqs,
            params_index: None,
            last_time: None,
            direction: None,
            via_mueller: false,
            jm_valid: false,
            mm_valid: false,
            jones: Array2::from_elem((num_mat_chans, num_antennas), Jones::identity()),
            jones_ok: Array2::from_elem((num_mat_chans, num_antennas), false),
            jones_weight_scale: Array2::from_elem((num_mat_chans, num_antennas), [1.0; 2]),
            mueller: Array2::from_elem((num_mat_chans, num_baselines), Mueller::identity()),
            mueller_ok: Array2::from_elem((num_mat_chans, num_baselines), false),
            mueller_weight_scale: Array2::from_elem((num_mat_chans, num_baselines), [1.0; 4]),
        }
    }

    fn invalidate(&mut self) {
        self.jm_valid = false;
        self.mm_valid = false;
    }
}

/// A read-only view of the synchronised matrices of a spectral window. Only
/// [`CalContext::synced`] hands these out, and only for valid caches.
#[derive(Debug)]
pub struct SyncedMatrices<'a> {
    /// Are the Mueller matrices the ones to apply? This is always the case
    /// for baseline-based types.
    pub via_mueller: bool,

    pub direction: ApplyDirection,

    /// \[matrix channel\]\[antenna\]
    pub jones: ArrayView2<'a, Jones<f64>>,
    pub jones_ok: ArrayView2<'a, bool>,

    /// \[matrix channel\]\[baseline\]
    pub mueller: ArrayView2<'a, Mueller>,
    pub mueller_ok: ArrayView2<'a, bool>,

    jones_weight_scale: ArrayView2<'a, [f64; 2]>,
    mueller_weight_scale: ArrayView2<'a, [f64; 4]>,
    maps: &'a AntennaBaselineMaps,

    /// Are the Mueller matrices built from per-antenna Jones matrices?
    antenna_based: bool,
}

impl<'a> SyncedMatrices<'a> {
    /// The matrix channel to use for a data channel.
    #[inline]
    pub fn mat_chan(&self, i_chan: usize) -> usize {
        if self.jones.len_of(Axis(0)) == 1 {
            0
        } else {
            i_chan
        }
    }

    /// The cache index of the baseline between two antennas.
    pub fn baseline(&self, ant1: usize, ant2: usize) -> Option<usize> {
        self.maps.baseline(ant1, ant2)
    }

    /// The Mueller matrix to apply to a row with antennas `ant1` and `ant2`,
    /// and whether it's ok. The cache holds one matrix per baseline with the
    /// lower antenna first; for antenna-based types, rows stored the other
    /// way around get `J(ant1) (x) conj(J(ant2))` composed here.
    pub fn row_mueller(&self, i_mat_chan: usize, ant1: usize, ant2: usize) -> (Mueller, bool) {
        if self.antenna_based && ant1 > ant2 {
            let ok = self.jones_ok.get((i_mat_chan, ant1)).copied().unwrap_or(false)
                && self.jones_ok.get((i_mat_chan, ant2)).copied().unwrap_or(false);
            if !ok {
                return (Mueller::identity(), false);
            }
            let mueller = Mueller::from_jones_pair(
                &self.jones[(i_mat_chan, ant1)],
                &self.jones[(i_mat_chan, ant2)],
            );
            return (mueller, true);
        }
        match self.baseline(ant1, ant2) {
            Some(i_bl) => (
                self.mueller[(i_mat_chan, i_bl)],
                self.mueller_ok[(i_mat_chan, i_bl)],
            ),
            None => (Mueller::identity(), false),
        }
    }

    /// The weight-scale factors (from the forward, corrupting matrices) of a
    /// row's baseline, one per correlation in matrix order. Correlations of
    /// the same hand use the first and last entries.
    pub fn baseline_weight_scale(&self, i_mat_chan: usize, ant1: usize, ant2: usize) -> Option<[f64; 4]> {
        // Antenna-based scales are built in row order, so the cross hands
        // match the row's antennas.
        if self.via_mueller && !self.antenna_based {
            let bl = self.baseline(ant1, ant2)?;
            self.mueller_weight_scale.get((i_mat_chan, bl)).copied()
        } else {
            let w1 = self.jones_weight_scale.get((i_mat_chan, ant1))?;
            let w2 = self.jones_weight_scale.get((i_mat_chan, ant2))?;
            Some([w1[0] * w2[0], w1[0] * w2[1], w1[1] * w2[0], w1[1] * w2[1]])
        }
    }

    /// The per-spectral-window weight-scale matrix. For antenna-based types,
    /// this is \[polarisation\]\[antenna\], otherwise \[correlation\]\[baseline\].
    /// Values are averaged over the matrix channels with ok matrices; elements
    /// without any are 1.
    pub fn weight_scale(&self) -> Array2<f64> {
        fn mean_over_ok<const N: usize>(
            ws: ArrayView2<[f64; N]>,
            ok: ArrayView2<bool>,
        ) -> Array2<f64> {
            let num_elements = ws.len_of(Axis(1));
            let mut out = Array2::ones((N, num_elements));
            for (i_elem, (ws, ok)) in ws.axis_iter(Axis(1)).zip(ok.axis_iter(Axis(1))).enumerate() {
                let mut sum = [0.0; N];
                let mut count = 0;
                for (ws, _) in ws.iter().zip(ok.iter()).filter(|&(_, &ok)| ok) {
                    for (s, w) in sum.iter_mut().zip(ws.iter()) {
                        *s += w;
                    }
                    count += 1;
                }
                if count > 0 {
                    for (i, s) in sum.into_iter().enumerate() {
                        out[(i, i_elem)] = s / count as f64;
                    }
                }
            }
            out
        }

        if self.via_mueller && !self.antenna_based {
            mean_over_ok(self.mueller_weight_scale, self.mueller_ok)
        } else {
            mean_over_ok(self.jones_weight_scale, self.jones_ok)
        }
    }
}

/// The parameters and matrix caches of a calibration type.
#[derive(Debug)]
pub struct CalContext {
    cal_type: CalType,
    props: CalTypeProperties,
    num_antennas: usize,
    maps: AntennaBaselineMaps,
    parameters: OrderedTable<CalibrationParameterSet>,
    caches: IndexMap<usize, SpwCache>,
}

impl CalContext {
    pub fn new(cal_type: CalType, num_antennas: usize) -> CalContext {
        CalContext {
            cal_type,
            props: cal_type.properties(),
            num_antennas,
            maps: AntennaBaselineMaps::new(num_antennas),
            parameters: OrderedTable::new(),
            caches: IndexMap::new(),
        }
    }

    pub fn cal_type(&self) -> CalType {
        self.cal_type
    }

    pub fn num_antennas(&self) -> usize {
        self.num_antennas
    }

    /// The number of calibration elements; antennas or baselines (including
    /// autos).
    pub fn num_elements(&self) -> usize {
        match self.props.element {
            ElementKind::Antenna => self.num_antennas,
            ElementKind::Baseline => num_baselines(self.num_antennas),
        }
    }

    pub fn parameters(&self) -> &OrderedTable<CalibrationParameterSet> {
        &self.parameters
    }

    /// Add newly-solved parameters. The matrices of the parameter set's
    /// spectral window are invalidated, unless the parameters were already
    /// present.
    pub fn add_parameters(
        &mut self,
        set: CalibrationParameterSet,
    ) -> Result<Insertion, ContextError> {
        let expected_chans = if self.props.freq_dep_par {
            set.num_chans()
        } else {
            1
        };
        if !self.props.freq_dep_par && set.num_chans() != 1 {
            return Err(ContextError::NotFreqDependent {
                cal_type: self.cal_type,
                num_chans: set.num_chans(),
            });
        }
        let expected = [self.props.n_par, expected_chans, self.num_elements()];
        if set.params.shape() != expected {
            return Err(ContextError::ParameterShape {
                cal_type: self.cal_type,
                expected: expected.to_vec(),
                got: set.params.shape().to_vec(),
            });
        }

        let spw = set.spw;
        let insertion = self.parameters.insert_by_start_time(set)?;
        if let Insertion::Inserted(_) = insertion {
            self.invalidate(spw);
        }
        Ok(insertion)
    }

    /// Work out whether the cached matrices of the metadata's spectral window
    /// are still usable, invalidating them if not. Returns whether
    /// invalidation happened.
    pub fn check_curr_cal(&mut self, meta: &MetaContext) -> bool {
        let cal_type = self.cal_type;
        let params_index = self.parameters.get_index_by_key(&meta.spw, meta.time);
        let num_mat_chans = self.num_mat_chans(meta.num_chans());
        let num_antennas = self.num_antennas;
        let num_baselines = self.maps.baseline_to_antenna_map.len();

        let cache = self.caches.entry(meta.spw).or_insert_with(|| {
            trace!("Allocating a {cal_type} matrix cache for spw {}", meta.spw);
            SpwCache::new(meta.freqs.clone(), num_mat_chans, num_antennas, num_baselines)
        });

        let mut invalidate = false;
        if cache.freqs != meta.freqs {
            debug!(
                "Spw {} changed channelisation ({} -> {} channels); reallocating {cal_type} matrices",
                meta.spw,
                cache.freqs.len(),
                meta.num_chans(),
            );
            *cache = SpwCache::new(meta.freqs.clone(), num_mat_chans, num_antennas, num_baselines);
            invalidate = true;
        }
        if cache.params_index != params_index {
            debug!(
                "New {cal_type} parameter set for spw {} at GPS {}",
                meta.spw,
                meta.time.to_gpst_seconds()
            );
            cache.params_index = params_index;
            invalidate = true;
        }
        if self.props.time_dep_mat && cache.last_time != Some(meta.time) {
            invalidate = true;
        }
        cache.last_time = Some(meta.time);

        if invalidate {
            cache.invalidate();
        }
        invalidate
    }

    /// Invalidate the matrices of a spectral window.
    pub fn invalidate(&mut self, spw: usize) {
        if let Some(cache) = self.caches.get_mut(&spw) {
            trace!("Invalidating {} matrices of spw {spw}", self.cal_type);
            cache.invalidate();
        }
    }

    /// Are the matrices of the spectral window ready to be applied?
    pub fn is_valid(&self, spw: usize) -> bool {
        self.caches.get(&spw).map(|c| self.cache_ready(c)).unwrap_or(false)
    }

    fn cache_ready(&self, cache: &SpwCache) -> bool {
        match self.props.element {
            ElementKind::Antenna if cache.via_mueller => cache.jm_valid && cache.mm_valid,
            ElementKind::Antenna => cache.jm_valid,
            ElementKind::Baseline => cache.mm_valid,
        }
    }

    fn num_mat_chans(&self, num_data_chans: usize) -> usize {
        if self.props.freq_dep_par {
            num_data_chans
        } else {
            1
        }
    }

    /// Bring the matrices of the metadata's spectral window up to date.
    /// `geometry` is only needed (one per antenna) by types whose matrices
    /// depend on it. When correcting, the cached matrices are the inverses of
    /// the parameters' matrices. Antenna-based matrices are also combined
    /// into per-baseline Mueller matrices when `via_mueller` is set.
    pub fn sync(
        &mut self,
        meta: &MetaContext,
        geometry: &[AntennaGeometry],
        basis: PolBasis,
        direction: ApplyDirection,
        via_mueller: bool,
    ) -> Result<(), ContextError> {
        let needs_geometry = self.props.par_from_geometry || self.cal_type == CalType::TOpac;
        if needs_geometry && geometry.len() != self.num_antennas {
            return Err(ContextError::GeometryCount {
                cal_type: self.cal_type,
                expected: self.num_antennas,
                got: geometry.len(),
            });
        }

        self.check_curr_cal(meta);

        let CalContext {
            cal_type,
            props,
            num_antennas,
            maps,
            parameters,
            caches,
        } = self;
        let cal_type = *cal_type;
        let via_mueller = via_mueller || props.element == ElementKind::Baseline;
        let cache = match caches.get_mut(&meta.spw) {
            Some(c) => c,
            // check_curr_cal always allocates.
            None => return Ok(()),
        };

        if cache.direction != Some(direction) || cache.via_mueller != via_mueller {
            cache.direction = Some(direction);
            cache.via_mueller = via_mueller;
            cache.invalidate();
        }

        let set = cache.params_index.and_then(|i| parameters.get(i));
        if set.is_none() && !props.par_from_geometry && !(cache.jm_valid || cache.mm_valid) {
            warn!(
                "No {cal_type} calibration parameters for spw {} at GPS {}; the data will be flagged",
                meta.spw,
                meta.time.to_gpst_seconds()
            );
        }
        let chan_map = match set {
            Some(set) => par_chan_map(*props, set, &meta.freqs)?,
            None => (0..cache.jones.len_of(Axis(0))).collect(),
        };

        match props.element {
            ElementKind::Antenna => {
                if !cache.jm_valid {
                    sync_jones(cal_type, set, &chan_map, geometry, basis, *num_antennas, cache)?;
                    debug!("Synced {cal_type} Jones matrices for spw {}", meta.spw);
                }
                if via_mueller && !cache.mm_valid {
                    mueller_from_jones(maps, cache);
                }
            }
            ElementKind::Baseline => {
                if !cache.mm_valid {
                    sync_mueller(cal_type, set, &chan_map, cache)?;
                    debug!("Synced {cal_type} Mueller matrices for spw {}", meta.spw);
                }
            }
        }
        Ok(())
    }

    /// Get the matrices of a spectral window, but only if they're valid.
    pub fn synced(&self, spw: usize) -> Option<SyncedMatrices> {
        let cache = self.caches.get(&spw)?;
        if !self.cache_ready(cache) {
            return None;
        }
        Some(SyncedMatrices {
            via_mueller: cache.via_mueller,
            direction: cache.direction?,
            jones: cache.jones.view(),
            jones_ok: cache.jones_ok.view(),
            mueller: cache.mueller.view(),
            mueller_ok: cache.mueller_ok.view(),
            jones_weight_scale: cache.jones_weight_scale.view(),
            mueller_weight_scale: cache.mueller_weight_scale.view(),
            maps: &self.maps,
            antenna_based: self.props.element == ElementKind::Antenna,
        })
    }
}

/// For each matrix channel, the parameter channel to use.
fn par_chan_map(
    props: CalTypeProperties,
    set: &CalibrationParameterSet,
    data_freqs: &Vec1<f64>,
) -> Result<Vec<usize>, ContextError> {
    if !props.freq_dep_par {
        return Ok(vec![0]);
    }
    match set.freqs.as_ref() {
        Some(par_freqs) => Ok(data_freqs
            .iter()
            .map(|&f| nearest_index(par_freqs, f))
            .collect()),
        None if set.num_chans() == data_freqs.len() => Ok((0..set.num_chans()).collect()),
        None => Err(ContextError::ChannelMismatch {
            par_chans: set.num_chans(),
            data_chans: data_freqs.len(),
        }),
    }
}

fn sync_jones(
    cal_type: CalType,
    set: Option<&CalibrationParameterSet>,
    chan_map: &[usize],
    geometry: &[AntennaGeometry],
    basis: PolBasis,
    num_antennas: usize,
    cache: &mut SpwCache,
) -> Result<(), ContextError> {
    let props = cal_type.properties();
    let direction = cache.direction.unwrap_or(ApplyDirection::Correct);
    let no_params = Array1::<c64>::zeros(0);
    let no_params_ok = Array1::<bool>::default(0);

    for (i_mat_chan, &i_par_chan) in chan_map.iter().enumerate() {
        for i_ant in 0..num_antennas {
            let geom = geometry.get(i_ant).copied().unwrap_or_default();
            let (mut jones, elem_ok) = match set {
                Some(set) => compose_jones(
                    cal_type,
                    set.params.slice(s![.., i_par_chan, i_ant]),
                    set.params_ok.slice(s![.., i_par_chan, i_ant]),
                    &geom,
                    basis,
                )?,
                None if props.par_from_geometry => {
                    compose_jones(cal_type, no_params.view(), no_params_ok.view(), &geom, basis)?
                }
                None => (Jones::identity(), [false; 4]),
            };
            let ok = set_jones_by_ok(&mut jones, &elem_ok);
            cache.jones_weight_scale[(i_mat_chan, i_ant)] = if ok {
                jones_weight_scale(&jones)
            } else {
                [1.0; 2]
            };

            let (jones, ok) = match direction {
                ApplyDirection::Correct => invert_jones(&jones, ok),
                ApplyDirection::Corrupt => (jones, ok),
            };
            cache.jones[(i_mat_chan, i_ant)] = jones;
            cache.jones_ok[(i_mat_chan, i_ant)] = ok;
        }
    }
    cache.jm_valid = true;
    cache.mm_valid = false;
    Ok(())
}

fn sync_mueller(
    cal_type: CalType,
    set: Option<&CalibrationParameterSet>,
    chan_map: &[usize],
    cache: &mut SpwCache,
) -> Result<(), ContextError> {
    let direction = cache.direction.unwrap_or(ApplyDirection::Correct);
    let num_baselines = cache.mueller.len_of(Axis(1));

    for (i_mat_chan, &i_par_chan) in chan_map.iter().enumerate() {
        for i_bl in 0..num_baselines {
            let (mut mueller, elem_ok) = match set {
                Some(set) => compose_mueller(
                    cal_type,
                    set.params.slice(s![.., i_par_chan, i_bl]),
                    set.params_ok.slice(s![.., i_par_chan, i_bl]),
                )?,
                None => (Mueller::identity(), [false; 16]),
            };
            let ok = set_mueller_by_ok(&mut mueller, &elem_ok);
            cache.mueller_weight_scale[(i_mat_chan, i_bl)] = if ok {
                mueller_weight_scale(&mueller)
            } else {
                [1.0; 4]
            };

            let (mueller, ok) = match direction {
                ApplyDirection::Correct => invert_mueller(&mueller, ok),
                ApplyDirection::Corrupt => (mueller, ok),
            };
            cache.mueller[(i_mat_chan, i_bl)] = mueller;
            cache.mueller_ok[(i_mat_chan, i_bl)] = ok;
        }
    }
    cache.mm_valid = true;
    Ok(())
}

/// Combine the (already synced, possibly inverted) Jones matrices of each
/// baseline's antennas into Mueller matrices.
fn mueller_from_jones(maps: &AntennaBaselineMaps, cache: &mut SpwCache) {
    let num_mat_chans = cache.jones.len_of(Axis(0));
    for i_mat_chan in 0..num_mat_chans {
        for (i_bl, &(ant1, ant2)) in maps.baseline_to_antenna_map.iter().enumerate() {
            let ok = cache.jones_ok[(i_mat_chan, ant1)] && cache.jones_ok[(i_mat_chan, ant2)];
            let (mueller, ws) = if ok {
                let w1 = cache.jones_weight_scale[(i_mat_chan, ant1)];
                let w2 = cache.jones_weight_scale[(i_mat_chan, ant2)];
                (
                    Mueller::from_jones_pair(
                        &cache.jones[(i_mat_chan, ant1)],
                        &cache.jones[(i_mat_chan, ant2)],
                    ),
                    [w1[0] * w2[0], w1[0] * w2[1], w1[1] * w2[0], w1[1] * w2[1]],
                )
            } else {
                (Mueller::identity(), [1.0; 4])
            };
            cache.mueller[(i_mat_chan, i_bl)] = mueller;
            cache.mueller_ok[(i_mat_chan, i_bl)] = ok;
            cache.mueller_weight_scale[(i_mat_chan, i_bl)] = ws;
        }
    }
    cache.mm_valid = true;
}
