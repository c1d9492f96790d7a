// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Time-indexed records, grouped by a non-temporal context key (e.g. antenna,
//! spectral window and feed) and kept in ascending start-time order within each
//! context.
//!
//! Records are owned by an [`OrderedTable`]; each context holds indices into
//! the table's rows. Inserting a record infers the validity durations of its
//! neighbours so that consecutive records neither overlap nor leave gaps.

mod error;
mod records;

pub use error::OrderingError;
pub use records::{AntennaFeedKey, FreqOffsetRow, GainTrackingRow};

use std::fmt::Debug;
use std::hash::Hash;

use hifitime::{Duration, Epoch};
use indexmap::IndexMap;
use log::trace;

/// A start time and a validity duration. A `None` duration is open-ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    pub start: Epoch,
    pub duration: Option<Duration>,
}

impl TimeInterval {
    pub fn new(start: Epoch, duration: Duration) -> TimeInterval {
        TimeInterval {
            start,
            duration: Some(duration),
        }
    }

    /// An interval starting at `start` that never ends.
    pub fn open_ended(start: Epoch) -> TimeInterval {
        TimeInterval {
            start,
            duration: None,
        }
    }

    /// The (exclusive) end of the interval, if it has one.
    pub fn end(&self) -> Option<Epoch> {
        self.duration.map(|d| self.start + d)
    }

    /// Is `t` within `[start, start + duration)`?
    pub fn contains(&self, t: Epoch) -> bool {
        t >= self.start && self.end().map_or(true, |end| t < end)
    }
}

/// A record that can live in an [`OrderedTable`].
pub trait TimeIndexed {
    /// The non-temporal part of the record's key.
    type Key: Clone + Debug + Eq + Hash;

    /// A name for this kind of record, used in errors.
    const TABLE_NAME: &'static str;

    fn key(&self) -> Self::Key;

    fn interval(&self) -> &TimeInterval;

    fn interval_mut(&mut self) -> &mut TimeInterval;

    /// Are the required (non-key) values of both records the same?
    fn equal_by_required_value(&self, other: &Self) -> bool;
}

/// What happened to a record given to [`OrderedTable::insert_by_start_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The record was added to the table at this row index.
    Inserted(usize),

    /// An identical record already starts at the same time; the table is
    /// unchanged and this is the existing record's row index.
    Existing(usize),
}

impl Insertion {
    pub fn index(self) -> usize {
        match self {
            Insertion::Inserted(i) | Insertion::Existing(i) => i,
        }
    }
}

/// Owns time-indexed records. Each context key maps to row indices that are
/// ordered by ascending start time.
#[derive(Debug, Clone)]
pub struct OrderedTable<R: TimeIndexed> {
    rows: Vec<R>,
    context: IndexMap<R::Key, Vec<usize>>,
}

impl<R: TimeIndexed> Default for OrderedTable<R> {
    fn default() -> Self {
        Self {
            rows: vec![],
            context: IndexMap::new(),
        }
    }
}

impl<R: TimeIndexed> OrderedTable<R> {
    pub fn new() -> OrderedTable<R> {
        Self::default()
    }

    /// The total number of records over all contexts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_contexts(&self) -> usize {
        self.context.len()
    }

    /// All records, in the order they were added.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.rows.get(index)
    }

    /// Insert a record so that its context stays ordered by ascending start
    /// time.
    ///
    /// If the record starts after every other record in its context, it is
    /// appended and the previous last record's duration is cut to end exactly
    /// where the new one starts (only if they would otherwise overlap). If it
    /// starts before every other record, it is prepended, and its own duration
    /// is cut if it would overlap the old first record. Otherwise the insertion
    /// point is found by dichotomy and both neighbouring durations are split at
    /// the new start time.
    ///
    /// A record starting at exactly the same time as an existing one is either
    /// the same record (the table is untouched and [`Insertion::Existing`] is
    /// returned) or a conflict ([`OrderingError::DuplicateKey`]).
    pub fn insert_by_start_time(&mut self, mut row: R) -> Result<Insertion, OrderingError> {
        let key = row.key();
        let start = row.interval().start;
        let new_index = self.rows.len();
        let rows = &mut self.rows;
        let order = self.context.entry(key.clone()).or_default();

        if order.is_empty() {
            trace!("{}: new context {key:?}", R::TABLE_NAME);
            order.push(new_index);
            rows.push(row);
            return Ok(Insertion::Inserted(new_index));
        }
        let first = order[0];
        let last = order[order.len() - 1];

        // Ascending insertion.
        let last_interval = *rows[last].interval();
        if start > last_interval.start {
            if last_interval.end().map_or(true, |end| start < end) {
                rows[last].interval_mut().duration = Some(start - last_interval.start);
            }
            order.push(new_index);
            rows.push(row);
            return Ok(Insertion::Inserted(new_index));
        }

        // Descending insertion.
        let first_start = rows[first].interval().start;
        if start < first_start {
            if row.interval().end().map_or(true, |end| first_start < end) {
                row.interval_mut().duration = Some(first_start - start);
            }
            order.insert(0, new_index);
            rows.push(row);
            return Ok(Insertion::Inserted(new_index));
        }

        // Dichotomy. Check both ends of the window for an equal start time
        // before narrowing it.
        let mut k0 = 0;
        let mut k1 = order.len() - 1;
        loop {
            for k in [k0, k1] {
                let existing = order[k];
                if rows[existing].interval().start == start {
                    return if rows[existing].equal_by_required_value(&row) {
                        Ok(Insertion::Existing(existing))
                    } else {
                        Err(OrderingError::DuplicateKey {
                            table: R::TABLE_NAME,
                            context: format!("{key:?}"),
                            start,
                        })
                    };
                }
            }
            if k1 <= k0 + 1 {
                break;
            }

            let mid = (k0 + k1) / 2;
            if start <= rows[order[mid]].interval().start {
                k1 = mid;
            } else {
                k0 = mid;
            }
        }

        let prev = order[k0];
        let prev_start = rows[prev].interval().start;
        let next_start = rows[order[k1]].interval().start;
        rows[prev].interval_mut().duration = Some(start - prev_start);
        row.interval_mut().duration = Some(next_start - start);
        order.insert(k1, new_index);
        rows.push(row);
        Ok(Insertion::Inserted(new_index))
    }

    /// Get the records of a context, ordered by ascending start time.
    pub fn get_by_context(&self, key: &R::Key) -> Option<impl Iterator<Item = &R> + '_> {
        self.context
            .get(key)
            .map(|order| order.iter().map(|&i| &self.rows[i]))
    }

    /// Find the record of a context whose validity interval contains `time`.
    /// Not finding one is not an error.
    pub fn get_row_by_key(&self, key: &R::Key, time: Epoch) -> Option<&R> {
        self.get_index_by_key(key, time).map(|i| &self.rows[i])
    }

    /// Like [`OrderedTable::get_row_by_key`], but get the row's index.
    pub fn get_index_by_key(&self, key: &R::Key, time: Epoch) -> Option<usize> {
        let order = self.context.get(key)?;
        let interval = |k: usize| self.rows[order[k]].interval();

        match order.len() {
            0 => return None,
            1 => return Some(order[0]).filter(|_| interval(0).contains(time)),
            _ => (),
        }

        // Quick misses before and after the whole context.
        if let Some(end) = interval(order.len() - 1).end() {
            if time >= end {
                return None;
            }
        }
        if time < interval(0).start {
            return None;
        }

        let mut k0 = 0;
        let mut k1 = order.len() - 1;
        while k0 != k1 {
            if interval(k0).contains(time) {
                return Some(order[k0]);
            }
            if interval(k1).contains(time) {
                return Some(order[k1]);
            }
            // Consecutive rows, and neither contains the time; a gap.
            if k1 == k0 + 1 {
                return None;
            }

            let mid = (k0 + k1) / 2;
            if time <= interval(mid).start {
                k1 = mid;
            } else {
                k0 = mid;
            }
        }
        None
    }
}
