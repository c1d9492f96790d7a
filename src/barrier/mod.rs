// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
A computed-once-per-key result shared between a fixed number of consumers.

When several threads work on the same buffer and all need the same expensive
intermediate result (e.g. something that depends only on the timestamp), the
first thread to ask computes it while the others wait. Once every consumer
has taken the result, the slot is cleared for the next key.
 */


use std::fmt::{self, Debug};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use log::trace;
use scopeguard::defer_on_unwind;

struct Slot<K, T> {
    key: Option<K>,
    value: Option<Arc<T>>,
    computing: bool,
    num_taken: usize,
}

impl<K, T> Slot<K, T> {
    fn clear(&mut self) {
        self.key = None;
        self.value = None;
        self.computing = false;
        self.num_taken = 0;
    }
}

/// A result of type `T`, computed at most once per key `K` and shared by
/// `num_consumers` consumers. See the module documentation.
pub struct SharedComputation<K, T> {
    num_consumers: usize,
    slot: Mutex<Slot<K, T>>,
    changed: Condvar,
}

impl<K: Debug, T> Debug for SharedComputation<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SharedComputation")
            .field("num_consumers", &self.num_consumers)
            .field("key", &slot.key)
            .field("computing", &slot.computing)
            .field("num_taken", &slot.num_taken)
            .finish()
    }
}

impl<K: PartialEq + Clone, T> SharedComputation<K, T> {
    /// A barrier for `num_consumers` consumers (at least 1). Every consumer
    /// must ask for every key exactly once; a consumer asking for a new key
    /// blocks until the previous key's result has been taken by all
    /// consumers, or until [`SharedComputation::reset`] is called.
    pub fn new(num_consumers: usize) -> SharedComputation<K, T> {
        SharedComputation {
            num_consumers: num_consumers.max(1),
            slot: Mutex::new(Slot {
                key: None,
                value: None,
                computing: false,
                num_taken: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn num_consumers(&self) -> usize {
        self.num_consumers
    }

    // A panicking computation is cleaned up by `abandon`, so the slot is
    // still consistent if the lock was poisoned.
    fn lock(&self) -> MutexGuard<Slot<K, T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the result for `key`, computing it with `compute` if no other
    /// consumer has done so.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Arc<T>
    where
        F: FnOnce(&K) -> T,
    {
        let mut slot = self.lock();
        loop {
            let same_key = slot.key.as_ref() == Some(&key);
            if same_key {
                if let Some(value) = slot.value.clone() {
                    self.take(&mut slot);
                    return value;
                }
            }
            // Wait if somebody is computing, or another key's result hasn't
            // been taken by everyone yet.
            if !slot.computing && (slot.key.is_none() || same_key) {
                break;
            }
            slot = self
                .changed
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }

        slot.key = Some(key.clone());
        slot.value = None;
        slot.computing = true;
        slot.num_taken = 0;
        drop(slot);

        let value = {
            defer_on_unwind! { self.abandon(); }
            Arc::new(compute(&key))
        };

        let mut slot = self.lock();
        slot.computing = false;
        slot.value = Some(Arc::clone(&value));
        self.take(&mut slot);
        drop(slot);
        self.changed.notify_all();
        value
    }

    /// Record that a consumer has taken the result, clearing the slot once
    /// they all have.
    fn take(&self, slot: &mut Slot<K, T>) {
        slot.num_taken += 1;
        if slot.num_taken >= self.num_consumers {
            trace!("All {} consumers have the shared result", self.num_consumers);
            slot.clear();
            self.changed.notify_all();
        }
    }

    fn abandon(&self) {
        self.lock().clear();
        self.changed.notify_all();
    }

    /// Forget any result, even if not every consumer has taken it. A
    /// computation in progress is left alone.
    pub fn reset(&self) {
        let mut slot = self.lock();
        if !slot.computing {
            slot.clear();
        }
        drop(slot);
        self.changed.notify_all();
    }

    /// The key of the result currently held or being computed.
    pub fn current_key(&self) -> Option<K> {
        self.lock().key.clone()
    }
}
