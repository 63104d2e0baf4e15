// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Round-robin match counters, the only mutable shared state.
//!
//! Every matching rule selection bumps a counter keyed by rule identity;
//! the counter value picks the variant slot. The table lives behind one
//! mutex together with the last-reset timestamp, so the `after` comparison
//! and the counter increment each see a consistent snapshot. The registry
//! is injected into request handlers through the router state rather than
//! living in a module-level singleton.

use std::collections::HashMap;
use std::sync::Mutex;

struct CounterState {
    counts: HashMap<String, u64>,
    last_reset_ms: i64,
}

/// Process-wide match-count registry with reset support.
pub struct MatchCounters {
    inner: Mutex<CounterState>,
}

impl MatchCounters {
    /// Fresh registry; the reset timestamp starts at 0 (the epoch), so no
    /// `after` gate holds before the first reset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CounterState {
                counts: HashMap::new(),
                last_reset_ms: 0,
            }),
        }
    }

    /// Current count for the key, post-incrementing it atomically.
    pub fn next(&self, key: &str) -> u64 {
        let mut state = self.lock();
        let entry = state.counts.entry(key.to_string()).or_insert(0);
        let current = *entry;
        *entry += 1;
        current
    }

    /// Milliseconds elapsed since the most recent reset.
    pub fn millis_since_reset(&self) -> i64 {
        now_ms() - self.lock().last_reset_ms
    }

    /// Clear all counters and stamp the reset time.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.counts.clear();
        state.last_reset_ms = now_ms();
    }

    /// Counter table sorted by key, for operator dumps.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let state = self.lock();
        let mut entries: Vec<(String, u64)> = state
            .counts
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        entries.sort();
        entries
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CounterState> {
        // A poisoned lock only happens if a holder panicked; the counter
        // table is still usable, so keep serving.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Pin the reset timestamp, so tests can step through `after` windows.
    #[cfg(test)]
    pub fn set_last_reset_ms(&self, last_reset_ms: i64) {
        self.lock().last_reset_ms = last_reset_ms;
    }
}

impl Default for MatchCounters {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
