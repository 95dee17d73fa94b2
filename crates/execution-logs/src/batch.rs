// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size-bounded groups of entries delivered in a single collector call.
//!
//! A batch is filled while it is the dispatcher's active batch, sealed when
//! the dispatcher rotates away from it, and delivered exactly once by the
//! report worker. Two one-shot signals describe its progress:
//!
//! - `ready` fires when the first entry is appended, telling the worker there
//!   is something to report.
//! - `done` fires once the delivery attempt finished, whatever its outcome,
//!   or immediately when the batch is still empty at delivery time.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::collector::Collector;
use crate::constants;
use crate::entry::Entry;
use crate::errors::DeliveryError;

/// One-time event observable by any number of waiters.
#[derive(Clone, Debug)]
pub struct Signal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Signal { tx: Arc::new(tx) }
    }

    /// Fires the signal. Returns `false` if it had already fired.
    pub(crate) fn fire(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired, immediately if it already did.
    pub async fn fired(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once fired.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

/// Rotation limits of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits {
            max_entries: constants::MAX_BATCH_ENTRIES,
            max_bytes: constants::MAX_BATCH_BYTES,
        }
    }
}

#[derive(Debug, Default)]
struct Contents {
    entries: Vec<Entry>,
    length: usize,
    sealed: bool,
}

/// Handle a writer uses to learn that the batch holding its entry finished
/// its delivery attempt.
#[derive(Clone, Debug)]
pub struct Completion {
    ready: Signal,
    done: Signal,
}

impl Completion {
    pub async fn wait(self) {
        self.ready.fired().await;
        self.done.fired().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_fired()
    }
}

#[derive(Debug)]
pub struct Batch {
    id: u64,
    contents: Mutex<Contents>,
    ready: Signal,
    done: Signal,
}

impl Batch {
    pub fn new(id: u64) -> Self {
        Batch {
            id,
            contents: Mutex::new(Contents::default()),
            ready: Signal::new(),
            done: Signal::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ready(&self) -> &Signal {
        &self.ready
    }

    pub fn done(&self) -> &Signal {
        &self.done
    }

    pub fn completion(&self) -> Completion {
        Completion {
            ready: self.ready.clone(),
            done: self.done.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether appending `entry` must be preceded by a rotation. An empty
    /// batch always accepts the entry, however large it is.
    pub fn should_rotate_before(&self, entry: &Entry, limits: &BatchLimits) -> bool {
        let contents = self.lock();
        !contents.entries.is_empty()
            && (contents.entries.len() + 1 > limits.max_entries
                || contents.length + entry.len() > limits.max_bytes)
    }

    /// Appends an entry. Only the dispatcher calls this, while holding its
    /// guard and while this is the active batch.
    pub(crate) fn append(&self, entry: Entry) {
        let mut contents = self.lock();
        debug_assert!(!contents.sealed, "append to sealed batch {}", self.id);
        if contents.entries.is_empty() {
            self.ready.fire();
        }
        contents.length += entry.len();
        contents.entries.push(entry);
    }

    /// Sends the batch to the collector, at most once. `done` fires after the
    /// attempt regardless of its outcome.
    pub async fn deliver_once(
        &self,
        collector: &dyn Collector,
        deadline: Duration,
    ) -> Result<(), DeliveryError> {
        let entries = {
            let mut contents = self.lock();
            contents.sealed = true;
            std::mem::take(&mut contents.entries)
        };

        if entries.is_empty() {
            debug!("LOGS | Batch {} is empty, skipping delivery", self.id);
            self.done.fire();
            return Ok(());
        }

        let result = collector.deliver(&entries, deadline).await;
        self.done.fire();
        result
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, Contents> {
        self.contents.lock().expect("lock poisoned")
    }
}
