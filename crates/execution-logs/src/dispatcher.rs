// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Owner of the active batch and of the background report worker.
//!
//! ```text
//!   writers ──submit──> active batch ──rotate──> report queue (bounded)
//!                                                     │
//!                                                     v
//!                                              report worker ──> collector
//! ```
//!
//! Writers append under a short guard that never spans an await. When the
//! active batch would overflow, it is sealed and a fresh batch is queued in
//! its place. The worker takes batches strictly in creation order, waits for
//! each to receive content, seals it if writers are still filling it, and
//! delivers it. A failed delivery ends the process through
//! [`fatal::kill_instance`].

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, OwnedPermit};
use tracing::{debug, debug_span, error, warn, Instrument};

use crate::batch::{Batch, BatchLimits, Completion};
use crate::collector::{Collector, HttpCollector};
use crate::config::Config;
use crate::constants;
use crate::entry::Entry;
use crate::errors::{ConfigError, DispatchError};
use crate::fatal::{self, ProcessTerminator, Terminator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    pub limits: BatchLimits,
    pub queue_capacity: usize,
    pub delivery_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        DispatcherSettings {
            limits: BatchLimits::default(),
            queue_capacity: constants::REPORT_QUEUE_CAPACITY,
            delivery_timeout: constants::MIN_DELIVERY_TIMEOUT,
        }
    }
}

impl From<&Config> for DispatcherSettings {
    fn from(config: &Config) -> Self {
        DispatcherSettings {
            limits: config.limits,
            queue_capacity: constants::REPORT_QUEUE_CAPACITY,
            delivery_timeout: config.delivery_timeout(),
        }
    }
}

/// Result of handing an entry to the dispatcher.
#[derive(Debug)]
pub enum Submission {
    /// The entry sits in a batch; the completion resolves once that batch
    /// finished its delivery attempt.
    Queued(Completion),
    /// No asynchronous path exists; the entry is handed back for local output.
    Local(Entry),
}

struct State {
    current: Arc<Batch>,
    next_id: u64,
}

impl State {
    /// Creates a batch and installs it as the active one.
    fn start_new_batch(&mut self) -> Arc<Batch> {
        let batch = Arc::new(Batch::new(self.next_id));
        self.next_id += 1;
        self.current = Arc::clone(&batch);
        batch
    }
}

struct Shared {
    state: Mutex<State>,
    queue_tx: mpsc::Sender<Arc<Batch>>,
    limits: BatchLimits,
}

impl Shared {
    #[allow(clippy::expect_used)]
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("lock poisoned")
    }

    /// Appends under the guard, rotating first when needed. Hands the entry
    /// back when a rotation is needed and the queue has no free slot, so the
    /// caller can wait for one without holding the guard.
    fn try_append(
        &self,
        entry: Entry,
        permit: Option<OwnedPermit<Arc<Batch>>>,
    ) -> Result<Completion, Entry> {
        let mut state = self.lock_state();

        if state.current.should_rotate_before(&entry, &self.limits) {
            let permit = match permit {
                Some(permit) => permit,
                None => match self.queue_tx.clone().try_reserve_owned() {
                    Ok(permit) => permit,
                    Err(_) => return Err(entry),
                },
            };
            let batch = state.start_new_batch();
            debug!("LOGS | Rotated to batch {}", batch.id());
            permit.send(batch);
        }

        state.current.append(entry);
        Ok(state.current.completion())
    }

    /// Seals `batch` if writers are still filling it. The replacement is
    /// returned instead of queued: `batch` being active means nothing newer
    /// exists, so the replacement is the next batch in creation order.
    fn seal_if_current(&self, batch: &Arc<Batch>) -> Option<Arc<Batch>> {
        let mut state = self.lock_state();
        if Arc::ptr_eq(&state.current, batch) {
            Some(state.start_new_batch())
        } else {
            None
        }
    }
}

struct ReportWorker {
    shared: Arc<Shared>,
    rx: mpsc::Receiver<Arc<Batch>>,
    collector: Arc<dyn Collector>,
    terminator: Arc<dyn Terminator>,
    delivery_timeout: Duration,
}

impl ReportWorker {
    /// Processes batches in creation order, starting with `first`. Runs for
    /// the lifetime of the process unless a delivery fails.
    async fn run(mut self, first: Arc<Batch>) {
        debug!("LOGS | Report worker started");
        let mut handed_over = Some(first);

        loop {
            let batch = match handed_over.take() {
                Some(batch) => batch,
                // `shared` holds a sender, so the queue stays open for as
                // long as the worker runs.
                None => match self.rx.recv().await {
                    Some(batch) => batch,
                    None => return,
                },
            };

            batch.ready().fired().await;
            handed_over = self.shared.seal_if_current(&batch);

            let count = batch.len();
            let time = Instant::now();
            match batch
                .deliver_once(self.collector.as_ref(), self.delivery_timeout)
                .await
            {
                Ok(()) => debug!(
                    "LOGS | Delivered batch {} with {count} entries in {} ms",
                    batch.id(),
                    time.elapsed().as_millis()
                ),
                Err(e) => {
                    error!("LOGS | Failed to deliver batch {}: {e}", batch.id());
                    fatal::kill_instance(self.collector.as_ref(), self.terminator.as_ref()).await;
                    return;
                }
            }
        }
    }
}

/// Process-wide batching pipeline. Construct it once and share it between
/// sinks; it starts its worker lazily, exactly once, on first use.
pub struct Dispatcher {
    settings: DispatcherSettings,
    collector: Option<Arc<dyn Collector>>,
    terminator: Arc<dyn Terminator>,
    shared: OnceLock<Arc<Shared>>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatcherSettings,
        collector: Arc<dyn Collector>,
        terminator: Arc<dyn Terminator>,
    ) -> Self {
        Dispatcher {
            settings,
            collector: Some(collector),
            terminator,
            shared: OnceLock::new(),
        }
    }

    /// A dispatcher without collector. Every submission comes back as
    /// [`Submission::Local`].
    pub fn disabled() -> Self {
        Dispatcher {
            settings: DispatcherSettings::default(),
            collector: None,
            terminator: Arc::new(ProcessTerminator),
            shared: OnceLock::new(),
        }
    }

    /// Builds an HTTP-backed dispatcher when a collector is configured and a
    /// disabled one otherwise.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        match config.collector() {
            Some(address) => {
                let collector = HttpCollector::new(address.base_url())?;
                Ok(Dispatcher::new(
                    DispatcherSettings::from(config),
                    Arc::new(collector),
                    Arc::new(ProcessTerminator),
                ))
            }
            None => {
                debug!("LOGS | No collector configured, using local output");
                Ok(Dispatcher::disabled())
            }
        }
    }

    /// Reads the environment. Any configuration problem degrades to local
    /// output instead of failing.
    pub fn from_env() -> Self {
        match Config::from_env().and_then(|config| Dispatcher::from_config(&config)) {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                warn!("LOGS | {e}, falling back to local output");
                Dispatcher::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.collector.is_some()
    }

    /// Whether the report worker has been started.
    pub fn is_initialized(&self) -> bool {
        self.shared.get().is_some()
    }

    /// Creates the queue and the first batch and spawns the report worker.
    /// Idempotent, also under concurrent first use; must run inside a tokio
    /// runtime.
    pub fn initialize(&self) -> Result<(), DispatchError> {
        self.shared().map(|_| ())
    }

    fn shared(&self) -> Result<&Arc<Shared>, DispatchError> {
        let collector = self.collector.as_ref().ok_or(DispatchError::Disabled)?;
        if let Some(shared) = self.shared.get() {
            return Ok(shared);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        Ok(self
            .shared
            .get_or_init(|| self.start(Arc::clone(collector), &runtime)))
    }

    fn start(&self, collector: Arc<dyn Collector>, runtime: &tokio::runtime::Handle) -> Arc<Shared> {
        let (queue_tx, rx) = mpsc::channel(self.settings.queue_capacity.max(1));
        let first = Arc::new(Batch::new(0));

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                current: Arc::clone(&first),
                next_id: 1,
            }),
            queue_tx,
            limits: self.settings.limits,
        });

        let worker = ReportWorker {
            shared: Arc::clone(&shared),
            rx,
            collector,
            terminator: Arc::clone(&self.terminator),
            delivery_timeout: self.settings.delivery_timeout,
        };
        runtime.spawn(worker.run(first).instrument(debug_span!("report_worker")));
        debug!(
            "LOGS | Dispatcher started with queue capacity {}",
            self.settings.queue_capacity
        );

        shared
    }

    /// Appends `entry` to the active batch, rotating first if the batch would
    /// exceed its limits. When rotation needs a queue slot and none is free,
    /// waits for the worker to drain one. Once the worker stopped after a
    /// failed delivery the queue is closed, and entries needing a rotation
    /// are handed back for local output.
    pub async fn submit(&self, entry: Entry) -> Submission {
        let shared = match self.shared() {
            Ok(shared) => shared,
            Err(DispatchError::Disabled) => return Submission::Local(entry),
            Err(e) => {
                warn!("LOGS | Dispatcher unavailable: {e}");
                return Submission::Local(entry);
            }
        };

        let mut entry = entry;
        let mut permit = None;
        loop {
            match shared.try_append(entry, permit.take()) {
                Ok(completion) => return Submission::Queued(completion),
                Err(returned) => {
                    entry = returned;
                    match shared.queue_tx.clone().reserve_owned().await {
                        Ok(reserved) => permit = Some(reserved),
                        Err(_) => {
                            warn!("LOGS | Report worker stopped, writing locally");
                            return Submission::Local(entry);
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("enabled", &self.is_enabled())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
