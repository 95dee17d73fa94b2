// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fail-fast policy applied when a batch cannot be delivered.
//!
//! A process that can no longer ship its logs is terminated rather than left
//! running silently. The collector gets one best-effort notification first.

use tracing::error;

use crate::collector::Collector;
use crate::constants;

/// Ends the process. Injected so the policy can be observed in tests.
pub trait Terminator: Send + Sync {
    fn terminate(&self, code: i32);
}

/// Exits the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Notifies the collector and terminates with [`constants::FATAL_EXIT_CODE`].
/// A failed notification is logged and does not change the outcome.
pub async fn kill_instance(collector: &dyn Collector, terminator: &dyn Terminator) {
    if let Err(e) = collector
        .notify_termination(constants::KILL_NOTIFICATION_TIMEOUT)
        .await
    {
        error!("LOGS | Failed to notify collector before exiting: {e}");
    }
    terminator.terminate(constants::FATAL_EXIT_CODE);
}
