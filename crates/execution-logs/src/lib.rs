// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous delivery of structured log entries to a local collector.
//!
//! Writers hand entries to a [`Sink`], which tags them with its severity and
//! the id of the [`Execution`] it belongs to. A process-wide [`Dispatcher`]
//! accumulates entries into size-bounded batches and a background worker
//! delivers those batches, in order, to the collector. [`Execution::wait`]
//! returns once everything written on behalf of that execution has been
//! through its delivery attempt. When delivery fails the process notifies the
//! collector and exits.
//!
//! Without a configured collector, entries are written to standard error as
//! `[<severity initial>] <text>` lines.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod collector;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod entry;
pub mod errors;
pub mod execution;
pub mod fatal;
pub mod sink;

pub use collector::{Collector, HttpCollector};
pub use config::Config;
pub use dispatcher::{Dispatcher, DispatcherSettings, Submission};
pub use entry::{Entry, Severity};
pub use execution::{wait, Execution};
pub use sink::Sink;
