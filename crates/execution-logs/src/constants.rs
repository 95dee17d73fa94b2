// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits and fixed values shared by the batching pipeline.
//!
//! The batch limits mirror what the collector accepts in a single request:
//! a batch is rotated before it would exceed either of them, whichever
//! comes first.

use std::time::Duration;

/// Maximum number of entries in a single batch.
pub const MAX_BATCH_ENTRIES: usize = 1_500;

/// Maximum accumulated text payload, in bytes, of a single batch.
///
/// A lone entry larger than this is still accepted into an empty batch.
pub const MAX_BATCH_BYTES: usize = 150_000;

/// Number of batches that may wait for delivery before producers that need
/// to rotate are held back.
pub const REPORT_QUEUE_CAPACITY: usize = 5;

/// Lower bound of the delivery deadline. The effective deadline is the larger
/// of this and the unit-of-work timeout, so the logs of a unit of work that is
/// timing out still get a chance to reach the collector.
pub const MIN_DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline of the termination notification sent before a fatal exit.
pub const KILL_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit status used when the process terminates because logs can no longer
/// be delivered.
pub const FATAL_EXIT_CODE: i32 = 16;

/// Collector path receiving log batches.
pub const LOG_PATH: &str = "/_ah/log";

/// Collector path notified before a fatal exit.
pub const KILL_PATH: &str = "/_ah/kill";
