// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors raised while reading or validating configuration. Any of these
/// leaves the process in local-output mode.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build collector client: {0}")]
    Client(String),
}

/// Outcome of a failed delivery attempt.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("timeout after {0:?} when calling collector")]
    Timeout(Duration),

    #[error("bad response code from collector: {0}")]
    Rejected(u16),

    #[error("error when calling collector: {0}")]
    Transport(String),

    #[error("failed to encode payload: {0}")]
    Payload(String),
}

/// Errors raised while bringing up the dispatcher.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no collector configured")]
    Disabled,

    #[error("no tokio runtime available to run the report worker")]
    NoRuntime,
}
