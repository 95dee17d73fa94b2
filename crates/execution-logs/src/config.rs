// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::batch::BatchLimits;
use crate::constants;
use crate::errors::ConfigError;

/// Where the local collector listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorAddress {
    pub host: String,
    pub port: u16,
}

impl CollectorAddress {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Configuration of the log pipeline, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Collector address; `None` keeps every entry on local output
    pub collector: Option<CollectorAddress>,
    /// Timeout of one unit of work (FUNCTION_TIMEOUT_SEC), zero when unset
    pub function_timeout: Duration,
    /// Batch rotation limits
    pub limits: BatchLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collector: None,
            function_timeout: Duration::ZERO,
            limits: BatchLimits::default(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables. The collector is
    /// found through SUPERVISOR_HOSTNAME and SUPERVISOR_INTERNAL_PORT, with
    /// COLLECTOR_HOSTNAME and COLLECTOR_PORT accepted as aliases.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host =
            non_empty_var("SUPERVISOR_HOSTNAME").or_else(|| non_empty_var("COLLECTOR_HOSTNAME"));
        let port =
            non_empty_var("SUPERVISOR_INTERNAL_PORT").or_else(|| non_empty_var("COLLECTOR_PORT"));

        let collector = match (host, port) {
            (None, None) => None,
            (Some(host), Some(port)) => Some(CollectorAddress {
                host,
                port: parse("SUPERVISOR_INTERNAL_PORT", &port)?,
            }),
            (Some(_), None) => {
                return Err(ConfigError::InvalidConfig(
                    "SUPERVISOR_HOSTNAME is set but SUPERVISOR_INTERNAL_PORT is not".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidConfig(
                    "SUPERVISOR_INTERNAL_PORT is set but SUPERVISOR_HOSTNAME is not".to_string(),
                ))
            }
        };

        // Only raises the delivery deadline above its floor, so a bad value
        // must not cost the collector.
        let function_timeout = match non_empty_var("FUNCTION_TIMEOUT_SEC") {
            Some(value) => match parse::<u64>("FUNCTION_TIMEOUT_SEC", &value) {
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => {
                    warn!("LOGS | {e}, using the minimum delivery timeout");
                    Duration::ZERO
                }
            },
            None => Duration::ZERO,
        };

        let mut limits = BatchLimits::default();
        if let Some(value) = non_empty_var("LOG_BATCH_MAX_ENTRIES") {
            limits.max_entries = parse("LOG_BATCH_MAX_ENTRIES", &value)?;
        }
        if let Some(value) = non_empty_var("LOG_BATCH_MAX_BYTES") {
            limits.max_bytes = parse("LOG_BATCH_MAX_BYTES", &value)?;
        }

        let config = Self {
            collector,
            function_timeout,
            limits,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(address) = &self.collector {
            if address.host.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "SUPERVISOR_HOSTNAME cannot be empty".to_string(),
                ));
            }
            if address.port == 0 {
                return Err(ConfigError::InvalidConfig(
                    "SUPERVISOR_INTERNAL_PORT must be greater than 0".to_string(),
                ));
            }
        }

        if self.limits.max_entries == 0 {
            return Err(ConfigError::InvalidConfig(
                "LOG_BATCH_MAX_ENTRIES must be greater than 0".to_string(),
            ));
        }
        if self.limits.max_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "LOG_BATCH_MAX_BYTES must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn collector(&self) -> Option<&CollectorAddress> {
        self.collector.as_ref()
    }

    /// Deadline of one delivery: the unit-of-work timeout, but never less
    /// than [`constants::MIN_DELIVERY_TIMEOUT`].
    pub fn delivery_timeout(&self) -> Duration {
        self.function_timeout.max(constants::MIN_DELIVERY_TIMEOUT)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| {
        ConfigError::InvalidConfig(format!("{name} has an invalid value '{value}'"))
    })
}
