// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use execution_logs::{Dispatcher, Execution, Severity, Sink};

const DEFAULT_SEVERITY: Severity = Severity::Info;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("EXECUTION_LOGS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,reqwest=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let severity = match env::var("RELAY_SEVERITY") {
        Ok(value) => value.parse::<Severity>().unwrap_or_else(|e| {
            warn!("{e}, using {DEFAULT_SEVERITY}");
            DEFAULT_SEVERITY
        }),
        Err(_) => DEFAULT_SEVERITY,
    };
    let execution = Arc::new(match env::var("RELAY_EXECUTION_ID") {
        Ok(id) => Execution::new(id),
        Err(_) => Execution::anonymous(),
    });

    let dispatcher = Arc::new(Dispatcher::from_env());
    if dispatcher.is_enabled() {
        if let Err(e) = dispatcher.initialize() {
            error!("Unable to start log dispatcher: {e}");
        }
    }
    let sink = Sink::new(dispatcher, severity, Some(Arc::clone(&execution)));

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut relayed: u64 = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Err(e) = sink.write_str(&line).await {
                    error!("Failed to relay line: {e}");
                }
                relayed += 1;
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read standard input: {e}");
                break;
            }
        }
    }

    debug!(
        "Waiting for {} pending entries to be delivered",
        execution.pending()
    );
    execution_logs::wait(Some(&execution)).await;
    info!("Relayed {relayed} lines");
}
