// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Write};
use std::sync::Arc;

use crate::dispatcher::{Dispatcher, Submission};
use crate::entry::{Entry, Severity};
use crate::execution::Execution;

/// Writer bound to one severity and, optionally, one execution. Every write
/// becomes one entry.
#[derive(Debug, Clone)]
pub struct Sink {
    dispatcher: Arc<Dispatcher>,
    severity: Severity,
    execution: Option<Arc<Execution>>,
}

impl Sink {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        severity: Severity,
        execution: Option<Arc<Execution>>,
    ) -> Self {
        Sink {
            dispatcher,
            severity,
            execution,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn execution(&self) -> Option<&Arc<Execution>> {
        self.execution.as_ref()
    }

    /// Hands `buf` to the dispatcher as a single entry and reports the whole
    /// buffer as written. Without a collector the entry is rendered to
    /// standard error instead. Returns without waiting for delivery; use
    /// [`Execution::wait`] for that.
    pub async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let execution_id = self.execution.as_deref().and_then(Execution::id);
        let entry = Entry::new(
            String::from_utf8_lossy(buf).into_owned(),
            self.severity,
            execution_id,
        );

        match self.dispatcher.submit(entry).await {
            Submission::Local(entry) => {
                write_local(&mut io::stderr().lock(), &entry)?;
            }
            Submission::Queued(completion) => {
                if let Some(execution) = &self.execution {
                    execution.track(completion);
                }
            }
        }

        Ok(buf.len())
    }

    pub async fn write_str(&self, text: &str) -> io::Result<usize> {
        self.write(text.as_bytes()).await
    }
}

fn write_local(out: &mut impl Write, entry: &Entry) -> io::Result<()> {
    out.write_all(&entry.render())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::tests::RecordingCollector;
    use crate::dispatcher::DispatcherSettings;
    use crate::fatal::tests::RecordingTerminator;
    use crate::batch::BatchLimits;
    use std::time::Duration;
    use tokio::time::timeout;

    fn dispatcher(
        collector: &RecordingCollector,
        max_entries: usize,
    ) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            DispatcherSettings {
                limits: BatchLimits {
                    max_entries,
                    max_bytes: 10_000,
                },
                ..Default::default()
            },
            Arc::new(collector.clone()),
            Arc::new(RecordingTerminator::default()),
        ))
    }

    #[test]
    fn test_write_local_renders_entry() {
        let mut out = Vec::new();
        let entry = Entry::new("hello".to_string(), Severity::Info, None);
        write_local(&mut out, &entry).unwrap();
        assert_eq!(out, b"[I] hello\n");
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_writes_locally() {
        let execution = Arc::new(Execution::new("evt"));
        let sink = Sink::new(
            Arc::new(Dispatcher::disabled()),
            Severity::Warning,
            Some(Arc::clone(&execution)),
        );

        let written = sink.write(b"careful").await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(execution.pending(), 0);
    }

    #[tokio::test]
    async fn test_write_tags_entry_and_reports_full_length() {
        let collector = RecordingCollector::default();
        let execution = Arc::new(Execution::new("evt-9"));
        let sink = Sink::new(
            dispatcher(&collector, 100),
            Severity::Critical,
            Some(Arc::clone(&execution)),
        );

        let written = sink.write_str("boom\n").await.unwrap();
        assert_eq!(written, 5);
        execution.wait().await;

        let deliveries = collector.deliveries();
        assert_eq!(deliveries.len(), 1);
        let entry = &deliveries[0][0];
        assert_eq!(entry.text_payload(), "boom\n");
        assert_eq!(entry.severity(), Severity::Critical);
        assert_eq!(entry.execution_id(), Some("evt-9"));
    }

    #[tokio::test]
    async fn test_write_without_execution_is_untagged() {
        let collector = RecordingCollector::default();
        let sink = Sink::new(dispatcher(&collector, 100), Severity::Info, None);

        sink.write_str("plain").await.unwrap();
        timeout(Duration::from_secs(5), async {
            while collector.deliveries().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("entry was never delivered");

        assert_eq!(collector.deliveries()[0][0].execution_id(), None);
    }

    #[tokio::test]
    async fn test_wait_covers_every_rotated_batch() {
        let (collector, gate) = RecordingCollector::gated();
        let dispatcher = Arc::new(Dispatcher::new(
            DispatcherSettings {
                limits: BatchLimits {
                    max_entries: 3,
                    max_bytes: 10_000,
                },
                ..Default::default()
            },
            Arc::new(collector.clone()),
            Arc::new(RecordingTerminator::default()),
        ));
        let execution = Arc::new(Execution::new("split"));
        let sink = Sink::new(dispatcher, Severity::Info, Some(Arc::clone(&execution)));

        for i in 0..5 {
            sink.write_str(&format!("line {i}")).await.unwrap();
        }
        assert_eq!(execution.pending(), 5);

        // neither batch may complete while deliveries are held back
        assert!(timeout(Duration::from_millis(100), execution.wait())
            .await
            .is_err());

        // releasing only the first batch is not enough
        gate.add_permits(1);
        assert!(timeout(Duration::from_millis(100), execution.wait())
            .await
            .is_err());
        assert_eq!(collector.deliveries().len(), 1);

        gate.add_permits(1);
        timeout(Duration::from_secs(5), execution.wait())
            .await
            .expect("wait never returned");

        assert_eq!(
            collector.payloads(),
            vec![
                vec!["line 0", "line 1", "line 2"],
                vec!["line 3", "line 4"],
            ]
        );
        assert_eq!(execution.pending(), 0);
    }
}
