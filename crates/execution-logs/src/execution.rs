// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tokio_util::task::TaskTracker;

use crate::batch::Completion;

/// One logical unit of caller work. Entries written on its behalf are tagged
/// with its id, and [`Execution::wait`] returns once every one of them has
/// been through a delivery attempt.
#[derive(Debug, Clone)]
pub struct Execution {
    id: String,
    tracker: TaskTracker,
}

impl Execution {
    pub fn new(id: impl Into<String>) -> Self {
        let tracker = TaskTracker::new();
        // A closed tracker still accepts tasks; closing only lets `wait`
        // resolve whenever no task is left.
        tracker.close();
        Execution {
            id: id.into(),
            tracker,
        }
    }

    /// An execution whose entries carry no id.
    pub fn anonymous() -> Self {
        Self::new(String::new())
    }

    pub fn id(&self) -> Option<&str> {
        if self.id.is_empty() {
            None
        } else {
            Some(&self.id)
        }
    }

    /// Number of written entries whose batch has not finished delivery yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Counts one more entry until `completion` resolves. Must be called from
    /// within a tokio runtime.
    pub(crate) fn track(&self, completion: Completion) {
        self.tracker.spawn(completion.wait());
    }

    /// Waits until every entry written so far has been delivered or
    /// abandoned by a failed delivery.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

/// Flush barrier for an optional execution; nothing to wait for when absent.
pub async fn wait(execution: Option<&Execution>) {
    if let Some(execution) = execution {
        execution.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;
    use crate::collector::tests::RecordingCollector;
    use crate::entry::{Entry, Severity};
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_ids() {
        assert_eq!(Execution::new("evt-1").id(), Some("evt-1"));
        assert_eq!(Execution::anonymous().id(), None);
    }

    #[tokio::test]
    async fn test_wait_without_pending_work_returns() {
        let execution = Execution::new("idle");
        timeout(Duration::from_secs(1), execution.wait())
            .await
            .expect("wait blocked with nothing pending");
        wait(None).await;
    }

    #[tokio::test]
    async fn test_wait_blocks_until_batch_done() {
        let execution = Execution::new("evt-2");
        let batch = Batch::new(0);
        batch.append(Entry::new("x".to_string(), Severity::Info, execution.id()));
        execution.track(batch.completion());
        assert_eq!(execution.pending(), 1);

        assert!(timeout(Duration::from_millis(50), execution.wait())
            .await
            .is_err());

        batch
            .deliver_once(&RecordingCollector::default(), Duration::from_secs(1))
            .await
            .unwrap();
        timeout(Duration::from_secs(1), wait(Some(&execution)))
            .await
            .expect("wait did not observe delivery");
        assert_eq!(execution.pending(), 0);
    }

    #[tokio::test]
    async fn test_execution_can_be_waited_repeatedly() {
        let execution = Execution::new("evt-3");
        for round in 0..3 {
            let batch = Batch::new(round);
            batch.append(Entry::new("x".to_string(), Severity::Debug, None));
            execution.track(batch.completion());
            batch
                .deliver_once(&RecordingCollector::default(), Duration::from_secs(1))
                .await
                .unwrap();
            timeout(Duration::from_secs(1), execution.wait())
                .await
                .expect("wait did not return");
        }
    }
}
