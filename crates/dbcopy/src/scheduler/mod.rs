//! Bounded-concurrency object task runner.
//!
//! One batch is one (schema, kind) object list. Each object runs as its own
//! tokio task once a semaphore permit is free; the batch call returns only
//! after every admitted task has finished. A failing object never stops the
//! others.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::core::schema::ObjectKind;
use crate::error::{MigrateError, Result};
use crate::sink::Receipt;

/// Work done for one object of a batch.
#[async_trait]
pub trait ObjectTask: Send + Sync + 'static {
    /// Fetch, translate and emit one object.
    async fn run(&self, name: &str) -> Result<Vec<Receipt>>;
}

/// Lifecycle of one object: `Pending -> Running -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl ObjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ObjectStatus::Succeeded | ObjectStatus::Failed)
    }
}

/// Result for one object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectOutcome {
    pub name: String,
    pub status: ObjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub receipts: Vec<Receipt>,
    pub duration_ms: u64,
}

impl ObjectOutcome {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ObjectStatus::Pending,
            error: None,
            receipts: Vec::new(),
            duration_ms: 0,
        }
    }

    fn fail(mut self, error: String) -> Self {
        self.status = ObjectStatus::Failed;
        self.error = Some(error);
        self
    }
}

/// Outcomes of one batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub schema: String,
    pub kind: ObjectKind,
    pub outcomes: Vec<ObjectOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ObjectStatus::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ObjectStatus::Failed)
            .count()
    }

    /// Failing objects with their error text.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| {
            (o.status == ObjectStatus::Failed)
                .then(|| (o.name.as_str(), o.error.as_deref().unwrap_or("")))
        })
    }
}

/// Runs batches with at most `jobs` objects in flight.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    jobs: usize,
    cancel: Option<watch::Receiver<bool>>,
}

impl TaskScheduler {
    pub fn new(jobs: usize) -> Self {
        Self {
            jobs: jobs.max(1),
            cancel: None,
        }
    }

    /// Stop admitting objects once the channel reads `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |rx| *rx.borrow())
    }

    /// Run `task` for every name and wait for all of them.
    pub async fn run_batch(
        &self,
        schema: &str,
        kind: ObjectKind,
        names: Vec<String>,
        task: Arc<dyn ObjectTask>,
    ) -> BatchReport {
        info!(
            "{}: processing {} {} with {} jobs",
            schema,
            names.len(),
            kind,
            self.jobs
        );

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut handles = Vec::with_capacity(names.len());
        let mut outcomes: Vec<ObjectOutcome> =
            names.iter().map(|n| ObjectOutcome::pending(n)).collect();

        for (idx, name) in names.into_iter().enumerate() {
            if self.cancelled() {
                info!("Cancellation requested, not admitting further {}", kind);
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let task = task.clone();
            let schema = schema.to_string();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let mut outcome = ObjectOutcome::pending(&name);
                outcome.status = ObjectStatus::Running;
                debug!("{}.{}: running", schema, name);

                let started = Instant::now();
                let result = task.run(&name).await;
                outcome.duration_ms = started.elapsed().as_millis() as u64;

                match result {
                    Ok(receipts) => {
                        outcome.status = ObjectStatus::Succeeded;
                        outcome.receipts = receipts;
                        outcome
                    }
                    Err(e) => {
                        error!(
                            schema = %schema,
                            object = %name,
                            kind = %kind,
                            "{} failed: {}",
                            name,
                            e
                        );
                        outcome.fail(e.to_string())
                    }
                }
            });
            handles.push((idx, handle));
        }

        let (admitted, handles): (Vec<usize>, Vec<_>) = handles.into_iter().unzip();
        for (idx, joined) in admitted.into_iter().zip(join_all(handles).await) {
            outcomes[idx] = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{}.{} task panicked: {}", schema, outcomes[idx].name, e);
                    outcomes[idx].clone().fail(format!("task panicked: {}", e))
                }
            };
        }

        for outcome in outcomes.iter_mut().filter(|o| !o.status.is_terminal()) {
            *outcome = outcome.clone().fail(MigrateError::Cancelled.to_string());
        }

        let report = BatchReport {
            schema: schema.to_string(),
            kind,
            outcomes,
        };
        info!(
            "{}: {} {} succeeded, {} failed",
            schema,
            report.succeeded(),
            kind,
            report.failed()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::core::dialect::Dialect;
    use crate::core::schema::ColumnMeta;
    use crate::core::traits::CatalogReader;
    use crate::testing::MockEndpoint;

    struct DescribeTask {
        endpoint: Arc<MockEndpoint>,
    }

    #[async_trait]
    impl ObjectTask for DescribeTask {
        async fn run(&self, name: &str) -> Result<Vec<Receipt>> {
            self.endpoint.describe_columns("public", name).await?;
            Ok(Vec::new())
        }
    }

    fn endpoint(count: usize) -> MockEndpoint {
        (0..count).fold(MockEndpoint::new("wh", Dialect::Postgres), |ep, i| {
            ep.with_table(&format!("t{}", i), vec![ColumnMeta::new("id", "integer")], &["id"])
        })
    }

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("t{}", i)).collect()
    }

    #[tokio::test]
    async fn test_failing_object_does_not_affect_others() {
        let ep = Arc::new(endpoint(6).failing_on("t3"));
        let report = TaskScheduler::new(3)
            .run_batch("public", ObjectKind::Tables, names(6), Arc::new(DescribeTask { endpoint: ep }))
            .await;

        assert_eq!(report.total(), 6);
        assert_eq!(report.succeeded(), 5);
        assert_eq!(report.failed(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "t3");
        assert!(failures[0].1.contains("does not exist"));
        assert_eq!(report.outcomes[3].name, "t3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let ep = Arc::new(endpoint(20).with_delay(Duration::from_millis(50)));
        let report = TaskScheduler::new(4)
            .run_batch(
                "public",
                ObjectKind::Tables,
                names(20),
                Arc::new(DescribeTask {
                    endpoint: ep.clone(),
                }),
            )
            .await;

        assert_eq!(report.succeeded(), 20);
        let max = ep.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "observed {} concurrent tasks", max);
        assert!(max > 1);
        assert_eq!(ep.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_batch_admits_nothing() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let ep = Arc::new(endpoint(3));
        let report = TaskScheduler::new(2)
            .with_cancel(rx)
            .run_batch("public", ObjectKind::Tables, names(3), Arc::new(DescribeTask { endpoint: ep }))
            .await;

        assert_eq!(report.failed(), 3);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.error.as_deref() == Some(&MigrateError::Cancelled.to_string()[..])));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = TaskScheduler::new(2)
            .run_batch(
                "public",
                ObjectKind::Views,
                Vec::new(),
                Arc::new(DescribeTask {
                    endpoint: Arc::new(endpoint(0)),
                }),
            )
            .await;
        assert_eq!(report.total(), 0);
        assert_eq!(report.failed(), 0);
    }
}
