//! Run driver: resolves schemas, builds one batch per (schema, kind) and
//! hands each batch to the [`TaskScheduler`].

mod tasks;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{Config, Destination, RunOptions};
use crate::connection::ConnectionPair;
use crate::core::catalog::TranslatorCatalog;
use crate::core::dialect::Dialect;
use crate::core::schema::ObjectKind;
use crate::error::{MigrateError, Result};
use crate::metadata::MetadataReader;
use crate::scheduler::{BatchReport, TaskScheduler};
use crate::sink::Sink;
use crate::translate::{LinkSource, Translator};

use tasks::{SchemaTask, TaskContext};

/// Schema pair and object list for one batch. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub kind: ObjectKind,
    pub source_schema: String,
    pub dest_schema: String,
    pub names: Vec<String>,
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    PartialFailure,
    Cancelled,
}

/// A failed object, for the summary.
#[derive(Debug, Clone, Serialize)]
pub struct FailedObject {
    pub schema: String,
    pub kind: ObjectKind,
    pub name: String,
    pub error: String,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: String,
    pub status: RunStatus,
    pub source: String,
    pub destination: String,
    pub source_dialect: Dialect,
    pub dest_dialect: Dialect,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub objects_total: usize,
    pub objects_succeeded: usize,
    pub objects_failed: usize,
    pub failed_objects: Vec<FailedObject>,
    pub batches: Vec<BatchReport>,
}

impl RunSummary {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `Err(PartialFailure)` when any object failed, `Err(Cancelled)` when
    /// the run was interrupted.
    pub fn check(&self) -> Result<()> {
        match self.status {
            RunStatus::Completed => Ok(()),
            RunStatus::Cancelled => Err(MigrateError::Cancelled),
            RunStatus::PartialFailure => Err(MigrateError::PartialFailure {
                failed: self.objects_failed,
                total: self.objects_total,
            }),
        }
    }
}

/// Schema copy orchestrator.
pub struct Orchestrator {
    pair: ConnectionPair,
    options: RunOptions,
    translator: Translator,
    sink: Sink,
    scheduler: TaskScheduler,
    cancel: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    /// Validate options and open the endpoints.
    pub async fn new(config: &Config, options: RunOptions) -> Result<Self> {
        options.validate()?;
        let pair = ConnectionPair::open(config, &options).await?;
        Self::with_pair(pair, options, &TranslatorCatalog::with_builtins())
    }

    /// Build over already-open endpoints.
    ///
    /// Fails with `UnsupportedDialectPair` before any object work when the
    /// catalog has no translator for the pair.
    pub fn with_pair(
        pair: ConnectionPair,
        options: RunOptions,
        catalog: &TranslatorCatalog,
    ) -> Result<Self> {
        let translator = catalog.translator(pair.source_dialect(), pair.dest_dialect())?;

        let sink = if options.dry_run {
            Sink::Print
        } else {
            match &options.destination {
                Destination::Files(dir) => Sink::Export { dir: dir.clone() },
                Destination::Endpoint(_) => Sink::Apply {
                    dest: pair.dest().clone(),
                    timeout: options.timeout,
                },
            }
        };

        Ok(Self {
            scheduler: TaskScheduler::new(options.jobs),
            pair,
            options,
            translator,
            sink,
            cancel: None,
        })
    }

    /// Stop admitting objects once the channel reads `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.scheduler = self.scheduler.clone().with_cancel(cancel.clone());
        self.cancel = Some(cancel);
        self
    }

    pub fn pair(&self) -> &ConnectionPair {
        &self.pair
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |rx| *rx.borrow())
    }

    /// Source/destination schema pairs for this run.
    ///
    /// A named source schema must exist. Without one, every non-system schema
    /// is processed under its own name.
    pub async fn resolve_schemas(&self) -> Result<Vec<(String, String)>> {
        let reader = self.source_reader();
        let available = reader.list_schemas().await?;

        match &self.options.source_schema {
            Some(schema) => {
                if !available.iter().any(|s| s == schema) {
                    return Err(MigrateError::SchemaNotFound {
                        endpoint: self.pair.source_info().name.clone(),
                        schema: schema.clone(),
                    });
                }
                let dest = match (&self.options.dest_schema, self.pair.is_exporting()) {
                    (Some(dest), false) => dest.clone(),
                    (Some(dest), true) => {
                        if dest != schema {
                            warn!(
                                "Destination schema '{}' ignored under file export; using '{}'",
                                dest, schema
                            );
                        }
                        schema.clone()
                    }
                    (None, _) => schema.clone(),
                };
                Ok(vec![(schema.clone(), dest)])
            }
            None => Ok(available.into_iter().map(|s| (s.clone(), s)).collect()),
        }
    }

    /// Object list for one kind in `schema`, explicit names first.
    async fn select(&self, schema: &str, kind: ObjectKind) -> Result<Vec<String>> {
        let exclude = self.options.exclude.as_ref();
        match self.options.names_for(kind) {
            Some(names) => Ok(names
                .iter()
                .filter(|n| exclude.map_or(true, |re| !re.is_match(n)))
                .cloned()
                .collect()),
            None => self.source_reader().list_objects(schema, kind, exclude).await,
        }
    }

    fn source_reader(&self) -> MetadataReader {
        MetadataReader::new(self.pair.source().clone(), self.options.timeout)
    }

    fn dest_reader(&self) -> MetadataReader {
        MetadataReader::new(self.pair.dest().clone(), self.options.timeout)
    }

    /// Immutable batch requests, in execution order.
    pub async fn plan(&self) -> Result<Vec<BatchRequest>> {
        let mut batches = Vec::new();
        for (source_schema, dest_schema) in self.resolve_schemas().await? {
            for kind in ObjectKind::ORDER {
                if !self.options.kinds.contains(&kind) {
                    continue;
                }
                let names = self.select(&source_schema, kind).await?;
                if names.is_empty() {
                    info!(
                        "{} (nothing to do)",
                        MigrateError::NoObjectsSelected {
                            schema: source_schema.clone(),
                            kind: kind.to_string(),
                        }
                    );
                    continue;
                }
                batches.push(BatchRequest {
                    kind,
                    source_schema: source_schema.clone(),
                    dest_schema: dest_schema.clone(),
                    names,
                });
            }
        }
        Ok(batches)
    }

    /// Run every batch sequentially and summarise.
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Starting run {}: {} ({}) -> {} ({})",
            run_id,
            self.options.source,
            self.pair.source_dialect(),
            self.destination_label(),
            self.pair.dest_dialect()
        );

        let plan = self.plan().await?;
        let mut batches = Vec::with_capacity(plan.len());

        for request in plan {
            if self.cancelled() {
                info!("Cancellation requested, skipping remaining batches");
                break;
            }
            batches.push(self.run_batch(request).await);
        }

        Ok(self.summarize(run_id, started_at, batches))
    }

    async fn run_batch(&self, request: BatchRequest) -> BatchReport {
        let link = LinkSource::from_endpoint(
            self.pair.source_info(),
            self.pair.dest_dialect(),
            &request.source_schema,
        );
        let ctx = TaskContext {
            source: self.source_reader(),
            dest: self.dest_reader(),
            translator: self.translator.clone(),
            sink: self.sink.clone(),
            source_schema: request.source_schema.clone(),
            dest_schema: request.dest_schema.clone(),
            actions: self.options.table_actions,
            link,
        };
        let task = Arc::new(SchemaTask::new(ctx, request.kind));
        self.scheduler
            .run_batch(&request.source_schema, request.kind, request.names, task)
            .await
    }

    fn destination_label(&self) -> String {
        match &self.options.destination {
            Destination::Endpoint(name) => name.clone(),
            Destination::Files(dir) => format!("file:{}", dir.display()),
        }
    }

    fn summarize(
        &self,
        run_id: String,
        started_at: DateTime<Utc>,
        batches: Vec<BatchReport>,
    ) -> RunSummary {
        let completed_at = Utc::now();
        let objects_total = batches.iter().map(BatchReport::total).sum();
        let objects_succeeded = batches.iter().map(BatchReport::succeeded).sum();
        let objects_failed = batches.iter().map(BatchReport::failed).sum();
        let failed_objects = batches
            .iter()
            .flat_map(|b| {
                b.failures().map(move |(name, error)| FailedObject {
                    schema: b.schema.clone(),
                    kind: b.kind,
                    name: name.to_string(),
                    error: error.to_string(),
                })
            })
            .collect();

        let status = if self.cancelled() {
            RunStatus::Cancelled
        } else if objects_failed > 0 {
            RunStatus::PartialFailure
        } else {
            RunStatus::Completed
        };

        let summary = RunSummary {
            run_id,
            status,
            source: self.options.source.clone(),
            destination: self.destination_label(),
            source_dialect: self.pair.source_dialect(),
            dest_dialect: self.pair.dest_dialect(),
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            objects_total,
            objects_succeeded,
            objects_failed,
            failed_objects,
            batches,
        };

        info!(
            "Run {} finished: {} objects, {} succeeded, {} failed",
            summary.run_id, summary.objects_total, summary.objects_succeeded, summary.objects_failed
        );
        summary
    }
}
