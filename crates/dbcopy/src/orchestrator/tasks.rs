//! Per-object work: describe, translate, emit.

use async_trait::async_trait;
use tracing::debug;

use crate::config::TableActions;
use crate::core::schema::ObjectKind;
use crate::error::Result;
use crate::metadata::MetadataReader;
use crate::scheduler::ObjectTask;
use crate::sink::{Artifact, ArtifactKind, Receipt, Sink};
use crate::translate::{DdlPair, LinkSource, Translator};

/// Everything a task needs, shared read-only by all tasks of a batch.
pub(super) struct TaskContext {
    pub source: MetadataReader,
    /// Destination catalog; the source catalog under file export.
    pub dest: MetadataReader,
    pub translator: Translator,
    pub sink: Sink,
    pub source_schema: String,
    pub dest_schema: String,
    pub actions: TableActions,
    pub link: LinkSource,
}

impl TaskContext {
    async fn emit(&self, object: &str, kind: ArtifactKind, ddl: DdlPair) -> Result<Option<Receipt>> {
        if ddl.is_empty() {
            debug!("{}.{}: nothing to emit for {}", self.dest_schema, object, kind);
            return Ok(None);
        }
        let artifact = Artifact::new(&self.dest_schema, object, kind, ddl);
        self.sink.emit(&artifact).await.map(Some)
    }

    async fn table(&self, name: &str) -> Result<Vec<Receipt>> {
        let mut receipts = Vec::new();
        let src = &self.source_schema;
        let dst = &self.dest_schema;

        let mut columns = Vec::new();
        if self.actions.create {
            let meta = self
                .source
                .describe_table(src, name, &self.translator)
                .await?;
            let mut ddl = self
                .translator
                .generate_table(dst, name, &meta.columns, &meta.primary_key)?;
            ddl.merge(self.translator.generate_indexes(dst, &meta.indexes)?);
            receipts.extend(self.emit(name, ArtifactKind::Table, ddl).await?);
            columns = meta.columns;
        } else if self.actions.link {
            columns = self
                .source
                .describe_columns(src, name, &self.translator)
                .await?;
        }

        if self.actions.link {
            let ddl = self
                .translator
                .generate_foreign_link(dst, name, &columns, &self.link)?;
            receipts.extend(self.emit(name, ArtifactKind::ForeignLink, ddl).await?);
        }

        if self.actions.sync {
            // The destination table is authoritative for the merge.
            let all_columns: Vec<String> = self
                .dest
                .describe_raw_columns(dst, name)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let primary_key = self.dest.describe_primary_key(dst, name).await?;
            let ddl = self
                .translator
                .generate_sync_procedure(dst, name, &primary_key, &all_columns)?;
            receipts.extend(self.emit(name, ArtifactKind::SyncProcedure, ddl).await?);
        }

        Ok(receipts)
    }

    async fn view(&self, name: &str) -> Result<Vec<Receipt>> {
        let view = self.source.describe_view(&self.source_schema, name).await?;
        let ddl = self.translator.generate_view(&self.dest_schema, &view)?;
        Ok(self.emit(name, ArtifactKind::View, ddl).await?.into_iter().collect())
    }

    async fn routine(&self, name: &str) -> Result<Vec<Receipt>> {
        let routine = self
            .source
            .describe_routine(&self.source_schema, name)
            .await?;
        let ddl = self.translator.generate_routine(&self.dest_schema, &routine)?;
        Ok(self.emit(name, ArtifactKind::Routine, ddl).await?.into_iter().collect())
    }

    async fn index(&self, name: &str) -> Result<Vec<Receipt>> {
        let index = self.source.describe_index(&self.source_schema, name).await?;
        let ddl = self
            .translator
            .generate_indexes(&self.dest_schema, std::slice::from_ref(&index))?;
        Ok(self.emit(name, ArtifactKind::Index, ddl).await?.into_iter().collect())
    }
}

/// Task for one batch kind.
pub(super) struct SchemaTask {
    ctx: TaskContext,
    kind: ObjectKind,
}

impl SchemaTask {
    pub fn new(ctx: TaskContext, kind: ObjectKind) -> Self {
        Self { ctx, kind }
    }
}

#[async_trait]
impl ObjectTask for SchemaTask {
    async fn run(&self, name: &str) -> Result<Vec<Receipt>> {
        match self.kind {
            ObjectKind::Tables => self.ctx.table(name).await,
            ObjectKind::Views => self.ctx.view(name).await,
            ObjectKind::Routines => self.ctx.routine(name).await,
            ObjectKind::Indexes => self.ctx.index(name).await,
        }
    }
}
