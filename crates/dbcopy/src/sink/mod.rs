//! Where generated DDL goes: a live destination, export files or stdout.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::traits::Endpoint;
use crate::error::{MigrateError, Result};
use crate::translate::DdlPair;

/// Kind of generated artifact; the tag appears in export file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Table,
    Index,
    View,
    Routine,
    ForeignLink,
    SyncProcedure,
}

impl ArtifactKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ArtifactKind::Table => "t",
            ArtifactKind::Index => "i",
            ArtifactKind::View => "v",
            ArtifactKind::Routine => "r",
            ArtifactKind::ForeignLink => "ft",
            ArtifactKind::SyncProcedure => "upd",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The statements generated for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Destination schema.
    pub schema: String,
    pub object: String,
    pub kind: ArtifactKind,
    pub ddl: DdlPair,
}

impl Artifact {
    pub fn new(
        schema: impl Into<String>,
        object: impl Into<String>,
        kind: ArtifactKind,
        ddl: DdlPair,
    ) -> Self {
        Self {
            schema: schema.into(),
            object: object.into(),
            kind,
            ddl,
        }
    }

    /// `<schema>__<tag>__<object>.sql`
    pub fn file_name(&self) -> String {
        format!(
            "{}__{}__{}.sql",
            sanitize(&self.schema),
            self.kind.tag(),
            sanitize(&self.object)
        )
    }

    /// All statements, newline separated.
    pub fn sql(&self) -> String {
        let mut sql = self.ddl.statements().collect::<Vec<_>>().join("\n");
        sql.push('\n');
        sql
    }

    /// Hex SHA-256 of [`Artifact::sql`].
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.sql().as_bytes()))
    }
}

/// Path separators and NUL cannot appear in a file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub kind: ArtifactKind,
    pub object: String,
    pub statements: usize,
    pub digest: String,
    /// Export file, when exporting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Statement sink for a run.
#[derive(Clone)]
pub enum Sink {
    /// Execute against the destination, each statement under `timeout`.
    Apply {
        dest: Arc<dyn Endpoint>,
        timeout: Duration,
    },
    /// Write one file per artifact into `dir`.
    Export { dir: PathBuf },
    /// Print statements to stdout.
    Print,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Apply { dest, timeout } => f
                .debug_struct("Apply")
                .field("dest", &dest.info().name)
                .field("timeout", timeout)
                .finish(),
            Sink::Export { dir } => f.debug_struct("Export").field("dir", dir).finish(),
            Sink::Print => f.write_str("Print"),
        }
    }
}

impl Sink {
    /// Apply, export or print one artifact.
    pub async fn emit(&self, artifact: &Artifact) -> Result<Receipt> {
        let mut receipt = Receipt {
            kind: artifact.kind,
            object: artifact.object.clone(),
            statements: artifact.ddl.statements().count(),
            digest: artifact.digest(),
            file: None,
        };

        match self {
            Sink::Apply { dest, timeout } => apply(dest.as_ref(), artifact, *timeout).await?,
            Sink::Export { dir } => receipt.file = Some(export(dir, artifact).await?),
            Sink::Print => {
                print!("-- {}\n{}", artifact.file_name(), artifact.sql());
            }
        }

        Ok(receipt)
    }
}

/// Execute drops then creates in order.
///
/// A failing statement does not stop the ones after it and nothing already
/// executed is rolled back; the first failure is returned.
async fn apply(dest: &dyn Endpoint, artifact: &Artifact, timeout: Duration) -> Result<()> {
    let mut first_error = None;

    for sql in artifact.ddl.statements() {
        debug!("{} {}: {}", artifact.kind, artifact.object, sql);
        let outcome = match tokio::time::timeout(timeout, dest.execute(sql)).await {
            Ok(result) => result,
            Err(_) => Err(MigrateError::timeout(
                format!("executing {} DDL for {}", artifact.kind, artifact.object),
                timeout.as_secs(),
            )),
        };
        if let Err(e) = outcome {
            warn!("{}.{}: {}", artifact.schema, artifact.object, e);
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn export(dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(artifact.file_name());
    tokio::fs::write(&path, artifact.sql()).await?;
    debug!("Wrote {}", path.display());
    Ok(path)
}
