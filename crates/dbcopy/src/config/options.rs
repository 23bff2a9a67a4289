//! Per-run options assembled by the front end.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::core::dialect::Dialect;
use crate::core::schema::ObjectKind;
use crate::error::{MigrateError, Result};

/// Destination value that switches the sink to file export.
pub const FILE_SENTINEL: &str = "file:";

/// Default number of concurrent object tasks.
pub const DEFAULT_JOBS: usize = 8;

/// Default per-operation timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where generated statements go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A configured endpoint, by logical name.
    Endpoint(String),
    /// Export files into a directory.
    Files(PathBuf),
}

impl Destination {
    /// Parse a destination value: `file:` exports to the current directory,
    /// `file:<dir>` to `<dir>`, anything else names an endpoint.
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix(FILE_SENTINEL) {
            Some("") => Destination::Files(PathBuf::from(".")),
            Some(dir) => Destination::Files(PathBuf::from(dir)),
            None => Destination::Endpoint(value.to_string()),
        }
    }

    pub fn is_export(&self) -> bool {
        matches!(self, Destination::Files(_))
    }
}

/// What a table task emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableActions {
    /// Table DDL plus the table's indexes.
    pub create: bool,
    /// Foreign link to the source table (staging relation).
    pub link: bool,
    /// Sync procedure reading the staging relation.
    pub sync: bool,
}

impl TableActions {
    pub fn create_only() -> Self {
        Self {
            create: true,
            link: false,
            sync: false,
        }
    }

    pub fn any(&self) -> bool {
        self.create || self.link || self.sync
    }
}

/// Immutable options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Source endpoint name.
    pub source: String,
    pub destination: Destination,
    /// Source schema; all non-system schemas when `None`.
    pub source_schema: Option<String>,
    /// Destination schema; the source schema when `None` and always under export.
    pub dest_schema: Option<String>,
    /// Object kinds to process, in batch order.
    pub kinds: Vec<ObjectKind>,
    /// Explicit object names per kind; enumeration is skipped for listed kinds.
    pub names: BTreeMap<ObjectKind, Vec<String>>,
    /// Names matching this pattern are dropped before scheduling.
    pub exclude: Option<Regex>,
    pub table_actions: TableActions,
    /// Maximum concurrent object tasks.
    pub jobs: usize,
    /// Per-operation timeout.
    pub timeout: Duration,
    /// Print statements instead of executing them.
    pub dry_run: bool,
    /// Dialect of exported DDL; the source dialect when `None`.
    pub export_dialect: Option<Dialect>,
}

impl RunOptions {
    pub fn new(source: impl Into<String>, destination: Destination) -> Self {
        Self {
            source: source.into(),
            destination,
            source_schema: None,
            dest_schema: None,
            kinds: Vec::new(),
            names: BTreeMap::new(),
            exclude: None,
            table_actions: TableActions::create_only(),
            jobs: DEFAULT_JOBS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            dry_run: false,
            export_dialect: None,
        }
    }

    /// Compile an exclusion pattern.
    pub fn with_exclude(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|e| {
            MigrateError::Config(format!("Invalid exclude pattern '{}': {}", pattern, e))
        })?;
        self.exclude = Some(re);
        Ok(self)
    }

    /// Whether `name` survives the exclusion pattern.
    pub fn is_selected(&self, name: &str) -> bool {
        self.exclude.as_ref().map_or(true, |re| !re.is_match(name))
    }

    /// Explicit names for a kind, if any were given.
    pub fn names_for(&self, kind: ObjectKind) -> Option<&[String]> {
        self.names
            .get(&kind)
            .filter(|n| !n.is_empty())
            .map(Vec::as_slice)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.is_empty() {
            return Err(MigrateError::Config("a source endpoint is required".into()));
        }
        if self.jobs == 0 {
            return Err(MigrateError::Config("jobs must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(MigrateError::Config("timeout must be at least 1 second".into()));
        }
        if self.kinds.is_empty() {
            return Err(MigrateError::Config(
                "no object kind selected (tables, views, routines, indexes or all)".into(),
            ));
        }
        if self.kinds.contains(&ObjectKind::Tables) && !self.table_actions.any() {
            return Err(MigrateError::Config(
                "tables selected but no table action (create, link or update)".into(),
            ));
        }
        for kind in self.names.keys() {
            if !self.kinds.contains(kind) {
                return Err(MigrateError::Config(format!(
                    "a {} name was given but {} are not selected",
                    kind, kind
                )));
            }
        }
        Ok(())
    }
}
