//! dbcopy CLI - schema translation between PostgreSQL and SQL Server.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use dbcopy::{
    drivers, Config, Destination, Dialect, Endpoint, MigrateError, ObjectKind, Orchestrator,
    RunOptions, TableActions,
};
use tokio::sync::watch;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "dbcopy")]
#[command(about = "Copy and translate schema objects between PostgreSQL and SQL Server")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Write logs to this file instead of stderr (truncated on start)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy schema objects from a source endpoint to a destination
    Run(RunArgs),

    /// Run one statement against an endpoint and print the result
    Query {
        /// Endpoint name from the configuration file
        #[arg(long)]
        source: String,

        /// Print elapsed time after the result
        #[arg(long)]
        timer: bool,

        /// SQL text
        sql: String,
    },

    /// Test database connections
    HealthCheck {
        /// Endpoint name from the configuration file
        #[arg(long)]
        source: String,

        /// Second endpoint to test
        #[arg(long)]
        dest: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Source endpoint name
    #[arg(long)]
    source: String,

    /// Destination endpoint name, or file:[dir] to export DDL files
    #[arg(long)]
    dest: String,

    /// Source schema [default: all non-system schemas]
    #[arg(long)]
    source_schema: Option<String>,

    /// Destination schema [default: the source schema]
    #[arg(long)]
    dest_schema: Option<String>,

    /// Create tables and their indexes
    #[arg(long)]
    tables: bool,

    /// Create views
    #[arg(long)]
    views: bool,

    /// Create procedures and functions
    #[arg(long)]
    routines: bool,

    /// Create secondary indexes
    #[arg(long)]
    indexes: bool,

    /// Tables, views and routines
    #[arg(long)]
    all: bool,

    /// Create a foreign link (staging relation) to each source table
    #[arg(long)]
    link: bool,

    /// Create a sync procedure for each table
    #[arg(long)]
    update: bool,

    /// Only this table (repeatable)
    #[arg(long = "table", value_name = "NAME")]
    table_names: Vec<String>,

    /// Only this view (repeatable)
    #[arg(long = "view", value_name = "NAME")]
    view_names: Vec<String>,

    /// Only this routine (repeatable)
    #[arg(long = "routine", value_name = "NAME")]
    routine_names: Vec<String>,

    /// Only this index (repeatable)
    #[arg(long = "index", value_name = "NAME")]
    index_names: Vec<String>,

    /// Skip objects whose name matches this regular expression
    #[arg(long)]
    exclude: Option<String>,

    /// Concurrent object tasks
    #[arg(long, default_value = "8")]
    jobs: usize,

    /// Per-statement timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Print statements instead of executing them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Dialect of exported DDL (postgres or mssql) [default: the source dialect]
    #[arg(long)]
    export_dialect: Option<Dialect>,
}

impl RunArgs {
    fn into_options(self) -> Result<RunOptions, MigrateError> {
        let mut options = RunOptions::new(self.source, Destination::parse(&self.dest));
        options.source_schema = self.source_schema;
        options.dest_schema = self.dest_schema;
        options.jobs = self.jobs;
        options.timeout = std::time::Duration::from_secs(self.timeout);
        options.dry_run = self.dry_run;
        options.export_dialect = self.export_dialect;

        let names = [
            (ObjectKind::Tables, self.table_names),
            (ObjectKind::Views, self.view_names),
            (ObjectKind::Routines, self.routine_names),
            (ObjectKind::Indexes, self.index_names),
        ];

        options.table_actions = TableActions {
            create: self.tables || self.all || (!self.link && !self.update && !names[0].1.is_empty()),
            link: self.link,
            sync: self.update,
        };

        for kind in ObjectKind::ORDER {
            let selected = match kind {
                ObjectKind::Tables => self.tables || self.all || self.link || self.update,
                ObjectKind::Views => self.views || self.all,
                ObjectKind::Routines => self.routines || self.all,
                ObjectKind::Indexes => self.indexes,
            };
            let explicit = names.iter().any(|(k, n)| *k == kind && !n.is_empty());
            if selected || explicit {
                options.kinds.push(kind);
            }
        }

        for (kind, list) in names {
            if !list.is_empty() {
                options.names.insert(kind, list);
            }
        }

        if let Some(pattern) = &self.exclude {
            options = options.with_exclude(pattern)?;
        }

        options.validate()?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format, cli.log_file.as_ref())?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run(args) => {
            let options = args.into_options()?;
            let dry_run = options.dry_run;
            let cancel = setup_signal_handler();

            let orchestrator = Orchestrator::new(&config, options).await?.with_cancel(cancel);
            let result = orchestrator.run().await;
            orchestrator.pair().close().await;
            let summary = result?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else if dry_run {
                eprint!("{}", output::format_summary(&summary));
            } else {
                print!("{}", output::format_summary(&summary));
            }

            summary.check()?;
        }

        Commands::Query { source, timer, sql } => {
            let endpoint = drivers::connect(&source, config.endpoint(&source)?, 1).await?;
            let started = Instant::now();
            let result = endpoint.query(&sql).await;
            let elapsed = started.elapsed();
            endpoint.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", output::format_query(&result));
            }
            if timer {
                eprintln!("Elapsed: {:.3}s", elapsed.as_secs_f64());
            }
        }

        Commands::HealthCheck { source, dest } => {
            let mut names = vec![source];
            names.extend(dest);

            let mut reports = Vec::with_capacity(names.len());
            for name in &names {
                reports.push(check_endpoint(&config, name).await);
            }

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print!("{}", output::format_health(&reports));
            }

            if let Some(failed) = reports.iter().find(|r| !r.healthy) {
                return Err(MigrateError::connection(
                    &failed.endpoint,
                    failed.error.as_deref().unwrap_or("health check failed"),
                ));
            }
        }
    }

    Ok(())
}

/// Open, ping and close one endpoint.
async fn check_endpoint(config: &Config, name: &str) -> output::HealthReport {
    let started = Instant::now();
    let result: Result<Arc<dyn Endpoint>, MigrateError> = async {
        let endpoint = drivers::connect(name, config.endpoint(name)?, 1).await?;
        endpoint.ping().await?;
        Ok(endpoint)
    }
    .await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(endpoint) => {
            let info = endpoint.info().clone();
            endpoint.close().await;
            output::HealthReport {
                endpoint: name.to_string(),
                dialect: Some(info.dialect),
                healthy: true,
                latency_ms,
                error: None,
            }
        }
        Err(e) => output::HealthReport {
            endpoint: name.to_string(),
            dialect: config.endpoint(name).ok().map(|c| c.driver),
            healthy: false,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}

fn setup_logging(
    verbosity: &str,
    format: &str,
    log_file: Option<&PathBuf>,
) -> Result<(), MigrateError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    // stdout is reserved for SQL and query output.
    match (log_file, format == "json") {
        (Some(path), json) => {
            let file = std::sync::Mutex::new(std::fs::File::create(path)?);
            let subscriber = subscriber.with_writer(file).with_ansi(false);
            if json {
                subscriber.json().init();
            } else {
                subscriber.init();
            }
        }
        (None, true) => subscriber.with_writer(std::io::stderr).json().init(),
        (None, false) => subscriber.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

/// Signal handlers for graceful shutdown (SIGINT and SIGTERM).
///
/// The returned channel flips to `true` on the first signal; objects not yet
/// admitted are then reported as cancelled.
#[cfg(unix)]
fn setup_signal_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    let tx = Arc::new(tx);

    for (kind, label) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let tx = tx.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Finishing in-flight objects...", label);
                    let _ = tx.send(true);
                });
            }
            Err(e) => tracing::warn!("Failed to set up {} handler: {}", label, e),
        }
    }

    rx
}

/// Signal handler for Windows (Ctrl-C only).
#[cfg(not(unix))]
fn setup_signal_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing in-flight objects...");
            let _ = tx.send(true);
        }
    });

    rx
}
