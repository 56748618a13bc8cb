mod display;
mod export;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tagbridge_core::ExportTarget;
use tagbridge_store::ReviewStore;
use tagbridge_sync::{AnnotationClient, AnnotationConfig};

/// Write reviewer decisions from the annotation tool back into DuckDB.
#[derive(Parser)]
#[command(name = "tagbridge", version)]
struct Cli {
    /// DuckDB database holding the reviewed tables.
    #[arg(long, env = "TAGBRIDGE_DB", default_value = "tagbridge.duckdb", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the tag and alias project exports and write their labels back.
    Export(ExportArgs),
    /// Write labels back from an export file that is already on disk.
    Reconcile(ReconcileArgs),
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, env = "DOCCANO_BASE_URL", default_value = "http://doccano:8000")]
    doccano_url: String,

    #[arg(long, env = "DOCCANO_USERNAME", default_value = "admin")]
    username: String,

    #[arg(
        long,
        env = "DOCCANO_PASSWORD",
        default_value = "password",
        hide_env_values = true
    )]
    password: String,

    #[arg(long, env = "TAG_PROJECT_NAME", default_value = "Tag QA (Demo)")]
    tag_project: String,

    #[arg(long, env = "ALIAS_PROJECT_NAME", default_value = "Alias QA (Demo)")]
    alias_project: String,

    /// Seconds between export-task status checks.
    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,

    /// Seconds to wait for an export task before giving up.
    #[arg(long, default_value_t = 300)]
    export_timeout_secs: u64,

    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,
}

impl ExportArgs {
    fn annotation_config(&self) -> AnnotationConfig {
        AnnotationConfig {
            base_url: self.doccano_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            export_timeout: Duration::from_secs(self.export_timeout_secs),
            accept_invalid_certs: self.insecure,
        }
    }
}

#[derive(Args)]
struct ReconcileArgs {
    /// Export file (plain JSONL, gzip, or zip).
    #[arg(long)]
    file: PathBuf,

    /// Table to write reviewer decisions to.
    #[arg(long, default_value = export::TAG_TABLE)]
    table: String,

    /// Identifier column of the table, also the `meta` key holding the row id.
    #[arg(long, default_value = export::TAG_ID_COLUMN)]
    id_column: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    tracing::info!("tagbridge v{}", env!("CARGO_PKG_VERSION"));

    let mut store = ReviewStore::open_persistent(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;

    match cli.command {
        Command::Export(args) => run_export_all(&mut store, &args).await,
        Command::Reconcile(args) => {
            let label = args.file.display().to_string();
            let target = ExportTarget::new(label, args.table, args.id_column);
            let report = export::reconcile_file(&mut store, &target, &args.file)?;
            display::print_report(&report);
            Ok(())
        }
    }
}

async fn run_export_all(store: &mut ReviewStore, args: &ExportArgs) -> anyhow::Result<()> {
    let client = AnnotationClient::connect(args.annotation_config())
        .await
        .context("logging in to annotation tool")?;

    // Resolve every project up front so a missing one fails before any write.
    let targets = export::default_targets(&args.tag_project, &args.alias_project);
    for target in &targets {
        client.find_project(&target.project_name).await?;
    }

    let work_dir = tempfile::TempDir::new().context("creating download directory")?;
    for target in &targets {
        let report = export::run_export(&client, store, target, work_dir.path()).await?;
        display::print_report(&report);
    }
    Ok(())
}
