/// Vault Uploader CLI
///
/// Runs the uploader against a markdown vault on disk: batch re-upload of
/// local attachment links, simulated drops into a note, and a configuration check.
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault_uploader::{
    batch::{BatchReconciler, BatchScope},
    blob_store::Vault,
    document::{shared, InMemoryDocument},
    notify::LogNotifier,
    orchestrator::{AttachedFile, EventDisposition, UploadEvent},
    Orchestrator, UploaderConfig, UploaderContext,
};

#[derive(Parser)]
#[command(name = "vault-uploader", version, about = "Upload note attachments to S3 or a local folder")]
struct Cli {
    /// Vault root directory
    #[arg(long, env = "UPLOADER_VAULT", default_value = ".")]
    vault: PathBuf,

    /// JSON settings file; environment variables are used when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload local attachments referenced by notes and rewrite the links
    Batch {
        /// Limit to a vault-relative folder
        #[arg(long, conflicts_with = "note")]
        folder: Option<String>,

        /// Limit to a single vault-relative note
        #[arg(long)]
        note: Option<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop files at the end of a note and upload them
    Upload {
        /// Vault-relative note path
        #[arg(long)]
        note: String,

        /// Files to attach
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Load and validate configuration, then print derived URLs
    ConfigCheck,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = load_config(cli.settings.as_deref())?;

    match cli.command {
        Command::ConfigCheck => config_check(&config),
        Command::Batch { folder, note, json } => {
            let scope = match (folder, note) {
                (_, Some(note)) => BatchScope::Note(note),
                (Some(folder), None) => BatchScope::Folder(folder),
                (None, None) => BatchScope::Vault,
            };
            run_batch(config, &cli.vault, scope, json).await
        }
        Command::Upload { note, files } => run_upload(config, &cli.vault, &note, &files).await,
    }
}

fn init_logging(json: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vault_uploader=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn load_config(settings: Option<&Path>) -> anyhow::Result<UploaderConfig> {
    match settings {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            UploaderConfig::from_json(&raw).context("Invalid settings file")
        }
        None => UploaderConfig::from_env().context("Invalid configuration"),
    }
}

async fn build_orchestrator(config: UploaderConfig, vault_root: &Path) -> anyhow::Result<Arc<Orchestrator>> {
    if !vault_root.is_dir() {
        bail!("Vault directory does not exist: {}", vault_root.display());
    }

    let context = UploaderContext::new(config, Vault::new(vault_root.to_path_buf()), Arc::new(LogNotifier))
        .await
        .context("Failed to initialize uploader")?;
    Ok(Arc::new(Orchestrator::new(Arc::new(context))))
}

fn config_check(config: &UploaderConfig) -> anyhow::Result<()> {
    println!("Mode:            {}", if config.local_upload { "local" } else { "remote" });
    match config.ensure_remote_configured() {
        Ok(()) => {
            println!("API endpoint:    {}", config.api_endpoint());
            println!("Public URL path: {}", config.image_url_path());
            println!("Example URL:     {}", config.public_url("example.png"));
        }
        Err(e) if config.local_upload => println!("Remote storage:  not configured ({})", e),
        Err(e) => return Err(e).context("Remote storage is required in remote mode"),
    }
    if config.local_upload || config.fallback_to_local {
        println!("Local folder:    {}", config.local_upload_folder);
    }
    println!("Configuration OK");
    Ok(())
}

async fn run_batch(config: UploaderConfig, vault_root: &Path, scope: BatchScope, json: bool) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, vault_root).await?;
    let reconciler = BatchReconciler::new(orchestrator);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current file");
            on_signal.cancel();
        }
    });

    let report = reconciler
        .run(
            &scope,
            |current, total| tracing::info!("Uploading {}/{}", current, total),
            &cancel,
        )
        .await
        .context("Batch upload failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} succeeded, {} failed, {} skipped{}",
            report.succeeded(),
            report.failed(),
            report.skipped(),
            if report.is_cancelled() { " (cancelled)" } else { "" }
        );
    }
    Ok(())
}

async fn run_upload(config: UploaderConfig, vault_root: &Path, note: &str, files: &[PathBuf]) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, vault_root).await?;
    let vault = &orchestrator.context().vault;

    let mut attached = Vec::with_capacity(files.len());
    for path in files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_guess::from_path(path)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_default();

        let mut file = AttachedFile::new(name, mime, data);
        if let Some(rel) = path.canonicalize().ok().and_then(|p| {
            vault.root().canonicalize().ok().and_then(|root| {
                p.strip_prefix(root).ok().map(|r| r.to_string_lossy().replace('\\', "/"))
            })
        }) {
            file = file.with_source_path(rel);
        }
        attached.push(file);
    }

    let doc = shared(
        InMemoryDocument::load(vault.root(), note)
            .await
            .with_context(|| format!("Failed to open note {}", note))?,
    );

    let disposition = orchestrator
        .handle_event(doc.clone(), UploadEvent::drop(attached))
        .await
        .context("Upload failed")?;

    match disposition {
        EventDisposition::PassThrough => println!("Nothing to upload for {}", note),
        EventDisposition::Intercepted(report) => {
            doc.lock()
                .await
                .save(vault.root())
                .await
                .with_context(|| format!("Failed to save note {}", note))?;
            println!("{} succeeded, {} failed", report.succeeded(), report.failed());
        }
    }
    Ok(())
}
