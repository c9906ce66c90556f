// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docwerk — batch Word to PDF conversion.
//
// Entry point. Parses the command line, initialises logging and backend
// services, and runs batches on a blocking worker while the async runtime
// watches for Ctrl-C.

mod services;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docwerk_batch::{
    BatchObserver, CancellationFlag, ChannelDecider, OverwriteDecider, OverwriteRequest,
};
use docwerk_core::human_errors::humanize_error;
use docwerk_core::{
    BatchResult, CollisionPolicy, CompressionSettings, ConversionJob, DocumentKind, DocwerkError,
    JobStatus,
};
use docwerk_document::{collect_documents, human_size};

use services::app_services::{AppServices, RunOverrides, load_config};
use services::data_dir;

#[derive(Parser)]
#[command(name = "docwerk", version, about = "Batch Word (.doc/.docx) to PDF converter")]
struct Cli {
    /// Directory for config.json and recovery data.
    #[arg(long, env = "DOCWERK_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert files or folders of .doc/.docx documents to PDF.
    Convert(ConvertArgs),
    /// Continue the batch interrupted by a crash.
    Resume(CompressArgs),
    /// Show or discard the unfinished-batch checkpoint.
    Recovery {
        #[arg(long)]
        discard: bool,
    },
    /// Print the config file location, or its contents with --show.
    Config {
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// Input files and folders.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output folder; defaults to next to each input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    compress: CompressArgs,

    /// Replace existing PDFs.
    #[arg(long, group = "collision")]
    overwrite: bool,
    /// Leave existing PDFs alone and skip those inputs.
    #[arg(long, group = "collision")]
    skip_existing: bool,
    /// Write `name (n).pdf` when `name.pdf` exists.
    #[arg(long, group = "collision")]
    auto_number: bool,
    /// Ask before replacing an existing PDF.
    #[arg(long, group = "collision")]
    confirm: bool,

    /// Descend into subfolders.
    #[arg(short, long)]
    recursive: bool,

    /// Input size limit in MB (1-500).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=500))]
    max_size_mb: Option<u64>,
}

#[derive(Args)]
struct CompressArgs {
    /// Recompress the produced PDFs.
    #[arg(long)]
    compress: bool,

    /// Compression level 1-9; implies --compress.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=9))]
    level: Option<u8>,
}

impl CompressArgs {
    fn settings(&self) -> anyhow::Result<Option<CompressionSettings>> {
        match (self.compress, self.level) {
            (_, Some(level)) => Ok(Some(CompressionSettings::new(true, level)?)),
            (true, None) => Ok(Some(CompressionSettings {
                enabled: true,
                level: Default::default(),
            })),
            (false, None) => Ok(None),
        }
    }
}

impl ConvertArgs {
    fn policy(&self) -> Option<CollisionPolicy> {
        if self.overwrite {
            Some(CollisionPolicy::Overwrite)
        } else if self.skip_existing {
            Some(CollisionPolicy::SkipIfExists)
        } else if self.auto_number {
            Some(CollisionPolicy::AutoNumber)
        } else if self.confirm {
            Some(CollisionPolicy::Confirm)
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let dir = data_dir::data_dir(cli.data_dir.as_deref());
    let config = load_config(&dir).unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Docwerk starting");
    let services = AppServices::init(dir, config);

    let outcome = match cli.command {
        Command::Convert(args) => convert(&services, args).await,
        Command::Resume(args) => resume(&services, args).await,
        Command::Recovery { discard } => recovery(&services, discard),
        Command::Config { show } => show_config(&services, show),
    };
    services.shutdown();

    match outcome {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<DocwerkError>() {
        Some(docwerk) => {
            let human = humanize_error(docwerk);
            eprintln!("error: {}", human.message);
            eprintln!("       {}", human.suggestion);
        }
        None => eprintln!("error: {err:#}"),
    }
}

// -- Commands -----------------------------------------------------------------

async fn convert(services: &AppServices, args: ConvertArgs) -> anyhow::Result<ExitCode> {
    let files = gather_inputs(&args.paths, args.recursive)?;
    if files.is_empty() {
        bail!("no .doc or .docx files found");
    }
    if services.recovery().exists() {
        tracing::warn!("An unfinished batch exists and will be replaced; see `docwerk recovery`");
    }

    let overrides = RunOverrides {
        compression: args.compress.settings()?,
        policy: args.policy(),
        max_size_mb: args.max_size_mb,
    };
    run_batch(services, files, args.output, overrides).await
}

async fn resume(services: &AppServices, args: CompressArgs) -> anyhow::Result<ExitCode> {
    let Some(checkpoint) = services.recovery().load()? else {
        println!("Nothing to resume.");
        return Ok(ExitCode::SUCCESS);
    };
    println!("{}\n", checkpoint.summary());

    let files = checkpoint.remaining_files();
    if files.is_empty() {
        services.recovery().clear()?;
        println!("Every file was already handled.");
        return Ok(ExitCode::SUCCESS);
    }

    let overrides = RunOverrides {
        compression: args.settings()?,
        ..RunOverrides::default()
    };
    run_batch(services, files, checkpoint.output_folder, overrides).await
}

fn recovery(services: &AppServices, discard: bool) -> anyhow::Result<ExitCode> {
    let store = services.recovery();
    if discard {
        if store.clear()? {
            println!("Unfinished batch discarded.");
        } else {
            println!("No unfinished batch.");
        }
        return Ok(ExitCode::SUCCESS);
    }

    match store.load()? {
        Some(checkpoint) => {
            println!("{}", checkpoint.summary());
            println!("\nRun `docwerk resume` to continue or `docwerk recovery --discard` to drop it.");
        }
        None => println!("No unfinished batch."),
    }
    Ok(ExitCode::SUCCESS)
}

fn show_config(services: &AppServices, show: bool) -> anyhow::Result<ExitCode> {
    println!("{}", services.config_path().display());
    if show {
        let json = serde_json::to_string_pretty(&services.config())?;
        println!("{json}");
    }
    Ok(ExitCode::SUCCESS)
}

// -- Batch plumbing -----------------------------------------------------------

fn gather_inputs(paths: &[PathBuf], recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = collect_documents(path, recursive)
                .with_context(|| format!("cannot read folder {}", path.display()))?;
            files.extend(found);
        } else {
            // Validation reports missing or unsupported files per job.
            files.push(path.clone());
        }
    }
    Ok(files)
}

async fn run_batch(
    services: &AppServices,
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    overrides: RunOverrides,
) -> anyhow::Result<ExitCode> {
    let (decider, prompter) = if overrides.policy == Some(CollisionPolicy::Confirm)
        || (overrides.policy.is_none()
            && docwerk_core::config::collision_policy(&services.config()) == CollisionPolicy::Confirm)
    {
        let (decider, requests) = ChannelDecider::new();
        let prompter = std::thread::spawn(move || answer_overwrite_prompts(requests));
        (Some(Arc::new(decider) as Arc<dyn OverwriteDecider>), Some(prompter))
    } else {
        (None, None)
    };

    let orchestrator = services.orchestrator(&overrides, decider);
    let cancel = CancellationFlag::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping after the current file...");
                cancel.cancel();
            }
        })
    };

    let needs_engine = files
        .iter()
        .any(|f| DocumentKind::from_path(f) == Some(DocumentKind::LegacyBinary));
    let pool = services.pool().cloned();
    let total = files.len();
    let out = output.clone();

    let result = tokio::task::spawn_blocking(move || {
        if needs_engine && let Some(pool) = &pool {
            pool.warm_up();
        }
        let observer = ConsoleObserver { total };
        orchestrator.run(&files, out.as_deref(), &cancel, &observer)
    })
    .await
    .context("batch worker stopped unexpectedly")?;

    watcher.abort();
    if let Some(prompter) = prompter
        && prompter.join().is_err()
    {
        tracing::warn!("Overwrite prompt thread panicked");
    }

    services.remember_output_folder(output.as_deref());
    print_summary(&result);
    Ok(if result.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Answer overwrite questions on the terminal until the batch drops its end.
fn answer_overwrite_prompts(requests: std::sync::mpsc::Receiver<OverwriteRequest>) {
    let stdin = std::io::stdin();
    for request in requests {
        eprint!("{} exists. Overwrite? [y/N] ", request.path.display());
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        let yes = stdin.lock().read_line(&mut line).is_ok()
            && matches!(line.trim(), "y" | "Y" | "yes");
        request.respond(yes);
    }
}

struct ConsoleObserver {
    total: usize,
}

impl BatchObserver for ConsoleObserver {
    fn job_updated(&self, job: &ConversionJob) {
        if !job.status.is_terminal() {
            return;
        }
        let mark = match job.status {
            JobStatus::Succeeded => "ok  ",
            JobStatus::Skipped => "skip",
            _ => "FAIL",
        };
        let detail = match (&job.status, &job.output) {
            (JobStatus::Succeeded, Some(out)) => pdf_detail(out),
            _ => job.message.clone().unwrap_or_default(),
        };
        println!("[{}/{}] {mark} {}  {detail}", job.index + 1, self.total, job.file_name());
    }
}

fn pdf_detail(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => format!("{} ({})", path.display(), human_size(meta.len())),
        Err(_) => path.display().to_string(),
    }
}

fn print_summary(result: &BatchResult) {
    let secs = result.elapsed.as_secs_f64();
    let time = if secs < 60.0 {
        format!("{secs:.1} s")
    } else {
        format!("{} min {:.0} s", (secs / 60.0) as u64, secs % 60.0)
    };
    println!();
    println!(
        "{} converted, {} failed, {} skipped of {} in {time}{}",
        result.success,
        result.failed,
        result.skipped,
        result.total,
        if result.cancelled { " (cancelled)" } else { "" }
    );
}
