// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! `statemig`: export the contract state of a ledger into a sharded tree, and
//! replay such a tree as batches of ledger actions.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam::channel::RecvTimeoutError;
use settings::{build_settings, Settings};
use statemig_migration_exports::{
    Batch, ExporterConfig, MigrationContext, MigrationEvent, MigrationStats, MigratorConfig,
};
use statemig_migration_worker::{
    export, load_bootstrap_contract, start_migration_worker, JsonSnapshotSource,
};
use statemig_models::name::Name;
use statemig_models::public_key::PublicKey;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

mod settings;

#[derive(Parser)]
#[command(name = "statemig")]
#[command(about = "Chain-state export and migration tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a ledger snapshot into an export tree and print the report
    #[command(alias = "migrate")]
    Export {
        /// Root of the export tree
        #[arg(long)]
        export_dir: PathBuf,
        /// JSON snapshot of the source ledger
        #[arg(long)]
        snapshot_path: PathBuf,
        /// Config file read instead of config/config.toml
        #[arg(long)]
        fallback_config: Option<PathBuf>,
    },

    /// Replay an export tree, one JSON line of actions per batch
    Replay {
        /// Root of the export tree
        #[arg(long)]
        export_dir: PathBuf,
        /// Key controlling every created account
        #[arg(long)]
        public_key: String,
        /// Output file, stdout if absent
        #[arg(long)]
        output: Option<PathBuf>,
        /// Config file read instead of config/config.toml
        #[arg(long)]
        fallback_config: Option<PathBuf>,
    },
}

const POLL_PERIOD: Duration = Duration::from_millis(100);

fn init_logging(level: usize) {
    use tracing_subscriber::prelude::*;
    let filter = match level {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let tracing_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(tracing_layer).init();
}

fn load_settings(fallback_config: Option<&Path>) -> Result<Settings> {
    let settings = build_settings(fallback_config).context("could not load settings")?;
    init_logging(settings.logging.level);
    Ok(settings)
}

fn run_export(export_dir: PathBuf, snapshot_path: &Path, settings: &Settings) -> Result<()> {
    let source = JsonSnapshotSource::load(snapshot_path)
        .with_context(|| format!("could not load snapshot {:?}", snapshot_path))?;
    let config = ExporterConfig {
        export_dir,
        export_permissions: settings.exporter.export_permissions,
    };
    let report = export(&source, &config).context("export failed")?;
    if report.skipped() > 0 {
        warn!("{} contract accounts were not exported", report.skipped());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn write_batch(out: &mut dyn Write, batch: &Batch, system_account: Name) -> Result<()> {
    let mut actions = Vec::new();
    for operation in batch {
        actions.extend(operation.to_actions(system_account)?);
    }
    serde_json::to_writer(&mut *out, &actions)?;
    writeln!(out)?;
    Ok(())
}

fn run_replay(
    export_dir: PathBuf,
    public_key: &str,
    output: Option<PathBuf>,
    settings: &Settings,
) -> Result<MigrationStats> {
    let public_key: PublicKey = public_key
        .parse()
        .with_context(|| format!("invalid public key {}", public_key))?;
    let bootstrap = load_bootstrap_contract(settings.migrator.bootstrap_code_path.as_deref())
        .context("could not load the bootstrap contract")?;
    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).with_context(|| format!("could not create {:?}", path))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupted.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))
        .context("could not install the interrupt handler")?;

    let config = MigratorConfig {
        export_dir,
        system_account: settings.migrator.system_account,
        creator_account: settings.migrator.creator_account,
        channel_capacity: settings.migrator.channel_capacity,
    };
    let system_account = config.system_account;
    let (receiver, mut manager) =
        start_migration_worker(config, MigrationContext::new(bootstrap, public_key));

    let mut stop_requested = false;
    let outcome = loop {
        if !stop_requested && interrupted.load(Ordering::Relaxed) {
            info!("interrupt signal received, finishing the in-flight scope");
            stop_requested = true;
            manager.request_stop();
        }
        // keep draining after a stop request: the walk ends with `Finished`
        match receiver.recv_timeout(POLL_PERIOD) {
            Ok(MigrationEvent::Batch(batch)) => {
                if let Err(err) = write_batch(&mut out, &batch, system_account) {
                    break Err(err);
                }
            }
            Ok(MigrationEvent::Finished(stats)) => break Ok(stats),
            Ok(MigrationEvent::Failed(reason)) => break Err(anyhow!(reason)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                break Err(anyhow!("migration worker exited without a result"))
            }
        }
    };

    // dropping the receiver unblocks a worker still sending after a write error
    drop(receiver);
    manager.stop();
    out.flush()?;
    outcome
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Export {
            export_dir,
            snapshot_path,
            fallback_config,
        } => {
            let settings = load_settings(fallback_config.as_deref())?;
            run_export(export_dir, &snapshot_path, &settings)
        }
        Commands::Replay {
            export_dir,
            public_key,
            output,
            fallback_config,
        } => {
            let settings = load_settings(fallback_config.as_deref())?;
            let stats = run_replay(export_dir, &public_key, output, &settings)?;
            info!(
                "replayed {} batches ({} accounts, {} contracts, {} rows){}",
                stats.batches,
                stats.accounts_created,
                stats.contracts_migrated,
                stats.rows,
                if stats.cancelled { ", cancelled" } else { "" }
            );
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
