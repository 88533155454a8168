//! Issuance Lane CLI
//!
//! Entry point for the `issuance-lane` command-line tool.

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use issuance_lane::config::{IssuerConfig, DEFAULT_CONFIG_PATH};
use issuance_lane::dispatch::{DispatchConfig, Dispatcher, RunReport};
use issuance_lane::{CancelFlag, DirTransport, FileRegistry, PdfRenderer, ZipCodec};

#[derive(Parser)]
#[command(name = "issuance-lane")]
#[command(about = "Issuance pack generation and dispatch", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process pending entries: build, publish and record issuance packs
    Run {
        /// Path to config file (default: issuance.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Build and verify packs without publishing or updating the registry
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration file
    Verify {
        /// Path to config file (default: issuance.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { config, dry_run } => run_dispatch(config, dry_run),
        Commands::Verify { config } => run_verify(config),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn config_path(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn run_dispatch(config: Option<PathBuf>, dry_run: bool) {
    let path = config_path(config);
    let config = match IssuerConfig::from_file(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let cancel = match CancelFlag::install() {
        Ok(flag) => Some(flag),
        Err(e) => {
            tracing::warn!(error = %e, "signal handler not installed");
            None
        }
    };

    let mut dispatcher = Dispatcher::new(
        DispatchConfig {
            base_url: config.base_url.clone(),
            dry_run,
        },
        Box::new(FileRegistry::new(&config.registry_path)),
        Box::new(FileRegistry::new(&config.registry_path)),
        Box::new(PdfRenderer::new()),
        Box::new(ZipCodec::new()),
        Arc::new(DirTransport::new(&config.store_root)),
    );
    if let Some(flag) = cancel {
        dispatcher = dispatcher.with_cancel_flag(flag);
    }

    match dispatcher.run() {
        Ok(report) => {
            println!(
                "Run {}: {} issued, {} unrecorded, {} failed ({} selected)",
                report.run_id,
                report.issued,
                report.unrecorded,
                report.failed,
                report.entries.len()
            );
            if let Some(dir) = &config.report_dir {
                if let Err(e) = write_report(dir, &report) {
                    eprintln!("Error writing run report: {e}");
                }
            }
            process::exit(report.exit_code());
        }
        Err(e) => {
            eprintln!("Run failed: {e}");
            process::exit(e.exit_code());
        }
    }
}

fn write_report(dir: &Path, report: &RunReport) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("run_report_{}.json", report.run_id));
    report.write_to_file(&path)?;
    println!("Report: {}", path.display());
    Ok(())
}

fn run_verify(config: Option<PathBuf>) {
    let path = config_path(config);
    match IssuerConfig::from_file(&path) {
        Ok(config) => {
            println!("Configuration valid: {}", path.display());
            println!();
            println!("  Registry: {}", config.registry_path.display());
            println!("  Store root: {}", config.store_root.display());
            println!("  Base URL: {}", config.base_url);
            if let Some(dir) = &config.report_dir {
                println!("  Reports: {}", dir.display());
            }
        }
        Err(e) => {
            eprintln!("Configuration invalid: {e}");
            process::exit(1);
        }
    }
}
