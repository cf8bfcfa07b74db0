use clap::Parser;
use favsync_lib::config::{Role, SyncSettings};
use favsync_lib::core::SyncEngine;
use favsync_lib::logging::{default_log_dir, LogConfig, SizeRotatingWriter};
use favsync_lib::storage::connect_remote;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

/// Synchronizes media-center favourites between installations over
/// FTP/SFTP/WebDAV. Runs one pass and exits.
#[derive(Parser)]
#[command(name = "favsync", version, about)]
struct Cli {
    /// Configuration file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured role and skip auto-detection for this run.
    #[arg(long, value_enum)]
    role: Option<RoleArg>,

    /// Print the end-of-run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum RoleArg {
    Primary,
    Secondary,
}

/// Wires up the file log (size-rotated) plus a console layer.
fn init_logging(config: &LogConfig) {
    if !config.enabled {
        let subscriber = tracing_subscriber::registry();
        let _ = tracing::subscriber::set_global_default(subscriber);
        return;
    }

    let level = config.tracing_level();
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("opendal=warn".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap());

    match SizeRotatingWriter::new(&default_log_dir(), config.max_size_mb) {
        Ok(file_writer) => {
            let console_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(console_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        Err(e) => {
            let console_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
            tracing::warn!("file logging unavailable: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(|| favsync_lib::dirs::data_dir().join("config.json"));

    let mut settings = match SyncSettings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("favsync: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings.log);

    if !settings.enabled {
        tracing::info!("sync is disabled, nothing to do");
        return ExitCode::SUCCESS;
    }

    if let Some(role) = cli.role {
        settings.role = match role {
            RoleArg::Primary => Role::Primary,
            RoleArg::Secondary => Role::Secondary,
        };
        settings.auto_detect_role = false;
    }

    let store = match connect_remote(&settings.remote) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("cannot set up remote endpoint: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = SyncEngine::new(settings, store).run().await;

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => tracing::warn!("cannot serialize report: {}", e),
        }
    }

    if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
