use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use webspeed_lib::batch::{CancelHandle, ProgressStatus};
use webspeed_lib::cdp::InitiatorType;
use webspeed_lib::commands;
use webspeed_lib::config::{default_config_path, AppConfig};
use webspeed_lib::{AppState, HistoryStore};

#[derive(Parser, Debug)]
#[command(name = "webspeed", version, about = "Measure and compare web page load performance")]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// History database path, overriding the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan one URL and print the result with its findings
    Scan {
        url: String,
        /// Save a full-page screenshot here
        #[arg(long)]
        screenshot: Option<PathBuf>,
        /// Do not record the scan in history
        #[arg(long)]
        no_save: bool,
        /// Only list resources of this type (img, script, css, font, xhr, fetch, iframe, other)
        #[arg(long)]
        resources: Option<String>,
    },
    /// Scan several URLs one after another
    Batch {
        urls: Vec<String>,
        /// Read additional URLs from a file, one per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Browse stored scans
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Scan two URLs and compare them
    Compare { before: String, after: String },
    /// Compare two stored scans by id
    CompareHistory { before_id: i64, after_id: i64 },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    List {
        #[arg(long)]
        limit: Option<u32>,
    },
    Show { id: i64 },
    Delete { id: i64 },
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webspeed=info,webspeed_lib=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if let Some(db) = cli.db.clone() {
        config.storage.db_path = Some(db);
    }

    let db_path = config.storage.resolved_db_path();
    let store = HistoryStore::open(&db_path)
        .with_context(|| format!("Failed to open history at {:?}", db_path))?;
    let state = AppState::new(config, store);

    match cli.command {
        Command::Scan {
            url,
            screenshot,
            no_save,
            resources,
        } => {
            let kind = resources.as_deref().map(InitiatorType::from);
            let save = no_save.then_some(false);
            let mut report = commands::scan_url(&state, &url, screenshot, save)
                .await
                .map_err(anyhow::Error::msg)?;
            if kind.is_some() {
                report.result.resources = commands::filter_resources(&report.result, kind);
            }
            print_json(&report)?;
        }
        Command::Batch { mut urls, file } => {
            if let Some(file) = file {
                urls.extend(read_url_file(&file)?);
            }

            let cancel = CancelHandle::default();
            spawn_ctrl_c(cancel.clone());

            let report = commands::batch_scan(&state, &urls, cancel, |event| match &event.status {
                ProgressStatus::Error(_) => warn!("[{}/{}] {} {}", event.index + 1, urls.len(), event.url, event.status),
                _ => info!("[{}/{}] {} {}", event.index + 1, urls.len(), event.url, event.status),
            })
            .await
            .map_err(anyhow::Error::msg)?;
            print_json(&report)?;
        }
        Command::History { action } => match action {
            HistoryAction::List { limit } => {
                print_json(&commands::list_history(&state, limit).map_err(anyhow::Error::msg)?)?
            }
            HistoryAction::Show { id } => {
                print_json(&commands::get_history(&state, id).map_err(anyhow::Error::msg)?)?
            }
            HistoryAction::Delete { id } => {
                commands::delete_history(&state, id).map_err(anyhow::Error::msg)?;
                info!("Deleted scan {}", id);
            }
            HistoryAction::Clear => commands::clear_history(&state).map_err(anyhow::Error::msg)?,
        },
        Command::Compare { before, after } => {
            let comparison = commands::compare_live(&state, &before, &after)
                .await
                .map_err(anyhow::Error::msg)?;
            print_json(&comparison)?;
        }
        Command::CompareHistory {
            before_id,
            after_id,
        } => {
            let comparison = commands::compare_history(&state, before_id, after_id)
                .map_err(anyhow::Error::msg)?;
            print_json(&comparison)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Non-empty lines not starting with `#`
fn read_url_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {:?}", path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn spawn_ctrl_c(cancel: CancelHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, finishing the current URL");
                cancel.cancel();
            }
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    });
}
