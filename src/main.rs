#![deny(dead_code)]
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, LevelFilter};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

mod ui;

use crate::ui::{DashboardUI, UiAction, ViewData};
use tgcrm::config::{default_config_path, load_config};
use tgcrm::crm::Workspace;
use tgcrm::logging::setup_logging;
use tgcrm::{BridgeApi, ChatController, Config, HttpBridge, RosterLoader, SyncCursor};

/// Command line arguments for tgcrm
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tgcrm: a terminal CRM dashboard for Telegram contacts.",
    long_about = "tgcrm shows clients, deals and tasks and lets you chat with Telegram contacts \
    through a bridge endpoint.\n\n\
    Settings are read from <config dir>/tgcrm/config.json when present; \
    command line options take precedence."
)]
struct Args {
    /// Bridge endpoint URL
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Where to write the log
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn resolve_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = load_config(&path)?;

    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(log_file) = &args.log_file {
        config.log_file = log_file.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    setup_logging(Some(&config.log_file), args.log_level)?;
    info!("tgcrm starting up");
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    info!("Bridge endpoint: {}", config.endpoint);

    let bridge = HttpBridge::new(&config.endpoint, config.request_timeout())
        .context("building HTTP client")?;
    let api: Arc<dyn BridgeApi> = Arc::new(bridge);

    let cursor = SyncCursor::default();
    let mut roster_loader = RosterLoader::new(api.clone(), cursor.clone());
    roster_loader.start(config.roster_interval());
    let mut chat = ChatController::new(api, config.poll_interval(), cursor);
    let workspace = Workspace::sample();

    let mut terminal = ui::setup_terminal()?;
    let mut dashboard = DashboardUI::new();

    let result = run_main_loop(&mut dashboard, &mut terminal, &mut chat, &roster_loader, &workspace, &config).await;
    if let Err(e) = &result {
        error!("Main loop failed: {}", e);
    }

    ui::restore_terminal(terminal)?;
    roster_loader.stop();
    chat.close().await;

    info!("tgcrm shut down");
    result
}

/// Run the main event loop
async fn run_main_loop(
    dashboard: &mut DashboardUI,
    terminal: &mut ui::Terminal<ui::CrosstermBackend<io::Stdout>>,
    chat: &mut ChatController,
    roster_loader: &RosterLoader,
    workspace: &Workspace,
    config: &Config,
) -> Result<()> {
    let roster_handle = roster_loader.roster();

    loop {
        let roster = roster_handle.lock().await.clone();
        let chat_snapshot = chat.snapshot().await;
        dashboard.sync_chat(&chat_snapshot);

        let view = ViewData {
            roster: &roster,
            workspace,
            chat: &chat_snapshot,
            config,
        };

        terminal.draw(|f| dashboard.draw(f, &view))?;

        match dashboard.handle_input(&view)? {
            Some(UiAction::Quit) => break,
            Some(UiAction::OpenChat(target)) => {
                info!("Opening chat with {} ({})", target.title, target.chat_id);
                chat.open(target).await;
            }
            Some(UiAction::CloseChat) => chat.close().await,
            Some(UiAction::Send(text)) => {
                chat.set_draft(&text).await;
                // Awaited so the next frame already sees the send in flight
                if chat.spawn_send().await.is_none() {
                    debug!("Nothing to send");
                }
            }
            None => {}
        }
    }

    Ok(())
}
