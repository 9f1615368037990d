//! hook-notifier
//!
//! Desktop notification daemon for coding agent hook events. Cards are
//! shown on a notification board; clicking one brings the project's editor
//! window to the front on X11.

mod client;
mod config;
mod focus;
mod notification;
mod server;
mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notifier_ipc::{Request, Response};
use serde_json::{Value, json};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use client::IpcClient;
use config::Config;
use focus::FocusService;
use focus::enumerate::{XDOTOOL, Xdotool};
use focus::error_log::ErrorLog;
use focus::mapping::FocusMapping;
use focus::x11::X11Connector;
use server::IpcServer;
use ui::Ui;

/// Command-line interface for `hook-notifier`.
#[derive(Parser, Debug)]
#[command(name = "hook-notifier", about = "Notification cards with editor window focus", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the notification daemon.
    Daemon,
    /// Read a hook event as JSON from stdin and show it.
    Notify,
    /// Bring a project window to the front.
    Focus(FocusArgs),
    /// List open editor windows.
    Windows,
    /// Re-read the focus mapping.
    Reload,
    /// Show cards currently on the board.
    Status,
    /// Dismiss all cards.
    Clear,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct FocusArgs {
    /// Card to focus, as listed by `status`.
    #[arg(long, value_name = "ID")]
    card: Option<u64>,

    /// Project directory to look up in the focus mapping.
    #[arg(long, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// X11 window id.
    #[arg(long, value_name = "ID")]
    window: Option<u32>,
}

impl FocusArgs {
    fn request(&self) -> Option<Request> {
        if let Some(card_id) = self.card {
            Some(Request::Focus { card_id })
        } else if let Some(cwd) = &self.cwd {
            Some(Request::FocusProject {
                cwd: cwd.display().to_string(),
            })
        } else {
            self.window.map(|window_id| Request::FocusWindow { window_id })
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hook_notifier=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon => run_daemon().await,
        Commands::Notify => notify().await,
        Commands::Focus(args) => {
            let request = args.request().context("one of --card, --cwd or --window is required")?;
            send_and_print(request).await
        }
        Commands::Windows => send_and_print(Request::ListWindows).await,
        Commands::Reload => send_and_print(Request::Reload).await,
        Commands::Status => send_and_print(Request::Status).await,
        Commands::Clear => send_and_print(Request::ClearAll).await,
    }
}

async fn run_daemon() -> Result<()> {
    info!("Starting hook-notifier daemon");

    let config = Config::load()?;
    let mapping_path = config.mapping_path()?;
    let mapping = FocusMapping::load_or_default(&mapping_path).unwrap_or_else(|e| {
        warn!("Failed to load focus mapping, using defaults: {}", e);
        FocusMapping::default()
    });

    let search = Xdotool {
        program: XDOTOOL.to_string(),
        search_timeout: Duration::from_millis(config.focus.search_timeout_ms),
        title_timeout: Duration::from_millis(config.focus.title_timeout_ms),
    };
    let error_log = ErrorLog::default_path()
        .map(ErrorLog::new)
        .unwrap_or_else(ErrorLog::disabled);
    if let Some(path) = error_log.path() {
        info!("Focus failures are logged to {:?}", path);
    }
    let service = FocusService::new(
        X11Connector { display: None },
        search,
        mapping,
        config.focus.options(),
        error_log,
    )
    .with_mapping_path(mapping_path);

    let (ui, handle) = Ui::new(config.cards.clone(), Arc::new(service), config.focus.max_concurrent);
    let server = IpcServer::bind()?;
    let server_task = tokio::spawn(server.run(handle.clone()));
    let ui_task = tokio::spawn(ui.run());

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    handle.shutdown();
    server_task.abort();
    // Let the aborted server drop its socket file.
    let _ = server_task.await;
    ui_task.await.context("UI loop failed")?;
    Ok(())
}

/// Parse a hook event; anything that is not a JSON object becomes a placeholder event.
fn parse_hook_input(input: &str) -> Value {
    match serde_json::from_str::<Value>(input) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            warn!("Hook JSON is not an object: {}", other);
            json!({ "message": "Invalid JSON data" })
        }
        Err(e) => {
            warn!("Invalid hook JSON: {}", e);
            json!({ "message": "Invalid JSON data" })
        }
    }
}

async fn notify() -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read hook event from stdin")?;
    let payload = parse_hook_input(&input);

    let mut client = match IpcClient::connect().await {
        Ok(client) => client,
        Err(e) => {
            // A hook must never fail the agent that ran it.
            eprintln!("hook-notifier daemon is not running ({e}); start it with `hook-notifier daemon`");
            return Ok(());
        }
    };
    let response = client.send(&Request::Notify { payload }).await?;
    print_response(&response);
    Ok(())
}

async fn send_and_print(request: Request) -> Result<()> {
    let mut client = IpcClient::connect()
        .await
        .context("hook-notifier daemon is not running")?;
    let response = client.send(&request).await?;
    print_response(&response);
    if let Response::Error { message } = response {
        anyhow::bail!(message);
    }
    Ok(())
}

fn print_response(response: &Response) {
    match response {
        Response::Ack { card_id: Some(id) } => println!("ok (card {id})"),
        Response::Ack { card_id: None } => println!("ok"),
        Response::FocusStatus { ok, message } => {
            if *ok {
                println!("{message}");
            } else {
                eprintln!("{message}");
            }
        }
        Response::Windows { entries } => {
            if entries.is_empty() {
                println!("No editor windows open");
            }
            for entry in entries {
                println!("{:#010x}  {:<8} {}", entry.window_id, entry.editor, entry.title);
            }
        }
        Response::Cards {
            cards,
            status,
            shortcuts,
        } => {
            if cards.is_empty() {
                println!("No cards");
            }
            for card in cards {
                let marker = if card.critical { "!" } else { " " };
                println!("{marker} {:>4}  {}", card.id, card.title);
                for line in card.body.lines() {
                    println!("        {line}");
                }
            }
            if !shortcuts.is_empty() {
                let bar: Vec<_> = shortcuts
                    .iter()
                    .map(|s| format!("[{} {:#x}]", s.editor, s.window_id))
                    .collect();
                println!("{}", bar.join(" "));
            }
            if let Some(status) = status {
                println!("-- {status}");
            }
        }
        Response::Error { message } => eprintln!("error: {message}"),
    }
}
