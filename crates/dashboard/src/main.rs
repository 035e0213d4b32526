use std::process::ExitCode;
use std::sync::Arc;

use skytorch::app::{Dashboard, DashboardOptions};
use skytorch::chat::DashboardView;
use skytorch::command::{Command, HELP, parse_command};
use skytorch::settings::Settings;
use skytorch::status::{ConnectionStatusMonitor, StatusBoard};
use skytorch_remote::{HttpRemoteStore, StaticCsrfToken};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "skytorch=info,skytorch_remote=info";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to initialize tracing subscriber: {error}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let settings = Settings::load();
    let store = match HttpRemoteStore::new(
        &settings.base_url,
        Arc::new(StaticCsrfToken::new(settings.csrf_token.clone())),
    ) {
        Ok(store) => Arc::new(store),
        Err(error) => {
            tracing::error!(stage = error.stage(), error = %error, "cannot reach remote store");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(base_url = %store.base_url(), "dashboard starting");

    let board = StatusBoard::new();
    let monitor =
        ConnectionStatusMonitor::new(store.clone(), board.clone(), settings.poll_interval()).start();

    let options = DashboardOptions::from(&settings);
    let (intent_tx, intent_rx) = mpsc::channel(32);
    let (view_tx, mut view_rx) = watch::channel(DashboardView::landing(&options.brand_name));
    let dashboard = tokio::spawn(Dashboard::new(store, board, options).run(intent_rx, view_tx));

    let printer = tokio::spawn(async move {
        while view_rx.changed().await.is_ok() {
            let view = view_rx.borrow_and_update().clone();
            println!("{view}");
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(error = %error, "failed to read input");
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(Command::Intent(intent))) => {
                if intent_tx.send(intent).await.is_err() {
                    break;
                }
            }
            Ok(Some(Command::Help)) => println!("{HELP}"),
            Ok(Some(Command::Quit)) => break,
            Ok(None) => {}
            Err(error) => println!("{error}"),
        }
    }

    drop(intent_tx);
    monitor.shutdown().await;
    if let Err(error) = dashboard.await {
        tracing::warn!(error = %error, "dashboard task ended abnormally");
    }
    if let Err(error) = printer.await {
        tracing::warn!(error = %error, "render task ended abnormally");
    }
    ExitCode::SUCCESS
}
