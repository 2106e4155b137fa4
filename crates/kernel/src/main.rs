//! Plugdash
//!
//! Plugin dashboard reconciler: health/metrics server, notification
//! consumer, and plugin management CLI.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use plugdash_kernel::config::Config;
use plugdash_kernel::events::{PluginEventBus, RedisEventSource, run_event_loop};
use plugdash_kernel::plugin::cli;
use plugdash_kernel::routes;
use plugdash_kernel::state::AppState;

/// Plugin dashboard reconciler.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the startup sweep, then serve health/metrics and consume notifications.
    Serve,

    /// Run the startup sweep once and exit.
    Sweep,

    /// Inspect and manage plugins per organization.
    #[command(subcommand)]
    Plugin(PluginCommand),
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List plugin settings and their sync state.
    List {
        /// Restrict to one organization.
        #[arg(long)]
        org: Option<i64>,
    },

    /// Show a plugin's dashboards and the action a sync pass would take.
    Dashboards {
        #[arg(long)]
        org: i64,
        plugin: String,
    },

    /// Enable a plugin and import its dashboards.
    Enable {
        #[arg(long)]
        org: i64,
        plugin: String,
    },

    /// Disable a plugin and delete its dashboards.
    Disable {
        #[arg(long)]
        org: i64,
        plugin: String,
    },

    /// Force a dashboard sync pass for a plugin.
    Sync {
        #[arg(long)]
        org: i64,
        plugin: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();

    let config = Config::from_env().context("failed to load configuration")?;

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let cancel = CancellationToken::new();
    spawn_shutdown_signal(cancel.clone());

    match args.command {
        Command::Serve => serve(&config, state, cancel).await,
        Command::Sweep => {
            let report = state.reconciler().reconcile_all(&cancel).await;
            println!(
                "Examined {} setting(s): {} synced, {} failed, {} up to date, {} disabled, {} not installed.",
                report.examined,
                report.synced,
                report.failed,
                report.up_to_date,
                report.skipped_disabled,
                report.skipped_uninstalled
            );
            if !report.completed {
                anyhow::bail!("sweep did not complete");
            }
            Ok(())
        }
        Command::Plugin(cmd) => match cmd {
            PluginCommand::List { org } => cli::cmd_plugin_list(&state, org).await,
            PluginCommand::Dashboards { org, plugin } => {
                cli::cmd_plugin_dashboards(&state, org, &plugin).await
            }
            PluginCommand::Enable { org, plugin } => {
                cli::cmd_plugin_enable(&state, org, &plugin, &cancel).await
            }
            PluginCommand::Disable { org, plugin } => {
                cli::cmd_plugin_disable(&state, org, &plugin, &cancel).await
            }
            PluginCommand::Sync { org, plugin } => {
                cli::cmd_plugin_sync(&state, org, &plugin, &cancel).await
            }
        },
    }
}

async fn serve(config: &Config, state: AppState, cancel: CancellationToken) -> Result<()> {
    info!(plugins = state.registry().len(), "starting plugdash");

    if config.sync_on_startup {
        state.reconciler().reconcile_all(&cancel).await;
    }

    let bus = Arc::new(
        PluginEventBus::builder()
            .subscribe(state.reconciler().clone())
            .build(),
    );
    info!(handlers = bus.handler_count(), "plugin state handlers registered");

    let (tx, rx) = mpsc::channel(config.event_queue_capacity);

    let source = RedisEventSource::new(state.redis().clone(), config.events_channel.clone());
    let source_cancel = cancel.clone();
    tokio::spawn(async move {
        source.run(tx, source_cancel.clone()).await;
        // Without a source no notification can arrive; stop serving.
        if !source_cancel.is_cancelled() {
            error!("plugin state notification source stopped, shutting down");
            source_cancel.cancel();
        }
    });

    let event_loop = tokio::spawn(run_event_loop(bus, rx, cancel.clone()));

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::metrics::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    // Stop the consumers if the server exited on its own.
    cancel.cancel();
    match event_loop.await {
        Ok(handled) => info!(handled, "notification consumer stopped"),
        Err(e) => warn!(error = %e, "notification consumer panicked"),
    }

    Ok(())
}

/// Cancel `cancel` on Ctrl-C.
fn spawn_shutdown_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        info!("shutdown requested");
        cancel.cancel();
    });
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
