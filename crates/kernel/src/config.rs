//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port for the health and metrics listener (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Redis connection URL used for plugin state notifications.
    pub redis_url: String,

    /// Path to plugins directory (default: ./plugins).
    pub plugins_dir: PathBuf,

    /// Redis pub/sub channel carrying plugin state changes.
    pub events_channel: String,

    /// Capacity of the in-process notification queue (default: 256).
    pub event_queue_capacity: usize,

    /// Run the startup sweep before accepting notifications (default: true).
    pub sync_on_startup: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let plugins_dir = env::var("PLUGINS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./plugins"));

        let events_channel = env::var("PLUGIN_EVENTS_CHANNEL")
            .unwrap_or_else(|_| "plugin_state_changed".to_string());

        let event_queue_capacity = env::var("EVENT_QUEUE_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .context("EVENT_QUEUE_CAPACITY must be a valid usize")?;

        let sync_on_startup = match env::var("SYNC_ON_STARTUP") {
            Ok(v) => parse_bool(&v).context("SYNC_ON_STARTUP must be true or false")?,
            Err(_) => true,
        };

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            redis_url,
            plugins_dir,
            events_channel,
            event_queue_capacity,
            sync_on_startup,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized boolean '{other}'"),
    }
}
