//! Plugin discovery for Plugdash.
//!
//! This module handles:
//! - Parsing plugin metadata from `.info.toml` files
//! - Indexing installed plugins and their bundled dashboards
//! - CLI commands for inspecting and toggling plugins per organization

pub mod cli;
mod error;
mod info_parser;
mod registry;

pub use error::PluginError;
pub use info_parser::{
    INCLUDE_DASHBOARD, KNOWN_INCLUDE_TYPES, PluginInclude, PluginInfo, is_contained_path,
};
pub use registry::{DashboardInclude, PluginDescriptor, PluginLookup, PluginRegistry};
