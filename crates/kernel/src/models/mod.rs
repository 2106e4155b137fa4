//! Database models.

pub mod dashboard;
pub mod plugin_setting;

pub use dashboard::{
    MAX_TITLE_LENGTH, SaveDashboard, StoredDashboard, payload_revision, payload_title, slugify,
};
pub use plugin_setting::{MAX_PLUGIN_ID_LENGTH, MAX_VERSION_LENGTH, PluginSetting};
