//! Stored dashboard model.
//!
//! Dashboards are unique per (organization, slug). Plugin-provided
//! dashboards carry the owning plugin's identifier in `plugin_id`; user
//! dashboards leave it empty.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Revision assumed when a payload carries none.
pub const DEFAULT_REVISION: i64 = 1;

/// Longest title or slug the `dashboard` table stores, in characters.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Stored dashboard record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredDashboard {
    /// Database identifier.
    pub id: i64,

    /// Stable external identifier (UUIDv7).
    pub uid: Uuid,

    /// Owning organization.
    pub org_id: i64,

    /// Plugin that provided the dashboard, empty for user dashboards.
    pub plugin_id: String,

    /// Dashboard title.
    pub title: String,

    /// URL slug derived from the title.
    pub slug: String,

    /// Dashboard payload (opaque JSON document).
    pub data: JsonValue,

    /// Principal that last wrote the dashboard.
    pub updated_by: String,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last updated.
    pub updated: i64,
}

/// Input for saving a dashboard.
#[derive(Debug, Clone)]
pub struct SaveDashboard {
    pub org_id: i64,
    pub plugin_id: String,
    pub title: String,
    pub slug: String,
    pub data: JsonValue,
    pub updated_by: String,
}

const COLUMNS: &str = "id, uid, org_id, plugin_id, title, slug, data, updated_by, created, updated";

impl StoredDashboard {
    /// Revision recorded in the stored payload.
    pub fn revision(&self) -> i64 {
        payload_revision(&self.data)
    }

    /// List dashboards attributed to a plugin within an organization.
    pub async fn list_by_plugin(pool: &PgPool, org_id: i64, plugin_id: &str) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM dashboard WHERE org_id = $1 AND plugin_id = $2 ORDER BY slug"
        );

        let dashboards = sqlx::query_as::<_, StoredDashboard>(&sql)
            .bind(org_id)
            .bind(plugin_id)
            .fetch_all(pool)
            .await
            .context("failed to list dashboards by plugin")?;

        Ok(dashboards)
    }

    /// Insert or replace the dashboard at `(org_id, slug)`.
    ///
    /// An existing row keeps its id and uid; everything else is overwritten.
    /// Returns None if the row belongs to a different plugin, which is left
    /// untouched.
    pub async fn upsert(pool: &PgPool, input: &SaveDashboard) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            r#"
            INSERT INTO dashboard (uid, org_id, plugin_id, title, slug, data, updated_by, created, updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (org_id, slug) DO UPDATE SET
                plugin_id = EXCLUDED.plugin_id,
                title = EXCLUDED.title,
                data = EXCLUDED.data,
                updated_by = EXCLUDED.updated_by,
                updated = EXCLUDED.updated
            WHERE dashboard.plugin_id = '' OR dashboard.plugin_id = EXCLUDED.plugin_id
            RETURNING {COLUMNS}
            "#
        );

        let dashboard = sqlx::query_as::<_, StoredDashboard>(&sql)
            .bind(Uuid::now_v7())
            .bind(input.org_id)
            .bind(&input.plugin_id)
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.data)
            .bind(&input.updated_by)
            .bind(now)
            .fetch_optional(pool)
            .await
            .context("failed to upsert dashboard")?;

        Ok(dashboard)
    }

    /// Insert a dashboard, returning None if the slug is already taken.
    pub async fn insert(pool: &PgPool, input: &SaveDashboard) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            r#"
            INSERT INTO dashboard (uid, org_id, plugin_id, title, slug, data, updated_by, created, updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (org_id, slug) DO NOTHING
            RETURNING {COLUMNS}
            "#
        );

        let dashboard = sqlx::query_as::<_, StoredDashboard>(&sql)
            .bind(Uuid::now_v7())
            .bind(input.org_id)
            .bind(&input.plugin_id)
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.data)
            .bind(&input.updated_by)
            .bind(now)
            .fetch_optional(pool)
            .await
            .context("failed to insert dashboard")?;

        Ok(dashboard)
    }

    /// Delete a dashboard by id within an organization.
    ///
    /// Returns false if nothing matched.
    pub async fn delete(pool: &PgPool, id: i64, org_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dashboard WHERE id = $1 AND org_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(pool)
            .await
            .context("failed to delete dashboard")?;

        Ok(result.rows_affected() > 0)
    }
}

/// Read the `revision` field of a dashboard payload.
///
/// Missing, non-integer, or non-positive values count as [`DEFAULT_REVISION`].
pub fn payload_revision(data: &JsonValue) -> i64 {
    data.get("revision")
        .and_then(JsonValue::as_i64)
        .filter(|r| *r > 0)
        .unwrap_or(DEFAULT_REVISION)
}

/// Read the non-empty `title` field of a dashboard payload.
pub fn payload_title(data: &JsonValue) -> Option<&str> {
    data.get("title")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Derive a URL slug from a dashboard title.
///
/// ASCII letters and digits are lowercased; every other run of characters
/// becomes a single `-`. Leading and trailing separators are dropped.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Nginx Overview"), "nginx-overview");
        assert_eq!(slugify("  CPU / Memory -- Usage!  "), "cpu-memory-usage");
        assert_eq!(slugify("HTTP 5xx"), "http-5xx");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Überblick Ω"), "berblick");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn revision_defaults_to_one() {
        assert_eq!(payload_revision(&json!({})), 1);
        assert_eq!(payload_revision(&json!({"revision": "7"})), 1);
        assert_eq!(payload_revision(&json!({"revision": 0})), 1);
        assert_eq!(payload_revision(&json!({"revision": 7})), 7);
    }

    #[test]
    fn title_must_be_non_empty_string() {
        assert_eq!(payload_title(&json!({"title": " Nginx "})), Some("Nginx"));
        assert_eq!(payload_title(&json!({"title": ""})), None);
        assert_eq!(payload_title(&json!({"title": 3})), None);
        assert_eq!(payload_title(&json!([])), None);
    }
}
