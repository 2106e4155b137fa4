//! Identities that dashboard writes are attributed to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Organization role of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Viewer,
    Editor,
    Admin,
}

/// Kind of identity behind a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// A real signed-in user.
    User(i64),
    /// The service itself, acting without an end user.
    System,
}

/// An identity scoped to a single organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub org_id: i64,
    pub role: OrgRole,
}

impl Principal {
    /// The system identity used for plugin dashboard imports.
    ///
    /// Admin within `org_id` only; it carries no user id.
    pub fn system_admin(org_id: i64) -> Self {
        Self {
            kind: PrincipalKind::System,
            org_id,
            role: OrgRole::Admin,
        }
    }

    /// True if this principal may write dashboards in `org_id`.
    pub fn can_write_dashboards(&self, org_id: i64) -> bool {
        self.org_id == org_id && matches!(self.role, OrgRole::Editor | OrgRole::Admin)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PrincipalKind::System => write!(f, "system:org-{}", self.org_id),
            PrincipalKind::User(id) => write!(f, "user:{id}"),
        }
    }
}
