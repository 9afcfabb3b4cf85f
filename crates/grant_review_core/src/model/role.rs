//! Organization-level and grant-level roles.
//!
//! Roles are closed sum types; persisted strings are converted at the storage
//! boundary and never compared directly by policy code.

use serde::{Deserialize, Serialize};

/// Global role a user holds inside their organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationRole {
    /// May create grants.
    Admin,
    Editor,
    Viewer,
    /// Assigned to every new user.
    #[default]
    Basic,
}

impl OrganizationRole {
    /// Stable string stored in `users.organization_role`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
            Self::Basic => "basic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            "basic" => Some(Self::Basic),
            _ => None,
        }
    }
}

/// Role a user holds on one grant through a `GrantUser` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantRole {
    Admin,
    Editor,
    Viewer,
}

impl GrantRole {
    /// Stable string stored in `grant_users.grant_role`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Returns whether this role may mutate grant-scoped resources.
    pub fn can_edit(self) -> bool {
        matches!(self, Self::Admin | Self::Editor)
    }
}

#[cfg(test)]
mod tests {
    use super::{GrantRole, OrganizationRole};

    #[test]
    fn organization_role_defaults_to_basic() {
        assert_eq!(OrganizationRole::default(), OrganizationRole::Basic);
    }

    #[test]
    fn roles_round_trip_through_storage_strings() {
        for role in [
            OrganizationRole::Admin,
            OrganizationRole::Editor,
            OrganizationRole::Viewer,
            OrganizationRole::Basic,
        ] {
            assert_eq!(OrganizationRole::parse(role.as_str()), Some(role));
        }
        for role in [GrantRole::Admin, GrantRole::Editor, GrantRole::Viewer] {
            assert_eq!(GrantRole::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn grant_role_rejects_unknown_and_organization_only_values() {
        assert_eq!(GrantRole::parse("basic"), None);
        assert_eq!(GrantRole::parse("Admin"), None);
    }

    #[test]
    fn only_admin_and_editor_can_edit() {
        assert!(GrantRole::Admin.can_edit());
        assert!(GrantRole::Editor.can_edit());
        assert!(!GrantRole::Viewer.can_edit());
    }
}
