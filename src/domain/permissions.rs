//! Role → capability matrix.
//!
//! The matrix has a fixed shape: one [`RolePermissions`] row per [`Role`]
//! and one boolean per [`Capability`]. Lookups are exhaustive matches, so
//! every (role, capability) pair has an answer. Rows or fields missing from
//! a stored record deserialize as "denied".

use super::account::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A privileged action gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    // ---
    ViewDashboard,
    ManageUsers,
    ManageKnowledgeBase,
    ViewChatLogs,
    ManageRoles,
    ConfigureModel,
    ManageCompanyInfo,
    ConfigureSmtp,
}

impl Capability {
    // ---
    pub const ALL: [Capability; 8] = [
        Capability::ViewDashboard,
        Capability::ManageUsers,
        Capability::ManageKnowledgeBase,
        Capability::ViewChatLogs,
        Capability::ManageRoles,
        Capability::ConfigureModel,
        Capability::ManageCompanyInfo,
        Capability::ConfigureSmtp,
    ];

    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Capability::ViewDashboard => "view-dashboard",
            Capability::ManageUsers => "manage-users",
            Capability::ManageKnowledgeBase => "manage-knowledge-base",
            Capability::ViewChatLogs => "view-chat-logs",
            Capability::ManageRoles => "manage-roles",
            Capability::ConfigureModel => "configure-model",
            Capability::ManageCompanyInfo => "manage-company-info",
            Capability::ConfigureSmtp => "configure-smtp",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities granted to one role. Wire keys follow the admin UI
/// (`canManageUsers`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolePermissions {
    // ---
    pub can_view_dashboard: bool,
    pub can_manage_users: bool,
    pub can_manage_knowledge_base: bool,
    pub can_view_chat_logs: bool,
    pub can_manage_roles: bool,
    pub can_configure_model: bool,
    pub can_manage_company_info: bool,
    pub can_configure_smtp: bool,
}

impl RolePermissions {
    // ---
    pub const NONE: RolePermissions = RolePermissions {
        can_view_dashboard: false,
        can_manage_users: false,
        can_manage_knowledge_base: false,
        can_view_chat_logs: false,
        can_manage_roles: false,
        can_configure_model: false,
        can_manage_company_info: false,
        can_configure_smtp: false,
    };

    pub const ALL: RolePermissions = RolePermissions {
        can_view_dashboard: true,
        can_manage_users: true,
        can_manage_knowledge_base: true,
        can_view_chat_logs: true,
        can_manage_roles: true,
        can_configure_model: true,
        can_manage_company_info: true,
        can_configure_smtp: true,
    };

    pub fn allows(&self, capability: Capability) -> bool {
        // ---
        match capability {
            Capability::ViewDashboard => self.can_view_dashboard,
            Capability::ManageUsers => self.can_manage_users,
            Capability::ManageKnowledgeBase => self.can_manage_knowledge_base,
            Capability::ViewChatLogs => self.can_view_chat_logs,
            Capability::ManageRoles => self.can_manage_roles,
            Capability::ConfigureModel => self.can_configure_model,
            Capability::ManageCompanyInfo => self.can_manage_company_info,
            Capability::ConfigureSmtp => self.can_configure_smtp,
        }
    }

    pub fn with(mut self, capability: Capability, granted: bool) -> Self {
        // ---
        let slot = match capability {
            Capability::ViewDashboard => &mut self.can_view_dashboard,
            Capability::ManageUsers => &mut self.can_manage_users,
            Capability::ManageKnowledgeBase => &mut self.can_manage_knowledge_base,
            Capability::ViewChatLogs => &mut self.can_view_chat_logs,
            Capability::ManageRoles => &mut self.can_manage_roles,
            Capability::ConfigureModel => &mut self.can_configure_model,
            Capability::ManageCompanyInfo => &mut self.can_manage_company_info,
            Capability::ConfigureSmtp => &mut self.can_configure_smtp,
        };
        *slot = granted;
        self
    }
}

/// The shared permission configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionMatrix {
    // ---
    pub admin: RolePermissions,
    pub manager: RolePermissions,
    pub supervisor: RolePermissions,
    pub support: RolePermissions,
    pub client: RolePermissions,
}

impl Default for PermissionMatrix {
    /// An all-denied matrix, the shape a partially stored record fills in.
    /// Use [`PermissionMatrix::seed`] for the shipped defaults.
    fn default() -> Self {
        // ---
        Self {
            admin: RolePermissions::NONE,
            manager: RolePermissions::NONE,
            supervisor: RolePermissions::NONE,
            support: RolePermissions::NONE,
            client: RolePermissions::NONE,
        }
    }
}

impl PermissionMatrix {
    // ---
    /// Matrix written on first start when no configuration exists.
    pub fn seed() -> Self {
        // ---
        use Capability::*;

        let grant = |caps: &[Capability]| {
            caps.iter()
                .fold(RolePermissions::NONE, |row, cap| row.with(*cap, true))
        };

        Self {
            admin: RolePermissions::ALL,
            manager: grant(&[ViewDashboard, ManageUsers, ManageKnowledgeBase, ViewChatLogs]),
            supervisor: grant(&[ViewDashboard, ManageKnowledgeBase, ViewChatLogs]),
            support: grant(&[ViewDashboard, ManageUsers, ManageKnowledgeBase]),
            client: RolePermissions::NONE,
        }
    }

    pub fn role(&self, role: Role) -> &RolePermissions {
        // ---
        match role {
            Role::Admin => &self.admin,
            Role::Manager => &self.manager,
            Role::Supervisor => &self.supervisor,
            Role::Support => &self.support,
            Role::Client => &self.client,
        }
    }

    pub fn allows(&self, role: Role, capability: Capability) -> bool {
        // ---
        self.role(role).allows(capability)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn seed_matrix_matches_shipped_roles() {
        // ---
        let m = PermissionMatrix::seed();

        for cap in Capability::ALL {
            assert!(m.allows(Role::Admin, cap), "admin lacks {cap}");
            assert!(!m.allows(Role::Client, cap), "client has {cap}");
        }

        assert!(m.allows(Role::Manager, Capability::ManageUsers));
        assert!(!m.allows(Role::Manager, Capability::ManageRoles));
        assert!(!m.allows(Role::Supervisor, Capability::ManageUsers));
        assert!(m.allows(Role::Supervisor, Capability::ViewChatLogs));
        assert!(m.allows(Role::Support, Capability::ManageUsers));
        assert!(!m.allows(Role::Support, Capability::ViewChatLogs));
    }

    #[test]
    fn wire_format_uses_ui_keys() {
        // ---
        let value = serde_json::to_value(PermissionMatrix::seed()).unwrap();
        assert_eq!(value["manager"]["canManageUsers"], json!(true));
        assert_eq!(value["manager"]["canConfigureSmtp"], json!(false));
    }

    #[test]
    fn missing_rows_and_fields_deserialize_as_denied() {
        // ---
        let m: PermissionMatrix = serde_json::from_value(json!({
            "admin": { "canManageRoles": true },
        }))
        .unwrap();

        assert!(m.allows(Role::Admin, Capability::ManageRoles));
        assert!(!m.allows(Role::Admin, Capability::ManageUsers));
        assert_eq!(m.manager, RolePermissions::NONE);
    }

    #[test]
    fn with_toggles_single_capability() {
        // ---
        let row = RolePermissions::NONE.with(Capability::ConfigureSmtp, true);
        for cap in Capability::ALL {
            assert_eq!(row.allows(cap), cap == Capability::ConfigureSmtp);
        }
    }
}
