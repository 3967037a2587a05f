//! Role and permission catalog
//!
//! The catalog is closed and compile-time constant: a fixed set of roles,
//! a fixed set of `<area>.<verb>` permissions, and a total role->permission
//! map. There are no per-tenant overrides; changing what a principal may do
//! means changing the principal's role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of principal roles.
///
/// The wire and database form is the snake_case identifier
/// (e.g. `data_protection_officer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    PlatformOwner,
    TenantAdmin,
    ComplianceOfficer,
    ComplianceAnalyst,
    PrivacyOfficer,
    DataProtectionOfficer,
    RiskManager,
    RiskAnalyst,
    Auditor,
    AuditAnalyst,
    SecurityOfficer,
    SystemAdministrator,
    RegularUser,
}

impl Role {
    /// Every role in the catalog
    pub const ALL: [Role; 14] = [
        Role::SuperAdmin,
        Role::PlatformOwner,
        Role::TenantAdmin,
        Role::ComplianceOfficer,
        Role::ComplianceAnalyst,
        Role::PrivacyOfficer,
        Role::DataProtectionOfficer,
        Role::RiskManager,
        Role::RiskAnalyst,
        Role::Auditor,
        Role::AuditAnalyst,
        Role::SecurityOfficer,
        Role::SystemAdministrator,
        Role::RegularUser,
    ];

    /// Wire identifier for this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::PlatformOwner => "platform_owner",
            Role::TenantAdmin => "tenant_admin",
            Role::ComplianceOfficer => "compliance_officer",
            Role::ComplianceAnalyst => "compliance_analyst",
            Role::PrivacyOfficer => "privacy_officer",
            Role::DataProtectionOfficer => "data_protection_officer",
            Role::RiskManager => "risk_manager",
            Role::RiskAnalyst => "risk_analyst",
            Role::Auditor => "auditor",
            Role::AuditAnalyst => "audit_analyst",
            Role::SecurityOfficer => "security_officer",
            Role::SystemAdministrator => "system_administrator",
            Role::RegularUser => "regular_user",
        }
    }

    /// Roles that operate the platform itself rather than a single tenant
    pub fn is_platform(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::PlatformOwner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    /// Role parsing is case-insensitive; the stored form is lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "super_admin" => Ok(Role::SuperAdmin),
            "platform_owner" => Ok(Role::PlatformOwner),
            "tenant_admin" => Ok(Role::TenantAdmin),
            "compliance_officer" => Ok(Role::ComplianceOfficer),
            "compliance_analyst" => Ok(Role::ComplianceAnalyst),
            "privacy_officer" => Ok(Role::PrivacyOfficer),
            "data_protection_officer" => Ok(Role::DataProtectionOfficer),
            "risk_manager" => Ok(Role::RiskManager),
            "risk_analyst" => Ok(Role::RiskAnalyst),
            "auditor" => Ok(Role::Auditor),
            "audit_analyst" => Ok(Role::AuditAnalyst),
            "security_officer" => Ok(Role::SecurityOfficer),
            "system_administrator" => Ok(Role::SystemAdministrator),
            "regular_user" => Ok(Role::RegularUser),
            _ => Err(()),
        }
    }
}

/// GRC functional areas; each owns a family of tenant-scoped resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Regops,
    Privacyops,
    Riskops,
    Auditops,
}

impl Area {
    pub const ALL: [Area; 4] = [Area::Regops, Area::Privacyops, Area::Riskops, Area::Auditops];

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Regops => "regops",
            Area::Privacyops => "privacyops",
            Area::Riskops => "riskops",
            Area::Auditops => "auditops",
        }
    }

    /// The permission gating `verb` within this area
    pub fn permission(&self, verb: Verb) -> Permission {
        match (self, verb) {
            (Area::Regops, Verb::View) => Permission::RegopsView,
            (Area::Regops, Verb::Create) => Permission::RegopsCreate,
            (Area::Regops, Verb::Edit) => Permission::RegopsEdit,
            (Area::Regops, Verb::Delete) => Permission::RegopsDelete,
            (Area::Regops, Verb::Approve) => Permission::RegopsApprove,
            (Area::Privacyops, Verb::View) => Permission::PrivacyopsView,
            (Area::Privacyops, Verb::Create) => Permission::PrivacyopsCreate,
            (Area::Privacyops, Verb::Edit) => Permission::PrivacyopsEdit,
            (Area::Privacyops, Verb::Delete) => Permission::PrivacyopsDelete,
            (Area::Privacyops, Verb::Approve) => Permission::PrivacyopsApprove,
            (Area::Riskops, Verb::View) => Permission::RiskopsView,
            (Area::Riskops, Verb::Create) => Permission::RiskopsCreate,
            (Area::Riskops, Verb::Edit) => Permission::RiskopsEdit,
            (Area::Riskops, Verb::Delete) => Permission::RiskopsDelete,
            (Area::Riskops, Verb::Approve) => Permission::RiskopsApprove,
            (Area::Auditops, Verb::View) => Permission::AuditopsView,
            (Area::Auditops, Verb::Create) => Permission::AuditopsCreate,
            (Area::Auditops, Verb::Edit) => Permission::AuditopsEdit,
            (Area::Auditops, Verb::Delete) => Permission::AuditopsDelete,
            (Area::Auditops, Verb::Approve) => Permission::AuditopsApprove,
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regops" => Ok(Area::Regops),
            "privacyops" => Ok(Area::Privacyops),
            "riskops" => Ok(Area::Riskops),
            "auditops" => Ok(Area::Auditops),
            _ => Err(()),
        }
    }
}

/// Operation classes within an area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    View,
    Create,
    Edit,
    Delete,
    Approve,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::View, Verb::Create, Verb::Edit, Verb::Delete, Verb::Approve];
}

/// Closed set of permissions. Wire form is `<area>.<verb>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    RegopsView,
    RegopsCreate,
    RegopsEdit,
    RegopsDelete,
    RegopsApprove,
    PrivacyopsView,
    PrivacyopsCreate,
    PrivacyopsEdit,
    PrivacyopsDelete,
    PrivacyopsApprove,
    RiskopsView,
    RiskopsCreate,
    RiskopsEdit,
    RiskopsDelete,
    RiskopsApprove,
    AuditopsView,
    AuditopsCreate,
    AuditopsEdit,
    AuditopsDelete,
    AuditopsApprove,
    AiChat,
    AiSearch,
    DocumentGenerate,
    DocumentAnalyze,
    AdminUsers,
    AdminSettings,
}

impl Permission {
    /// Every permission in the catalog
    pub const ALL: [Permission; 26] = [
        Permission::RegopsView,
        Permission::RegopsCreate,
        Permission::RegopsEdit,
        Permission::RegopsDelete,
        Permission::RegopsApprove,
        Permission::PrivacyopsView,
        Permission::PrivacyopsCreate,
        Permission::PrivacyopsEdit,
        Permission::PrivacyopsDelete,
        Permission::PrivacyopsApprove,
        Permission::RiskopsView,
        Permission::RiskopsCreate,
        Permission::RiskopsEdit,
        Permission::RiskopsDelete,
        Permission::RiskopsApprove,
        Permission::AuditopsView,
        Permission::AuditopsCreate,
        Permission::AuditopsEdit,
        Permission::AuditopsDelete,
        Permission::AuditopsApprove,
        Permission::AiChat,
        Permission::AiSearch,
        Permission::DocumentGenerate,
        Permission::DocumentAnalyze,
        Permission::AdminUsers,
        Permission::AdminSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::RegopsView => "regops.view",
            Permission::RegopsCreate => "regops.create",
            Permission::RegopsEdit => "regops.edit",
            Permission::RegopsDelete => "regops.delete",
            Permission::RegopsApprove => "regops.approve",
            Permission::PrivacyopsView => "privacyops.view",
            Permission::PrivacyopsCreate => "privacyops.create",
            Permission::PrivacyopsEdit => "privacyops.edit",
            Permission::PrivacyopsDelete => "privacyops.delete",
            Permission::PrivacyopsApprove => "privacyops.approve",
            Permission::RiskopsView => "riskops.view",
            Permission::RiskopsCreate => "riskops.create",
            Permission::RiskopsEdit => "riskops.edit",
            Permission::RiskopsDelete => "riskops.delete",
            Permission::RiskopsApprove => "riskops.approve",
            Permission::AuditopsView => "auditops.view",
            Permission::AuditopsCreate => "auditops.create",
            Permission::AuditopsEdit => "auditops.edit",
            Permission::AuditopsDelete => "auditops.delete",
            Permission::AuditopsApprove => "auditops.approve",
            Permission::AiChat => "ai.chat",
            Permission::AiSearch => "ai.search",
            Permission::DocumentGenerate => "document.generate",
            Permission::DocumentAnalyze => "document.analyze",
            Permission::AdminUsers => "admin.users",
            Permission::AdminSettings => "admin.settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or(())
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Permission::from_str(&s)
            .map_err(|_| serde::de::Error::custom(format!("unknown permission: {}", s)))
    }
}

/// The static role->permission map.
///
/// Platform roles and tenant admins hold the full set; everyone else holds
/// the subset matching their function. Cross-area read access reflects that
/// auditors and security officers review artifacts they do not own.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    use Permission::*;

    match role {
        Role::SuperAdmin | Role::PlatformOwner | Role::TenantAdmin => &Permission::ALL,
        Role::ComplianceOfficer => &[
            RegopsView,
            RegopsCreate,
            RegopsEdit,
            RegopsDelete,
            RegopsApprove,
            AuditopsView,
            AiChat,
            AiSearch,
            DocumentGenerate,
            DocumentAnalyze,
        ],
        Role::ComplianceAnalyst => &[RegopsView, RegopsCreate, RegopsEdit, AiChat, AiSearch],
        Role::PrivacyOfficer => &[
            PrivacyopsView,
            PrivacyopsCreate,
            PrivacyopsEdit,
            PrivacyopsDelete,
            AiChat,
            AiSearch,
            DocumentGenerate,
            DocumentAnalyze,
        ],
        Role::DataProtectionOfficer => &[
            PrivacyopsView,
            PrivacyopsCreate,
            PrivacyopsEdit,
            PrivacyopsDelete,
            PrivacyopsApprove,
            RegopsView,
            AiChat,
            AiSearch,
            DocumentGenerate,
            DocumentAnalyze,
        ],
        Role::RiskManager => &[
            RiskopsView,
            RiskopsCreate,
            RiskopsEdit,
            RiskopsDelete,
            RiskopsApprove,
            AiChat,
            AiSearch,
            DocumentGenerate,
            DocumentAnalyze,
        ],
        Role::RiskAnalyst => &[RiskopsView, RiskopsCreate, RiskopsEdit, AiChat, AiSearch],
        Role::Auditor => &[
            AuditopsView,
            AuditopsCreate,
            AuditopsEdit,
            AuditopsDelete,
            AuditopsApprove,
            RegopsView,
            PrivacyopsView,
            RiskopsView,
            AiChat,
            AiSearch,
            DocumentAnalyze,
        ],
        Role::AuditAnalyst => &[AuditopsView, AuditopsCreate, AuditopsEdit, AiChat, AiSearch],
        Role::SecurityOfficer => &[
            RiskopsView,
            RiskopsCreate,
            RiskopsEdit,
            RiskopsDelete,
            PrivacyopsView,
            PrivacyopsEdit,
            RegopsView,
            AiChat,
            AiSearch,
        ],
        Role::SystemAdministrator => &[
            AdminUsers,
            AdminSettings,
            RegopsView,
            PrivacyopsView,
            RiskopsView,
            AuditopsView,
        ],
        Role::RegularUser => &[RegopsView, PrivacyopsView, RiskopsView, AuditopsView],
    }
}

/// Membership test on the static catalog
pub fn permits(role: Role, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

/// Whether a role may enter an area at all (holds the area's view permission)
pub fn has_area_access(role: Role, area: Area) -> bool {
    permits(role, area.permission(Verb::View))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_string_roundtrip() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()), Ok(role));
        }
    }

    #[test]
    fn test_role_parse_case_insensitive() {
        assert_eq!(Role::from_str("TENANT_ADMIN"), Ok(Role::TenantAdmin));
        assert_eq!(Role::from_str("Compliance_Officer"), Ok(Role::ComplianceOfficer));
    }

    #[test]
    fn test_role_parse_unknown() {
        assert!(Role::from_str("wizard").is_err());
        assert!(Role::from_str("").is_err());
    }

    #[test]
    fn test_role_serde_wire_form() {
        let json = serde_json::to_string(&Role::DataProtectionOfficer).unwrap();
        assert_eq!(json, "\"data_protection_officer\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::DataProtectionOfficer);
    }

    #[test]
    fn test_permission_string_roundtrip() {
        for perm in Permission::ALL {
            assert_eq!(Permission::from_str(perm.as_str()), Ok(perm));
        }
    }

    #[test]
    fn test_permission_shape() {
        for perm in Permission::ALL {
            let parts: Vec<&str> = perm.as_str().split('.').collect();
            assert_eq!(parts.len(), 2, "{} is not <area>.<verb>", perm);
            assert!(!parts[0].is_empty() && !parts[1].is_empty());
        }
    }

    #[test]
    fn test_permits_matches_catalog() {
        for role in Role::ALL {
            for perm in Permission::ALL {
                assert_eq!(
                    permits(role, perm),
                    role_permissions(role).contains(&perm),
                    "permits disagrees with catalog for {} / {}",
                    role,
                    perm
                );
            }
        }
    }

    #[test]
    fn test_platform_roles_hold_everything() {
        for perm in Permission::ALL {
            assert!(permits(Role::SuperAdmin, perm));
            assert!(permits(Role::PlatformOwner, perm));
            assert!(permits(Role::TenantAdmin, perm));
        }
    }

    #[test]
    fn test_regular_user_is_read_only() {
        assert!(permits(Role::RegularUser, Permission::RegopsView));
        assert!(!permits(Role::RegularUser, Permission::RegopsCreate));
        assert!(!permits(Role::RegularUser, Permission::RegopsDelete));
        assert!(!permits(Role::RegularUser, Permission::AiChat));
    }

    #[test]
    fn test_analysts_cannot_delete_or_approve() {
        for analyst in [Role::ComplianceAnalyst, Role::RiskAnalyst, Role::AuditAnalyst] {
            for area in Area::ALL {
                assert!(!permits(analyst, area.permission(Verb::Delete)));
                assert!(!permits(analyst, area.permission(Verb::Approve)));
            }
        }
    }

    #[test]
    fn test_area_access() {
        assert!(has_area_access(Role::ComplianceOfficer, Area::Regops));
        assert!(!has_area_access(Role::ComplianceOfficer, Area::Privacyops));
        assert!(has_area_access(Role::Auditor, Area::Riskops));
        assert!(!has_area_access(Role::PrivacyOfficer, Area::Auditops));
    }

    #[test]
    fn test_every_area_verb_is_in_catalog() {
        for area in Area::ALL {
            for verb in Verb::ALL {
                let perm = area.permission(verb);
                assert!(Permission::ALL.contains(&perm));
                assert!(perm.as_str().starts_with(area.as_str()));
            }
        }
    }
}
