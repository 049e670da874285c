//! User and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// `None` only for platform super-admins
    pub cooperative_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fixed roles of the platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    CoopAdmin,
    Clerk,
    Inspector,
    FinanceOfficer,
    Farmer,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::SuperAdmin,
        UserRole::CoopAdmin,
        UserRole::Clerk,
        UserRole::Inspector,
        UserRole::FinanceOfficer,
        UserRole::Farmer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::CoopAdmin => "coop_admin",
            UserRole::Clerk => "clerk",
            UserRole::Inspector => "inspector",
            UserRole::FinanceOfficer => "finance_officer",
            UserRole::Farmer => "farmer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    /// Whether accounts with this role belong to a cooperative
    pub fn is_tenant_scoped(&self) -> bool {
        !matches!(self, UserRole::SuperAdmin)
    }

    /// Whether a user holding `self` may create or edit accounts with `target`
    pub fn can_manage(&self, target: UserRole) -> bool {
        match self {
            UserRole::SuperAdmin => true,
            UserRole::CoopAdmin => target != UserRole::SuperAdmin,
            _ => false,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission granting actions on a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Cooperative,
    User,
    Farmer,
    Harvest,
    Batch,
    Price,
    Payment,
    Report,
    Portal,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Cooperative => "cooperative",
            Resource::User => "user",
            Resource::Farmer => "farmer",
            Resource::Harvest => "harvest",
            Resource::Batch => "batch",
            Resource::Price => "price",
            Resource::Payment => "payment",
            Resource::Report => "report",
            Resource::Portal => "portal",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Verify,
    Approve,
    Pay,
    Export,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Verify => "verify",
            Action::Approve => "approve",
            Action::Pay => "pay",
            Action::Export => "export",
        }
    }
}

/// Permission key as carried in tokens, e.g. `harvest:verify`
pub fn permission_key(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

/// Permissions granted to each role
pub fn role_permissions(role: UserRole) -> Vec<Permission> {
    use Action::*;
    use Resource::*;

    let grant = |resource, actions: &[Action]| Permission {
        resource,
        actions: actions.to_vec(),
    };

    match role {
        UserRole::SuperAdmin => vec![
            grant(Cooperative, &[View, Create, Edit, Delete]),
            grant(User, &[View, Create, Edit, Delete]),
            grant(Report, &[View]),
        ],
        UserRole::CoopAdmin => vec![
            grant(User, &[View, Create, Edit, Delete]),
            grant(Farmer, &[View, Create, Edit, Delete]),
            grant(Harvest, &[View, Create, Edit, Delete, Verify]),
            grant(Batch, &[View, Create, Edit]),
            grant(Price, &[View, Edit]),
            grant(Payment, &[View, Create, Approve]),
            grant(Report, &[View, Export]),
        ],
        UserRole::Clerk => vec![
            grant(Farmer, &[View, Create, Edit]),
            grant(Harvest, &[View, Create, Edit, Delete]),
            grant(Batch, &[View]),
        ],
        UserRole::Inspector => vec![
            grant(Farmer, &[View]),
            grant(Harvest, &[View, Verify]),
            grant(Batch, &[View, Create, Edit]),
        ],
        UserRole::FinanceOfficer => vec![
            grant(Farmer, &[View]),
            grant(Harvest, &[View]),
            grant(Price, &[View, Edit]),
            grant(Payment, &[View, Create, Approve, Pay]),
            grant(Report, &[View, Export]),
        ],
        UserRole::Farmer => vec![grant(Portal, &[View])],
    }
}

/// Flattened `resource:action` keys for a role
pub fn permissions_for(role: UserRole) -> Vec<String> {
    role_permissions(role)
        .into_iter()
        .flat_map(|p| {
            p.actions
                .into_iter()
                .map(move |a| permission_key(p.resource, a))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        for role in UserRole::ALL {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("owner"), None);
    }

    #[test]
    fn test_only_super_admin_is_global() {
        assert!(!UserRole::SuperAdmin.is_tenant_scoped());
        assert!(UserRole::Farmer.is_tenant_scoped());
        assert!(UserRole::CoopAdmin.is_tenant_scoped());
    }

    #[test]
    fn test_coop_admin_cannot_mint_super_admins() {
        assert!(!UserRole::CoopAdmin.can_manage(UserRole::SuperAdmin));
        assert!(UserRole::CoopAdmin.can_manage(UserRole::Clerk));
        assert!(!UserRole::Clerk.can_manage(UserRole::Farmer));
    }

    #[test]
    fn test_permission_keys() {
        let perms = permissions_for(UserRole::Inspector);
        assert!(perms.contains(&"harvest:verify".to_string()));
        assert!(!perms.contains(&"payment:pay".to_string()));
    }
}
