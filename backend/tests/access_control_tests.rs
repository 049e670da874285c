//! Role and permission tests
//!
//! Covers:
//! - Property 1: Role Permission Enforcement
//! - Property 2: Account management stays inside the role hierarchy

use proptest::prelude::*;
use shared::{permission_key, permissions_for, role_permissions, Action, Resource, UserRole};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn role_strategy() -> impl Strategy<Value = UserRole> {
    prop::sample::select(UserRole::ALL.to_vec())
}

fn resource_strategy() -> impl Strategy<Value = Resource> {
    prop_oneof![
        Just(Resource::Cooperative),
        Just(Resource::User),
        Just(Resource::Farmer),
        Just(Resource::Harvest),
        Just(Resource::Batch),
        Just(Resource::Price),
        Just(Resource::Payment),
        Just(Resource::Report),
        Just(Resource::Portal),
    ]
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::View),
        Just(Action::Create),
        Just(Action::Edit),
        Just(Action::Delete),
        Just(Action::Verify),
        Just(Action::Approve),
        Just(Action::Pay),
        Just(Action::Export),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 1: flattened keys agree with the structured grants
    #[test]
    fn test_permission_keys_match_grants(
        role in role_strategy(),
        resource in resource_strategy(),
        action in action_strategy(),
    ) {
        let granted = role_permissions(role)
            .iter()
            .any(|p| p.resource == resource && p.actions.contains(&action));
        let key = permission_key(resource, action);
        prop_assert_eq!(permissions_for(role).contains(&key), granted);
    }

    /// Property 1: every key has the `resource:action` shape
    #[test]
    fn test_permission_format_validity(role in role_strategy()) {
        for key in permissions_for(role) {
            let parts: Vec<&str> = key.split(':').collect();
            prop_assert_eq!(parts.len(), 2);
            prop_assert!(!parts[0].is_empty());
            prop_assert!(!parts[1].is_empty());
        }
    }

    /// Property 2: nobody but a super admin can create super admins
    #[test]
    fn test_super_admin_minting(actor in role_strategy(), target in role_strategy()) {
        if target == UserRole::SuperAdmin && actor != UserRole::SuperAdmin {
            prop_assert!(!actor.can_manage(target));
        }
        if !matches!(actor, UserRole::SuperAdmin | UserRole::CoopAdmin) {
            prop_assert!(!actor.can_manage(target));
        }
    }

    /// Role names survive a parse of their own wire form
    #[test]
    fn test_role_names_parse(role in role_strategy()) {
        prop_assert_eq!(UserRole::parse(role.as_str()), Some(role));
    }
}

// ============================================================================
// Unit Tests: Separation of Duties
// ============================================================================

#[cfg(test)]
mod separation_of_duties_tests {
    use super::*;

    fn has(role: UserRole, resource: Resource, action: Action) -> bool {
        permissions_for(role).contains(&permission_key(resource, action))
    }

    #[test]
    fn test_only_inspectors_and_admins_verify() {
        for role in UserRole::ALL {
            let expected = matches!(role, UserRole::Inspector | UserRole::CoopAdmin);
            assert_eq!(
                has(role, Resource::Harvest, Action::Verify),
                expected,
                "harvest:verify for {}",
                role
            );
        }
    }

    #[test]
    fn test_only_finance_marks_payments_paid() {
        for role in UserRole::ALL {
            assert_eq!(
                has(role, Resource::Payment, Action::Pay),
                role == UserRole::FinanceOfficer,
                "payment:pay for {}",
                role
            );
        }
    }

    #[test]
    fn test_clerk_cannot_touch_money() {
        assert!(!has(UserRole::Clerk, Resource::Payment, Action::View));
        assert!(!has(UserRole::Clerk, Resource::Price, Action::Edit));
        assert!(has(UserRole::Clerk, Resource::Harvest, Action::Create));
    }

    #[test]
    fn test_farmer_only_sees_portal() {
        assert_eq!(permissions_for(UserRole::Farmer), vec!["portal:view".to_string()]);
    }

    #[test]
    fn test_super_admin_stays_out_of_cooperative_operations() {
        assert!(has(UserRole::SuperAdmin, Resource::Cooperative, Action::Create));
        assert!(!has(UserRole::SuperAdmin, Resource::Harvest, Action::View));
        assert!(!has(UserRole::SuperAdmin, Resource::Payment, Action::Approve));
    }

    #[test]
    fn test_only_super_admin_is_global() {
        let global: Vec<UserRole> = UserRole::ALL
            .into_iter()
            .filter(|r| !r.is_tenant_scoped())
            .collect();
        assert_eq!(global, vec![UserRole::SuperAdmin]);
    }
}
