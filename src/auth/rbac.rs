/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Each operator role maps to a fixed permission set that is copied into the
 * JWT at login.
 */

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::permissions::{consts as perm, is_permission_implied};
use crate::entities::operator::OperatorRole;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

pub static ROLES: Lazy<HashMap<OperatorRole, Role>> = Lazy::new(|| {
    let mut roles = HashMap::new();

    roles.insert(
        OperatorRole::Admin,
        Role {
            name: "admin",
            description: "Administrator with full access",
            permissions: vec!["*"],
        },
    );

    roles.insert(
        OperatorRole::Manager,
        Role {
            name: "manager",
            description: "Runs warehouse, production, purchasing and sales",
            permissions: vec![
                perm::WAREHOUSES_READ,
                perm::WAREHOUSES_MANAGE,
                perm::INVENTORY_READ,
                perm::INVENTORY_TRANSFER,
                perm::BOMS_READ,
                perm::BOMS_MANAGE,
                perm::PRODUCTION_READ,
                perm::PRODUCTION_MANAGE,
                perm::PURCHASING_READ,
                perm::PURCHASING_MANAGE,
                perm::PURCHASING_RECEIVE,
                perm::SALES_READ,
                perm::SALES_MANAGE,
                perm::HELPDESK_READ,
                perm::HELPDESK_REPLY,
                perm::HELPDESK_MANAGE,
                perm::HELPDESK_INBOUND,
                perm::TASKS_READ,
                perm::TASKS_MANAGE,
                perm::ATTENDANCE_READ,
                perm::ATTENDANCE_RECORD,
                perm::CUSTOMERS_READ,
                perm::CUSTOMERS_MANAGE,
                perm::OPERATORS_READ,
                perm::PRICING_USE,
            ],
        },
    );

    roles.insert(
        OperatorRole::Agent,
        Role {
            name: "agent",
            description: "Helpdesk agent",
            permissions: vec![
                perm::HELPDESK_READ,
                perm::HELPDESK_REPLY,
                perm::HELPDESK_MANAGE,
                perm::HELPDESK_INBOUND,
                perm::CUSTOMERS_READ,
                perm::CUSTOMERS_MANAGE,
                perm::SALES_READ,
                perm::TASKS_READ,
                perm::TASKS_MANAGE,
                perm::ATTENDANCE_READ,
                perm::ATTENDANCE_RECORD,
                perm::OPERATORS_READ,
                perm::PRICING_USE,
            ],
        },
    );

    roles.insert(
        OperatorRole::Staff,
        Role {
            name: "staff",
            description: "Storekeeper and shop-floor staff",
            permissions: vec![
                perm::WAREHOUSES_READ,
                perm::INVENTORY_READ,
                perm::INVENTORY_TRANSFER,
                perm::BOMS_READ,
                perm::PRODUCTION_READ,
                perm::PURCHASING_READ,
                perm::PURCHASING_RECEIVE,
                perm::TASKS_READ,
                perm::TASKS_MANAGE,
                perm::ATTENDANCE_READ,
                perm::ATTENDANCE_RECORD,
                perm::PRICING_USE,
            ],
        },
    );

    roles
});

/// Permission strings granted to `role`.
pub fn permissions_for_role(role: OperatorRole) -> Vec<String> {
    ROLES
        .get(&role)
        .map(|r| r.permissions.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

/// True when any of `granted` covers `required`.
pub fn has_permission(granted: &[String], required: &str) -> bool {
    granted.iter().any(|p| is_permission_implied(p, required))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_is_defined() {
        for role in [
            OperatorRole::Admin,
            OperatorRole::Manager,
            OperatorRole::Agent,
            OperatorRole::Staff,
        ] {
            assert!(!permissions_for_role(role).is_empty(), "{} has no grants", role);
        }
    }

    #[test]
    fn admin_wildcard_covers_everything() {
        let admin = permissions_for_role(OperatorRole::Admin);
        assert!(has_permission(&admin, perm::OPERATORS_MANAGE));
    }

    #[test]
    fn agents_cannot_post_stock() {
        let agent = permissions_for_role(OperatorRole::Agent);
        assert!(has_permission(&agent, perm::HELPDESK_REPLY));
        assert!(!has_permission(&agent, perm::INVENTORY_TRANSFER));
        assert!(!has_permission(&agent, perm::OPERATORS_MANAGE));
    }

    #[test]
    fn staff_can_receive_but_not_approve_purchases() {
        let staff = permissions_for_role(OperatorRole::Staff);
        assert!(has_permission(&staff, perm::PURCHASING_RECEIVE));
        assert!(!has_permission(&staff, perm::PURCHASING_MANAGE));
    }
}
