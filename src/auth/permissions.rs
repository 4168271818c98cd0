/*!
 * # Permissions Module
 *
 * Permissions are `resource:action` strings. A `resource:*` grant covers every
 * action on that resource and `*` covers everything.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const MANAGE: &'static str = "manage";
    pub const RECORD: &'static str = "record";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const WAREHOUSES: &'static str = "warehouses";
    pub const INVENTORY: &'static str = "inventory";
    pub const BOMS: &'static str = "boms";
    pub const PRODUCTION: &'static str = "production";
    pub const PURCHASING: &'static str = "purchasing";
    pub const SALES: &'static str = "sales";
    pub const HELPDESK: &'static str = "helpdesk";
    pub const TASKS: &'static str = "tasks";
    pub const ATTENDANCE: &'static str = "attendance";
    pub const CUSTOMERS: &'static str = "customers";
    pub const OPERATORS: &'static str = "operators";
    pub const PRICING: &'static str = "pricing";
}

/// Permission string constants used to gate route groups
pub mod consts {
    // Warehouses and bins
    pub const WAREHOUSES_READ: &str = "warehouses:read";
    pub const WAREHOUSES_MANAGE: &str = "warehouses:manage";

    // Inventory batches and transfers
    pub const INVENTORY_READ: &str = "inventory:read";
    pub const INVENTORY_TRANSFER: &str = "inventory:transfer";

    pub const BOMS_READ: &str = "boms:read";
    pub const BOMS_MANAGE: &str = "boms:manage";

    pub const PRODUCTION_READ: &str = "production:read";
    pub const PRODUCTION_MANAGE: &str = "production:manage";

    // Purchase quotations, purchase orders and goods receipts
    pub const PURCHASING_READ: &str = "purchasing:read";
    pub const PURCHASING_MANAGE: &str = "purchasing:manage";
    pub const PURCHASING_RECEIVE: &str = "purchasing:receive";

    // Sales quotations and sales orders
    pub const SALES_READ: &str = "sales:read";
    pub const SALES_MANAGE: &str = "sales:manage";

    pub const HELPDESK_READ: &str = "helpdesk:read";
    pub const HELPDESK_REPLY: &str = "helpdesk:reply";
    pub const HELPDESK_MANAGE: &str = "helpdesk:manage";
    pub const HELPDESK_INBOUND: &str = "helpdesk:inbound";

    pub const TASKS_READ: &str = "tasks:read";
    pub const TASKS_MANAGE: &str = "tasks:manage";

    pub const ATTENDANCE_READ: &str = "attendance:read";
    pub const ATTENDANCE_RECORD: &str = "attendance:record";

    pub const CUSTOMERS_READ: &str = "customers:read";
    pub const CUSTOMERS_MANAGE: &str = "customers:manage";

    pub const OPERATORS_READ: &str = "operators:read";
    pub const OPERATORS_MANAGE: &str = "operators:manage";

    pub const PRICING_USE: &str = "pricing:use";
}

/// Format a permission string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// True when `granted` covers `required`, honouring `resource:*` and `*`.
pub fn is_permission_implied(granted: &str, required: &str) -> bool {
    if granted == required || granted == Actions::ALL {
        return true;
    }

    match (granted.split_once(':'), required.split_once(':')) {
        (Some((granted_resource, granted_action)), Some((required_resource, _))) => {
            granted_action == Actions::ALL
                && (granted_resource == required_resource || granted_resource == "admin")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_grants() {
        assert!(is_permission_implied(consts::BOMS_READ, consts::BOMS_READ));
        assert!(is_permission_implied("boms:*", consts::BOMS_MANAGE));
        assert!(is_permission_implied("admin:*", consts::SALES_MANAGE));
        assert!(is_permission_implied("*", consts::HELPDESK_INBOUND));
        assert!(!is_permission_implied("boms:*", consts::SALES_READ));
        assert!(!is_permission_implied(consts::BOMS_READ, consts::BOMS_MANAGE));
    }

    #[test]
    fn formats_resource_action() {
        assert_eq!(
            format_permission(Resources::HELPDESK, Actions::READ),
            consts::HELPDESK_READ
        );
    }
}
