//! Bitmask role-based access control.
//!
//! Each [`Permission`] occupies one bit of a 16-bit mask. A [`Role`] is a
//! name bound to the OR of the permissions it grants; a user's effective
//! mask is the OR of the masks of every role assigned to them.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Permission {
    ReadMarket = 1 << 0,
    ReadOrders = 1 << 1,
    ReadAccount = 1 << 2,
    ReadConfig = 1 << 3,
    WriteOrders = 1 << 4,
    WriteCancel = 1 << 5,
    AdminKeys = 1 << 6,
    AdminUsers = 1 << 7,
    AdminConfig = 1 << 8,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::ReadMarket,
        Permission::ReadOrders,
        Permission::ReadAccount,
        Permission::ReadConfig,
        Permission::WriteOrders,
        Permission::WriteCancel,
        Permission::AdminKeys,
        Permission::AdminUsers,
        Permission::AdminConfig,
    ];

    pub fn bit(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Permission::ReadMarket => "read_market",
            Permission::ReadOrders => "read_orders",
            Permission::ReadAccount => "read_account",
            Permission::ReadConfig => "read_config",
            Permission::WriteOrders => "write_orders",
            Permission::WriteCancel => "write_cancel",
            Permission::AdminKeys => "admin_keys",
            Permission::AdminUsers => "admin_users",
            Permission::AdminConfig => "admin_config",
        }
    }

    pub fn from_name(name: &str) -> Option<Permission> {
        Permission::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// A named collection of permissions, represented as a single bitmask.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub mask: u16,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: &[Permission]) -> Self {
        let mask = permissions.iter().fold(0u16, |acc, p| acc | p.bit());
        Self { name: name.into(), mask }
    }
}

/// Maps role names to masks, and user ids to the set of role names they hold.
/// Both maps are built at startup and mutated rarely (admin role grants);
/// protected by a single `RwLock` each since reads vastly outnumber writes.
pub struct RbacStore {
    roles: RwLock<HashMap<String, u16>>,
    user_roles: RwLock<HashMap<String, Vec<String>>>,
}

impl RbacStore {
    pub fn new() -> Self {
        Self {
            roles: RwLock::new(HashMap::new()),
            user_roles: RwLock::new(HashMap::new()),
        }
    }

    pub fn define_role(&self, role: Role) {
        self.roles.write().expect("rbac roles lock poisoned").insert(role.name, role.mask);
    }

    pub fn assign_role(&self, user_id: &str, role_name: &str) {
        self.user_roles
            .write()
            .expect("rbac user_roles lock poisoned")
            .entry(user_id.to_string())
            .or_default()
            .push(role_name.to_string());
    }

    /// OR of the masks of every role assigned to `user_id`. Unknown role
    /// names (a stale assignment referencing a removed role) contribute zero
    /// bits rather than erroring.
    pub fn effective_mask(&self, user_id: &str) -> u16 {
        let user_roles = self.user_roles.read().expect("rbac user_roles lock poisoned");
        let roles = self.roles.read().expect("rbac roles lock poisoned");
        user_roles
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|name| roles.get(name))
            .fold(0u16, |acc, mask| acc | mask)
    }

    pub fn has_permission(&self, user_id: &str, permission: Permission) -> bool {
        self.effective_mask(user_id) & permission.bit() != 0
    }
}

impl Default for RbacStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks whether `info` grants `permission`, considering both the bitmask
/// role system (JWT users) and the string-named permission set attached
/// directly to API-key-authenticated requests.
pub fn has_permission(rbac: &RbacStore, info: &crate::auth_info::AuthInfo, permission: Permission) -> bool {
    if info.has_permission_name(permission.name()) {
        return true;
    }
    rbac.has_permission(&info.user_id, permission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_info::{AuthInfo, AuthMethod};
    use std::collections::BTreeSet;

    #[test]
    fn role_mask_ors_its_permissions() {
        let role = Role::new("trader", &[Permission::ReadOrders, Permission::WriteOrders]);
        assert_eq!(role.mask, Permission::ReadOrders.bit() | Permission::WriteOrders.bit());
    }

    #[test]
    fn user_effective_mask_combines_roles() {
        let store = RbacStore::new();
        store.define_role(Role::new("reader", &[Permission::ReadMarket]));
        store.define_role(Role::new("trader", &[Permission::WriteOrders]));
        store.assign_role("alice", "reader");
        store.assign_role("alice", "trader");
        assert!(store.has_permission("alice", Permission::ReadMarket));
        assert!(store.has_permission("alice", Permission::WriteOrders));
        assert!(!store.has_permission("alice", Permission::AdminKeys));
    }

    #[test]
    fn api_key_permission_names_bypass_rbac() {
        let store = RbacStore::new();
        let mut permissions = BTreeSet::new();
        permissions.insert("read_orders".to_string());
        let info = AuthInfo {
            user_id: "u1".to_string(),
            auth_method: AuthMethod::ApiKey,
            api_key_id: Some("deadbeefcafef00d".to_string()),
            permissions,
        };
        assert!(has_permission(&store, &info, Permission::ReadOrders));
        assert!(!has_permission(&store, &info, Permission::WriteOrders));
    }

    #[test]
    fn permission_name_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(Permission::from_name(permission.name()), Some(permission));
        }
        assert_eq!(Permission::from_name("not_a_permission"), None);
    }
}
