//! 权限派生模块
//!
//! 权限采用 `resource:action` 格式，`*` 为通配符。权限集合永远从
//! 角色即时派生，不做持久化——角色变更后下一次签发 / 刷新立即生效。

use crate::user::record::UserRole;

/// 通配符常量，表示匹配所有
pub const WILDCARD: &str = "*";

/// 从角色派生权限集合
///
/// # Example
///
/// ```rust
/// use authgate::user::{UserRole, permissions_for_role};
///
/// let perms = permissions_for_role(UserRole::Guest);
/// assert!(perms.contains(&"requirements:read".to_string()));
/// assert!(!perms.contains(&"requirements:write".to_string()));
/// ```
pub fn permissions_for_role(role: UserRole) -> Vec<String> {
    let perms: &[&str] = match role {
        UserRole::Admin => &["*:*"],
        UserRole::User => &[
            "requirements:read",
            "requirements:write",
            "feedback:read",
            "feedback:write",
            "profile:read",
            "profile:write",
        ],
        UserRole::Guest => &["requirements:read", "feedback:read"],
    };
    perms.iter().map(|p| p.to_string()).collect()
}

/// 检查已授予的权限是否覆盖所需权限
///
/// 通配符可以出现在资源位或操作位：`posts:*` 覆盖 `posts:read`，
/// `*:*` 覆盖一切。
pub fn permission_matches(granted: &str, required: &str) -> bool {
    let (g_resource, g_action) = match granted.split_once(':') {
        Some(parts) => parts,
        None => return granted == required,
    };
    let (r_resource, r_action) = match required.split_once(':') {
        Some(parts) => parts,
        None => return false,
    };

    let resource_ok = g_resource == WILDCARD || g_resource == r_resource;
    let action_ok = g_action == WILDCARD || g_action == r_action;
    resource_ok && action_ok
}

/// 检查权限集合是否包含所需权限（考虑通配符）
pub fn is_permitted(granted: &[String], required: &str) -> bool {
    granted.iter().any(|g| permission_matches(g, required))
}
