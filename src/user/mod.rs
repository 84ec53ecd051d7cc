//! 用户模型模块
//!
//! 提供用户记录、存储契约和角色权限派生。
//!
//! ## 子模块
//!
//! - **record**: [`UserRecord`] 与 [`UserRole`]
//! - **store**: [`UserStore`] 契约与内存实现
//! - **permissions**: 角色到权限集合的派生

pub mod permissions;
pub mod record;
pub mod store;

pub use permissions::{is_permitted, permission_matches, permissions_for_role};
pub use record::{UserRecord, UserRole};
pub use store::{InMemoryUserStore, UserStore};
