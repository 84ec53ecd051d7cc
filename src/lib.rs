//! # AuthGate
//!
//! 一个自包含的 Token 认证与授权引擎。
//!
//! ## 功能特性
//!
//! - **密码生命周期**: 使用 Argon2id 和 bcrypt 进行安全的密码哈希，附带强度检查
//! - **令牌签发与校验**: 访问 / 刷新令牌对，类型隔离，吊销登记优先于结构有效性
//! - **失败锁定**: 滑动窗口失败计数，用户名与客户端地址独立追踪
//! - **OAuth 联合登录**: 一次性 state 令牌、提供方握手、邮箱归并，
//!   与密码登录共用同一条令牌签发路径
//! - **授权解析**: 请求范围的 `UserContext`，角色 / 权限检查，管理员旁路
//!
//! 所有组件通过显式依赖注入组合：每进程（或每个测试）构造一份实例，
//! 不存在模块级共享状态。时钟可注入（[`clock::ManualClock`]），锁定
//! 窗口与令牌有效期在测试中可以确定性推进。
//!
//! ## Features
//!
//! - `argon2` - 启用 Argon2id 密码哈希支持（默认启用）
//! - `bcrypt` - 启用 bcrypt 密码哈希支持（默认启用）
//! - `full` - 启用所有功能
//!
//! ## 登录示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use authgate::auth::{AuthenticationEngine, AuthorizationResolver};
//! use authgate::clock::system_clock;
//! use authgate::token::{TokenCodec, TokenCodecConfig, TtlRevocationStore};
//! use authgate::user::InMemoryUserStore;
//!
//! # async fn demo() -> authgate::Result<()> {
//! let clock = system_clock();
//! let users = Arc::new(InMemoryUserStore::new());
//! let revocations = Arc::new(TtlRevocationStore::in_memory(clock.clone()));
//! let tokens = Arc::new(TokenCodec::new(
//!     b"my-secret-key-at-least-32-bytes!",
//!     TokenCodecConfig::default(),
//!     revocations,
//!     clock.clone(),
//! )?);
//!
//! let engine = AuthenticationEngine::builder()
//!     .users(users.clone())
//!     .tokens(tokens.clone())
//!     .clock(clock)
//!     .build()?;
//!
//! // 登录 → 访问受保护资源 → 登出
//! let pair = engine.login("alice", "P@ssw0rd1", "10.0.0.1").await?;
//!
//! let resolver = AuthorizationResolver::new(tokens, users);
//! let ctx = resolver.required(Some(&pair.access_token)).await?;
//! assert_eq!(ctx.username, "alice");
//!
//! engine.logout(Some(&pair.access_token), Some(&pair.refresh_token));
//! # Ok(())
//! # }
//! ```
//!
//! ## 密码强度示例
//!
//! ```rust
//! use authgate::password::is_strong;
//!
//! assert!(is_strong("Abc1234!"));
//! assert!(!is_strong("alllowercase1!"));
//! ```

pub mod auth;
pub mod clock;
pub mod error;
pub mod oauth;
pub mod password;
pub mod random;
pub mod security;
pub mod store;
pub mod token;
pub mod user;

pub use error::{AuthError, Error, Result, TokenError};

// ============================================================================
// 认证与授权导出
// ============================================================================

pub use auth::{AuthenticationEngine, AuthorizationResolver, UserContext};

// ============================================================================
// 密码相关导出
// ============================================================================

pub use password::{PasswordService, hash_password, is_strong, verify_password};

// ============================================================================
// Token 相关导出
// ============================================================================

pub use token::{
    IssuedToken, TokenClaims, TokenCodec, TokenCodecConfig, TokenKind, TokenPair,
    TtlRevocationStore,
};

// ============================================================================
// 安全防护导出
// ============================================================================

pub use security::{LockoutConfig, LockoutTracker, RateLimitConfig, RateLimiter};

// ============================================================================
// OAuth 相关导出
// ============================================================================

pub use oauth::{
    ExternalIdentityProvider, ExternalProfile, GoogleConfig, GoogleProvider, IdentityReconciler,
    OAuthEngine, OAuthLogin, OAuthStateManager,
};

// ============================================================================
// 用户与存储导出
// ============================================================================

pub use store::{InMemoryTtlStore, TtlStore};
pub use user::{InMemoryUserStore, UserRecord, UserRole, UserStore};
