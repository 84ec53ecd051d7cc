//! 认证与授权模块
//!
//! ## 子模块
//!
//! - **engine**: 凭证认证、令牌对签发 / 刷新 / 登出
//! - **authorize**: 请求范围的令牌解析与角色 / 权限检查
//!
//! ## 示例
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
//! let resolver = AuthorizationResolver::new(tokens, users);
//!
//! let pair = engine.login("alice", "P@ssw0rd1", "10.0.0.1").await?;
//! let ctx = resolver.required(Some(&pair.access_token)).await?;
//! assert_eq!(ctx.username, "alice");
//! # Ok(())
//! # }
//! ```

pub mod authorize;
pub mod engine;

pub use authorize::{AuthorizationResolver, UserContext};
pub use engine::{AuthenticationEngine, AuthenticationEngineBuilder};
