//! Token 模块
//!
//! 提供令牌的签发、校验、吊销功能。
//!
//! ## 子模块
//!
//! - **codec**: 令牌编解码与类型隔离
//! - **revocation**: 吊销登记（jti 黑名单）
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use authgate::clock::system_clock;
//! use authgate::token::{TokenCodec, TokenCodecConfig, TokenKind, TtlRevocationStore};
//! use authgate::user::UserRole;
//!
//! let clock = system_clock();
//! let revocations = Arc::new(TtlRevocationStore::in_memory(clock.clone()));
//! let codec = TokenCodec::new(
//!     b"my-secret-key-at-least-32-bytes!",
//!     TokenCodecConfig::default(),
//!     revocations,
//!     clock,
//! ).unwrap();
//!
//! // 签发令牌对，吊销后校验失败
//! let pair = codec.issue_pair("usr_1", "alice", UserRole::User, vec![]).unwrap();
//! let claims = codec.verify(&pair.access_token, TokenKind::Access).unwrap();
//! codec.revoke(&claims.jti, claims.expires_at()).unwrap();
//! assert!(codec.verify(&pair.access_token, TokenKind::Access).is_err());
//! ```

pub mod codec;
pub mod revocation;

pub use codec::{
    DEFAULT_AUDIENCE, DEFAULT_ISSUER, IssuedToken, TokenClaims, TokenCodec, TokenCodecConfig,
    TokenKind, TokenPair,
};
pub use revocation::{RevocationStore, TtlRevocationStore};
