//! OAuth 联合登录模块
//!
//! 提供第三方身份握手的完整闭环，包括：
//!
//! - **state** (`state`): 一次性防 CSRF state 令牌
//! - **provider** (`provider`): 外部身份提供方抽象与 Google 实现
//! - **reconcile** (`reconcile`): 外部身份到本地用户的归并
//! - **engine** (`engine`): 流程编排（start / complete）
//!
//! ## 流程概览
//!
//! ```text
//! start(provider)    →  签发 state，返回授权地址
//!        ↓ 用户在提供方完成授权
//! complete(provider, code, state)
//!        →  消费 state（一次性）
//!        →  授权码换取提供方令牌
//!        →  拉取档案
//!        →  按邮箱归并 / 创建本地用户
//!        →  认证引擎签发令牌对（与密码登录同一条出口）
//! ```

pub mod engine;
pub mod provider;
pub mod reconcile;
pub mod state;

pub use engine::{AuthorizationRequest, OAuthEngine, OAuthLogin};
pub use provider::{
    ExternalIdentityProvider, ExternalProfile, GoogleConfig, GoogleProvider, ProviderToken,
};
pub use reconcile::IdentityReconciler;
pub use state::{ConsumedState, OAuthStateManager};
