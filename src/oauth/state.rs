//! OAuth state 令牌模块
//!
//! state 令牌是一次性的防 CSRF / 防重放值，把一次授权请求绑定到它的
//! 回调：签发时记录提供方与可选的返回地址，回调时消费。
//!
//! ## 不变式
//!
//! **每个令牌恰好允许一次成功校验。** [`OAuthStateManager::consume`]
//! 以原子的"取出并删除"实现：无论校验结果如何，条目在首次查找时即被
//! 销毁——提供方不匹配同样烧掉令牌。不存在、已过期、提供方不匹配对
//! 调用方统一表现为 `None`，不泄露区别。

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::random::generate_state_token;
use crate::store::{InMemoryTtlStore, TtlStore};

/// state 条目的键前缀
const KEY_PREFIX: &str = "oauth_state:";

/// state 令牌默认有效期
const DEFAULT_STATE_TTL_MINUTES: i64 = 10;

/// 存储中的 state 条目
#[derive(Debug, Serialize, Deserialize)]
struct StateEntry {
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_url: Option<String>,
}

/// 成功消费的 state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedState {
    /// 签发时记录的返回地址
    pub return_url: Option<String>,
}

/// OAuth state 管理器
pub struct OAuthStateManager {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl OAuthStateManager {
    /// 基于任意 TTL 存储创建
    pub fn new(store: Arc<dyn TtlStore>) -> Self {
        Self {
            store,
            ttl: Duration::minutes(DEFAULT_STATE_TTL_MINUTES),
        }
    }

    /// 创建内存后端的管理器
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(InMemoryTtlStore::new(clock)))
    }

    /// 设置 state 有效期
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 签发 state 令牌
    ///
    /// 32 字节密码学随机数据的 URL 安全编码，绑定提供方与可选的
    /// 返回地址。
    pub fn issue(&self, provider: &str, return_url: Option<String>) -> Result<String> {
        let token = generate_state_token()?;
        let entry = StateEntry {
            provider: provider.to_string(),
            return_url,
        };
        let encoded = serde_json::to_string(&entry)
            .map_err(|e| Error::internal(format!("failed to encode state entry: {}", e)))?;

        self.store.put(&Self::key(&token), encoded, self.ttl)?;
        Ok(token)
    }

    /// 消费 state 令牌（单次有效）
    ///
    /// 查找即删除。令牌不存在、已过期或提供方不匹配都返回 `None`，
    /// 且条目此后一定不复存在。
    pub fn consume(&self, token: &str, expected_provider: &str) -> Option<ConsumedState> {
        let raw = self.store.take(&Self::key(token))?;

        let entry: StateEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "corrupt state entry, discarding");
                return None;
            }
        };

        if entry.provider != expected_provider {
            tracing::debug!(
                expected = expected_provider,
                actual = %entry.provider,
                "state token provider mismatch"
            );
            return None;
        }

        Some(ConsumedState {
            return_url: entry.return_url,
        })
    }

    /// 清理从未被消费的过期条目，返回清理数量
    pub fn sweep(&self) -> usize {
        self.store.sweep()
    }

    fn key(token: &str) -> String {
        format!("{}{}", KEY_PREFIX, token)
    }
}
