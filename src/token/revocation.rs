//! Token 吊销登记模块
//!
//! 以 `jti` 为键登记已吊销的令牌。条目的有效期等于被拉黑令牌自身的
//! 剩余有效期——令牌过期后吊销条目再无意义，可随时清理，条目永远
//! 不会比它拉黑的令牌活得更久。
//!
//! 查找必须是均摊 O(1)：每一次受保护请求的令牌校验都要经过这里。

use std::sync::Arc;

use chrono::Duration;

use crate::clock::Clock;
use crate::error::Result;
use crate::store::{InMemoryTtlStore, TtlStore};

/// 吊销条目的键前缀
const KEY_PREFIX: &str = "revoked:";

/// 吊销登记 trait
pub trait RevocationStore: Send + Sync {
    /// 登记一个 jti，`ttl` 为被吊销令牌的剩余有效期
    fn revoke(&self, jti: &str, ttl: Duration) -> Result<()>;

    /// 检查 jti 是否已被吊销
    fn is_revoked(&self, jti: &str) -> bool;

    /// 清理已过期的条目，返回清理数量
    fn sweep(&self) -> usize;
}

/// 基于 TTL 键值存储的吊销登记
///
/// 后端存储是部署决策：单进程用内存实现，多实例部署可替换为共享
/// 缓存的 [`TtlStore`] 实现。
pub struct TtlRevocationStore {
    store: Arc<dyn TtlStore>,
}

impl TtlRevocationStore {
    /// 基于任意 TTL 存储创建
    pub fn new(store: Arc<dyn TtlStore>) -> Self {
        Self { store }
    }

    /// 创建内存后端的吊销登记
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(InMemoryTtlStore::new(clock)))
    }

    fn key(jti: &str) -> String {
        format!("{}{}", KEY_PREFIX, jti)
    }
}

impl RevocationStore for TtlRevocationStore {
    fn revoke(&self, jti: &str, ttl: Duration) -> Result<()> {
        // 已过期的令牌无需拉黑
        if ttl <= Duration::zero() {
            return Ok(());
        }
        self.store.put(&Self::key(jti), "1".to_string(), ttl)
    }

    fn is_revoked(&self, jti: &str) -> bool {
        self.store.get(&Self::key(jti)).is_some()
    }

    fn sweep(&self) -> usize {
        self.store.sweep()
    }
}
