//! 带 TTL 的键值存储契约
//!
//! 吊销登记和 OAuth state 都只需要一个最小的 TTL 键值契约：
//! `put` / `get` / `take` / `delete`。后端实现是部署决策——单进程部署
//! 用内存实现 [`InMemoryTtlStore`]，多实例部署可以换成共享缓存。
//!
//! `take` 是原子的"读取并删除"：state 令牌的单次消费语义要求查找和
//! 删除是同一个不可分的操作，拆成 `get` + `delete` 两步会产生竞争窗口。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::clock::Clock;
use crate::error::Result;

/// TTL 键值存储 trait
///
/// 所有方法按 key 原子执行；不同 key 的操作互不阻塞。
pub trait TtlStore: Send + Sync {
    /// 写入键值，`ttl` 过后条目视为不存在
    fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// 读取键值；已过期的条目返回 `None`
    fn get(&self, key: &str) -> Option<String>;

    /// 原子地读取并删除键值；已过期的条目返回 `None`
    ///
    /// 无论条目是否过期，调用后该 key 一定不再存在。
    fn take(&self, key: &str) -> Option<String>;

    /// 删除键值
    fn delete(&self, key: &str);

    /// 清理所有已过期的条目，返回清理数量
    ///
    /// 读取路径已经做惰性过期检查，正确性不依赖本方法；定期调用
    /// 可以回收从未被再次访问的条目占用的内存。
    fn sweep(&self) -> usize;
}

#[derive(Debug, Clone)]
struct TtlEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// 内存 TTL 存储
///
/// 基于分片并发映射，读写按 key 加锁，不同 key 互不阻塞。
pub struct InMemoryTtlStore {
    entries: DashMap<String, TtlEntry>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTtlStore {
    /// 创建新的内存存储
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// 当前存储的条目数（含未清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 存储是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TtlStore for InMemoryTtlStore {
    fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let entry = TtlEntry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();

        // 惰性过期：读到过期条目时顺手删除
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        self.entries.remove(key);
        None
    }

    fn take(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let (_, entry) = self.entries.remove(key)?;

        if entry.expires_at > now {
            Some(entry.value)
        } else {
            None
        }
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}
