//! 用户存储契约
//!
//! [`UserStore`] 是本库消费的外部协作契约：具体的持久化技术（关系库、
//! 文档库、内存映射）由部署方决定。契约要求用户名与邮箱唯一，冲突时
//! 返回独立的"已存在"错误。
//!
//! [`InMemoryUserStore`] 供测试和单进程部署使用。

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{Result, StorageError};
use crate::user::record::UserRecord;

/// 用户存储 trait
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按用户名查找（调用方负责小写规范化）
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// 按邮箱查找（调用方负责小写规范化）
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// 按 id 查找
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    /// 创建用户；用户名或邮箱冲突时返回 `StorageError::AlreadyExists`
    async fn create(&self, user: &UserRecord) -> Result<()>;

    /// 更新已存在的用户；不存在时返回 `StorageError::NotFound`
    async fn update(&self, user: &UserRecord) -> Result<()>;
}

/// 内存用户存储
///
/// 主索引按 id，辅以用户名 / 邮箱两个唯一索引。
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, UserRecord>,
    by_username: DashMap<String, String>,
    by_email: DashMap<String, String>,
}

impl InMemoryUserStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前用户数
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// 存储是否为空
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let id = match self.by_username.get(username) {
            Some(id) => id.value().clone(),
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let id = match self.by_email.get(email) {
            Some(id) => id.value().clone(),
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn create(&self, user: &UserRecord) -> Result<()> {
        if self.by_username.contains_key(&user.username) {
            return Err(StorageError::AlreadyExists(format!(
                "username {}",
                user.username
            ))
            .into());
        }
        if self.by_email.contains_key(&user.email) {
            return Err(StorageError::AlreadyExists(format!("email {}", user.email)).into());
        }

        self.users.insert(user.id.clone(), user.clone());
        self.by_username
            .insert(user.username.clone(), user.id.clone());
        self.by_email.insert(user.email.clone(), user.id.clone());
        Ok(())
    }

    async fn update(&self, user: &UserRecord) -> Result<()> {
        let previous = match self.users.get(&user.id) {
            Some(u) => u.value().clone(),
            None => {
                return Err(StorageError::NotFound(format!("user {}", user.id)).into());
            }
        };

        // 用户名 / 邮箱变更时维护唯一索引
        if previous.username != user.username {
            if self.by_username.contains_key(&user.username) {
                return Err(StorageError::AlreadyExists(format!(
                    "username {}",
                    user.username
                ))
                .into());
            }
            self.by_username.remove(&previous.username);
            self.by_username
                .insert(user.username.clone(), user.id.clone());
        }
        if previous.email != user.email {
            if self.by_email.contains_key(&user.email) {
                return Err(StorageError::AlreadyExists(format!("email {}", user.email)).into());
            }
            self.by_email.remove(&previous.email);
            self.by_email.insert(user.email.clone(), user.id.clone());
        }

        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}
