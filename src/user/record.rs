//! 用户记录定义
//!
//! [`UserRecord`] 是认证引擎和身份归并器共同维护的核心数据结构。
//! 不变式：`password_hash` 为空的记录必须携带完整的
//! `oauth_provider` + `oauth_subject` 对——它只能通过外部身份认证，
//! 构造函数保证这一点。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::random::generate_user_id;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// 管理员：绕过所有角色与权限检查
    Admin,
    /// 普通用户
    #[default]
    User,
    /// 访客：只读
    Guest,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
            UserRole::Guest => write!(f, "guest"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "guest" => Ok(UserRole::Guest),
            _ => Err(Error::Config(ConfigError::InvalidValue {
                key: "role".to_string(),
                message: format!("unknown role: {}", s),
            })),
        }
    }
}

/// 用户记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// 唯一标识符
    pub id: String,

    /// 用户名（唯一，小写规范化）
    pub username: String,

    /// 邮箱（唯一，小写规范化）
    pub email: String,

    /// 密码哈希；外部身份账户为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    /// 角色
    pub role: UserRole,

    /// 是否启用
    pub is_active: bool,

    /// 连续失败次数（锁定追踪器的持久化镜像）
    pub failed_attempts: u32,

    /// 锁定结束时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,

    /// 关联的外部身份提供方
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_provider: Option<String>,

    /// 外部身份在提供方处的 subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_subject: Option<String>,

    /// 最后登录时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// 创建密码认证用户
    pub fn with_password(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: UserRole,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: generate_user_id()?,
            username: username.into().to_lowercase(),
            email: email.into().to_lowercase(),
            password_hash: Some(password_hash.into()),
            role,
            is_active: true,
            failed_attempts: 0,
            locked_until: None,
            oauth_provider: None,
            oauth_subject: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// 创建外部身份用户
    ///
    /// 无密码哈希，必须携带完整的提供方 / subject 对。
    pub fn from_external(
        username: impl Into<String>,
        email: impl Into<String>,
        provider: impl Into<String>,
        subject: impl Into<String>,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: generate_user_id()?,
            username: username.into().to_lowercase(),
            email: email.into().to_lowercase(),
            password_hash: None,
            role: UserRole::User,
            is_active: true,
            failed_attempts: 0,
            locked_until: None,
            oauth_provider: Some(provider.into()),
            oauth_subject: Some(subject.into()),
            last_login: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// 是否为纯外部身份账户（不可密码登录）
    pub fn is_oauth_only(&self) -> bool {
        self.password_hash.is_none()
    }

    /// 是否已关联指定提供方的外部身份
    pub fn is_linked_to(&self, provider: &str) -> bool {
        self.oauth_provider.as_deref() == Some(provider)
    }

    /// 关联外部身份（幂等）
    pub fn link_external(&mut self, provider: impl Into<String>, subject: impl Into<String>) {
        self.oauth_provider = Some(provider.into());
        self.oauth_subject = Some(subject.into());
        self.updated_at = Utc::now();
    }

    /// 记录一次成功登录
    pub fn touch_login(&mut self, now: DateTime<Utc>) {
        self.last_login = Some(now);
        self.failed_attempts = 0;
        self.locked_until = None;
        self.updated_at = now;
    }

    /// 记录一次失败登录
    pub fn record_failure(&mut self, now: DateTime<Utc>, locked_until: Option<DateTime<Utc>>) {
        self.failed_attempts += 1;
        if locked_until.is_some() {
            self.locked_until = locked_until;
        }
        self.updated_at = now;
    }
}
