//! 统一错误类型模块
//!
//! 提供 authgate 库中所有操作的错误类型定义。
//!
//! 认证相关的"预期失败"（密码错误、账户锁定、令牌无效等）统一表达为
//! [`AuthError`]，对外永远不泄露可供攻击者区分的细节；令牌校验的内部
//! 失败原因（过期、签名无效、类型不符等）由 [`TokenError`] 区分，仅用于
//! 日志记录，不直接暴露给调用方。

use std::fmt;

use chrono::Duration;

/// authgate 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// authgate 库的错误类型
#[derive(Debug)]
pub enum Error {
    /// 认证 / 授权失败（预期内的业务失败）
    Auth(AuthError),

    /// Token 相关错误（内部区分，外部折叠）
    Token(TokenError),

    /// 密码哈希错误
    PasswordHash(PasswordHashError),

    /// 存储错误
    Storage(StorageError),

    /// 配置错误
    Config(ConfigError),

    /// 加密错误
    Crypto(CryptoError),

    /// 内部错误
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 如果是认证错误，返回其引用
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Error::Auth(e) => Some(e),
            _ => None,
        }
    }
}

/// 认证与授权失败
///
/// 凭证类错误对外不可区分：用户不存在与密码错误都表现为
/// [`AuthError::InvalidCredentials`]，防止用户枚举。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// 用户名或密码错误（含用户不存在、账户停用）
    InvalidCredentials,
    /// 账户因连续失败被锁定
    AccountLocked {
        /// 剩余锁定时间
        retry_after: Option<Duration>,
    },
    /// 请求方尝试次数过多
    TooManyAttempts,
    /// 未认证（缺少、无效或已吊销的令牌）
    Unauthenticated,
    /// 已认证但权限不足
    Forbidden,
    /// 令牌无效（过期 / 格式错误 / 已吊销 / 类型不符的对外折叠）
    InvalidToken,
    /// 不支持的 OAuth 提供方
    UnsupportedProvider(String),
    /// OAuth state 无效（不存在、已过期或已被消费）
    InvalidState,
    /// OAuth 提供方侧失败（可由用户重新发起流程恢复）
    ProviderError(String),
}

/// Token 相关错误
///
/// 校验失败的内部原因，供日志区分使用；对外统一折叠为
/// [`AuthError::InvalidToken`] 或 [`AuthError::Unauthenticated`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token 已过期
    Expired,
    /// Token 签名无效
    InvalidSignature,
    /// Token 类型不符（如用 refresh token 访问受保护接口）
    WrongKind {
        /// 期望的类型
        expected: String,
        /// 实际的类型
        actual: String,
    },
    /// Token 格式错误
    Malformed(String),
    /// Token 已被吊销
    Revoked,
    /// Token 编码失败
    EncodingFailed(String),
    /// 缺少必需的 claim
    MissingClaim(String),
}

/// 密码哈希相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    /// 哈希生成失败
    HashFailed(String),
    /// 无效的哈希格式
    InvalidFormat(String),
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 连接失败
    ConnectionFailed(String),
    /// 记录未找到
    NotFound(String),
    /// 记录已存在（用户名 / 邮箱唯一性冲突）
    AlreadyExists(String),
    /// 操作失败
    OperationFailed(String),
}

/// 配置相关错误
///
/// 配置错误属于启动期的致命问题（如生产环境缺少签名密钥），
/// 不应在每个请求中出现。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必需的配置
    MissingRequired(String),
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth(e) => write!(f, "Authentication error: {}", e),
            Error::Token(e) => write!(f, "Token error: {}", e),
            Error::PasswordHash(e) => write!(f, "Password hash error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "invalid username or password"),
            AuthError::AccountLocked { retry_after } => match retry_after {
                Some(d) => write!(f, "account locked, retry after {}s", d.num_seconds()),
                None => write!(f, "account locked"),
            },
            AuthError::TooManyAttempts => write!(f, "too many attempts"),
            AuthError::Unauthenticated => write!(f, "authentication required"),
            AuthError::Forbidden => write!(f, "insufficient permissions"),
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::UnsupportedProvider(p) => write!(f, "unsupported provider: {}", p),
            AuthError::InvalidState => write!(f, "invalid state token"),
            AuthError::ProviderError(msg) => write!(f, "provider error: {}", msg),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::InvalidSignature => write!(f, "invalid token signature"),
            TokenError::WrongKind { expected, actual } => {
                write!(f, "wrong token kind: expected {}, got {}", expected, actual)
            }
            TokenError::Malformed(msg) => write!(f, "malformed token: {}", msg),
            TokenError::Revoked => write!(f, "token has been revoked"),
            TokenError::EncodingFailed(msg) => write!(f, "token encoding failed: {}", msg),
            TokenError::MissingClaim(claim) => write!(f, "missing required claim: {}", claim),
        }
    }
}

impl fmt::Display for PasswordHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordHashError::HashFailed(msg) => write!(f, "hash generation failed: {}", msg),
            PasswordHashError::InvalidFormat(msg) => write!(f, "invalid hash format: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => write!(f, "storage connection failed: {}", msg),
            StorageError::NotFound(item) => write!(f, "not found: {}", item),
            StorageError::AlreadyExists(item) => write!(f, "already exists: {}", item),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => {
                write!(f, "missing required configuration: {}", key)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for AuthError {}
impl std::error::Error for TokenError {}
impl std::error::Error for PasswordHashError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Auth(err)
    }
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::Token(err)
    }
}

impl From<PasswordHashError> for Error {
    fn from(err: PasswordHashError) -> Self {
        Error::PasswordHash(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}
