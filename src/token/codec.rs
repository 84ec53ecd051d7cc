//! Token 编解码模块
//!
//! 提供访问令牌与刷新令牌的签发、校验和吊销。
//!
//! ## 设计要点
//!
//! - **类型隔离**: 每个令牌携带 `kind` claim（`access` / `refresh`），
//!   校验时强制匹配期望类型——刷新令牌永远不能当访问令牌使用，反之亦然
//! - **吊销优先**: 签名与 claims 全部合法的令牌，只要 `jti` 在吊销
//!   登记中就拒绝——拉黑胜过结构有效性
//! - **单签发方模型**: 默认 HMAC-SHA256 对称密钥，也支持 RSA 密钥对；
//!   签名密钥由外部提供（环境变量、密钥管理服务），生产配置下本模块
//!   绝不隐式生成长期密钥，开发回退 [`TokenCodec::with_dev_secret`]
//!   会记录显式警告
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
//! let issued = codec
//!     .issue_access("usr_1", "alice", UserRole::User, vec!["requirements:read".into()])
//!     .unwrap();
//! let claims = codec.verify(&issued.token, TokenKind::Access).unwrap();
//! assert_eq!(claims.username, "alice");
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, dangerous::insecure_decode,
    decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{ConfigError, Error, Result, TokenError};
use crate::random::{generate_random_bytes, generate_token_id};
use crate::token::revocation::RevocationStore;
use crate::user::record::UserRole;

/// 默认签发者
pub const DEFAULT_ISSUER: &str = "authgate";

/// 默认接收者
pub const DEFAULT_AUDIENCE: &str = "authgate-api";

/// 对称密钥最小长度（字节）
const MIN_SECRET_LEN: usize = 32;

/// Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// 访问令牌（短期）
    Access,
    /// 刷新令牌（长期，不携带权限）
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Token claims
///
/// 签名负载，不做持久化。刷新令牌的 `permissions` 为空：权限在刷新时
/// 从用户当前角色重新派生，不信任刷新令牌里的旧值。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// 主题（用户 id）
    pub sub: String,

    /// 用户名
    pub username: String,

    /// 角色
    pub role: UserRole,

    /// 权限集合（仅访问令牌）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,

    /// 签发者
    pub iss: String,

    /// 接收者
    pub aud: String,

    /// 签发时间（Unix 时间戳）
    pub iat: i64,

    /// 过期时间（Unix 时间戳）
    pub exp: i64,

    /// 唯一标识符，用于吊销登记
    pub jti: String,

    /// 令牌类型
    pub kind: TokenKind,
}

impl TokenClaims {
    /// 过期时间
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// 单个已签发的令牌
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// 编码后的令牌字符串
    pub token: String,
    /// 令牌的 jti
    pub jti: String,
    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

/// Access Token 和 Refresh Token 对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access Token（短期有效）
    pub access_token: String,
    /// Refresh Token（长期有效）
    pub refresh_token: String,
    /// Access Token 过期时间（Unix 时间戳）
    pub access_token_expires_at: i64,
    /// Refresh Token 过期时间（Unix 时间戳）
    pub refresh_token_expires_at: i64,
    /// Token 类型（通常为 "Bearer"）
    pub token_type: String,
}

/// Token 编解码配置
#[derive(Debug, Clone)]
pub struct TokenCodecConfig {
    /// 签发者
    pub issuer: String,
    /// 接收者
    pub audience: String,
    /// 访问令牌有效期
    pub access_ttl: Duration,
    /// 刷新令牌有效期
    pub refresh_ttl: Duration,
}

impl Default for TokenCodecConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::days(30),
        }
    }
}

impl TokenCodecConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// 设置接收者
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// 设置访问令牌有效期
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// 设置刷新令牌有效期
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }
}

/// Token 编解码器
///
/// 签名与校验本身无共享可变状态，可以完全并行；唯一的共享依赖是
/// 吊销登记，按 jti 做 O(1) 查找。
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    config: TokenCodecConfig,
    revocations: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// 使用对称密钥创建（HMAC-SHA256）
    ///
    /// 密钥长度不足 32 字节视为配置错误——这是启动期的致命问题，
    /// 不是请求期错误。
    pub fn new(
        secret: &[u8],
        config: TokenCodecConfig,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: "signing_secret".to_string(),
                message: format!("secret must be at least {} bytes", MIN_SECRET_LEN),
            }));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            config,
            revocations,
            clock,
        })
    }

    /// 使用 RSA 密钥对创建（RS256）
    pub fn with_rsa_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        config: TokenCodecConfig,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem).map_err(|e| {
            Error::Config(ConfigError::InvalidValue {
                key: "signing_key".to_string(),
                message: format!("invalid RSA private key: {}", e),
            })
        })?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem).map_err(|e| {
            Error::Config(ConfigError::InvalidValue {
                key: "signing_key".to_string(),
                message: format!("invalid RSA public key: {}", e),
            })
        })?;

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm: Algorithm::RS256,
            config,
            revocations,
            clock,
        })
    }

    /// 开发环境回退：随机生成一次性签名密钥
    ///
    /// 进程重启后所有已签发的令牌立即失效。仅用于本地开发，
    /// 调用时记录警告日志。
    pub fn with_dev_secret(
        config: TokenCodecConfig,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        tracing::warn!(
            "no signing secret provided, generating an ephemeral development secret; \
             all tokens become invalid on restart"
        );
        let secret = generate_random_bytes(MIN_SECRET_LEN)?;
        Self::new(&secret, config, revocations, clock)
    }

    /// 获取配置引用
    pub fn config(&self) -> &TokenCodecConfig {
        &self.config
    }

    /// 签发访问令牌
    pub fn issue_access(
        &self,
        user_id: &str,
        username: &str,
        role: UserRole,
        permissions: Vec<String>,
    ) -> Result<IssuedToken> {
        self.issue(
            user_id,
            username,
            role,
            permissions,
            TokenKind::Access,
            self.config.access_ttl,
        )
    }

    /// 签发刷新令牌
    ///
    /// 不携带权限负载：权限在刷新时重新派生，不从刷新令牌信任。
    pub fn issue_refresh(&self, user_id: &str, username: &str, role: UserRole) -> Result<IssuedToken> {
        self.issue(
            user_id,
            username,
            role,
            Vec::new(),
            TokenKind::Refresh,
            self.config.refresh_ttl,
        )
    }

    /// 签发访问 + 刷新令牌对
    pub fn issue_pair(
        &self,
        user_id: &str,
        username: &str,
        role: UserRole,
        permissions: Vec<String>,
    ) -> Result<TokenPair> {
        let access = self.issue_access(user_id, username, role, permissions)?;
        let refresh = self.issue_refresh(user_id, username, role)?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_token_expires_at: access.expires_at.timestamp(),
            refresh_token_expires_at: refresh.expires_at.timestamp(),
            token_type: "Bearer".to_string(),
        })
    }

    fn issue(
        &self,
        user_id: &str,
        username: &str,
        role: UserRole,
        permissions: Vec<String>,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = self.clock.now();
        let expires_at = now + ttl;
        let jti = generate_token_id()?;

        let claims = TokenClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            permissions,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: jti.clone(),
            kind,
        };

        let header = Header::new(self.algorithm);
        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            Error::Token(TokenError::EncodingFailed(format!(
                "failed to encode token: {}",
                e
            )))
        })?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// 校验令牌并返回 claims
    ///
    /// 依次检查：签名、签发者、接收者、过期时间、令牌类型，最后查询
    /// 吊销登记。结构完全合法但已拉黑的令牌同样被拒绝。
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<TokenClaims> {
        let validation = self.build_validation();

        let token_data: TokenData<TokenClaims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| {
                let error = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        TokenError::InvalidSignature
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                        TokenError::Malformed("invalid issuer".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                        TokenError::Malformed("invalid audience".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                        TokenError::Malformed("token not yet valid".to_string())
                    }
                    _ => TokenError::Malformed(e.to_string()),
                };
                Error::Token(error)
            })?;

        let claims = token_data.claims;

        if claims.kind != expected_kind {
            return Err(Error::Token(TokenError::WrongKind {
                expected: expected_kind.to_string(),
                actual: claims.kind.to_string(),
            }));
        }

        // 拉黑胜过结构有效性
        if self.revocations.is_revoked(&claims.jti) {
            return Err(Error::Token(TokenError::Revoked));
        }

        Ok(claims)
    }

    /// 吊销令牌
    ///
    /// 以令牌自身的剩余有效期作为吊销条目的有效期。
    pub fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let remaining = expires_at - self.clock.now();
        self.revocations.revoke(jti, remaining)
    }

    /// 不验证签名，仅解码令牌
    ///
    /// 用于登出时从（可能已过期的）令牌中提取 jti 与过期时间。
    /// 不得用于任何授权决策。
    pub fn decode_unverified(token: &str) -> Result<TokenClaims> {
        let token_data: TokenData<TokenClaims> = insecure_decode(token).map_err(|e| {
            Error::Token(TokenError::Malformed(format!(
                "failed to decode token: {}",
                e
            )))
        })?;
        Ok(token_data.claims)
    }

    fn build_validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock as _, ManualClock, system_clock};

    const TEST_SECRET: &[u8] = b"test-secret-key-at-least-32-bytes!";

    fn codec() -> TokenCodec {
        let clock = system_clock();
        let revocations = Arc::new(crate::token::revocation::TtlRevocationStore::in_memory(
            clock.clone(),
        ));
        TokenCodec::new(TEST_SECRET, TokenCodecConfig::default(), revocations, clock).unwrap()
    }

    fn codec_with_config(config: TokenCodecConfig) -> TokenCodec {
        let clock = system_clock();
        let revocations = Arc::new(crate::token::revocation::TtlRevocationStore::in_memory(
            clock.clone(),
        ));
        TokenCodec::new(TEST_SECRET, config, revocations, clock).unwrap()
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let codec = codec();
        let issued = codec
            .issue_access(
                "usr_1",
                "alice",
                UserRole::User,
                vec!["requirements:read".to_string()],
            )
            .unwrap();

        assert_eq!(issued.token.matches('.').count(), 2);

        let claims = codec.verify(&issued.token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, "usr_1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, UserRole::User);
        assert_eq!(claims.permissions, vec!["requirements:read".to_string()]);
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn test_kind_separation() {
        let codec = codec();
        let access = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();
        let refresh = codec.issue_refresh("usr_1", "alice", UserRole::User).unwrap();

        // 刷新令牌不能当访问令牌用，反之亦然
        let result = codec.verify(&refresh.token, TokenKind::Access);
        assert!(matches!(
            result,
            Err(Error::Token(TokenError::WrongKind { .. }))
        ));

        let result = codec.verify(&access.token, TokenKind::Refresh);
        assert!(matches!(
            result,
            Err(Error::Token(TokenError::WrongKind { .. }))
        ));
    }

    #[test]
    fn test_refresh_has_no_permissions() {
        let codec = codec();
        let refresh = codec.issue_refresh("usr_1", "alice", UserRole::Admin).unwrap();
        let claims = codec.verify(&refresh.token, TokenKind::Refresh).unwrap();
        assert!(claims.permissions.is_empty());
    }

    #[test]
    fn test_expired_token() {
        let config = TokenCodecConfig::default().with_access_ttl(Duration::seconds(-10));
        let codec = codec_with_config(config);

        let issued = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();
        let result = codec.verify(&issued.token, TokenKind::Access);
        assert!(matches!(result, Err(Error::Token(TokenError::Expired))));
    }

    #[test]
    fn test_invalid_signature() {
        let codec_a = codec();
        let clock = system_clock();
        let revocations = Arc::new(crate::token::revocation::TtlRevocationStore::in_memory(
            clock.clone(),
        ));
        let codec_b = TokenCodec::new(
            b"another-secret-key-of-32-bytes!!",
            TokenCodecConfig::default(),
            revocations,
            clock,
        )
        .unwrap();

        let issued = codec_a
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();
        let result = codec_b.verify(&issued.token, TokenKind::Access);
        assert!(matches!(
            result,
            Err(Error::Token(TokenError::InvalidSignature))
        ));
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec();
        let result = codec.verify("not.a.token", TokenKind::Access);
        assert!(matches!(result, Err(Error::Token(TokenError::Malformed(_)))));

        let result = codec.verify("", TokenKind::Access);
        assert!(matches!(result, Err(Error::Token(TokenError::Malformed(_)))));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let issued = {
            let config = TokenCodecConfig::default().with_issuer("other-issuer");
            let codec = codec_with_config(config);
            codec
                .issue_access("usr_1", "alice", UserRole::User, vec![])
                .unwrap()
        };

        let codec = codec();
        let result = codec.verify(&issued.token, TokenKind::Access);
        assert!(matches!(result, Err(Error::Token(TokenError::Malformed(_)))));
    }

    #[test]
    fn test_revocation_wins() {
        let codec = codec();
        let issued = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();

        // 吊销前结构合法、未过期
        assert!(codec.verify(&issued.token, TokenKind::Access).is_ok());

        codec.revoke(&issued.jti, issued.expires_at).unwrap();

        let result = codec.verify(&issued.token, TokenKind::Access);
        assert!(matches!(result, Err(Error::Token(TokenError::Revoked))));
    }

    #[test]
    fn test_jti_unique_per_issue() {
        let codec = codec();
        let a = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();
        let b = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_issue_pair() {
        let codec = codec();
        let pair = codec
            .issue_pair("usr_1", "alice", UserRole::User, vec!["feedback:read".to_string()])
            .unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert!(pair.refresh_token_expires_at > pair.access_token_expires_at);

        assert!(codec.verify(&pair.access_token, TokenKind::Access).is_ok());
        assert!(codec.verify(&pair.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_decode_unverified() {
        let codec = codec();
        let issued = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();

        let claims = TokenCodec::decode_unverified(&issued.token).unwrap();
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.sub, "usr_1");

        assert!(TokenCodec::decode_unverified("garbage").is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let clock = system_clock();
        let revocations = Arc::new(crate::token::revocation::TtlRevocationStore::in_memory(
            clock.clone(),
        ));
        let result = TokenCodec::new(
            b"too-short",
            TokenCodecConfig::default(),
            revocations,
            clock,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_dev_secret_codec_works() {
        let clock = system_clock();
        let revocations = Arc::new(crate::token::revocation::TtlRevocationStore::in_memory(
            clock.clone(),
        ));
        let codec =
            TokenCodec::with_dev_secret(TokenCodecConfig::default(), revocations, clock).unwrap();

        let issued = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();
        assert!(codec.verify(&issued.token, TokenKind::Access).is_ok());
    }

    #[test]
    fn test_issue_uses_injected_clock() {
        let manual = Arc::new(ManualClock::start_now());
        let clock: Arc<dyn Clock> = manual.clone();
        let revocations = Arc::new(crate::token::revocation::TtlRevocationStore::in_memory(
            clock.clone(),
        ));
        let codec = TokenCodec::new(
            TEST_SECRET,
            TokenCodecConfig::default(),
            revocations,
            clock,
        )
        .unwrap();

        let issued = codec
            .issue_access("usr_1", "alice", UserRole::User, vec![])
            .unwrap();
        let claims = TokenCodec::decode_unverified(&issued.token).unwrap();
        assert_eq!(claims.iat, manual.now().timestamp());
        assert_eq!(
            claims.exp - claims.iat,
            TokenCodecConfig::default().access_ttl.num_seconds()
        );
    }
}
