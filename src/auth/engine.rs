//! 认证引擎模块
//!
//! 组合密码服务、令牌编解码、锁定追踪和用户存储，完成凭证认证与
//! 令牌对的签发 / 刷新 / 吊销。
//!
//! ## 登录流程
//!
//! 1. 锁定检查先于一切（用户名与客户端地址任一被锁即拒绝），避免在
//!    锁定状态下消耗 KDF 算力，这是有意的 DoS 缓解
//! 2. 用户不存在、已停用、外部身份账户、密码错误一律返回
//!    `InvalidCredentials`，对外不可区分，防止用户枚举
//! 3. 密码验证失败同时记入用户名和客户端地址两个计数器
//! 4. 成功后清空两个计数器、更新 `last_login`、从当前角色派生权限并
//!    签发访问 + 刷新令牌对
//!
//! OAuth 登录与密码登录在 [`AuthenticationEngine::issue_pair_for`]
//! 汇合：两条路径签发完全相同的令牌，下游授权检查不感知登录方式。

use std::sync::Arc;

use crate::clock::{Clock, system_clock};
use crate::error::{AuthError, ConfigError, Error, Result};
use crate::password::PasswordService;
use crate::security::lockout::{LockoutConfig, LockoutTracker};
use crate::security::rate_limit::RateLimiter;
use crate::token::codec::{IssuedToken, TokenCodec, TokenKind, TokenPair};
use crate::user::permissions::permissions_for_role;
use crate::user::record::UserRecord;
use crate::user::store::UserStore;

/// 认证引擎
///
/// 所有依赖显式注入，每进程（或每个测试）构造一份实例；不存在任何
/// 模块级共享状态。
pub struct AuthenticationEngine {
    users: Arc<dyn UserStore>,
    passwords: PasswordService,
    tokens: Arc<TokenCodec>,
    lockout: Arc<LockoutTracker>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl AuthenticationEngine {
    /// 创建构建器
    pub fn builder() -> AuthenticationEngineBuilder {
        AuthenticationEngineBuilder::new()
    }

    /// 获取令牌编解码器引用
    pub fn tokens(&self) -> &Arc<TokenCodec> {
        &self.tokens
    }

    /// 获取用户存储引用
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// 凭证登录
    ///
    /// `client_addr` 是请求方的网络地址，与用户名作为独立标识符分别
    /// 参与锁定判定。
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_addr: &str,
    ) -> Result<TokenPair> {
        let username = username.trim().to_lowercase();

        // 锁定检查先于密码验证，锁定期内不做任何 KDF 工作
        if self.lockout.is_locked(&username) {
            return Err(Error::Auth(AuthError::AccountLocked {
                retry_after: self.lockout.remaining_lockout(&username),
            }));
        }
        if self.lockout.is_locked(client_addr) {
            return Err(Error::Auth(AuthError::TooManyAttempts));
        }
        self.limiter.check(&format!("login:{}", client_addr))?;

        let Some(mut user) = self.users.find_by_username(&username).await? else {
            return Err(Error::Auth(AuthError::InvalidCredentials));
        };
        if !user.is_active {
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }
        let Some(hash) = user.password_hash.clone() else {
            // 外部身份账户没有密码，不可凭证登录
            return Err(Error::Auth(AuthError::InvalidCredentials));
        };

        if !self.passwords.verify(password, &hash) {
            self.record_failed_login(&mut user, client_addr).await;
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }

        self.lockout.record_success(&user.username);
        self.lockout.record_success(client_addr);

        user.touch_login(self.clock.now());
        if let Err(e) = self.users.update(&user).await {
            tracing::warn!(user_id = %user.id, error = %e, "failed to persist last_login");
        }

        self.issue_pair_for(&user)
    }

    /// 刷新访问令牌
    ///
    /// 校验刷新令牌后按 subject 重新解析用户，从**当前**角色派生权限
    /// （不信任令牌中的旧权限），签发新的访问令牌。任何校验失败统一
    /// 折叠为 `InvalidToken`。
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedToken> {
        let claims = match self.tokens.verify(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "refresh token rejected");
                return Err(Error::Auth(AuthError::InvalidToken));
            }
        };

        let user = match self.users.find_by_id(&claims.sub).await? {
            Some(user) if user.is_active => user,
            _ => return Err(Error::Auth(AuthError::InvalidToken)),
        };

        let permissions = permissions_for_role(user.role);
        self.tokens
            .issue_access(&user.id, &user.username, user.role, permissions)
    }

    /// 登出
    ///
    /// 尽力吊销传入的令牌。吊销失败只记录日志，登出在调用方视角永远
    /// 成功——即使吊销存储不可达。
    pub fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        for token in [access_token, refresh_token].into_iter().flatten() {
            match TokenCodec::decode_unverified(token) {
                Ok(claims) => {
                    if let Err(e) = self.tokens.revoke(&claims.jti, claims.expires_at()) {
                        tracing::warn!(
                            jti = %claims.jti,
                            error = %e,
                            "failed to revoke token during logout"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring undecodable token during logout");
                }
            }
        }
    }

    /// 为指定用户签发令牌对
    ///
    /// 密码登录与 OAuth 登录的共同出口。
    pub fn issue_pair_for(&self, user: &UserRecord) -> Result<TokenPair> {
        let permissions = permissions_for_role(user.role);
        self.tokens
            .issue_pair(&user.id, &user.username, user.role, permissions)
    }

    /// 记录一次成功登录并持久化 `last_login`
    ///
    /// OAuth 完成回调在签发令牌前调用。
    pub async fn record_login(&self, user: &mut UserRecord) {
        user.touch_login(self.clock.now());
        if let Err(e) = self.users.update(user).await {
            tracing::warn!(user_id = %user.id, error = %e, "failed to persist last_login");
        }
    }

    async fn record_failed_login(&self, user: &mut UserRecord, client_addr: &str) {
        self.lockout.record_failure(&user.username);
        self.lockout.record_failure(client_addr);

        // 把计数镜像到用户记录；镜像失败不影响认证结果
        let locked_until = self
            .lockout
            .remaining_lockout(&user.username)
            .map(|remaining| self.clock.now() + remaining);
        user.record_failure(self.clock.now(), locked_until);
        if let Err(e) = self.users.update(user).await {
            tracing::warn!(
                user_id = %user.id,
                error = %e,
                "failed to persist failed-attempt counter"
            );
        }
    }
}

/// 认证引擎构建器
pub struct AuthenticationEngineBuilder {
    users: Option<Arc<dyn UserStore>>,
    passwords: Option<PasswordService>,
    tokens: Option<Arc<TokenCodec>>,
    lockout: Option<Arc<LockoutTracker>>,
    limiter: Option<Arc<RateLimiter>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AuthenticationEngineBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            users: None,
            passwords: None,
            tokens: None,
            lockout: None,
            limiter: None,
            clock: None,
        }
    }

    /// 设置用户存储（必需）
    pub fn users(mut self, users: Arc<dyn UserStore>) -> Self {
        self.users = Some(users);
        self
    }

    /// 设置密码服务（默认 `PasswordService::default()`）
    pub fn passwords(mut self, passwords: PasswordService) -> Self {
        self.passwords = Some(passwords);
        self
    }

    /// 设置令牌编解码器（必需）
    pub fn tokens(mut self, tokens: Arc<TokenCodec>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// 设置锁定追踪器（默认按默认配置构建）
    pub fn lockout(mut self, lockout: Arc<LockoutTracker>) -> Self {
        self.lockout = Some(lockout);
        self
    }

    /// 设置限流能力（默认 `RateLimiter::NoOp`）
    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// 设置时钟（默认系统时钟）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 构建引擎
    pub fn build(self) -> Result<AuthenticationEngine> {
        let users = self.users.ok_or_else(|| {
            Error::Config(ConfigError::MissingRequired("user store".to_string()))
        })?;
        let tokens = self.tokens.ok_or_else(|| {
            Error::Config(ConfigError::MissingRequired("token codec".to_string()))
        })?;
        let clock = self.clock.unwrap_or_else(system_clock);
        let lockout = self
            .lockout
            .unwrap_or_else(|| Arc::new(LockoutTracker::new(LockoutConfig::default(), clock.clone())));

        Ok(AuthenticationEngine {
            users,
            passwords: self.passwords.unwrap_or_default(),
            tokens,
            lockout,
            limiter: self.limiter.unwrap_or_else(|| Arc::new(RateLimiter::noop())),
            clock,
        })
    }
}

impl Default for AuthenticationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
