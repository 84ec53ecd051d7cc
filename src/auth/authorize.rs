//! 授权解析模块
//!
//! 把请求携带的令牌解析为 [`UserContext`]，并提供角色 / 权限检查。
//!
//! 上下文按请求即时构建，绝不跨请求缓存：令牌校验通过后还要按
//! subject 回查用户存储，停用的用户与不存在的用户一视同仁地拒绝。
//! 所有拒绝对外只表现为 `Unauthenticated`，内部原因仅记录在 debug
//! 日志。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Error, Result};
use crate::token::codec::{TokenCodec, TokenKind};
use crate::user::permissions::is_permitted;
use crate::user::record::UserRole;
use crate::user::store::UserStore;

/// 请求范围的用户上下文
///
/// 由校验通过的访问令牌与用户记录共同派生，生命周期不超过单个请求。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    /// 用户 id
    pub user_id: String,
    /// 用户名
    pub username: String,
    /// 角色
    pub role: UserRole,
    /// 权限集合（来自访问令牌）
    pub permissions: Vec<String>,
    /// 是否启用
    pub is_active: bool,
}

impl UserContext {
    /// 是否为管理员
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// 是否拥有指定权限（考虑通配符，不含管理员旁路）
    pub fn has_permission(&self, permission: &str) -> bool {
        is_permitted(&self.permissions, permission)
    }
}

/// 授权解析器
pub struct AuthorizationResolver {
    tokens: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl AuthorizationResolver {
    /// 创建新的解析器
    pub fn new(tokens: Arc<TokenCodec>, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// 必需认证
    ///
    /// 令牌缺失、无效、过期、已吊销、用户不存在或已停用，一律返回
    /// `Unauthenticated`。
    pub async fn required(&self, token: Option<&str>) -> Result<UserContext> {
        let Some(token) = token else {
            return Err(Error::Auth(AuthError::Unauthenticated));
        };

        let claims = match self.tokens.verify(token, TokenKind::Access) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "access token rejected");
                return Err(Error::Auth(AuthError::Unauthenticated));
            }
        };

        let user = match self.users.find_by_id(&claims.sub).await? {
            Some(user) => user,
            None => {
                tracing::debug!(sub = %claims.sub, "token subject no longer exists");
                return Err(Error::Auth(AuthError::Unauthenticated));
            }
        };

        // 停用用户与不存在的用户不可区分
        if !user.is_active {
            tracing::debug!(user_id = %user.id, "inactive user rejected");
            return Err(Error::Auth(AuthError::Unauthenticated));
        }

        Ok(UserContext {
            user_id: user.id,
            username: user.username,
            role: user.role,
            permissions: claims.permissions,
            is_active: user.is_active,
        })
    }

    /// 可选认证
    ///
    /// 无令牌或任何校验失败都返回 `None`，绝不报错。
    pub async fn optional(&self, token: Option<&str>) -> Option<UserContext> {
        self.required(token).await.ok()
    }

    /// 要求指定角色
    ///
    /// 管理员满足任何角色检查（超级用户旁路）；否则要求精确匹配。
    pub fn require_role(&self, ctx: &UserContext, role: UserRole) -> Result<()> {
        if ctx.role == UserRole::Admin || ctx.role == role {
            Ok(())
        } else {
            Err(Error::Auth(AuthError::Forbidden))
        }
    }

    /// 要求指定权限
    ///
    /// 管理员旁路同上；否则权限必须存在于上下文的权限集合中。
    pub fn require_permission(&self, ctx: &UserContext, permission: &str) -> Result<()> {
        if ctx.role == UserRole::Admin || ctx.has_permission(permission) {
            Ok(())
        } else {
            Err(Error::Auth(AuthError::Forbidden))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use crate::token::codec::TokenCodecConfig;
    use crate::token::revocation::TtlRevocationStore;
    use crate::user::permissions::permissions_for_role;
    use crate::user::record::UserRecord;
    use crate::user::store::InMemoryUserStore;
    use chrono::Duration;

    const TEST_SECRET: &[u8] = b"test-secret-key-at-least-32-bytes!";

    struct Fixture {
        resolver: AuthorizationResolver,
        codec: Arc<TokenCodec>,
        users: Arc<InMemoryUserStore>,
    }

    fn fixture() -> Fixture {
        fixture_with_config(TokenCodecConfig::default())
    }

    fn fixture_with_config(config: TokenCodecConfig) -> Fixture {
        let clock = system_clock();
        let revocations = Arc::new(TtlRevocationStore::in_memory(clock.clone()));
        let codec = Arc::new(TokenCodec::new(TEST_SECRET, config, revocations, clock).unwrap());
        let users = Arc::new(InMemoryUserStore::new());
        let resolver = AuthorizationResolver::new(codec.clone(), users.clone());
        Fixture {
            resolver,
            codec,
            users,
        }
    }

    async fn seed_user(f: &Fixture, username: &str, role: UserRole) -> UserRecord {
        let user = UserRecord::with_password(
            username,
            format!("{}@example.com", username),
            "$hash",
            role,
        )
        .unwrap();
        f.users.create(&user).await.unwrap();
        user
    }

    fn issue_for(f: &Fixture, user: &UserRecord) -> String {
        f.codec
            .issue_access(
                &user.id,
                &user.username,
                user.role,
                permissions_for_role(user.role),
            )
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn test_required_with_valid_token() {
        let f = fixture();
        let user = seed_user(&f, "alice", UserRole::User).await;
        let token = issue_for(&f, &user);

        let ctx = f.resolver.required(Some(&token)).await.unwrap();
        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.role, UserRole::User);
        assert!(ctx.is_active);
        assert!(ctx.has_permission("requirements:read"));
    }

    #[tokio::test]
    async fn test_required_without_token() {
        let f = fixture();
        let err = f.resolver.required(None).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_required_with_garbage_token() {
        let f = fixture();
        let err = f.resolver.required(Some("garbage")).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_required_with_refresh_token_rejected() {
        let f = fixture();
        let user = seed_user(&f, "alice", UserRole::User).await;
        let refresh = f
            .codec
            .issue_refresh(&user.id, &user.username, user.role)
            .unwrap();

        let err = f.resolver.required(Some(&refresh.token)).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_required_with_expired_token() {
        let f = fixture_with_config(
            TokenCodecConfig::default().with_access_ttl(Duration::seconds(-10)),
        );
        let user = seed_user(&f, "alice", UserRole::User).await;
        let token = issue_for(&f, &user);

        let err = f.resolver.required(Some(&token)).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_required_with_revoked_token() {
        let f = fixture();
        let user = seed_user(&f, "alice", UserRole::User).await;
        let issued = f
            .codec
            .issue_access(&user.id, &user.username, user.role, vec![])
            .unwrap();

        f.codec.revoke(&issued.jti, issued.expires_at).unwrap();

        let err = f.resolver.required(Some(&issued.token)).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_required_inactive_user() {
        let f = fixture();
        let mut user = seed_user(&f, "alice", UserRole::User).await;
        let token = issue_for(&f, &user);

        user.is_active = false;
        f.users.update(&user).await.unwrap();

        let err = f.resolver.required(Some(&token)).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_required_vanished_user() {
        let f = fixture();
        let user = UserRecord::with_password("ghost", "ghost@example.com", "$h", UserRole::User)
            .unwrap();
        // 用户从未写入存储
        let token = issue_for(&f, &user);

        let err = f.resolver.required(Some(&token)).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_optional_never_errors() {
        let f = fixture();
        assert!(f.resolver.optional(None).await.is_none());
        assert!(f.resolver.optional(Some("garbage")).await.is_none());

        let user = seed_user(&f, "alice", UserRole::User).await;
        let token = issue_for(&f, &user);
        assert!(f.resolver.optional(Some(&token)).await.is_some());
    }

    #[tokio::test]
    async fn test_require_role_exact_match() {
        let f = fixture();
        let user = seed_user(&f, "alice", UserRole::User).await;
        let token = issue_for(&f, &user);
        let ctx = f.resolver.required(Some(&token)).await.unwrap();

        assert!(f.resolver.require_role(&ctx, UserRole::User).is_ok());
        let err = f.resolver.require_role(&ctx, UserRole::Guest).unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_admin_bypasses_role_and_permission_checks() {
        let f = fixture();
        let admin = seed_user(&f, "root", UserRole::Admin).await;
        let token = issue_for(&f, &admin);
        let ctx = f.resolver.required(Some(&token)).await.unwrap();

        assert!(f.resolver.require_role(&ctx, UserRole::User).is_ok());
        assert!(f.resolver.require_role(&ctx, UserRole::Guest).is_ok());
        assert!(f.resolver.require_permission(&ctx, "users:delete").is_ok());
        assert!(f.resolver.require_permission(&ctx, "anything:at_all").is_ok());
    }

    #[tokio::test]
    async fn test_require_permission() {
        let f = fixture();
        let user = seed_user(&f, "alice", UserRole::User).await;
        let token = issue_for(&f, &user);
        let ctx = f.resolver.required(Some(&token)).await.unwrap();

        assert!(f.resolver.require_permission(&ctx, "feedback:write").is_ok());
        let err = f
            .resolver
            .require_permission(&ctx, "users:delete")
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Forbidden)));
    }
}
