//! OAuth 引擎模块
//!
//! 组合 state 管理器、外部身份提供方、身份归并器与认证引擎，完成一次
//! 联合登录：
//!
//! 1. `start` 签发 state 并构造授权地址
//! 2. `complete` 先消费 state（失败即 `InvalidState`），再依次完成
//!    授权码交换、档案拉取、身份归并，最后由认证引擎签发与密码登录
//!    完全相同的令牌对——下游授权检查不感知提供方

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::engine::AuthenticationEngine;
use crate::error::{AuthError, Error, Result};
use crate::oauth::provider::ExternalIdentityProvider;
use crate::oauth::reconcile::IdentityReconciler;
use crate::oauth::state::OAuthStateManager;
use crate::token::codec::TokenPair;

/// 授权请求
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// 完整的提供方授权地址
    pub url: String,
    /// 本次流程的 state 令牌
    pub state: String,
}

/// 联合登录结果
#[derive(Debug, Clone)]
pub struct OAuthLogin {
    /// 签发的令牌对
    pub tokens: TokenPair,
    /// 登录的本地用户 id
    pub user_id: String,
    /// start 时记录的返回地址
    pub return_url: Option<String>,
    /// 本次登录是否新建了用户
    pub is_new_user: bool,
}

/// OAuth 引擎
pub struct OAuthEngine {
    providers: HashMap<String, Arc<dyn ExternalIdentityProvider>>,
    state: OAuthStateManager,
    reconciler: IdentityReconciler,
    auth: Arc<AuthenticationEngine>,
}

impl OAuthEngine {
    /// 创建新的引擎（不含任何提供方）
    pub fn new(
        state: OAuthStateManager,
        reconciler: IdentityReconciler,
        auth: Arc<AuthenticationEngine>,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            state,
            reconciler,
            auth,
        }
    }

    /// 注册一个提供方
    pub fn with_provider(mut self, provider: Arc<dyn ExternalIdentityProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// 当前支持的提供方名称
    pub fn supported_providers(&self) -> Vec<&str> {
        self.providers.keys().map(|name| name.as_str()).collect()
    }

    /// 开始授权流程
    ///
    /// 不支持的提供方返回 `UnsupportedProvider`。
    pub fn start(
        &self,
        provider: &str,
        return_url: Option<String>,
    ) -> Result<AuthorizationRequest> {
        let Some(identity_provider) = self.providers.get(provider) else {
            return Err(Error::Auth(AuthError::UnsupportedProvider(
                provider.to_string(),
            )));
        };

        let state = self.state.issue(provider, return_url)?;
        let url = identity_provider.build_authorization_url(&state);

        Ok(AuthorizationRequest { url, state })
    }

    /// 完成授权流程
    ///
    /// state 消费必须首先成功；之后授权码交换、档案拉取中的提供方侧
    /// 失败都折叠为可恢复的 `ProviderError`。
    pub async fn complete(&self, provider: &str, code: &str, state: &str) -> Result<OAuthLogin> {
        let Some(identity_provider) = self.providers.get(provider) else {
            return Err(Error::Auth(AuthError::UnsupportedProvider(
                provider.to_string(),
            )));
        };

        let Some(consumed) = self.state.consume(state, provider) else {
            return Err(Error::Auth(AuthError::InvalidState));
        };

        let Some(token) = identity_provider.exchange_code(code).await else {
            return Err(Error::Auth(AuthError::ProviderError(
                "code exchange failed".to_string(),
            )));
        };

        let Some(profile) = identity_provider.fetch_profile(&token.access_token).await else {
            return Err(Error::Auth(AuthError::ProviderError(
                "profile fetch failed".to_string(),
            )));
        };

        let (mut user, is_new_user) = self.reconciler.reconcile(&profile, provider).await?;

        self.auth.record_login(&mut user).await;
        let tokens = self.auth.issue_pair_for(&user)?;

        Ok(OAuthLogin {
            tokens,
            user_id: user.id,
            return_url: consumed.return_url,
            is_new_user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::oauth::provider::{ExternalProfile, ProviderToken};
    use crate::token::codec::{TokenCodec, TokenCodecConfig, TokenKind};
    use crate::token::revocation::TtlRevocationStore;
    use crate::user::store::{InMemoryUserStore, UserStore};
    use async_trait::async_trait;

    const TEST_SECRET: &[u8] = b"test-secret-key-at-least-32-bytes!";

    /// 可配置成功 / 失败的提供方替身
    struct MockProvider {
        fail_exchange: bool,
        fail_profile: bool,
        email: String,
    }

    impl MockProvider {
        fn ok(email: &str) -> Self {
            Self {
                fail_exchange: false,
                fail_profile: false,
                email: email.to_string(),
            }
        }
    }

    #[async_trait]
    impl ExternalIdentityProvider for MockProvider {
        fn name(&self) -> &str {
            "google"
        }

        fn build_authorization_url(&self, state: &str) -> String {
            format!("https://provider.test/auth?state={}", state)
        }

        async fn exchange_code(&self, _code: &str) -> Option<ProviderToken> {
            if self.fail_exchange {
                return None;
            }
            Some(ProviderToken {
                access_token: "provider-access".to_string(),
                refresh_token: Some("provider-refresh".to_string()),
                expires_in: Some(3600),
            })
        }

        async fn fetch_profile(&self, _access_token: &str) -> Option<ExternalProfile> {
            if self.fail_profile {
                return None;
            }
            Some(ExternalProfile {
                subject_id: "sub-1".to_string(),
                email: self.email.clone(),
                display_name: None,
            })
        }

        async fn revoke(&self, _token: &str) -> bool {
            true
        }
    }

    struct Fixture {
        engine: OAuthEngine,
        users: Arc<InMemoryUserStore>,
        auth: Arc<AuthenticationEngine>,
    }

    fn fixture_with_provider(provider: MockProvider) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::start_now());
        let users = Arc::new(InMemoryUserStore::new());
        let revocations = Arc::new(TtlRevocationStore::in_memory(clock.clone()));
        let tokens = Arc::new(
            TokenCodec::new(
                TEST_SECRET,
                TokenCodecConfig::default(),
                revocations,
                clock.clone(),
            )
            .unwrap(),
        );
        let auth = Arc::new(
            AuthenticationEngine::builder()
                .users(users.clone())
                .tokens(tokens)
                .clock(clock.clone())
                .build()
                .unwrap(),
        );

        let engine = OAuthEngine::new(
            OAuthStateManager::in_memory(clock),
            IdentityReconciler::new(users.clone()),
            auth.clone(),
        )
        .with_provider(Arc::new(provider));

        Fixture {
            engine,
            users,
            auth,
        }
    }

    #[test]
    fn test_start_unsupported_provider() {
        let f = fixture_with_provider(MockProvider::ok("x@y.com"));

        let err = f.engine.start("github", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_start_embeds_state_in_url() {
        let f = fixture_with_provider(MockProvider::ok("x@y.com"));

        let request = f.engine.start("google", Some("/after".to_string())).unwrap();
        assert!(request.url.contains(&request.state));
    }

    #[tokio::test]
    async fn test_complete_happy_path_creates_user() {
        let f = fixture_with_provider(MockProvider::ok("x@y.com"));

        let request = f.engine.start("google", Some("/after".to_string())).unwrap();
        let login = f
            .engine
            .complete("google", "auth-code", &request.state)
            .await
            .unwrap();

        assert!(login.is_new_user);
        assert_eq!(login.return_url.as_deref(), Some("/after"));

        // 新建用户无密码哈希
        let user = f.users.find_by_id(&login.user_id).await.unwrap().unwrap();
        assert!(user.password_hash.is_none());
        assert_eq!(user.email, "x@y.com");
        assert!(user.last_login.is_some());

        // 签发的令牌与密码登录路径完全一致，可被正常校验
        let claims = f
            .auth
            .tokens()
            .verify(&login.tokens.access_token, TokenKind::Access)
            .unwrap();
        assert_eq!(claims.sub, login.user_id);
    }

    #[tokio::test]
    async fn test_complete_second_use_of_state_fails() {
        let f = fixture_with_provider(MockProvider::ok("x@y.com"));

        let request = f.engine.start("google", None).unwrap();
        f.engine
            .complete("google", "auth-code", &request.state)
            .await
            .unwrap();

        let err = f
            .engine
            .complete("google", "auth-code", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_complete_with_unknown_state() {
        let f = fixture_with_provider(MockProvider::ok("x@y.com"));

        let err = f
            .engine
            .complete("google", "auth-code", "never-issued")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_complete_exchange_failure_is_provider_error() {
        let f = fixture_with_provider(MockProvider {
            fail_exchange: true,
            fail_profile: false,
            email: "x@y.com".to_string(),
        });

        let request = f.engine.start("google", None).unwrap();
        let err = f
            .engine
            .complete("google", "auth-code", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::ProviderError(_))));
    }

    #[tokio::test]
    async fn test_complete_profile_failure_is_provider_error() {
        let f = fixture_with_provider(MockProvider {
            fail_exchange: false,
            fail_profile: true,
            email: "x@y.com".to_string(),
        });

        let request = f.engine.start("google", None).unwrap();
        let err = f
            .engine
            .complete("google", "auth-code", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::ProviderError(_))));
    }

    #[tokio::test]
    async fn test_repeated_login_reuses_user() {
        let f = fixture_with_provider(MockProvider::ok("x@y.com"));

        let request = f.engine.start("google", None).unwrap();
        let first = f
            .engine
            .complete("google", "code", &request.state)
            .await
            .unwrap();

        let request = f.engine.start("google", None).unwrap();
        let second = f
            .engine
            .complete("google", "code", &request.state)
            .await
            .unwrap();

        assert!(first.is_new_user);
        assert!(!second.is_new_user);
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(f.users.len(), 1);
    }

    #[test]
    fn test_supported_providers() {
        let f = fixture_with_provider(MockProvider::ok("x@y.com"));
        assert_eq!(f.engine.supported_providers(), vec!["google"]);
    }
}
