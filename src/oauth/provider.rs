//! 外部身份提供方模块
//!
//! [`ExternalIdentityProvider`] 抽象一个具体的 OAuth 提供方：授权地址
//! 构造、授权码换取令牌、档案拉取和提供方侧吊销。每个支持的提供方
//! 一个实例。
//!
//! 提供方调用是本库仅有的网络 I/O 点，全部带有限定超时。任何传输层
//! 或提供方侧错误（含超时）都折叠为 `None` / `false`——OAuth 失败
//! 永远可以由用户重新发起流程恢复，本层不做自动重试，重试策略属于
//! 调用方。

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Google 授权端点
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google 令牌端点
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google 用户信息端点（OpenID userinfo）
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google 令牌吊销端点
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// 提供方调用的默认超时
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// 外部身份档案
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    /// 提供方侧的稳定 subject 标识
    pub subject_id: String,
    /// 邮箱（归并键）
    pub email: String,
    /// 显示名称
    pub display_name: Option<String>,
}

/// 提供方返回的令牌
#[derive(Debug, Clone)]
pub struct ProviderToken {
    /// 访问令牌
    pub access_token: String,
    /// 刷新令牌（首次授权时由 offline access 保证）
    pub refresh_token: Option<String>,
    /// 有效期（秒）
    pub expires_in: Option<u64>,
}

/// 外部身份提供方抽象
#[async_trait]
pub trait ExternalIdentityProvider: Send + Sync {
    /// 提供方名称（注册与 state 绑定使用）
    fn name(&self) -> &str;

    /// 构造授权地址
    ///
    /// 嵌入 client id、回调地址、作用域、`response_type=code` 与
    /// state 令牌。
    fn build_authorization_url(&self, state: &str) -> String;

    /// 授权码换取令牌
    ///
    /// 任何传输或提供方侧错误返回 `None`，不向上抛出。
    async fn exchange_code(&self, code: &str) -> Option<ProviderToken>;

    /// 拉取用户档案
    async fn fetch_profile(&self, access_token: &str) -> Option<ExternalProfile>;

    /// 提供方侧吊销（尽力而为）
    ///
    /// 失败不阻塞本地登出。
    async fn revoke(&self, token: &str) -> bool;
}

/// Google 提供方配置
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// 已注册的回调地址
    pub redirect_uri: String,
    /// 请求的作用域
    pub scopes: Vec<String>,
    /// 提供方调用超时
    pub timeout: StdDuration,
}

impl GoogleConfig {
    /// 创建新的配置
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            timeout: StdDuration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// 设置作用域
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// 设置超时
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Google 提供方
pub struct GoogleProvider {
    config: GoogleConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl GoogleProvider {
    /// 创建新的 Google 提供方
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl ExternalIdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn build_authorization_url(&self, state: &str) -> String {
        let mut url = match Url::parse(GOOGLE_AUTH_URL) {
            Ok(url) => url,
            // 常量地址，解析失败不可达
            Err(_) => return GOOGLE_AUTH_URL.to_string(),
        };

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            // offline access + 强制确认：保证首次登录拿到 refresh token
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Option<ProviderToken> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = match self.http.post(GOOGLE_TOKEN_URL).form(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "code exchange request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "code exchange rejected by provider");
            return None;
        }

        match response.json::<GoogleTokenResponse>().await {
            Ok(token) => Some(ProviderToken {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse token response");
                None
            }
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Option<ExternalProfile> {
        let response = match self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "profile request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "profile fetch rejected by provider");
            return None;
        }

        let info = match response.json::<GoogleUserInfo>().await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse userinfo response");
                return None;
            }
        };

        // 邮箱是归并键，缺失时档案不可用
        let email = match info.email {
            Some(email) if !email.is_empty() => email,
            _ => {
                tracing::warn!(sub = %info.sub, "provider profile has no email");
                return None;
            }
        };

        Some(ExternalProfile {
            subject_id: info.sub,
            email,
            display_name: info.name,
        })
    }

    async fn revoke(&self, token: &str) -> bool {
        let result = self
            .http
            .post(GOOGLE_REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "provider-side revocation failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "provider-side revocation request failed");
                false
            }
        }
    }
}
