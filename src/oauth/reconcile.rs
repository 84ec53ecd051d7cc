//! 身份归并模块
//!
//! 把外部身份映射到本地用户记录：存在则关联，不存在则创建。
//!
//! 邮箱是唯一的归并键——共享同一邮箱的两个不同外部身份会有意地归并
//! 到同一个本地账户。用户名冲突用确定性的 `_2`、`_3`…… 后缀解决
//! （不是随机后缀，重试在测试中可复现）。

use std::sync::Arc;

use crate::error::Result;
use crate::oauth::provider::ExternalProfile;
use crate::user::record::UserRecord;
use crate::user::store::UserStore;

/// 身份归并器
pub struct IdentityReconciler {
    users: Arc<dyn UserStore>,
}

impl IdentityReconciler {
    /// 创建新的归并器
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// 归并外部身份
    ///
    /// 返回 `(用户记录, 是否新建)`。
    ///
    /// 1. 按邮箱查找已有用户：命中则幂等地关联提供方 / subject
    /// 2. 否则从邮箱本地部分派生用户名，冲突时追加确定性后缀
    /// 3. 创建 `password_hash` 为空、角色为默认 `user` 的新记录
    pub async fn reconcile(
        &self,
        profile: &ExternalProfile,
        provider: &str,
    ) -> Result<(UserRecord, bool)> {
        let email = profile.email.trim().to_lowercase();

        if let Some(mut user) = self.users.find_by_email(&email).await? {
            if !user.is_linked_to(provider) {
                user.link_external(provider, &profile.subject_id);
                self.users.update(&user).await?;
                tracing::info!(
                    user_id = %user.id,
                    provider,
                    "linked external identity to existing user"
                );
            }
            return Ok((user, false));
        }

        let username = self.available_username(&email).await?;
        let user = UserRecord::from_external(username, &email, provider, &profile.subject_id)?;
        self.users.create(&user).await?;
        tracing::info!(
            user_id = %user.id,
            provider,
            "created user from external identity"
        );

        Ok((user, true))
    }

    /// 从邮箱派生一个未被占用的用户名
    async fn available_username(&self, email: &str) -> Result<String> {
        let base = derive_username(email);

        if self.users.find_by_username(&base).await?.is_none() {
            return Ok(base);
        }

        let mut suffix = 2u32;
        loop {
            let candidate = format!("{}_{}", base, suffix);
            if self.users.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }
}

/// 从邮箱本地部分派生用户名
///
/// 小写化并只保留 `[a-z0-9._-]`；结果为空时回退到 `user`。
fn derive_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let cleaned: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        .collect();

    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}
