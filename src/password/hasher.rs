//! 密码哈希实现
//!
//! 提供密码哈希和验证的核心功能。默认使用 Argon2id（内存硬 KDF，
//! 64 MiB / 3 次迭代 / 1 通道），未启用 `argon2` feature 时回退到
//! bcrypt（cost 12）。
//!
//! 哈希输出自描述所用算法（PHC 字符串 / bcrypt 前缀），因此 KDF 迁移
//! 之后旧哈希仍然可以验证，配合 [`PasswordService::needs_rehash`] 可在
//! 用户下次登录时平滑升级。

#[cfg(feature = "argon2")]
use argon2::{Argon2, Params, Version};

#[cfg(feature = "argon2")]
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};

use crate::error::{Error, PasswordHashError, Result};

/// Argon2id 内存参数：64 MiB
#[cfg(feature = "argon2")]
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;

/// Argon2id 迭代次数
#[cfg(feature = "argon2")]
const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id 并行通道数
#[cfg(feature = "argon2")]
const ARGON2_LANES: u32 = 1;

/// bcrypt cost 参数默认值
#[cfg(feature = "bcrypt")]
const BCRYPT_DEFAULT_COST: u32 = 12;

/// 支持的哈希算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Argon2id - 推荐的默认算法
    /// 结合了 Argon2i（抵抗侧信道攻击）和 Argon2d（抵抗 GPU 攻击）的优点
    #[cfg(feature = "argon2")]
    Argon2id,

    /// bcrypt - 首选 KDF 不可用时的回退算法
    #[cfg(feature = "bcrypt")]
    Bcrypt,
}

// 编译时检查：至少需要启用一个密码哈希算法
#[cfg(not(any(feature = "argon2", feature = "bcrypt")))]
compile_error!(
    "At least one password hashing algorithm (argon2 or bcrypt) must be enabled. Enable one of the password hashing features."
);

#[allow(clippy::derivable_impls)]
impl Default for Algorithm {
    fn default() -> Self {
        #[cfg(feature = "argon2")]
        {
            Algorithm::Argon2id
        }
        #[cfg(all(not(feature = "argon2"), feature = "bcrypt"))]
        {
            Algorithm::Bcrypt
        }
    }
}

/// 密码服务
///
/// 哈希、验证与强度检查的入口。无共享可变状态，可被任意多个请求
/// 并发使用。
///
/// ## 示例
///
/// ```rust
/// use authgate::password::PasswordService;
///
/// let service = PasswordService::default();
/// let hash = service.hash("my_secure_password").unwrap();
///
/// assert!(service.verify("my_secure_password", &hash));
/// assert!(!service.verify("wrong_password", &hash));
/// ```
#[derive(Debug, Clone)]
pub struct PasswordService {
    /// 新哈希使用的算法
    algorithm: Algorithm,

    /// bcrypt 的 cost 参数 (4-31, 默认 12)
    #[cfg(feature = "bcrypt")]
    bcrypt_cost: u32,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            #[cfg(feature = "bcrypt")]
            bcrypt_cost: BCRYPT_DEFAULT_COST,
        }
    }
}

impl PasswordService {
    /// 使用指定算法创建密码服务
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            #[cfg(feature = "bcrypt")]
            bcrypt_cost: BCRYPT_DEFAULT_COST,
        }
    }

    /// 设置 bcrypt 的 cost 参数
    ///
    /// # Panics
    ///
    /// 如果 cost 不在 4-31 范围内会 panic
    #[cfg(feature = "bcrypt")]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        assert!(
            (4..=31).contains(&cost),
            "bcrypt cost must be between 4 and 31"
        );
        self.bcrypt_cost = cost;
        self
    }

    /// 哈希密码
    ///
    /// 返回自描述算法的哈希字符串。
    pub fn hash(&self, password: &str) -> Result<String> {
        match self.algorithm {
            #[cfg(feature = "argon2")]
            Algorithm::Argon2id => self.hash_argon2(password),
            #[cfg(feature = "bcrypt")]
            Algorithm::Bcrypt => self.hash_bcrypt(password),
        }
    }

    /// 验证密码
    ///
    /// 自动检测哈希格式。任何内部错误（格式损坏、未知算法）都视为
    /// 验证失败返回 `false`，不向调用方暴露可区分的错误，防止预言机
    /// 攻击。底层比较由 KDF 库以常量时间完成。
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        #[cfg(feature = "argon2")]
        if hash.starts_with("$argon2") {
            return self.verify_argon2(password, hash);
        }
        #[cfg(feature = "bcrypt")]
        if hash.starts_with("$2") {
            return self.verify_bcrypt(password, hash);
        }

        tracing::debug!("password hash has unknown format, rejecting");
        false
    }

    /// 检查哈希是否需要重新生成
    ///
    /// 当算法或参数升级时，旧哈希可以在用户下次成功登录时重新生成。
    pub fn needs_rehash(&self, hash: &str) -> bool {
        match self.algorithm {
            #[cfg(feature = "argon2")]
            Algorithm::Argon2id => !hash.starts_with("$argon2id"),
            #[cfg(feature = "bcrypt")]
            Algorithm::Bcrypt => {
                if !hash.starts_with("$2") {
                    return true;
                }
                if let Some(cost_str) = hash.get(4..6)
                    && let Ok(cost) = cost_str.parse::<u32>()
                {
                    return cost < self.bcrypt_cost;
                }
                true
            }
        }
    }

    // ========================================================================
    // Argon2 实现
    // ========================================================================

    #[cfg(feature = "argon2")]
    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, None)
            .map_err(|e| {
                Error::PasswordHash(PasswordHashError::HashFailed(format!(
                    "invalid Argon2 params: {}",
                    e
                )))
            })?;
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            params,
        ))
    }

    #[cfg(feature = "argon2")]
    fn hash_argon2(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::fill(&mut salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "Failed to generate random salt: {}",
                e
            )))
        })?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "Failed to encode salt: {}",
                e
            )))
        })?;

        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| {
                Error::PasswordHash(PasswordHashError::HashFailed(format!(
                    "Argon2 hash failed: {}",
                    e
                )))
            })
    }

    #[cfg(feature = "argon2")]
    fn verify_argon2(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!(error = %e, "failed to parse Argon2 hash, rejecting");
                return false;
            }
        };

        // 验证参数来自哈希本身，迁移前的旧参数仍可校验
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    // ========================================================================
    // bcrypt 实现
    // ========================================================================

    #[cfg(feature = "bcrypt")]
    fn hash_bcrypt(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.bcrypt_cost).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "bcrypt hash failed: {}",
                e
            )))
        })
    }

    #[cfg(feature = "bcrypt")]
    fn verify_bcrypt(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!(error = %e, "bcrypt verify failed, rejecting");
                false
            }
        }
    }
}

// ============================================================================
// 便捷函数
// ============================================================================

/// 使用默认算法哈希密码
pub fn hash_password(password: &str) -> Result<String> {
    PasswordService::default().hash(password)
}

/// 验证密码是否匹配哈希
///
/// 自动检测哈希格式（支持 Argon2 / bcrypt，取决于启用的 feature）
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordService::default().verify(password, hash)
}
