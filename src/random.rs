//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成 token 标识、state 令牌
//! 等敏感数据。

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, TryRngCore, distr::Alphanumeric, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use authgate::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定字节数的十六进制随机字符串
///
/// 最终字符串长度为字节数的两倍。
pub fn generate_random_hex(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

/// 生成指定字节数的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充），可直接用于 URL 参数。
///
/// # Example
///
/// ```rust
/// use authgate::random::generate_random_base64_url;
///
/// let token = generate_random_base64_url(32).unwrap();
/// assert!(!token.contains('+'));
/// assert!(!token.contains('/'));
/// ```
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成指定长度的字母数字随机字符串
///
/// 只包含 a-z, A-Z, 0-9 字符
pub fn generate_random_alphanumeric(length: usize) -> Result<String> {
    let token: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    Ok(token)
}

/// 生成 token 唯一标识符 (jti)
///
/// 16 字节随机数据的十六进制编码，用于吊销登记。
pub fn generate_token_id() -> Result<String> {
    generate_random_hex(16)
}

/// 生成用户记录标识符
///
/// 格式: `usr_<随机字符串>`
pub fn generate_user_id() -> Result<String> {
    let random = generate_random_alphanumeric(24)?;
    Ok(format!("usr_{}", random))
}

/// 生成 OAuth state 令牌
///
/// 32 字节（256 位）随机数据的 URL 安全编码，提供足够的熵
/// 防止暴力猜测。
pub fn generate_state_token() -> Result<String> {
    generate_random_base64_url(32)
}
