//! 密码生命周期模块
//!
//! 提供安全的密码哈希、验证和强度检查功能。
//!
//! ## 支持的算法
//!
//! - **Argon2id** (推荐): 内存硬哈希算法，抵抗 GPU/ASIC 攻击（需启用 `argon2` feature）
//! - **bcrypt**: 首选 KDF 不可用时的回退算法（需启用 `bcrypt` feature）
//!
//! ## 示例
//!
//! ```rust
//! use authgate::password::{PasswordService, is_strong};
//!
//! let service = PasswordService::default();
//!
//! // 强度检查
//! assert!(is_strong("Str0ng_P@ss!"));
//!
//! // 哈希与验证
//! let hash = service.hash("Str0ng_P@ss!").unwrap();
//! assert!(service.verify("Str0ng_P@ss!", &hash));
//! assert!(!service.verify("wrong", &hash));
//! ```

mod hasher;
pub mod strength;

pub use hasher::{Algorithm, PasswordService, hash_password, verify_password};
pub use strength::{StrengthReport, analyze, is_strong};
