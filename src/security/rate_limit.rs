//! 速率限制模块
//!
//! 提供滑动窗口速率限制，用于限制单个来源的认证请求频率。
//!
//! 限流是一个在启动期选定的能力（capability）：部署方在构造引擎时
//! 选择 [`RateLimiter::Enforced`] 或 [`RateLimiter::NoOp`]，调用点
//! 不感知差异，也不存在任何运行期的"依赖缺失时退化"逻辑。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::clock::Clock;
use crate::error::{AuthError, Error, Result};

/// 速率限制配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 时间窗口内允许的最大请求数
    pub max_requests: u32,
    /// 时间窗口大小
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::minutes(1),
        }
    }
}

impl RateLimitConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最大请求数
    pub fn with_max_requests(mut self, max: u32) -> Self {
        self.max_requests = max;
        self
    }

    /// 设置时间窗口
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

/// 滑动窗口限制器
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Vec<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// 创建新的限制器
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            clock,
        }
    }

    /// 检查并记录一次请求
    ///
    /// 窗口内请求数达到上限时返回 `AuthError::TooManyAttempts`。
    pub fn check(&self, key: &str) -> Result<()> {
        let now = self.clock.now();
        let cutoff = now - self.config.window;

        let mut bucket = self.buckets.entry(key.to_string()).or_default();
        bucket.retain(|&ts| ts > cutoff);

        if bucket.len() as u32 >= self.config.max_requests {
            return Err(Error::Auth(AuthError::TooManyAttempts));
        }

        bucket.push(now);
        Ok(())
    }

    /// 重置某个 key 的计数
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    /// 清理空闲的 bucket，返回清理数量
    pub fn sweep(&self) -> usize {
        let cutoff = self.clock.now() - self.config.window;
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.iter().any(|&ts| ts > cutoff));
        before - self.buckets.len()
    }
}

/// 速率限制能力
///
/// 两个变体在启动期选定，调用点统一走 [`RateLimiter::check`]。
pub enum RateLimiter {
    /// 启用限流
    Enforced(SlidingWindowLimiter),
    /// 不限流
    NoOp,
}

impl RateLimiter {
    /// 创建启用限流的实例
    pub fn enforced(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        RateLimiter::Enforced(SlidingWindowLimiter::new(config, clock))
    }

    /// 创建不限流的实例
    pub fn noop() -> Self {
        RateLimiter::NoOp
    }

    /// 检查请求是否被允许
    pub fn check(&self, key: &str) -> Result<()> {
        match self {
            RateLimiter::Enforced(limiter) => limiter.check(key),
            RateLimiter::NoOp => Ok(()),
        }
    }

    /// 重置某个 key 的计数
    pub fn reset(&self, key: &str) {
        if let RateLimiter::Enforced(limiter) = self {
            limiter.reset(key);
        }
    }
}
