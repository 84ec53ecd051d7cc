//! 失败尝试锁定模块
//!
//! 为每个标识符（用户名、客户端地址）维护滑动窗口内的失败尝试记录，
//! 达到阈值后进入定时锁定。
//!
//! ## 状态机
//!
//! 每个标识符经历 `Clear → Accumulating → Locked → Clear`：
//!
//! - 首次失败时惰性创建状态，窗口内失败次数达到阈值转入 `Locked`
//! - 锁定在 `locked_until` 之前保持粘性；到期后的下一次检查自行清除
//!   全部状态（惰性过期，正确性不依赖后台清理任务）
//! - 任何一次成功认证无条件清空该标识符的状态
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use authgate::clock::ManualClock;
//! use authgate::security::{LockoutConfig, LockoutTracker};
//! use chrono::Duration;
//!
//! let clock = Arc::new(ManualClock::start_now());
//! let tracker = LockoutTracker::new(LockoutConfig::default(), clock.clone());
//!
//! for _ in 0..5 {
//!     tracker.record_failure("alice");
//! }
//! assert!(tracker.is_locked("alice"));
//!
//! // 锁定时间过后自动解除
//! clock.advance(Duration::minutes(16));
//! assert!(!tracker.is_locked("alice"));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::clock::Clock;

/// 锁定配置
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// 触发锁定的失败次数阈值
    pub max_failures: u32,

    /// 失败计数的滑动窗口
    pub window: Duration,

    /// 锁定持续时间
    pub lockout_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: Duration::minutes(1),
            lockout_duration: Duration::minutes(15),
        }
    }
}

impl LockoutConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建严格的配置
    pub fn strict() -> Self {
        Self {
            max_failures: 3,
            window: Duration::minutes(5),
            lockout_duration: Duration::minutes(30),
        }
    }

    /// 创建宽松的配置（适用于开发环境）
    pub fn relaxed() -> Self {
        Self {
            max_failures: 10,
            window: Duration::minutes(1),
            lockout_duration: Duration::minutes(1),
        }
    }

    /// 设置失败次数阈值
    pub fn with_max_failures(mut self, max: u32) -> Self {
        self.max_failures = max;
        self
    }

    /// 设置滑动窗口
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// 设置锁定持续时间
    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }
}

/// 单个标识符的锁定状态
#[derive(Debug, Clone, Default)]
struct LockoutState {
    /// 窗口内的失败时间戳（升序）
    attempts: Vec<DateTime<Utc>>,
    /// 锁定结束时间
    locked_until: Option<DateTime<Utc>>,
}

/// 失败尝试锁定追踪器
///
/// 用户名和客户端地址作为相互独立的标识符分别追踪；调用方在任一
/// 标识符被锁定时拒绝请求。按标识符分片加锁，不同标识符互不阻塞。
pub struct LockoutTracker {
    config: LockoutConfig,
    states: DashMap<String, LockoutState>,
    clock: Arc<dyn Clock>,
}

impl LockoutTracker {
    /// 创建新的追踪器
    pub fn new(config: LockoutConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            states: DashMap::new(),
            clock,
        }
    }

    /// 获取配置引用
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// 记录一次失败尝试，返回窗口内的当前失败次数
    ///
    /// 达到阈值时转入锁定状态。
    pub fn record_failure(&self, id: &str) -> u32 {
        let now = self.clock.now();
        let cutoff = now - self.config.window;

        let mut state = self.states.entry(id.to_string()).or_default();

        state.attempts.retain(|&ts| ts > cutoff);
        state.attempts.push(now);

        let count = state.attempts.len() as u32;
        if count >= self.config.max_failures {
            state.locked_until = Some(now + self.config.lockout_duration);
        }
        count
    }

    /// 记录一次成功认证：无条件清空该标识符的全部状态
    pub fn record_success(&self, id: &str) {
        self.states.remove(id);
    }

    /// 检查标识符是否处于锁定状态
    ///
    /// 锁定到期后的首次检查会顺手清除存储的状态（惰性过期）。
    pub fn is_locked(&self, id: &str) -> bool {
        let now = self.clock.now();

        let lock_expired = {
            let Some(state) = self.states.get(id) else {
                return false;
            };
            match state.locked_until {
                Some(until) if until > now => return true,
                Some(_) => true,
                None => false,
            }
        };

        if lock_expired {
            self.states.remove(id);
        }
        false
    }

    /// 获取剩余锁定时间
    pub fn remaining_lockout(&self, id: &str) -> Option<Duration> {
        let now = self.clock.now();
        let state = self.states.get(id)?;
        let until = state.locked_until?;
        if until > now { Some(until - now) } else { None }
    }

    /// 清理所有无效状态，返回清理数量
    ///
    /// 惰性过期已保证正确性；本方法仅用于回收不再被访问的条目。
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let cutoff = now - self.config.window;
        let before = self.states.len();

        self.states.retain(|_, state| {
            if let Some(until) = state.locked_until {
                return until > now;
            }
            state.attempts.iter().any(|&ts| ts > cutoff)
        });

        before - self.states.len()
    }

    /// 当前追踪的标识符数量
    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }
}
