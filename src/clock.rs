//! 可注入时钟模块
//!
//! 锁定窗口、令牌过期和 state 有效期都依赖当前时间。通过 [`Clock`] trait
//! 注入时间源，测试中可以用 [`ManualClock`] 精确推进时间，而不必真实等待。

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// 时间源抽象
pub trait Clock: Send + Sync {
    /// 获取当前时间
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟（生产环境默认实现）
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 可手动推进的时钟（用于测试）
///
/// ## 示例
///
/// ```rust
/// use authgate::clock::{Clock, ManualClock};
/// use chrono::Duration;
///
/// let clock = ManualClock::start_now();
/// let before = clock.now();
///
/// clock.advance(Duration::minutes(15));
/// assert_eq!(clock.now() - before, Duration::minutes(15));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// 以指定时间创建时钟
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// 以当前系统时间创建时钟
    pub fn start_now() -> Self {
        Self::new(Utc::now())
    }

    /// 推进时钟
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut now) = self.now.write() {
            *now = *now + duration;
        }
    }

    /// 设置时钟到指定时间
    pub fn set(&self, time: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = time;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|t| *t).unwrap_or_else(|_| Utc::now())
    }
}

/// 获取默认时钟的共享实例
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_progresses() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::start_now();
        let start = clock.now();

        clock.advance(Duration::seconds(61));
        assert_eq!(clock.now() - start, Duration::seconds(61));

        // 不推进时时间不变
        assert_eq!(clock.now() - start, Duration::seconds(61));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::start_now();
        let target = clock.now() + Duration::days(1);

        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
