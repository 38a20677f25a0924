//! 固定间隔重试策略。
//!
//! 所有需要重试的地方（页面请求、整文件下载）都走 [`RetryPolicy::run_if`]，
//! 调用方不再自行嵌套重试循环。

use std::fmt::Display;
use std::time::Duration;

use tracing::{error, info, warn};

use super::context::Config;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.retry_attempts, cfg.retry_delay_duration())
    }

    /// 只尝试一次。
    #[cfg(test)]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// 任何错误都重试。
    pub fn run<T, E, F>(&self, label: &str, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_if(label, op, |_| true)
    }

    /// 仅当 `retryable` 判定为可重试时才重试，否则立即返回该错误。
    ///
    /// `op` 收到从 1 开始的尝试序号。耗尽次数后返回最后一次的错误。
    pub fn run_if<T, E, F, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !retryable(&err) {
                return Err(err);
            }

            warn!(
                "{} 失败 (尝试 {}/{}): {}",
                label, attempt, self.attempts, err
            );
            if attempt >= self.attempts {
                error!("{} 在 {} 次尝试后仍失败", label, self.attempts);
                return Err(err);
            }

            if !self.delay.is_zero() {
                info!("{:.1} 秒后重试...", self.delay.as_secs_f64());
                std::thread::sleep(self.delay);
            }
            attempt += 1;
        }
    }
}
