//! 全局配置结构（Config）、默认值与运行上下文。
//!
//! 运行上下文（[`DownloadContext`]）在 `main` 中创建一次，按引用传给各个组件；
//! 组件之间不共享任何可变状态。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::ConfigSpec;
use super::logging::PendingAlbums;
use super::retry::RetryPolicy;
use crate::download::models::AudioFormat;
use crate::download::progress::ProgressHub;
use crate::network_parser::network::SiteNetwork;

pub const DEFAULT_BASE_URL: &str = "https://downloads.khinsider.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 保存配置
    #[serde(default)]
    pub output_directory: String,
    #[serde(default = "default_true")]
    pub include_track_number: bool,
    #[serde(default = "default_format_preference")]
    pub format_preference: Vec<AudioFormat>,

    // 网络配置
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// 重试间隔（秒）
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    /// 单次等待服务器数据的超时（秒）：连接建立后每次读取都重新计时，不限制整个文件的传输时长
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: String::new(),
            include_track_number: default_true(),
            format_preference: default_format_preference(),
            max_threads: default_max_threads(),
            retry_attempts: default_retry_attempts(),
            retry_delay: default_retry_delay(),
            request_timeout: default_request_timeout(),
            base_url: default_base_url(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "khinsider_config.json";

    fn normalized(mut self) -> Self {
        self.max_threads = self.max_threads.max(1);
        self.retry_attempts = self.retry_attempts.max(1);
        if !self.retry_delay.is_finite() || self.retry_delay < 0.0 {
            self.retry_delay = default_retry_delay();
        }
        if self.format_preference.is_empty() {
            self.format_preference = default_format_preference();
        }
        // 去重但保持优先级顺序
        let mut seen = Vec::with_capacity(self.format_preference.len());
        self.format_preference.retain(|f| {
            if seen.contains(f) {
                false
            } else {
                seen.push(*f);
                true
            }
        });
        let trimmed = self.base_url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            default_base_url()
        } else {
            trimmed.to_string()
        };
        self
    }
}

impl Config {
    /// 专辑目录的父目录；未配置时使用当前工作目录。
    pub fn output_root(&self) -> PathBuf {
        if self.output_directory.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.output_directory)
        }
    }

    pub fn retry_delay_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_delay).unwrap_or_default()
    }
}

/// 一次进程调用内的上下文：配置、HTTP 客户端、进度条，以及供中断日志使用的未完成专辑列表。
pub struct DownloadContext {
    pub config: Config,
    pub network: SiteNetwork,
    pub progress: ProgressHub,
    pub pending: PendingAlbums,
}

impl DownloadContext {
    pub fn new(config: Config, progress: ProgressHub) -> Result<Self, reqwest::Error> {
        let config = config.normalized();
        let network = SiteNetwork::new(&config)?;
        Ok(Self {
            config,
            network,
            progress,
            pending: PendingAlbums::default(),
        })
    }

    pub fn with_pending(mut self, pending: PendingAlbums) -> Self {
        self.pending = pending;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config)
    }
}

/// 替换 Windows 文件名中的非法字符 `\ / : * ? " < > |` 为 `_`。
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => ch,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_format_preference() -> Vec<AudioFormat> {
    vec![AudioFormat::Flac, AudioFormat::Mp3]
}

fn default_max_threads() -> usize {
    3
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    5.0
}

fn default_request_timeout() -> u64 {
    30
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
