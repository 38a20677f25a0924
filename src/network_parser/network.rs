//! 站点 HTTP 访问：带固定间隔重试的 GET、单次 GET 与存在性探测。

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::debug;

use crate::base_system::context::Config;
use crate::base_system::retry::RetryPolicy;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("请求 {url} 失败: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} 返回 HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("读取 {url} 的响应失败: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// 连接层面的失败（拒绝连接、超时、DNS、正文中断）才值得重试；HTTP 状态码不重试。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Body { .. })
    }
}

pub struct SiteNetwork {
    client: Client,
    base_url: String,
}

impl SiteNetwork {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        // reqwest 在本项目中未启用 gzip 解码，统一请求 identity 编码。
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,audio/*;q=0.9,*/*;q=0.8"),
        );
        default_headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let client = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(CONNECT_TIMEOUT)
            // 对阻塞客户端而言该超时作用于每次读取，慢速但持续的传输不会被截断
            .timeout(Duration::from_secs(config.request_timeout.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 站点根地址，不带结尾的 `/`。
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 单次 GET，不重试。非 2xx 状态视为错误。
    pub fn fetch_once(&self, url: &str) -> Result<Response, FetchError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(resp)
    }

    /// 带重试地获取页面文本：只对连接层错误（含读取正文时的中断）重试，间隔固定。
    pub fn fetch_text(&self, url: &str, policy: &RetryPolicy) -> Result<String, FetchError> {
        policy.run_if(
            &format!("请求 {url}"),
            |_| {
                self.fetch_once(url)?
                    .text()
                    .map_err(|source| FetchError::Body {
                        url: url.to_string(),
                        source,
                    })
            },
            FetchError::is_transient,
        )
    }

    /// 轻量存在性探测（HEAD）。任何失败都只返回 `false`。
    pub fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send() {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!("探测 {} 返回 HTTP {}", url, resp.status());
                false
            }
            Err(err) => {
                debug!("探测 {} 失败: {}", url, err);
                false
            }
        }
    }
}
