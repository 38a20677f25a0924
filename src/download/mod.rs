//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      : 数据模型（Album / ResolvedTrack / AlbumReport 等）
//! - `progress`    : CLI 进度条
//! - `worker_pool` : 曲目并发下载工作池
//! - `engine`      : 单文件下载与完整性校验
//! - `downloader`  : 专辑下载主流程编排

pub mod downloader;
pub mod engine;
pub mod models;
pub mod progress;
pub(crate) mod worker_pool;
