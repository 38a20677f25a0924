//! 专辑下载编排：校验地址 → 抓取目录 → 并发解析并下载每首曲目 → 汇总。
//!
//! 目录抓取和专辑之间是串行的；只有曲目级别走 worker 池。
//! 单曲失败不会中断同专辑的其它曲目，专辑失败也不会中断批量任务。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};

use super::engine::DownloadEngine;
use super::models::{AlbumReport, DownloadResult, TrackStub};
use super::worker_pool::run_pool;
use crate::album_parser::catalog::{CatalogError, fetch_album};
use crate::album_parser::tagging::{TrackTags, write_tags};
use crate::album_parser::track_resolver::TrackResolver;
use crate::album_parser::url_utils::is_album_url;
use crate::base_system::context::{Config, DownloadContext, sanitize_filename};

#[derive(Debug, Error)]
pub enum AlbumError {
    #[error("无效的专辑地址: {0:?}")]
    InvalidUrl(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("专辑 {0} 中没有可下载的曲目")]
    NoTracks(String),
    #[error("无法创建目录 {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 提交给 worker 的任务；`index` 在提交时确定（从 1 开始），不依赖完成顺序。
struct TrackJob<'a> {
    index: usize,
    stub: &'a TrackStub,
}

/// 下载整张专辑并返回逐曲结果。地址校验失败时不会发出任何请求。
pub fn run_album(album_url: &str, ctx: &DownloadContext) -> Result<AlbumReport, AlbumError> {
    let album_url = album_url.trim();
    if !is_album_url(album_url, ctx.network.base_url()) {
        return Err(AlbumError::InvalidUrl(album_url.to_string()));
    }

    let policy = ctx.retry_policy();
    let album = fetch_album(&ctx.network, album_url, &policy)?;
    if album.tracks.is_empty() {
        return Err(AlbumError::NoTracks(album.title));
    }

    let album_dir = ctx.config.output_root().join(&album.title);
    fs::create_dir_all(&album_dir).map_err(|source| AlbumError::OutputDir {
        path: album_dir.clone(),
        source,
    })?;
    info!("{} -> {}", album.source_url, album_dir.display());

    let total = album.tracks.len();
    let resolver = TrackResolver::new(&ctx.network, policy);
    let engine = DownloadEngine::new(&ctx.network, policy, &ctx.progress);
    let bar = ctx.progress.album_bar(&album.title, total);

    let jobs: Vec<TrackJob<'_>> = album
        .tracks
        .iter()
        .enumerate()
        .map(|(i, stub)| TrackJob { index: i + 1, stub })
        .collect();

    let results = run_pool(ctx.config.max_threads, jobs, |job| {
        let result = download_track(&job, &album.title, &album_dir, &ctx.config, &resolver, &engine);
        bar.inc(1);
        result
    });
    bar.finish_and_clear();

    let report = AlbumReport::from_results(album.title, total, results);
    info!(
        "{}: {}/{} tracks succeeded",
        report.title, report.succeeded, report.total
    );
    let failed = report.failed_tracks();
    if !failed.is_empty() {
        warn!("{} 中失败的曲目序号: {:?}", report.title, failed);
    }
    Ok(report)
}

/// 只有全部曲目成功才返回 `true`；已下载的文件在失败时保留。
pub fn download_album(album_url: &str, ctx: &DownloadContext) -> bool {
    match run_album(album_url, ctx) {
        Ok(report) => report.is_complete(),
        Err(err) => {
            error!("专辑 {} 下载失败: {}", album_url.trim(), err);
            false
        }
    }
}

/// 逐个处理专辑地址，返回成功的专辑数量。
pub fn download_albums<S: AsRef<str>>(urls: &[S], ctx: &DownloadContext) -> usize {
    let total = urls.len();
    let mut succeeded = 0;
    for (i, url) in urls.iter().enumerate() {
        let url = url.as_ref();
        info!("处理专辑 {}/{}: {}", i + 1, total, url);
        ctx.pending.begin(url);
        if download_album(url, ctx) {
            succeeded += 1;
        }
        ctx.pending.finish(url);
    }
    info!("{}/{} albums succeeded", succeeded, total);
    succeeded
}

fn download_track(
    job: &TrackJob<'_>,
    album_title: &str,
    album_dir: &Path,
    config: &Config,
    resolver: &TrackResolver<'_>,
    engine: &DownloadEngine<'_>,
) -> DownloadResult {
    let failed = DownloadResult {
        track_index: job.index,
        success: false,
    };

    let Some(resolved) = resolver.resolve(&job.stub.detail_url, &config.format_preference) else {
        error!("第 {} 首 {} 没有可用的下载地址", job.index, job.stub.name);
        return failed;
    };

    let display = track_display_name(
        &job.stub.name,
        &resolved.title,
        job.index,
        config.include_track_number,
    );
    let dest = album_dir.join(format!(
        "{}.{}",
        sanitize_filename(&display),
        resolved.format.extension()
    ));

    if !engine.download_to(&resolved, &dest) {
        return failed;
    }

    let tags = TrackTags {
        title: display,
        album: album_title.to_string(),
        track_number: u32::try_from(job.index).ok(),
    };
    if let Err(err) = write_tags(&dest, &tags) {
        warn!("写入标签失败（文件已保留）: {}", err);
    }

    DownloadResult {
        track_index: job.index,
        success: true,
    }
}

/// `NN - 名称`（序号两位补零），或只有名称。目录里的名称为空时用解析出的标题。
pub fn track_display_name(name: &str, fallback: &str, index: usize, numbered: bool) -> String {
    let name = [name.trim(), fallback.trim()]
        .into_iter()
        .find(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Track {index}"));
    if numbered {
        format!("{index:02} - {name}")
    } else {
        name
    }
}
