//! 单文件下载：按大小跳过、分块写入、完整性校验、失败重试。
//!
//! 每次尝试都写到同目录下的 `<文件名>.part`，校验通过后才改名为最终文件，
//! 因此最终路径上出现的文件总是完整的。

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

use super::models::ResolvedTrack;
use super::progress::ProgressHub;
use crate::base_system::retry::RetryPolicy;
use crate::network_parser::network::{FetchError, SiteNetwork};

pub const CHUNK_SIZE: usize = 8 * 1024;
/// 已有文件与期望大小相差小于该值（MB）时视为已下载。
pub const SIZE_TOLERANCE_MB: f64 = 0.1;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("传输中断: {0}")]
    Stream(#[source] io::Error),
    #[error("写入临时文件失败: {0}")]
    Write(#[source] io::Error),
    #[error("写入 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("下载不完整: 已写入 {written} 字节, 期望 {expected} 字节")]
    Incomplete { written: u64, expected: u64 },
}

impl DownloadError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub struct DownloadEngine<'a> {
    network: &'a SiteNetwork,
    policy: RetryPolicy,
    progress: &'a ProgressHub,
}

impl<'a> DownloadEngine<'a> {
    pub fn new(network: &'a SiteNetwork, policy: RetryPolicy, progress: &'a ProgressHub) -> Self {
        Self {
            network,
            policy,
            progress,
        }
    }

    /// 把 `track` 下载到 `dest`。已存在且大小吻合时直接返回 `true`；
    /// 重试耗尽返回 `false`，不会 panic。
    pub fn download_to(&self, track: &ResolvedTrack, dest: &Path) -> bool {
        let name = display_name(dest);
        if should_skip(dest, track.expected_size) {
            info!("文件已存在且大小一致，跳过: {}", name);
            return true;
        }

        let staging = staging_path(dest);
        let outcome = self.policy.run(&format!("下载 {name}"), |attempt| {
            debug!("下载 {} 第 {} 次尝试", name, attempt);
            self.attempt(track, &staging, dest, &name)
        });

        match outcome {
            Ok(bytes) => {
                info!("下载完成: {} ({} 字节)", name, bytes);
                true
            }
            Err(err) => {
                if let Err(rm) = fs::remove_file(&staging)
                    && rm.kind() != io::ErrorKind::NotFound
                {
                    debug!("清理临时文件失败 {}: {}", staging.display(), rm);
                }
                error!("下载 {} 失败: {}", name, err);
                false
            }
        }
    }

    fn attempt(
        &self,
        track: &ResolvedTrack,
        staging: &Path,
        dest: &Path,
        name: &str,
    ) -> Result<u64, DownloadError> {
        let mut resp = self.network.fetch_once(&track.download_url)?;
        let advertised = resp.content_length().unwrap_or(0);

        let bar = self.progress.transfer_bar(name, advertised);
        let file = File::create(staging).map_err(DownloadError::io(staging))?;
        let mut writer = BufWriter::new(file);
        let copied = copy_chunks(&mut resp, &mut writer, |n| bar.inc(n as u64));
        bar.finish_and_clear();

        let written = copied?;
        writer.flush().map_err(DownloadError::io(staging))?;
        drop(writer);

        check_complete(written, advertised)?;
        replace_file(staging, dest)?;
        Ok(written)
    }
}

/// 只有在已知期望大小时才做跳过判断。
pub fn should_skip(dest: &Path, expected_size: Option<u64>) -> bool {
    let Some(expected) = expected_size else {
        return false;
    };
    let Ok(meta) = fs::metadata(dest) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    let existing_mb = meta.len() as f64 / BYTES_PER_MB;
    let expected_mb = expected as f64 / BYTES_PER_MB;
    (existing_mb - expected_mb).abs() < SIZE_TOLERANCE_MB
}

/// 以 [`CHUNK_SIZE`] 为单位复制，每写完一块回调一次。读取失败与写入失败分开报告。
pub fn copy_chunks<R, W, F>(reader: &mut R, writer: &mut W, mut on_chunk: F) -> Result<u64, DownloadError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(usize),
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(DownloadError::Stream(err)),
        };
        writer.write_all(&buf[..n]).map_err(DownloadError::Write)?;
        total += n as u64;
        on_chunk(n);
    }
}

/// 服务器给出了长度（> 0）时，写入字节数必须与之相等。
pub fn check_complete(written: u64, advertised: u64) -> Result<(), DownloadError> {
    if advertised > 0 && written != advertised {
        return Err(DownloadError::Incomplete {
            written,
            expected: advertised,
        });
    }
    Ok(())
}

pub fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn replace_file(staging: &Path, dest: &Path) -> Result<(), DownloadError> {
    match fs::remove_file(dest) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(DownloadError::io(dest)(err)),
    }
    fs::rename(staging, dest).map_err(DownloadError::io(dest))
}

fn display_name(dest: &Path) -> String {
    dest.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dest.display().to_string())
}
