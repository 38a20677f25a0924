//! 下载相关的数据模型定义。
//!
//! 包含专辑、曲目条目、解析后的下载目标、单曲结果与专辑汇总。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Flac,
    Mp3,
    M4a,
    Ogg,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [Self::Flac, Self::Mp3, Self::M4a, Self::Ogg];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown audio format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for AudioFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownFormat(token.to_string()))
    }
}

/// 专辑页中的一行曲目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackStub {
    pub name: String,
    pub detail_url: String,
}

/// 一次目录抓取的结果；`title` 已做文件名清洗。
#[derive(Debug, Clone)]
pub struct Album {
    pub title: String,
    pub source_url: String,
    pub tracks: Vec<TrackStub>,
}

/// 解析出的具体下载目标。
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub download_url: String,
    pub format: AudioFormat,
    pub title: String,
    /// 期望大小（字节）；页面未给出时为 `None`。
    pub expected_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadResult {
    /// 从 1 开始，按目录顺序。
    pub track_index: usize,
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct AlbumReport {
    pub title: String,
    pub total: usize,
    pub succeeded: usize,
    pub results: Vec<DownloadResult>,
}

impl AlbumReport {
    pub fn from_results(title: String, total: usize, mut results: Vec<DownloadResult>) -> Self {
        results.sort_by_key(|r| r.track_index);
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            title,
            total,
            succeeded,
            results,
        }
    }

    /// 失败曲目的序号（从 1 开始，升序）。
    pub fn failed_tracks(&self) -> Vec<usize> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.track_index)
            .collect()
    }

    /// 专辑只有在全部曲目成功时才算成功。
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.succeeded == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_case_insensitive() {
        assert_eq!("FLAC".parse::<AudioFormat>(), Ok(AudioFormat::Flac));
        assert_eq!(" mp3 ".parse::<AudioFormat>(), Ok(AudioFormat::Mp3));
        assert_eq!(
            "wma".parse::<AudioFormat>(),
            Err(UnknownFormat("wma".to_string()))
        );
    }

    #[test]
    fn format_serializes_lowercase() {
        let json = serde_json::to_string(&vec![AudioFormat::Flac, AudioFormat::M4a]).unwrap();
        assert_eq!(json, r#"["flac","m4a"]"#);
    }

    #[test]
    fn partial_album_is_not_complete() {
        let results = (1..=8)
            .map(|i| DownloadResult {
                track_index: i,
                success: i != 5,
            })
            .collect();
        let report = AlbumReport::from_results("OST".to_string(), 8, results);
        assert_eq!(report.succeeded, 7);
        assert_eq!(report.failed_tracks(), vec![5]);
        assert!(!report.is_complete());
    }

    #[test]
    fn report_orders_results_by_track_index() {
        let results = vec![
            DownloadResult {
                track_index: 3,
                success: true,
            },
            DownloadResult {
                track_index: 1,
                success: true,
            },
            DownloadResult {
                track_index: 2,
                success: true,
            },
        ];
        let report = AlbumReport::from_results("OST".to_string(), 3, results);
        let order: Vec<usize> = report.results.iter().map(|r| r.track_index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(report.is_complete());
    }
}
