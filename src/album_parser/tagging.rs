//! 下载完成后写入基础元数据（标题、专辑、曲目号）。

use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::error::LoftyError;
use lofty::file::TaggedFileExt;
use lofty::tag::{Accessor, Tag, TagExt};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("无法读取音频文件 {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: LoftyError,
    },
    #[error("写入标签失败 {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: LoftyError,
    },
    #[error("{0} 不支持写入标签")]
    Unsupported(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub album: String,
    pub track_number: Option<u32>,
}

/// 写入 `tags`，文件没有标签块时按其主标签类型新建一个。
pub fn write_tags(path: &Path, tags: &TrackTags) -> Result<(), TagError> {
    let mut file = lofty::read_from_path(path).map_err(|source| TagError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if file.primary_tag().is_none() {
        let tag_type = file.primary_tag_type();
        file.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = file.primary_tag_mut() else {
        return Err(TagError::Unsupported(path.to_path_buf()));
    };

    tag.set_title(tags.title.clone());
    tag.set_album(tags.album.clone());
    if let Some(number) = tags.track_number {
        tag.set_track(number);
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|source| TagError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("已写入标签: {}", path.display());
    Ok(())
}
