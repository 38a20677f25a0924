//! 配置文件读写：用户 JSON 覆盖默认值，缺失的键回落到默认值。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid json at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;

    /// 加载后修正越界的值（例如线程数为 0）。
    fn normalized(self) -> Self {
        self
    }
}

pub fn resolve_path<T: ConfigSpec>(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(T::FILE_NAME))
}

/// 读取配置；文件不存在时返回默认值。
pub fn load<T: ConfigSpec>(config_path: Option<&Path>) -> Result<T, ConfigError> {
    let path = resolve_path::<T>(config_path);
    if !path.exists() {
        debug!("配置文件 {} 不存在，使用默认配置", path.display());
        return Ok(T::default());
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    parse_merged(&raw, &path)
}

/// 与 [`load`] 相同，但任何错误都只记录警告并回落到默认配置。
pub fn load_or_default<T: ConfigSpec>(config_path: Option<&Path>) -> T {
    match load::<T>(config_path) {
        Ok(config) => config,
        Err(err) => {
            warn!("加载配置失败，使用默认配置: {err}");
            T::default()
        }
    }
}

pub fn save<T: ConfigSpec>(config: &T, config_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = resolve_path::<T>(config_path);
    ensure_parent(&path)?;
    let json = serde_json::to_string_pretty(config)
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    fs::write(&path, json).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    info!("配置已保存到 {}", path.display());
    Ok(path)
}

fn parse_merged<T: ConfigSpec>(raw: &str, path: &Path) -> Result<T, ConfigError> {
    let user_json: Value = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if !user_json.is_object() {
        return Err(ConfigError::Validation(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    }

    let mut merged =
        serde_json::to_value(T::default()).map_err(|err| ConfigError::Validation(err.to_string()))?;
    merge_values(&mut merged, user_json);

    let config: T =
        serde_json::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))?;
    Ok(config.normalized())
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Object(dest), Value::Object(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    debug!("忽略未知配置项: {key}");
                }
            }
        }
        (dest, other) => {
            *dest = other;
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
