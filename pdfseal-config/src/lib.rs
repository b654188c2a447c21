use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod profiles;

pub use profiles::{ProfilePosition, SignatureProfile, SignatureProfiles};

pub const CONFIG_ENV: &str = "PDFSEAL_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `PDFSEAL_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl PreviewQuality {
    pub fn dpi(self) -> f64 {
        match self {
            PreviewQuality::Low => 72.0,
            PreviewQuality::Medium => 150.0,
            PreviewQuality::High => 300.0,
        }
    }

    /// 每个 PDF 点对应的像素数。
    pub fn pixels_per_point(self) -> f64 {
        self.dpi() / 72.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeSetting {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub preview_quality: PreviewQuality,
    #[serde(default = "EditorConfig::default_zoom")]
    pub preview_zoom: f64,
    #[serde(default = "EditorConfig::default_signature_size")]
    pub default_signature_size: SizeSetting,
}

impl EditorConfig {
    fn default_zoom() -> f64 {
        2.0
    }

    fn default_signature_size() -> SizeSetting {
        SizeSetting {
            width: 100.0,
            height: 50.0,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            preview_quality: PreviewQuality::default(),
            preview_zoom: Self::default_zoom(),
            default_signature_size: Self::default_signature_size(),
        }
    }
}

/// 文件夹批处理的默认路径。
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "BatchConfig::default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "BatchConfig::default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "BatchConfig::default_stamp_image")]
    pub stamp_image: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl BatchConfig {
    fn default_input_dir() -> PathBuf {
        PathBuf::from("docs")
    }

    fn default_output_dir() -> PathBuf {
        PathBuf::from("sellados")
    }

    fn default_stamp_image() -> PathBuf {
        PathBuf::from("sello.png")
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: Self::default_input_dir(),
            output_dir: Self::default_output_dir(),
            stamp_image: Self::default_stamp_image(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_capacity")]
    pub capacity: usize,
}

impl CacheConfig {
    fn default_capacity() -> usize {
        16
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub image_roots: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("序列化签名配置失败: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("写入文件 {path:?} 失败: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("签名配置 `{id}` 无效: {reason}")]
    InvalidProfile { id: String, reason: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
