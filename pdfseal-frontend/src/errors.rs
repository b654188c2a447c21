use std::path::PathBuf;

use pdfseal_config::ConfigError;
use pdfseal_engine::errors::{PipelineError, ValidationError};
use pdfseal_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("找不到印章图像 {0:?}")]
    StampNotFound(PathBuf),
    #[error("参数无效: {0}")]
    InvalidArgument(String),
    #[error("{failed} 个文档处理失败")]
    Incomplete { failed: usize },
}
