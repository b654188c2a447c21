pub mod cli;
pub mod errors;
pub mod loader;
pub mod resource_locator;

use std::path::Path;

use errors::FrontendError;
use pdfseal_config::AppConfig;
use tracing::info;

pub use cli::{BatchOptions, PageSummary, SignOptions};

/// 执行文件夹批处理盖章。
pub fn run_batch(config: &AppConfig, options: &BatchOptions) -> Result<(), FrontendError> {
    info!("启动批量盖章");
    cli::run_batch(config, options).map(|_| ())
}

/// 执行一次手动签名并保存。
pub fn run_sign(config: &AppConfig, options: &SignOptions) -> Result<(), FrontendError> {
    info!(pdf = %options.pdf.display(), mode = %options.mode, "启动手动签名");
    cli::run_sign(config, options).map(|_| ())
}

/// 打印文档各页的尺寸与场景。
pub fn run_inspect(config: &AppConfig, pdf: &Path) -> Result<(), FrontendError> {
    cli::run_inspect(config, pdf).map(|_| ())
}
