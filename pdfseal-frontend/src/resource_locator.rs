use std::env;
use std::path::{Path, PathBuf};

use pdfseal_config::AppConfig;
use tracing::{debug, trace};

use crate::errors::FrontendError;

const IMAGE_ROOTS_ENV: &str = "PDFSEAL_IMAGE_ROOTS";

/// 在若干根目录中查找印章图像。
pub struct StampLocator {
    search_roots: Vec<PathBuf>,
}

impl StampLocator {
    pub fn from_config(base_dir: Option<&Path>, config: &AppConfig) -> Self {
        let mut roots: Vec<PathBuf> = Vec::new();

        if let Some(dir) = base_dir {
            roots.push(dir.to_path_buf());
        }

        roots.extend(
            config
                .resources
                .image_roots
                .iter()
                .cloned()
                .filter(|path| path.is_dir()),
        );

        if let Some(env_paths) = env::var_os(IMAGE_ROOTS_ENV) {
            roots.extend(env::split_paths(&env_paths).filter(|path| path.is_dir()));
        }

        Self::with_roots(roots)
    }

    /// 去重，保持靠前优先级。
    pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut deduped: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !deduped.contains(&root) {
                deduped.push(root);
            }
        }
        Self {
            search_roots: deduped,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn resolve(&self, raw_path: &Path) -> Option<PathBuf> {
        if raw_path.is_absolute() {
            if raw_path.is_file() {
                return Some(raw_path.to_path_buf());
            }
            debug!(path = %raw_path.display(), "印章路径为绝对路径但未找到对应文件");
            return None;
        }

        if raw_path.is_file() {
            return Some(raw_path.to_path_buf());
        }
        for root in &self.search_roots {
            let candidate = root.join(raw_path);
            trace!(candidate = %candidate.display(), "stamp locator candidate");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    pub fn require(&self, raw_path: &Path) -> Result<PathBuf, FrontendError> {
        self.resolve(raw_path)
            .ok_or_else(|| FrontendError::StampNotFound(raw_path.to_path_buf()))
    }
}
