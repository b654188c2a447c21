use std::path::Path;

use pdfseal_config::AppConfig;
use pdfseal_engine::pipeline::document_from_source;
use pdfseal_engine::session::Session;
use pdfseal_io::PageSource;
use tracing::info;

use crate::errors::FrontendError;

/// 已打开的文档：编辑会话与后端句柄。
#[derive(Debug)]
pub struct LoadedDocument<H> {
    pub session: Session,
    pub handle: H,
}

/// 打开 PDF 并以配置中的预览缩放建立编辑会话。
pub fn open_for_editing<S: PageSource>(
    source: &S,
    path: &Path,
    config: &AppConfig,
) -> Result<LoadedDocument<S::Handle>, FrontendError> {
    let handle = source.open_document(path)?;
    let document = document_from_source(source, &handle, path)?;
    info!(
        path = %path.display(),
        pages = document.total_pages(),
        "文档加载成功"
    );
    Ok(LoadedDocument {
        session: Session::with_zoom(document, config.editor.preview_zoom),
        handle,
    })
}
