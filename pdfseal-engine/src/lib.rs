pub mod cache;
pub mod command;
pub mod mode;
pub mod pipeline;
pub mod placement;
pub mod session;

pub mod errors {
    use std::path::PathBuf;

    use pdfseal_core::document::DocumentError;
    use pdfseal_core::mode::SignatureModeKind;
    use pdfseal_io::IoError;
    use thiserror::Error;

    /// 在任何修改发生之前返回给调用方，不会重试。
    #[derive(Debug, Error)]
    pub enum ValidationError {
        #[error(transparent)]
        Document(#[from] DocumentError),
        #[error("signature mode `{mode}` is not applicable to a document with {total_pages} pages")]
        ModeNotApplicable {
            mode: SignatureModeKind,
            total_pages: usize,
        },
        #[error(
            "page {page} is not a mass-mode input ({total_pages} pages): \
             sign the first or the last page"
        )]
        UndefinedMassPage { page: usize, total_pages: usize },
        #[error("position ({x}, {y}) lies outside page {page}")]
        OutsidePage { page: usize, x: f64, y: f64 },
    }

    /// 单个印章失败。合成流程记录后跳过，从不向上传播。
    #[derive(Debug, Error)]
    pub enum RenderError {
        #[error("failed to load stamp image {path:?}: {source}")]
        Load {
            path: PathBuf,
            #[source]
            source: IoError,
        },
        #[error("failed to prepare stamp image {path:?}: {source}")]
        Transform {
            path: PathBuf,
            #[source]
            source: IoError,
        },
        #[error("failed to compose stamp on page {page}: {source}")]
        Compose {
            page: usize,
            #[source]
            source: IoError,
        },
    }

    /// 对当前文档致命；文件夹批处理中其余文档继续处理。
    #[derive(Debug, Error)]
    pub enum PipelineError {
        #[error("failed to open document {path:?}: {source}")]
        Open {
            path: PathBuf,
            #[source]
            source: IoError,
        },
        #[error("failed to save document {path:?}: {source}")]
        Save {
            path: PathBuf,
            #[source]
            source: IoError,
        },
        #[error("stamp image {path:?} is unusable: {source}")]
        StampImage {
            path: PathBuf,
            #[source]
            source: IoError,
        },
        #[error("failed to read input folder {path:?}: {source}")]
        Folder {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("failed to plan stamps: {0}")]
        Planning(#[from] DocumentError),
        #[error("composition cancelled before page {page}")]
        Cancelled { page: usize },
    }
}
