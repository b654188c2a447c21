pub mod codec;
pub mod pdf;

use std::path::{Path, PathBuf};

use pdfseal_core::document::PageGeometry;
use pdfseal_core::geometry::Rect;
use thiserror::Error;

pub use codec::RasterCodec;
pub use image::RgbaImage;
pub use pdf::{LopdfBackend, PdfHandle};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pdf error in {path:?}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("page index {page} is out of range ({total_pages} pages)")]
    PageOutOfRange { page: usize, total_pages: usize },
    #[error("failed to decode image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
}

/// 页面来源：打开文档并报告页数与页面尺寸。
pub trait PageSource {
    type Handle;

    fn open_document(&self, path: &Path) -> Result<Self::Handle, IoError>;
    fn page_count(&self, handle: &Self::Handle) -> usize;
    fn page_rect(&self, handle: &Self::Handle, index: usize) -> Result<PageGeometry, IoError>;

    fn close(&self, handle: Self::Handle) {
        drop(handle);
    }
}

/// 页面合成器。`rect` 位于 PDF 空间（原点左下角）。
///
/// 句柄在一次合成期间被独占借用，不支持并发修改。
pub trait PageRenderer: PageSource {
    fn draw_image(
        &self,
        handle: &mut Self::Handle,
        page_index: usize,
        rect: Rect,
        image: &RgbaImage,
        overlay: bool,
    ) -> Result<(), IoError>;

    fn save(&self, handle: &mut Self::Handle, output: &Path) -> Result<(), IoError>;
}

/// 图像解码与变换。
pub trait ImageCodec {
    fn load(&self, path: &Path) -> Result<RgbaImage, IoError>;
    /// 高质量重采样到指定像素尺寸。
    fn resize(&self, image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, IoError>;
    /// 逆时针旋转，画布扩展为旋转后的外接框，空白处透明。
    fn rotate(&self, image: &RgbaImage, angle_deg: f64) -> RgbaImage;
}
