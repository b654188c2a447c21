use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pdfseal_core::document::Document;
use pdfseal_core::geometry::Size2;
use pdfseal_core::units;
use pdfseal_io::{ImageCodec, IoError, PageRenderer, PageSource, RgbaImage};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::cache::ImageCache;
use crate::errors::{PipelineError, RenderError};
use crate::placement::PlacementEngine;

/// 合成期间在每页开始前检查。
pub trait CancellationToken {
    fn is_cancelled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// 可跨线程触发的取消标志。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancellationToken for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct SkippedStamp {
    pub page: usize,
    pub image: PathBuf,
    pub error: RenderError,
}

#[derive(Debug, Default)]
pub struct CompositionReport {
    pub pages: usize,
    pub applied: usize,
    pub skipped: Vec<SkippedStamp>,
}

impl CompositionReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// 从页面来源读取全部页面尺寸，构造空白文档模型。
pub fn document_from_source<S: PageSource + ?Sized>(
    source: &S,
    handle: &S::Handle,
    path: &Path,
) -> Result<Document, IoError> {
    let pages = (0..source.page_count(handle))
        .map(|index| source.page_rect(handle, index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Document::new(path, pages))
}

/// 把文档中的印章依次合成到页面上。
///
/// 单个印章失败只记录为 [`SkippedStamp`]，其余印章与页面照常处理。
pub struct CompositionPipeline<'a, C: ?Sized> {
    codec: &'a C,
    cache: &'a mut ImageCache,
    overlay: bool,
    raster_scale: f64,
}

impl<'a, C> CompositionPipeline<'a, C>
where
    C: ImageCodec + ?Sized,
{
    pub fn new(codec: &'a C, cache: &'a mut ImageCache) -> Self {
        Self {
            codec,
            cache,
            overlay: true,
            raster_scale: 1.0,
        }
    }

    pub fn overlay(mut self, overlay: bool) -> Self {
        self.overlay = overlay;
        self
    }

    /// 每个 PDF 点对应的像素数，非法值忽略。
    pub fn raster_scale(mut self, scale: f64) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.raster_scale = scale;
        }
        self
    }

    /// 句柄在调用期间被独占借用。取消时返回错误且不保存任何内容。
    pub fn apply<R: PageRenderer + ?Sized>(
        &mut self,
        document: &Document,
        renderer: &R,
        handle: &mut R::Handle,
        cancel: &dyn CancellationToken,
    ) -> Result<CompositionReport, PipelineError> {
        let mut report = CompositionReport {
            pages: document.total_pages(),
            ..CompositionReport::default()
        };

        for (page_index, page) in document.pages().iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(page = page_index, "合成已取消");
                return Err(PipelineError::Cancelled { page: page_index });
            }
            for stamp in document.signatures_on_page(page_index) {
                let overlay = self.overlay;
                let rect = units::page_rect_to_pdf(stamp.rect(), page.height());
                let result = self
                    .render_stamp(&stamp.image, stamp.size, stamp.rotation_deg)
                    .and_then(|image| {
                        renderer
                            .draw_image(handle, page_index, rect, &image, overlay)
                            .map_err(|source| RenderError::Compose {
                                page: page_index,
                                source,
                            })
                    });
                match result {
                    Ok(()) => {
                        report.applied += 1;
                        debug!(
                            page = page_index,
                            image = %stamp.image.display(),
                            x = stamp.position.x(),
                            y = stamp.position.y(),
                            "印章已合成"
                        );
                    }
                    Err(err) => {
                        warn!(
                            page = page_index,
                            image = %stamp.image.display(),
                            error = %err,
                            "跳过印章"
                        );
                        report.skipped.push(SkippedStamp {
                            page: page_index,
                            image: stamp.image.clone(),
                            error: err,
                        });
                    }
                }
            }
        }
        Ok(report)
    }

    /// 合成后保存到 `output`。
    pub fn apply_and_save<R: PageRenderer + ?Sized>(
        &mut self,
        document: &Document,
        renderer: &R,
        handle: &mut R::Handle,
        output: &Path,
        cancel: &dyn CancellationToken,
    ) -> Result<CompositionReport, PipelineError> {
        let report = self.apply(document, renderer, handle, cancel)?;
        renderer
            .save(handle, output)
            .map_err(|source| PipelineError::Save {
                path: output.to_path_buf(),
                source,
            })?;
        info!(
            output = %output.display(),
            applied = report.applied,
            skipped = report.skipped.len(),
            "文档已保存"
        );
        Ok(report)
    }

    /// 旋转（扩展外接框）后重采样到绘制框的像素尺寸。
    fn render_stamp(
        &mut self,
        path: &Path,
        size: Size2,
        rotation_deg: f64,
    ) -> Result<RgbaImage, RenderError> {
        let source = self
            .cache
            .get_or_load(path, self.codec)
            .map_err(|source| RenderError::Load {
                path: path.to_path_buf(),
                source,
            })?;
        let rotated: Cow<'_, RgbaImage> = if rotation_deg.rem_euclid(360.0) == 0.0 {
            Cow::Borrowed(source.as_ref())
        } else {
            Cow::Owned(self.codec.rotate(&source, rotation_deg))
        };
        let (width, height) = pixel_size(size, self.raster_scale);
        self.codec
            .resize(&rotated, width, height)
            .map_err(|source| RenderError::Transform {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn pixel_size(size: Size2, scale: f64) -> (u32, u32) {
    let to_pixels = |points: f64| (points * scale).round().max(1.0) as u32;
    (to_pixels(size.width), to_pixels(size.height))
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<CompositionReport, PipelineError>,
}

#[derive(Debug, Default)]
pub struct FolderReport {
    pub documents: Vec<DocumentOutcome>,
    pub cancelled: bool,
}

impl FolderReport {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|doc| doc.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &DocumentOutcome> + '_ {
        self.documents.iter().filter(|doc| doc.result.is_err())
    }

    pub fn skipped_stamps(&self) -> usize {
        self.documents
            .iter()
            .filter_map(|doc| doc.result.as_ref().ok())
            .map(|report| report.skipped.len())
            .sum()
    }
}

/// 自动盖章：每页分类、摆放一枚印章，合成后另存。
pub struct BatchStamper<'a, B, C: ?Sized> {
    backend: &'a B,
    codec: &'a C,
    cache: &'a mut ImageCache,
    engine: PlacementEngine,
    raster_scale: f64,
    cancel: &'a dyn CancellationToken,
}

impl<'a, B, C> BatchStamper<'a, B, C>
where
    B: PageRenderer,
    C: ImageCodec + ?Sized,
{
    pub fn new(backend: &'a B, codec: &'a C, cache: &'a mut ImageCache) -> Self {
        Self {
            backend,
            codec,
            cache,
            engine: PlacementEngine::default(),
            raster_scale: 1.0,
            cancel: &NeverCancel,
        }
    }

    pub fn with_engine(mut self, engine: PlacementEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_raster_scale(mut self, scale: f64) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.raster_scale = scale;
        }
        self
    }

    pub fn with_cancellation(mut self, cancel: &'a dyn CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn stamp_size(&mut self, stamp: &Path) -> Result<Size2, PipelineError> {
        let image = self
            .cache
            .get_or_load(stamp, self.codec)
            .map_err(|source| PipelineError::StampImage {
                path: stamp.to_path_buf(),
                source,
            })?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::StampImage {
                path: stamp.to_path_buf(),
                source: IoError::InvalidImageSize { width, height },
            });
        }
        Ok(Size2::new(f64::from(width), f64::from(height)))
    }

    /// 对单个文档的每一页盖章并保存到 `output`。
    pub fn stamp_document<G: Rng + ?Sized>(
        &mut self,
        input: &Path,
        stamp: &Path,
        output: &Path,
        rng: &mut G,
    ) -> Result<CompositionReport, PipelineError> {
        let raw_size = self.stamp_size(stamp)?;
        let open_error = |source| PipelineError::Open {
            path: input.to_path_buf(),
            source,
        };
        let mut handle = self.backend.open_document(input).map_err(open_error)?;
        let mut document =
            document_from_source(self.backend, &handle, input).map_err(open_error)?;

        let requests = self
            .engine
            .plan_document(document.pages(), stamp, raw_size, rng)?;
        document.replace_signatures(requests)?;

        let report = CompositionPipeline::new(self.codec, &mut *self.cache)
            .raster_scale(self.raster_scale)
            .apply_and_save(&document, self.backend, &mut handle, output, self.cancel);
        self.backend.close(handle);
        report
    }

    /// 处理目录下所有 PDF（扩展名不区分大小写，按文件名排序）。
    ///
    /// 单个文档失败不会中断其余文档；只有输入目录、输出目录或印章图像不可用时整体失败。
    pub fn stamp_folder<G: Rng + ?Sized>(
        &mut self,
        input_dir: &Path,
        stamp: &Path,
        output_dir: &Path,
        rng: &mut G,
    ) -> Result<FolderReport, PipelineError> {
        let inputs = list_pdfs(input_dir)?;
        fs::create_dir_all(output_dir).map_err(|source| PipelineError::Folder {
            path: output_dir.to_path_buf(),
            source,
        })?;
        self.stamp_size(stamp)?;

        info!(
            input = %input_dir.display(),
            output = %output_dir.display(),
            documents = inputs.len(),
            "开始批量盖章"
        );

        let mut report = FolderReport::default();
        for input in inputs {
            if self.cancel.is_cancelled() {
                warn!("批量盖章已取消");
                report.cancelled = true;
                break;
            }
            let output = match input.file_name() {
                Some(name) => output_dir.join(name),
                None => continue,
            };
            let result = self.stamp_document(&input, stamp, &output, rng);
            match &result {
                Ok(document) => info!(
                    input = %input.display(),
                    pages = document.pages,
                    applied = document.applied,
                    "文档盖章完成"
                ),
                Err(err) => error!(input = %input.display(), error = %err, "文档盖章失败"),
            }
            report.documents.push(DocumentOutcome {
                input,
                output,
                result,
            });
        }
        Ok(report)
    }
}

fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let folder_error = |source| PipelineError::Folder {
        path: dir.to_path_buf(),
        source,
    };
    let mut pdfs = Vec::new();
    for entry in fs::read_dir(dir).map_err(folder_error)? {
        let path = entry.map_err(folder_error)?.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}
