use std::sync::{Arc, PoisonError, RwLock};

use pdfseal_core::document::{Document, DocumentError, StampRequest};
use pdfseal_core::geometry::{Point2, Size2};
use pdfseal_core::mode::{SignatureModeConfig, SignatureModeKind};
use pdfseal_core::units;
use tracing::{debug, info, warn};

use crate::errors::ValidationError;
use crate::mode::{self, AddOutcome};

const DEFAULT_ZOOM: f64 = 2.0;
const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 16.0;

/// 切换模式时产生的事件。上层收到后应重新加载预览。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChanged {
    pub previous: SignatureModeKind,
    pub current: SignatureModeConfig,
    pub discarded: usize,
}

/// 编辑器状态：当前文档、模式与预览缩放。
#[derive(Debug, Clone)]
pub struct Session {
    document: Document,
    zoom: f64,
}

impl Session {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            zoom: DEFAULT_ZOOM,
        }
    }

    pub fn with_zoom(document: Document, zoom: f64) -> Self {
        let mut session = Self::new(document);
        session.set_zoom(zoom);
        session
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[inline]
    pub fn mode(&self) -> &SignatureModeConfig {
        self.document.mode_config()
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// 设置预览缩放（自动限制在合法范围内，非法值忽略）。
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// 替换当前文档，沿用会话当前的模式配置。
    pub fn load_document(&mut self, mut document: Document) {
        let mode = self.document.mode_config().clone();
        document.replace_mode_config(mode);
        info!(
            path = %document.path().display(),
            pages = document.total_pages(),
            "会话已加载文档"
        );
        self.document = document;
    }

    /// 切换签名模式。所有已放置的签名都会被丢弃。
    pub fn set_mode(&mut self, config: SignatureModeConfig) -> ModeChanged {
        let previous = self.document.mode_config().kind();
        if !mode::validate_for_document(&config, self.document.total_pages()) {
            warn!(
                mode = %config.kind(),
                pages = self.document.total_pages(),
                "模式不适用于当前文档"
            );
        }
        let discarded = self.document.replace_mode_config(config.clone()).len();
        info!(
            previous = %previous,
            current = %config.kind(),
            discarded,
            "签名模式已切换"
        );
        ModeChanged {
            previous,
            current: config,
            discarded,
        }
    }

    pub fn add_signature(
        &mut self,
        signature: StampRequest,
    ) -> Result<AddOutcome, ValidationError> {
        mode::add_signature(&mut self.document, signature)
    }

    /// 按当前模式展开一次签名并全部放入文档，返回实际新增的摆放数。
    ///
    /// 任一摆放非法时文档保持不变。
    pub fn place_signature(&mut self, signature: StampRequest) -> Result<usize, ValidationError> {
        let placements = mode::plan_placements(
            self.document.mode_config(),
            self.document.total_pages(),
            &signature,
        )?;
        if matches!(self.document.mode_config(), SignatureModeConfig::Mass) {
            return match self.add_signature(signature)? {
                AddOutcome::Replicated { copies } => Ok(copies),
                AddOutcome::Appended | AddOutcome::LastPage => Ok(1),
            };
        }
        for placement in &placements {
            self.document.validate_signature(placement)?;
        }
        let count = placements.len();
        for placement in placements {
            self.document.add_signature(placement)?;
        }
        debug!(count, mode = %self.document.mode_config().kind(), "签名已按模式展开");
        Ok(count)
    }

    /// 在预览坐标处放置签名。
    pub fn add_signature_at_ui(
        &mut self,
        image: impl Into<std::path::PathBuf>,
        page_index: usize,
        ui: Point2,
        size: Size2,
    ) -> Result<AddOutcome, ValidationError> {
        let position = units::ui_to_page(ui, self.zoom);
        self.add_signature(StampRequest::new(image, page_index, position, size))
    }

    #[inline]
    pub fn remove_last_signature(&mut self) -> Option<StampRequest> {
        self.document.remove_last_signature()
    }

    #[inline]
    pub fn clear_signatures(&mut self) -> usize {
        self.document.clear_signatures().len()
    }

    /// 拖拽：预览坐标换算为页面坐标后移动签名。位置必须落在页面内。
    pub fn move_signature(&mut self, index: usize, ui: Point2) -> Result<Point2, ValidationError> {
        let position = units::ui_to_page(ui, self.zoom);
        let page = self.page_of(index)?;
        let geometry = self
            .document
            .page(page)
            .copied()
            .ok_or(DocumentError::InvalidPageIndex {
                page,
                total_pages: self.document.total_pages(),
            })?;
        if !geometry.contains(position) {
            return Err(ValidationError::OutsidePage {
                page,
                x: position.x(),
                y: position.y(),
            });
        }
        self.document.move_signature(index, position)?;
        debug!(index, x = position.x(), y = position.y(), "签名已移动");
        Ok(position)
    }

    /// 按页宽百分比调整签名宽度，高度保持原始宽高比。
    pub fn resize_signature_to_page_pct(
        &mut self,
        index: usize,
        pct: f64,
    ) -> Result<Size2, ValidationError> {
        let page = self.page_of(index)?;
        let page_width = self
            .document
            .page(page)
            .map(|geometry| geometry.width())
            .ok_or(DocumentError::InvalidPageIndex {
                page,
                total_pages: self.document.total_pages(),
            })?;
        let current = self.document.signatures()[index].size;
        let width = page_width * pct / 100.0;
        let size = Size2::new(width, width * current.aspect_ratio());
        self.document.resize_signature(index, size)?;
        debug!(index, pct, width = size.width, height = size.height, "签名已缩放");
        Ok(size)
    }

    /// 当前模式下需要签名的页面。
    pub fn pages_to_sign(&self) -> Vec<usize> {
        mode::pages_to_sign(self.document.mode_config(), self.document.total_pages())
    }

    fn page_of(&self, index: usize) -> Result<usize, DocumentError> {
        self.document
            .signatures()
            .get(index)
            .map(|signature| signature.page_index)
            .ok_or(DocumentError::SignatureIndexOutOfRange {
                index,
                len: self.document.signatures().len(),
            })
    }
}

/// 宿主持有的会话句柄，可在编辑线程与合成线程之间共享。
///
/// 合成读取一致的文档快照；编辑在写锁内完成，不会出现撕裂写入。
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// 当前文档的完整副本。
    pub fn snapshot(&self) -> Document {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.document().clone()
    }

    pub fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn edit<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
