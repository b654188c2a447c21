pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，单位为 PDF 点或像素，取决于所在坐标空间。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于抖动偏移与拖拽位移。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 宽高尺寸。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Size2 {
        pub width: f64,
        pub height: f64,
    }

    impl Size2 {
        #[inline]
        pub fn new(width: f64, height: f64) -> Self {
            Self { width, height }
        }

        /// 两个分量均为有限正数。
        #[inline]
        pub fn is_positive(self) -> bool {
            self.width.is_finite()
                && self.height.is_finite()
                && self.width > 0.0
                && self.height > 0.0
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self::new(self.width * factor, self.height * factor)
        }

        /// 高宽比（height / width）。
        #[inline]
        pub fn aspect_ratio(self) -> f64 {
            self.height / self.width
        }

        /// 旋转后外接轴对齐矩形的尺寸（"rotate and expand"）。
        pub fn rotated_bounds(self, angle_deg: f64) -> Self {
            let (sin, cos) = angle_deg.to_radians().sin_cos();
            let (sin, cos) = (sin.abs(), cos.abs());
            Self::new(
                self.width * cos + self.height * sin,
                self.width * sin + self.height * cos,
            )
        }
    }

    /// 轴对齐矩形，`(x0, y0)` 为最小角，`(x1, y1)` 为最大角。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Rect {
        pub x0: f64,
        pub y0: f64,
        pub x1: f64,
        pub y1: f64,
    }

    impl Rect {
        #[inline]
        pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
            Self { x0, y0, x1, y1 }
        }

        #[inline]
        pub fn from_origin_size(origin: Point2, size: Size2) -> Self {
            Self::new(
                origin.x(),
                origin.y(),
                origin.x() + size.width,
                origin.y() + size.height,
            )
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.x1 - self.x0
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.y1 - self.y0
        }

        #[inline]
        pub fn origin(&self) -> Point2 {
            Point2::new(self.x0, self.y0)
        }

        #[inline]
        pub fn size(&self) -> Size2 {
            Size2::new(self.width(), self.height())
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            Point2::new((self.x0 + self.x1) * 0.5, (self.y0 + self.y1) * 0.5)
        }

        /// 保持中心不变，替换尺寸。
        pub fn with_size_about_center(&self, size: Size2) -> Self {
            let center = self.center();
            Self::new(
                center.x() - size.width * 0.5,
                center.y() - size.height * 0.5,
                center.x() + size.width * 0.5,
                center.y() + size.height * 0.5,
            )
        }
    }
}

/// 厘米、PDF 点与缩放像素三种坐标空间之间的转换。
///
/// 约定：
/// - **页面空间**：PDF 点，原点在页面左上角，Y 向下增长。编辑器和摆放引擎都工作在此空间。
/// - **PDF 空间**：PDF 点，原点在左下角，Y 向上增长。仅在合成时使用。
/// - **UI 空间**：页面空间乘以预览缩放倍数。
///
/// UI → 页面只去除缩放，不翻转 Y；翻转只在 `page_rect_to_pdf` 中发生一次。
pub mod units {
    use glam::DVec2;

    use crate::geometry::{Point2, Rect};

    /// 1 cm = 28.3465 pt
    pub const CM_TO_POINTS: f64 = 28.3465;
    pub const POINTS_TO_CM: f64 = 1.0 / CM_TO_POINTS;

    #[inline]
    pub fn cm_to_points(cm: f64) -> f64 {
        cm * CM_TO_POINTS
    }

    #[inline]
    pub fn points_to_cm(points: f64) -> f64 {
        points / CM_TO_POINTS
    }

    #[inline]
    pub fn cm_to_points_pair((x, y): (f64, f64)) -> (f64, f64) {
        (cm_to_points(x), cm_to_points(y))
    }

    #[inline]
    pub fn points_to_cm_pair((x, y): (f64, f64)) -> (f64, f64) {
        (points_to_cm(x), points_to_cm(y))
    }

    /// 绕 `origin` 旋转点，角度单位为度，逆时针为正（Y 向上的坐标系下）。
    pub fn rotate_point(point: Point2, angle_deg: f64, origin: Point2) -> Point2 {
        let rotation = DVec2::from_angle(angle_deg.to_radians());
        let local = point.as_vec2() - origin.as_vec2();
        Point2::from_vec(rotation.rotate(local) + origin.as_vec2())
    }

    #[inline]
    fn sanitize_zoom(zoom: f64) -> f64 {
        if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 }
    }

    /// UI 像素 → 页面空间。非法缩放（非正数或非有限值）按 1.0 处理。
    pub fn ui_to_page(ui: Point2, zoom: f64) -> Point2 {
        Point2::from_vec(ui.as_vec2() / sanitize_zoom(zoom))
    }

    pub fn page_to_ui(page: Point2, zoom: f64) -> Point2 {
        Point2::from_vec(page.as_vec2() * sanitize_zoom(zoom))
    }

    /// 页面空间矩形 → PDF 空间矩形。该变换是自身的逆。
    pub fn page_rect_to_pdf(rect: Rect, page_height: f64) -> Rect {
        Rect::new(rect.x0, page_height - rect.y1, rect.x1, page_height - rect.y0)
    }

    #[inline]
    pub fn pdf_rect_to_page(rect: Rect, page_height: f64) -> Rect {
        page_rect_to_pdf(rect, page_height)
    }

    /// UI 左上角坐标 → 印章在 PDF 空间中的左下角坐标。
    ///
    /// 先去除缩放，再以页面高度翻转并减去印章高度。
    pub fn ui_to_pdf(
        ui_x: f64,
        ui_y: f64,
        zoom: f64,
        page_height: f64,
        stamp_height: f64,
    ) -> (f64, f64) {
        let page = ui_to_page(Point2::new(ui_x, ui_y), zoom);
        (page.x(), page_height - page.y() - stamp_height)
    }

    /// [`ui_to_pdf`] 的逆变换。
    pub fn pdf_to_ui(
        pdf_x: f64,
        pdf_y: f64,
        zoom: f64,
        page_height: f64,
        stamp_height: f64,
    ) -> (f64, f64) {
        let page = Point2::new(pdf_x, page_height - pdf_y - stamp_height);
        let ui = page_to_ui(page, zoom);
        (ui.x(), ui.y())
    }
}

/// 页面版式场景：内置注册表与按页面尺寸分类。
pub mod scenario {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    pub const A4_WIDTH: f64 = 595.0;
    pub const A4_HEIGHT: f64 = 842.0;
    pub const TOLERANCE: f64 = 50.0;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Orientation {
        Vertical,
        Horizontal,
    }

    impl fmt::Display for Orientation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Orientation::Vertical => f.write_str("vertical"),
                Orientation::Horizontal => f.write_str("horizontal"),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ScenarioKind {
        A4Vertical,
        A4Horizontal,
        LargeFormat,
    }

    impl ScenarioKind {
        pub fn key(self) -> &'static str {
            match self {
                ScenarioKind::A4Vertical => "A4_VERTICAL",
                ScenarioKind::A4Horizontal => "A4_HORIZONTAL",
                ScenarioKind::LargeFormat => "LARGE_FORMAT",
            }
        }
    }

    /// 一组摆放参数。长度单位为 PDF 点，角度单位为度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct Scenario {
        pub kind: ScenarioKind,
        pub name: &'static str,
        pub orientation: Orientation,
        pub desired_width: f64,
        pub margin_right: f64,
        pub margin_bottom: f64,
        pub horiz_variability_pct: f64,
        pub vert_variability_pct: f64,
        pub rotation_variability_deg: f64,
        pub base_rotation_deg: f64,
    }

    impl Scenario {
        #[inline]
        pub fn with_orientation(mut self, orientation: Orientation) -> Self {
            self.orientation = orientation;
            self
        }

        /// 去除所有随机抖动后的场景。
        pub fn without_jitter(mut self) -> Self {
            self.horiz_variability_pct = 0.0;
            self.vert_variability_pct = 0.0;
            self.rotation_variability_deg = 0.0;
            self
        }
    }

    pub const A4_VERTICAL: Scenario = Scenario {
        kind: ScenarioKind::A4Vertical,
        name: "A4 Vertical",
        orientation: Orientation::Vertical,
        desired_width: 120.0,
        margin_right: 100.0,
        margin_bottom: 50.0,
        horiz_variability_pct: 80.0,
        vert_variability_pct: 20.0,
        rotation_variability_deg: 5.0,
        base_rotation_deg: 0.0,
    };

    pub const A4_HORIZONTAL: Scenario = Scenario {
        kind: ScenarioKind::A4Horizontal,
        name: "A4 Horizontal",
        orientation: Orientation::Horizontal,
        desired_width: 70.0,
        margin_right: 100.0,
        margin_bottom: 250.0,
        horiz_variability_pct: 80.0,
        vert_variability_pct: 20.0,
        rotation_variability_deg: 5.0,
        base_rotation_deg: 90.0,
    };

    /// 方向由分类器按实际页面尺寸覆盖。
    pub const LARGE_FORMAT: Scenario = Scenario {
        kind: ScenarioKind::LargeFormat,
        name: "Large format",
        orientation: Orientation::Vertical,
        desired_width: 180.0,
        margin_right: 90.0,
        margin_bottom: 100.0,
        horiz_variability_pct: 50.0,
        vert_variability_pct: 20.0,
        rotation_variability_deg: 5.0,
        base_rotation_deg: 0.0,
    };

    /// 不可变场景注册表，分类器与摆放引擎共用。
    #[derive(Debug, Clone, Copy)]
    pub struct ScenarioRegistry {
        entries: &'static [Scenario],
    }

    const BUILTIN: [Scenario; 3] = [A4_VERTICAL, A4_HORIZONTAL, LARGE_FORMAT];

    impl ScenarioRegistry {
        pub const fn builtin() -> Self {
            Self { entries: &BUILTIN }
        }

        pub fn get(&self, kind: ScenarioKind) -> Scenario {
            self.entries
                .iter()
                .copied()
                .find(|scenario| scenario.kind == kind)
                .unwrap_or(LARGE_FORMAT)
        }

        /// 按键名（如 `A4_VERTICAL`）或展示名查找，大小写不敏感。
        pub fn by_name(&self, name: &str) -> Option<Scenario> {
            self.entries.iter().copied().find(|scenario| {
                scenario.kind.key().eq_ignore_ascii_case(name)
                    || scenario.name.eq_ignore_ascii_case(name)
            })
        }

        pub fn iter(&self) -> impl Iterator<Item = &Scenario> + '_ {
            self.entries.iter()
        }

        /// 按页面宽高（点）选择场景。规则按顺序匹配，总能返回结果。
        pub fn classify(&self, width: f64, height: f64) -> Scenario {
            let near = |value: f64, target: f64| (value - target).abs() <= TOLERANCE;

            if near(width, A4_WIDTH) && near(height, A4_HEIGHT) && width < height {
                return self.get(ScenarioKind::A4Vertical);
            }
            if near(width, A4_HEIGHT) && near(height, A4_WIDTH) && width > height {
                return self.get(ScenarioKind::A4Horizontal);
            }

            let orientation = if width > height {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            };
            self.get(ScenarioKind::LargeFormat)
                .with_orientation(orientation)
        }
    }

    impl Default for ScenarioRegistry {
        fn default() -> Self {
            Self::builtin()
        }
    }

    /// 使用内置注册表分类。
    #[inline]
    pub fn classify(width: f64, height: f64) -> Scenario {
        ScenarioRegistry::builtin().classify(width, height)
    }
}

/// 签名模式配置：四种模式的带标签联合体。
pub mod mode {
    use std::collections::BTreeSet;
    use std::fmt;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SignatureModeKind {
        Free,
        Mass,
        Template,
        Selective,
    }

    impl SignatureModeKind {
        pub const ALL: [SignatureModeKind; 4] = [
            SignatureModeKind::Free,
            SignatureModeKind::Mass,
            SignatureModeKind::Template,
            SignatureModeKind::Selective,
        ];

        pub fn as_str(self) -> &'static str {
            match self {
                SignatureModeKind::Free => "free",
                SignatureModeKind::Mass => "mass",
                SignatureModeKind::Template => "template",
                SignatureModeKind::Selective => "selective",
            }
        }
    }

    impl fmt::Display for SignatureModeKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("unknown signature mode `{0}` (expected free, mass, template or selective)")]
    pub struct UnknownModeError(pub String);

    impl FromStr for SignatureModeKind {
        type Err = UnknownModeError;

        /// 同时接受旧版界面使用的西班牙语名称。
        fn from_str(value: &str) -> Result<Self, Self::Err> {
            match value.trim().to_ascii_lowercase().as_str() {
                "free" | "libre" => Ok(SignatureModeKind::Free),
                "mass" | "masivo" => Ok(SignatureModeKind::Mass),
                "template" | "plantilla" => Ok(SignatureModeKind::Template),
                "selective" | "selectivo" => Ok(SignatureModeKind::Selective),
                _ => Err(UnknownModeError(value.to_string())),
            }
        }
    }

    /// 每个文档一份；切换模式时整体替换，从不跨模式局部修改。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "mode", rename_all = "lowercase")]
    pub enum SignatureModeConfig {
        Free,
        Mass,
        Template {
            interval: usize,
            /// 放置原始签名的页索引（从 0 开始），仅作记录；展开始终从第 0 页起算。
            #[serde(default)]
            template_page: usize,
        },
        Selective {
            #[serde(default)]
            affected: BTreeSet<usize>,
            #[serde(default)]
            excluded: BTreeSet<usize>,
        },
    }

    impl SignatureModeConfig {
        #[inline]
        pub fn template(interval: usize) -> Self {
            SignatureModeConfig::Template {
                interval,
                template_page: 0,
            }
        }

        pub fn selective(
            affected: impl IntoIterator<Item = usize>,
            excluded: impl IntoIterator<Item = usize>,
        ) -> Self {
            SignatureModeConfig::Selective {
                affected: affected.into_iter().collect(),
                excluded: excluded.into_iter().collect(),
            }
        }

        /// 以默认参数构造指定模式（模板间隔 1，选择集为空）。
        pub fn default_for(kind: SignatureModeKind) -> Self {
            match kind {
                SignatureModeKind::Free => SignatureModeConfig::Free,
                SignatureModeKind::Mass => SignatureModeConfig::Mass,
                SignatureModeKind::Template => SignatureModeConfig::template(1),
                SignatureModeKind::Selective => SignatureModeConfig::Selective {
                    affected: BTreeSet::new(),
                    excluded: BTreeSet::new(),
                },
            }
        }

        pub fn kind(&self) -> SignatureModeKind {
            match self {
                SignatureModeConfig::Free => SignatureModeKind::Free,
                SignatureModeConfig::Mass => SignatureModeKind::Mass,
                SignatureModeConfig::Template { .. } => SignatureModeKind::Template,
                SignatureModeConfig::Selective { .. } => SignatureModeKind::Selective,
            }
        }
    }

    impl Default for SignatureModeConfig {
        fn default() -> Self {
            SignatureModeConfig::Free
        }
    }
}

pub mod document {
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::geometry::{Point2, Rect, Size2};
    use crate::mode::SignatureModeConfig;

    /// 页面尺寸（PDF 点），打开文档时创建，之后不可变。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PageGeometry {
        width: f64,
        height: f64,
    }

    impl PageGeometry {
        /// 宽高必须为有限正数。
        pub fn new(width: f64, height: f64) -> Option<Self> {
            if Size2::new(width, height).is_positive() {
                Some(Self { width, height })
            } else {
                None
            }
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.width
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.height
        }

        /// 页面空间中的整页矩形 `(0, 0, width, height)`。
        #[inline]
        pub fn rect(&self) -> Rect {
            Rect::new(0.0, 0.0, self.width, self.height)
        }

        pub fn contains(&self, point: Point2) -> bool {
            (0.0..=self.width).contains(&point.x()) && (0.0..=self.height).contains(&point.y())
        }

        /// 印章尺寸为正且不越过页面右边与下边。
        pub fn fits(&self, position: Point2, size: Size2) -> bool {
            size.is_positive()
                && position.x() + size.width <= self.width
                && position.y() + size.height <= self.height
        }
    }

    /// 一次印章请求。`position` 为页面空间中的左上角，`size` 为最终绘制框，
    /// `rotation_deg` 是放入绘制框之前对图像施加的旋转（扩展外接框）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct StampRequest {
        pub image: PathBuf,
        pub size: Size2,
        pub position: Point2,
        #[serde(default)]
        pub rotation_deg: f64,
        pub page_index: usize,
    }

    impl StampRequest {
        pub fn new(
            image: impl Into<PathBuf>,
            page_index: usize,
            position: Point2,
            size: Size2,
        ) -> Self {
            Self {
                image: image.into(),
                size,
                position,
                rotation_deg: 0.0,
                page_index,
            }
        }

        #[inline]
        pub fn with_rotation(mut self, rotation_deg: f64) -> Self {
            self.rotation_deg = rotation_deg;
            self
        }

        /// 同一图像、位置与尺寸复制到另一页。
        pub fn on_page(&self, page_index: usize) -> Self {
            Self {
                page_index,
                ..self.clone()
            }
        }

        /// 页面空间中的绘制框。
        #[inline]
        pub fn rect(&self) -> Rect {
            Rect::from_origin_size(self.position, self.size)
        }
    }

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum DocumentError {
        #[error("page index {page} is out of range for {total_pages} pages")]
        InvalidPageIndex { page: usize, total_pages: usize },
        #[error("stamp size {width}x{height} must be positive")]
        InvalidStampSize { width: f64, height: f64 },
        #[error("signature index {index} is out of range ({len} signatures)")]
        SignatureIndexOutOfRange { index: usize, len: usize },
    }

    /// 打开的 PDF 及其印章列表。
    ///
    /// 不变量：每个 `StampRequest::page_index` 都小于页数。签名按插入顺序保存，
    /// "移除最后一个"依赖该顺序。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Document {
        path: PathBuf,
        pages: Vec<PageGeometry>,
        signatures: Vec<StampRequest>,
        #[serde(default)]
        mode_config: SignatureModeConfig,
    }

    impl Document {
        pub fn new(path: impl Into<PathBuf>, pages: Vec<PageGeometry>) -> Self {
            Self {
                path: path.into(),
                pages,
                signatures: Vec::new(),
                mode_config: SignatureModeConfig::Free,
            }
        }

        #[inline]
        pub fn path(&self) -> &Path {
            &self.path
        }

        #[inline]
        pub fn total_pages(&self) -> usize {
            self.pages.len()
        }

        #[inline]
        pub fn pages(&self) -> &[PageGeometry] {
            &self.pages
        }

        #[inline]
        pub fn page(&self, index: usize) -> Option<&PageGeometry> {
            self.pages.get(index)
        }

        #[inline]
        pub fn signatures(&self) -> &[StampRequest] {
            &self.signatures
        }

        /// 指定页上的印章，保持插入顺序。
        pub fn signatures_on_page(
            &self,
            page_index: usize,
        ) -> impl Iterator<Item = &StampRequest> + '_ {
            self.signatures
                .iter()
                .filter(move |signature| signature.page_index == page_index)
        }

        #[inline]
        pub fn mode_config(&self) -> &SignatureModeConfig {
            &self.mode_config
        }

        /// 整体替换模式配置并清空所有印章，返回被丢弃的印章。
        pub fn replace_mode_config(&mut self, config: SignatureModeConfig) -> Vec<StampRequest> {
            self.mode_config = config;
            std::mem::take(&mut self.signatures)
        }

        /// 检查印章请求是否满足文档不变量。
        pub fn validate_signature(&self, signature: &StampRequest) -> Result<(), DocumentError> {
            if signature.page_index >= self.total_pages() {
                return Err(DocumentError::InvalidPageIndex {
                    page: signature.page_index,
                    total_pages: self.total_pages(),
                });
            }
            if !signature.size.is_positive() {
                return Err(DocumentError::InvalidStampSize {
                    width: signature.size.width,
                    height: signature.size.height,
                });
            }
            Ok(())
        }

        pub fn add_signature(&mut self, signature: StampRequest) -> Result<(), DocumentError> {
            self.validate_signature(&signature)?;
            self.signatures.push(signature);
            Ok(())
        }

        /// 以新列表整体替换印章；任一元素非法则保持原状。
        pub fn replace_signatures(
            &mut self,
            signatures: Vec<StampRequest>,
        ) -> Result<(), DocumentError> {
            for signature in &signatures {
                self.validate_signature(signature)?;
            }
            self.signatures = signatures;
            Ok(())
        }

        #[inline]
        pub fn remove_last_signature(&mut self) -> Option<StampRequest> {
            self.signatures.pop()
        }

        #[inline]
        pub fn clear_signatures(&mut self) -> Vec<StampRequest> {
            std::mem::take(&mut self.signatures)
        }

        pub fn move_signature(
            &mut self,
            index: usize,
            position: Point2,
        ) -> Result<(), DocumentError> {
            let len = self.signatures.len();
            let signature = self
                .signatures
                .get_mut(index)
                .ok_or(DocumentError::SignatureIndexOutOfRange { index, len })?;
            signature.position = position;
            Ok(())
        }

        pub fn resize_signature(&mut self, index: usize, size: Size2) -> Result<(), DocumentError> {
            if !size.is_positive() {
                return Err(DocumentError::InvalidStampSize {
                    width: size.width,
                    height: size.height,
                });
            }
            let len = self.signatures.len();
            let signature = self
                .signatures
                .get_mut(index)
                .ok_or(DocumentError::SignatureIndexOutOfRange { index, len })?;
            signature.size = size;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::document::{Document, DocumentError, PageGeometry, StampRequest};
    use super::geometry::{Point2, Rect, Size2};
    use super::mode::{SignatureModeConfig, SignatureModeKind, UnknownModeError};
    use super::scenario::{Orientation, ScenarioKind, ScenarioRegistry, classify};
    use super::units::*;

    fn a4_document(pages: usize) -> Document {
        let geometry = PageGeometry::new(595.0, 842.0).expect("valid page");
        Document::new("sample.pdf", vec![geometry; pages])
    }

    #[test]
    fn classify_matches_builtin_scenarios() {
        assert_eq!(classify(595.0, 842.0).kind, ScenarioKind::A4Vertical);
        assert_eq!(classify(842.0, 595.0).kind, ScenarioKind::A4Horizontal);

        let tall = classify(1000.0, 1400.0);
        assert_eq!(tall.kind, ScenarioKind::LargeFormat);
        assert_eq!(tall.orientation, Orientation::Vertical);

        let wide = classify(1400.0, 1000.0);
        assert_eq!(wide.kind, ScenarioKind::LargeFormat);
        assert_eq!(wide.orientation, Orientation::Horizontal);
    }

    #[test]
    fn classify_respects_tolerance_edges() {
        // US Letter 612x792 仍在 A4 容差内
        assert_eq!(classify(612.0, 792.0).kind, ScenarioKind::A4Vertical);
        assert_eq!(classify(645.0, 892.0).kind, ScenarioKind::A4Vertical);
        assert_eq!(classify(646.0, 842.0).kind, ScenarioKind::LargeFormat);
        // 正方形页面落入默认场景，方向为纵向
        let square = classify(600.0, 600.0);
        assert_eq!(square.kind, ScenarioKind::LargeFormat);
        assert_eq!(square.orientation, Orientation::Vertical);
    }

    #[test]
    fn registry_lookup_by_name() {
        let registry = ScenarioRegistry::builtin();
        assert_eq!(registry.iter().count(), 3);
        let horizontal = registry.by_name("a4_horizontal").expect("known key");
        assert_eq!(horizontal.base_rotation_deg, 90.0);
        assert_eq!(horizontal.desired_width, 70.0);
        assert!(registry.by_name("letter").is_none());
        assert_eq!(
            registry.get(ScenarioKind::LargeFormat).desired_width,
            180.0
        );
    }

    #[test]
    fn cm_points_conversion() {
        assert!((cm_to_points(1.0) - 28.3465).abs() < 1e-12);
        let (x, y) = cm_to_points_pair((2.0, 3.0));
        assert!((x - 56.693).abs() < 1e-9);
        assert!((y - 85.0395).abs() < 1e-9);
        let (x, y) = points_to_cm_pair((56.693, 85.0395));
        assert!((x - 2.0).abs() < 1e-9);
        assert!((y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rotate_point_quarter_turn() {
        let rotated = rotate_point(Point2::new(1.0, 0.0), 90.0, Point2::new(0.0, 0.0));
        assert!(rotated.x().abs() < 1e-12);
        assert!((rotated.y() - 1.0).abs() < 1e-12);

        let around = rotate_point(Point2::new(2.0, 1.0), 180.0, Point2::new(1.0, 1.0));
        assert!((around.x() - 0.0).abs() < 1e-12);
        assert!((around.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ui_to_pdf_removes_zoom_then_flips() {
        let (x, y) = ui_to_pdf(200.0, 100.0, 2.0, 842.0, 50.0);
        assert!((x - 100.0).abs() < 1e-12);
        assert!((y - (842.0 - 50.0 - 50.0)).abs() < 1e-12);

        let (ux, uy) = pdf_to_ui(x, y, 2.0, 842.0, 50.0);
        assert!((ux - 200.0).abs() < 1e-9);
        assert!((uy - 100.0).abs() < 1e-9);
    }

    #[test]
    fn page_rect_flip_is_involution() {
        let rect = Rect::new(375.0, 700.0, 495.0, 792.0);
        let pdf = page_rect_to_pdf(rect, 842.0);
        assert_eq!(pdf, Rect::new(375.0, 50.0, 495.0, 142.0));
        assert_eq!(pdf_rect_to_page(pdf, 842.0), rect);
    }

    #[test]
    fn invalid_zoom_falls_back_to_identity() {
        let p = ui_to_page(Point2::new(10.0, 20.0), 0.0);
        assert_eq!(p, Point2::new(10.0, 20.0));
        let p = ui_to_page(Point2::new(10.0, 20.0), f64::NAN);
        assert_eq!(p, Point2::new(10.0, 20.0));
    }

    #[test]
    fn rotated_bounds_expand() {
        let size = Size2::new(100.0, 50.0);
        let quarter = size.rotated_bounds(90.0);
        assert!((quarter.width - 50.0).abs() < 1e-9);
        assert!((quarter.height - 100.0).abs() < 1e-9);

        let diagonal = Size2::new(10.0, 10.0).rotated_bounds(45.0);
        assert!((diagonal.width - 10.0 * 2f64.sqrt()).abs() < 1e-9);
        assert_eq!(size.rotated_bounds(0.0), size);
    }

    #[test]
    fn page_geometry_validators() {
        assert!(PageGeometry::new(0.0, 10.0).is_none());
        assert!(PageGeometry::new(10.0, -1.0).is_none());

        let page = PageGeometry::new(595.0, 842.0).unwrap();
        assert!(page.contains(Point2::new(100.0, 100.0)));
        assert!(!page.contains(Point2::new(-1.0, 100.0)));
        assert!(!page.contains(Point2::new(600.0, 100.0)));

        assert!(page.fits(Point2::new(100.0, 100.0), Size2::new(100.0, 50.0)));
        assert!(!page.fits(Point2::new(100.0, 100.0), Size2::new(500.0, 50.0)));
        assert!(!page.fits(Point2::new(100.0, 100.0), Size2::new(0.0, 50.0)));
    }

    #[test]
    fn document_enforces_page_and_size_invariants() {
        let mut doc = a4_document(2);
        let ok = StampRequest::new("sig.png", 1, Point2::new(10.0, 10.0), Size2::new(100.0, 50.0));
        doc.add_signature(ok.clone()).unwrap();

        let err = doc.add_signature(ok.on_page(2)).unwrap_err();
        assert_eq!(
            err,
            DocumentError::InvalidPageIndex {
                page: 2,
                total_pages: 2
            }
        );

        let mut flat = ok.clone();
        flat.size = Size2::new(100.0, 0.0);
        assert!(matches!(
            doc.add_signature(flat),
            Err(DocumentError::InvalidStampSize { .. })
        ));

        assert_eq!(err.to_string(), "page index 2 is out of range for 2 pages");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());

        // 整体替换失败时保持原状
        assert!(doc.replace_signatures(vec![ok.on_page(0), ok.on_page(5)]).is_err());
        assert_eq!(doc.signatures().len(), 1);
    }

    #[test]
    fn document_edit_operations() {
        let mut doc = a4_document(3);
        let sig = StampRequest::new("sig.png", 0, Point2::new(0.0, 0.0), Size2::new(100.0, 50.0));
        doc.add_signature(sig.clone()).unwrap();
        doc.add_signature(sig.on_page(2)).unwrap();

        doc.move_signature(1, Point2::new(40.0, 60.0)).unwrap();
        assert_eq!(doc.signatures()[1].position, Point2::new(40.0, 60.0));
        assert!(doc.move_signature(9, Point2::new(0.0, 0.0)).is_err());

        doc.resize_signature(0, Size2::new(200.0, 100.0)).unwrap();
        assert!(doc.resize_signature(0, Size2::new(-1.0, 1.0)).is_err());

        assert_eq!(doc.signatures_on_page(2).count(), 1);
        let last = doc.remove_last_signature().expect("has last");
        assert_eq!(last.page_index, 2);

        let discarded = doc.replace_mode_config(SignatureModeConfig::Mass);
        assert_eq!(discarded.len(), 1);
        assert!(doc.signatures().is_empty());
        assert_eq!(doc.mode_config().kind(), SignatureModeKind::Mass);
    }

    #[test]
    fn mode_kind_parses_english_and_legacy_names() {
        assert_eq!("mass".parse::<SignatureModeKind>().unwrap(), SignatureModeKind::Mass);
        assert_eq!(
            "Plantilla".parse::<SignatureModeKind>().unwrap(),
            SignatureModeKind::Template
        );
        assert_eq!("libre".parse::<SignatureModeKind>().unwrap(), SignatureModeKind::Free);
        let err = "stamp".parse::<SignatureModeKind>().unwrap_err();
        assert_eq!(err, UnknownModeError("stamp".to_string()));
        assert!(err.to_string().contains("`stamp`"));

        for kind in SignatureModeKind::ALL {
            assert_eq!(SignatureModeConfig::default_for(kind).kind(), kind);
        }
    }

    mod proptests {
        use proptest::prelude::*;

        use super::super::geometry::{Point2, Rect};
        use super::super::units::*;

        proptest! {
            #[test]
            fn cm_round_trip(cm in -1.0e6f64..1.0e6) {
                let back = points_to_cm(cm_to_points(cm));
                prop_assert!((back - cm).abs() <= 1e-9 * cm.abs().max(1.0));
            }

            #[test]
            fn ui_pdf_round_trip(
                x in 0.0f64..2000.0,
                y in 0.0f64..2000.0,
                zoom in 0.1f64..8.0,
                page_height in 100.0f64..3000.0,
                stamp_height in 1.0f64..400.0,
            ) {
                let (px, py) = ui_to_pdf(x, y, zoom, page_height, stamp_height);
                let (ux, uy) = pdf_to_ui(px, py, zoom, page_height, stamp_height);
                prop_assert!((ux - x).abs() < 1e-6);
                prop_assert!((uy - y).abs() < 1e-6);
            }

            #[test]
            fn page_rect_round_trip(
                x0 in 0.0f64..500.0,
                y0 in 0.0f64..500.0,
                w in 1.0f64..300.0,
                h in 1.0f64..300.0,
                page_height in 800.0f64..2000.0,
            ) {
                let rect = Rect::new(x0, y0, x0 + w, y0 + h);
                let back = pdf_rect_to_page(page_rect_to_pdf(rect, page_height), page_height);
                prop_assert!((back.x0 - rect.x0).abs() < 1e-9);
                prop_assert!((back.y0 - rect.y0).abs() < 1e-9);
                prop_assert!((back.x1 - rect.x1).abs() < 1e-9);
                prop_assert!((back.y1 - rect.y1).abs() < 1e-9);
            }

            #[test]
            fn rotation_preserves_distance_to_origin(
                x in -500.0f64..500.0,
                y in -500.0f64..500.0,
                angle in -360.0f64..360.0,
            ) {
                let origin = Point2::new(10.0, -20.0);
                let point = Point2::new(x, y);
                let rotated = rotate_point(point, angle, origin);
                let before = origin.vector_to(point).as_vec2().length();
                let after = origin.vector_to(rotated).as_vec2().length();
                prop_assert!((before - after).abs() < 1e-6);
            }
        }
    }
}
