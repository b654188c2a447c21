use std::path::Path;

use pdfseal_core::document::{DocumentError, PageGeometry, StampRequest};
use pdfseal_core::geometry::{Rect, Size2};
use pdfseal_core::scenario::{Orientation, Scenario, ScenarioRegistry};
use rand::Rng;
use tracing::debug;

/// 一次摆放的结果。`rect` 位于页面空间（原点左上角）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub rect: Rect,
    pub rotation_deg: f64,
    pub scaled_size: Size2,
}

impl Placement {
    /// 转换为可交给合成流程的印章请求。
    pub fn into_request(self, image: &Path, page_index: usize) -> StampRequest {
        StampRequest::new(image, page_index, self.rect.origin(), self.scaled_size)
            .with_rotation(self.rotation_deg)
    }
}

/// 在 `[low, high)` 内均匀取值；区间为空时直接返回 `low`，不消耗随机数。
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// 计算印章的旋转、缩放、抖动与最终矩形。
///
/// 抖动是单侧的：偏移只会把印章拉向页面内部。
pub fn place<R: Rng + ?Sized>(
    raw_image_size: Size2,
    scenario: &Scenario,
    page_rect: Rect,
    rng: &mut R,
) -> Result<Placement, DocumentError> {
    if !raw_image_size.is_positive() {
        return Err(DocumentError::InvalidStampSize {
            width: raw_image_size.width,
            height: raw_image_size.height,
        });
    }

    let spread = scenario.rotation_variability_deg;
    let rotation_deg = scenario.base_rotation_deg + uniform(rng, -spread, spread);

    let rotated = raw_image_size.rotated_bounds(rotation_deg);
    let scaled_size = rotated.scale(scenario.desired_width / rotated.width);

    let offset_x = uniform(
        rng,
        -scenario.horiz_variability_pct / 100.0 * scaled_size.width,
        0.0,
    );
    let offset_y = uniform(
        rng,
        -scenario.vert_variability_pct / 100.0 * scaled_size.height,
        0.0,
    );

    let (x0, y0) = match scenario.orientation {
        Orientation::Vertical => (
            page_rect.x1 - scaled_size.width - scenario.margin_right + offset_x,
            page_rect.y1 - scaled_size.height - scenario.margin_bottom + offset_y,
        ),
        // 横向页面两种边距互换角色
        Orientation::Horizontal => (
            page_rect.x1 - scaled_size.width - scenario.margin_bottom + offset_x,
            page_rect.y0 + scenario.margin_right + offset_y,
        ),
    };

    Ok(Placement {
        rect: Rect::new(x0, y0, x0 + scaled_size.width, y0 + scaled_size.height),
        rotation_deg,
        scaled_size,
    })
}

/// 结合场景注册表为整份文档规划自动盖章。
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementEngine {
    registry: ScenarioRegistry,
}

impl PlacementEngine {
    pub fn new(registry: ScenarioRegistry) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub fn place_on_page<R: Rng + ?Sized>(
        &self,
        raw_image_size: Size2,
        page: &PageGeometry,
        rng: &mut R,
    ) -> Result<(Scenario, Placement), DocumentError> {
        let scenario = self.registry.classify(page.width(), page.height());
        let placement = place(raw_image_size, &scenario, page.rect(), rng)?;
        Ok((scenario, placement))
    }

    /// 每页一次"分类 + 摆放"，生成整份文档的印章请求。
    pub fn plan_document<R: Rng + ?Sized>(
        &self,
        pages: &[PageGeometry],
        image: &Path,
        raw_image_size: Size2,
        rng: &mut R,
    ) -> Result<Vec<StampRequest>, DocumentError> {
        let mut requests = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let (scenario, placement) = self.place_on_page(raw_image_size, page, rng)?;
            debug!(
                page = index,
                scenario = scenario.name,
                orientation = %scenario.orientation,
                rotation = placement.rotation_deg,
                x0 = placement.rect.x0,
                y0 = placement.rect.y0,
                "页面摆放完成"
            );
            requests.push(placement.into_request(image, index));
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use pdfseal_core::scenario::{A4_HORIZONTAL, A4_VERTICAL, LARGE_FORMAT, ScenarioKind, classify};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const A4: Rect = Rect {
        x0: 0.0,
        y0: 0.0,
        x1: 595.0,
        y1: 842.0,
    };

    #[test]
    fn zero_variance_vertical_placement_matches_formula() {
        let scenario = A4_VERTICAL.without_jitter();
        let mut rng = StdRng::seed_from_u64(7);
        let placement = place(Size2::new(300.0, 150.0), &scenario, A4, &mut rng).unwrap();

        let h = placement.scaled_size.height;
        assert!((placement.scaled_size.width - 120.0).abs() < 1e-9);
        assert!((h - 60.0).abs() < 1e-9);
        assert!((placement.rect.x0 - 375.0).abs() < 1e-9);
        assert!((placement.rect.x1 - 495.0).abs() < 1e-9);
        assert!((placement.rect.y0 - (842.0 - h - 50.0)).abs() < 1e-9);
        assert!((placement.rect.y1 - 792.0).abs() < 1e-9);
        assert_eq!(placement.rotation_deg, 0.0);
    }

    #[test]
    fn zero_variance_is_deterministic_for_any_rng() {
        let scenario = LARGE_FORMAT.without_jitter();
        let page = Rect::new(0.0, 0.0, 1190.0, 1684.0);
        let raw = Size2::new(640.0, 480.0);

        let first = place(raw, &scenario, page, &mut StdRng::seed_from_u64(1)).unwrap();
        let second = place(raw, &scenario, page, &mut StdRng::seed_from_u64(99)).unwrap();
        let mut shared = StdRng::seed_from_u64(3);
        let third = place(raw, &scenario, page, &mut shared).unwrap();
        let fourth = place(raw, &scenario, page, &mut shared).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(third, fourth);
    }

    #[test]
    fn horizontal_scenario_swaps_margins_and_rotates() {
        let scenario = A4_HORIZONTAL.without_jitter();
        let page = Rect::new(0.0, 0.0, 842.0, 595.0);
        let placement = place(
            Size2::new(200.0, 100.0),
            &scenario,
            page,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        assert_eq!(placement.rotation_deg, 90.0);
        // 旋转 90° 后外接框为 100x200，按宽 70 缩放
        assert!((placement.scaled_size.width - 70.0).abs() < 1e-9);
        assert!((placement.scaled_size.height - 140.0).abs() < 1e-6);
        assert!((placement.rect.x0 - (842.0 - 70.0 - 250.0)).abs() < 1e-9);
        assert!((placement.rect.y0 - 100.0).abs() < 1e-9);
        let drawn_height = placement.rect.y1 - placement.rect.y0;
        assert!((drawn_height - placement.scaled_size.height).abs() < 1e-9);
    }

    #[test]
    fn wide_large_format_uses_horizontal_margins() {
        let scenario = classify(1684.0, 1190.0);
        assert_eq!(scenario.kind, ScenarioKind::LargeFormat);
        assert_eq!(scenario.orientation, Orientation::Horizontal);

        let page = Rect::new(0.0, 0.0, 1684.0, 1190.0);
        let placement = place(
            Size2::new(300.0, 150.0),
            &scenario.without_jitter(),
            page,
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap();

        assert_eq!(placement.rotation_deg, 0.0);
        assert!((placement.scaled_size.width - 180.0).abs() < 1e-9);
        assert!((placement.scaled_size.height - 90.0).abs() < 1e-9);
        // margin_bottom 决定 x，margin_right 决定 y
        assert!((placement.rect.x0 - (1684.0 - 180.0 - 100.0)).abs() < 1e-9);
        assert!((placement.rect.y0 - 90.0).abs() < 1e-9);
        assert!((placement.rect.x1 - (1684.0 - 100.0)).abs() < 1e-9);
        assert!((placement.rect.y1 - 180.0).abs() < 1e-9);
    }

    #[test]
    fn jitter_is_bounded_and_one_sided() {
        let scenario = A4_VERTICAL;
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..500 {
            let placement = place(Size2::new(300.0, 150.0), &scenario, A4, &mut rng).unwrap();
            let rotation = placement.rotation_deg;
            assert!((-5.0..=5.0).contains(&rotation));
            assert!((placement.scaled_size.width - 120.0).abs() < 1e-9);

            let w = placement.scaled_size.width;
            let h = placement.scaled_size.height;
            let base_x0 = 595.0 - w - 100.0;
            let base_y0 = 842.0 - h - 50.0;
            assert!(placement.rect.x0 <= base_x0 + 1e-9);
            assert!(placement.rect.x0 >= base_x0 - 0.8 * w - 1e-9);
            assert!(placement.rect.y0 <= base_y0 + 1e-9);
            assert!(placement.rect.y0 >= base_y0 - 0.2 * h - 1e-9);
        }
    }

    #[test]
    fn seeded_rng_reproduces_jitter() {
        let raw = Size2::new(300.0, 150.0);
        let a = place(raw, &A4_VERTICAL, A4, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = place(raw, &A4_VERTICAL, A4, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_degenerate_image_sizes() {
        let err = place(
            Size2::new(0.0, 10.0),
            &A4_VERTICAL,
            A4,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidStampSize { .. }));
    }

    #[test]
    fn plan_document_classifies_each_page() {
        let engine = PlacementEngine::default();
        let pages = [
            PageGeometry::new(595.0, 842.0).unwrap(),
            PageGeometry::new(842.0, 595.0).unwrap(),
            PageGeometry::new(1684.0, 1190.0).unwrap(),
        ];
        let mut rng = StdRng::seed_from_u64(5);
        let requests = engine
            .plan_document(&pages, Path::new("sello.png"), Size2::new(300.0, 150.0), &mut rng)
            .unwrap();

        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests.iter().map(|r| r.page_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!((requests[0].size.width - 120.0).abs() < 1e-9);
        assert!((requests[1].size.width - 70.0).abs() < 1e-9);
        assert!((requests[2].size.width - 180.0).abs() < 1e-9);
        assert!((requests[1].rotation_deg - 90.0).abs() <= 5.0);
    }
}
