use std::path::{Path, PathBuf};

use pdfseal_config::{AppConfig, SignatureProfile, SignatureProfiles};
use pdfseal_core::document::StampRequest;
use pdfseal_core::geometry::{Point2, Size2};
use pdfseal_core::mode::SignatureModeKind;
use pdfseal_core::scenario::{Orientation, ScenarioRegistry};
use pdfseal_core::units;
use pdfseal_engine::cache::ImageCache;
use pdfseal_engine::command::{CommandBus, CommandContext, CommandRequest};
use pdfseal_engine::pipeline::{
    BatchStamper, CompositionPipeline, CompositionReport, FolderReport, NeverCancel,
    document_from_source,
};
use pdfseal_engine::session::SharedSession;
use pdfseal_io::{LopdfBackend, PageSource, RasterCodec};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{LoadedDocument, open_for_editing};
use crate::resource_locator::StampLocator;

/// `batch` 子命令参数；缺省值取自 `[batch]` 配置。
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub input: Option<PathBuf>,
    pub stamp: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// `sign` 子命令参数。页码从 1 开始，坐标为页面空间中的 PDF 点。
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub pdf: PathBuf,
    pub stamp: PathBuf,
    pub output: PathBuf,
    pub mode: String,
    pub page: usize,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub interval: Option<usize>,
    pub pages: Option<String>,
    pub exclude: Option<String>,
    pub profile: Option<String>,
    pub profiles_file: Option<PathBuf>,
}

impl SignOptions {
    pub fn new(
        pdf: impl Into<PathBuf>,
        stamp: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pdf: pdf.into(),
            stamp: stamp.into(),
            output: output.into(),
            mode: SignatureModeKind::Free.as_str().to_string(),
            page: 1,
            x: None,
            y: None,
            width: None,
            interval: None,
            pages: None,
            exclude: None,
            profile: None,
            profiles_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub index: usize,
    pub width: f64,
    pub height: f64,
    pub scenario: &'static str,
    pub orientation: Orientation,
}

/// 文件夹批处理：每个 PDF 的每一页自动盖章。
pub fn run_batch(
    config: &AppConfig,
    options: &BatchOptions,
) -> Result<FolderReport, FrontendError> {
    let input = options.input.as_ref().unwrap_or(&config.batch.input_dir);
    let output = options.output.as_ref().unwrap_or(&config.batch.output_dir);
    let raw_stamp = options.stamp.as_ref().unwrap_or(&config.batch.stamp_image);
    let stamp = StampLocator::from_config(Some(input.as_path()), config).require(raw_stamp)?;

    let mut rng = match options.seed.or(config.batch.seed) {
        Some(seed) => {
            info!(seed, "使用固定随机种子");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let backend = LopdfBackend::new();
    let codec = RasterCodec::new();
    let mut cache = ImageCache::new(config.cache.capacity);
    let report = BatchStamper::new(&backend, &codec, &mut cache)
        .with_raster_scale(config.editor.preview_quality.pixels_per_point())
        .stamp_folder(input, &stamp, output, &mut rng)?;

    println!("批量盖章：{} -> {}", input.display(), output.display());
    for outcome in &report.documents {
        match &outcome.result {
            Ok(document) => println!(
                "  ✓ {} ({} 页，盖章 {}，跳过 {})",
                outcome.input.display(),
                document.pages,
                document.applied,
                document.skipped.len()
            ),
            Err(err) => println!("  ✗ {}: {err}", outcome.input.display()),
        }
    }
    if report.cancelled {
        println!("批处理已取消");
    }
    println!(
        "完成 {} 个文档，失败 {} 个，跳过印章 {} 个",
        report.succeeded(),
        report.failed().count(),
        report.skipped_stamps()
    );

    let failed = report.failed().count();
    if failed > 0 {
        return Err(FrontendError::Incomplete { failed });
    }
    Ok(report)
}

/// 手动签名：在一页上放置签名，按模式展开后合成并保存。
pub fn run_sign(
    config: &AppConfig,
    options: &SignOptions,
) -> Result<CompositionReport, FrontendError> {
    let stamp = StampLocator::from_config(options.pdf.parent(), config).require(&options.stamp)?;
    let backend = LopdfBackend::new();
    let codec = RasterCodec::new();
    let mut cache = ImageCache::new(config.cache.capacity);

    let LoadedDocument {
        session,
        mut handle,
    } = open_for_editing(&backend, &options.pdf, config)?;
    let shared = SharedSession::new(session);

    let bus = CommandBus::new();
    let request = CommandRequest::new("set_mode", mode_args(options)?);
    let response = shared.edit(|session| bus.dispatch(&request, &mut CommandContext { session }));
    if !response.success {
        return Err(FrontendError::InvalidArgument(
            response.message.unwrap_or_default(),
        ));
    }

    let profile = load_profile(options)?;
    let source = cache.get_or_load(&stamp, &codec)?;
    let (image_width, image_height) = source.dimensions();
    let image_size = Size2::new(f64::from(image_width), f64::from(image_height));
    let signature = build_signature(config, options, &stamp, image_size, profile.as_ref())?;

    let fits = shared.read(|session| {
        session
            .document()
            .page(signature.page_index)
            .map(|page| page.fits(signature.position, signature.size))
    });
    if fits == Some(false) {
        warn!(
            page = signature.page_index,
            x = signature.position.x(),
            y = signature.position.y(),
            "签名超出页面边界"
        );
    }

    let placed = shared.edit(|session| session.place_signature(signature))?;
    let (kind, pages) = shared.read(|session| (session.mode().kind(), session.pages_to_sign()));
    println!(
        "模式 {}：需要签名的页面 {:?}，新增 {} 个签名",
        kind,
        pages.iter().map(|page| page + 1).collect::<Vec<_>>(),
        placed
    );

    let document = shared.snapshot();
    let report = CompositionPipeline::new(&codec, &mut cache)
        .raster_scale(config.editor.preview_quality.pixels_per_point())
        .apply_and_save(
            &document,
            &backend,
            &mut handle,
            &options.output,
            &NeverCancel,
        )?;
    backend.close(handle);

    println!(
        "已保存 {}：盖章 {}，跳过 {}",
        options.output.display(),
        report.applied,
        report.skipped.len()
    );
    for skipped in &report.skipped {
        println!("  - 第 {} 页: {}", skipped.page + 1, skipped.error);
    }
    Ok(report)
}

/// 打印每页尺寸与分类场景。
pub fn run_inspect(config: &AppConfig, pdf: &Path) -> Result<Vec<PageSummary>, FrontendError> {
    let backend = LopdfBackend::new();
    let handle = backend.open_document(pdf)?;
    let document = document_from_source(&backend, &handle, pdf)?;
    backend.close(handle);

    let registry = ScenarioRegistry::builtin();
    let zoom = config.editor.preview_zoom;
    println!("{}：{} 页", pdf.display(), document.total_pages());

    let mut summaries = Vec::with_capacity(document.total_pages());
    for (index, page) in document.pages().iter().enumerate() {
        let scenario = registry.classify(page.width(), page.height());
        let (width_cm, height_cm) = units::points_to_cm_pair((page.width(), page.height()));
        let preview = units::page_to_ui(Point2::new(page.width(), page.height()), zoom);
        println!(
            "  第 {} 页: {:.1}x{:.1} pt ({:.1}x{:.1} cm)，预览 {:.0}x{:.0} px，场景 {} ({})",
            index + 1,
            page.width(),
            page.height(),
            width_cm,
            height_cm,
            preview.x(),
            preview.y(),
            scenario.name,
            scenario.orientation
        );
        summaries.push(PageSummary {
            index,
            width: page.width(),
            height: page.height(),
            scenario: scenario.name,
            orientation: scenario.orientation,
        });
    }
    Ok(summaries)
}

fn mode_args(options: &SignOptions) -> Result<Vec<String>, FrontendError> {
    let kind: SignatureModeKind = options
        .mode
        .parse()
        .map_err(|err| FrontendError::InvalidArgument(format!("{err}")))?;
    let mut args = vec![kind.as_str().to_string()];
    match kind {
        SignatureModeKind::Free | SignatureModeKind::Mass => {}
        SignatureModeKind::Template => {
            let interval = options.interval.ok_or_else(|| {
                FrontendError::InvalidArgument("template 模式需要 --interval".to_string())
            })?;
            args.push(interval.to_string());
            args.push(options.page.to_string());
        }
        SignatureModeKind::Selective => {
            let pages = options.pages.clone().ok_or_else(|| {
                FrontendError::InvalidArgument("selective 模式需要 --pages".to_string())
            })?;
            args.push(pages);
            if let Some(exclude) = &options.exclude {
                args.push(exclude.clone());
            }
        }
    }
    Ok(args)
}

fn load_profile(options: &SignOptions) -> Result<Option<SignatureProfile>, FrontendError> {
    let Some(id) = &options.profile else {
        return Ok(None);
    };
    let path = options.profiles_file.as_ref().ok_or_else(|| {
        FrontendError::InvalidArgument("--profile 需要同时提供 --profiles".to_string())
    })?;
    let profiles = SignatureProfiles::load(path)?;
    profiles
        .get(id)
        .copied()
        .map(Some)
        .ok_or_else(|| FrontendError::InvalidArgument(format!("未找到签名配置 `{id}`")))
}

/// 参数优先于签名配置，签名配置优先于 `[editor]` 默认值。
fn build_signature(
    config: &AppConfig,
    options: &SignOptions,
    stamp: &Path,
    image_size: Size2,
    profile: Option<&SignatureProfile>,
) -> Result<StampRequest, FrontendError> {
    if options.page == 0 {
        return Err(FrontendError::InvalidArgument("页码从 1 开始".to_string()));
    }
    let x = options.x.or(profile.map(|p| p.position.x));
    let y = options.y.or(profile.map(|p| p.position.y));
    let (Some(x), Some(y)) = (x, y) else {
        return Err(FrontendError::InvalidArgument(
            "需要 --x/--y 或 --profile 指定签名位置".to_string(),
        ));
    };

    let size = match (options.width, profile) {
        (Some(width), _) => Size2::new(width, width * image_size.aspect_ratio()),
        (None, Some(profile)) => Size2::new(profile.size.width, profile.size.height),
        (None, None) => {
            let default = config.editor.default_signature_size;
            Size2::new(default.width, default.height)
        }
    };
    let rotation = profile.map_or(0.0, |p| p.rotation);

    Ok(StampRequest::new(stamp, options.page - 1, Point2::new(x, y), size).with_rotation(rotation))
}

#[cfg(test)]
mod tests {
    use pdfseal_config::{ProfilePosition, SizeSetting};

    use super::*;

    #[test]
    fn mode_arguments_follow_the_mode() {
        let mut options = SignOptions::new("in.pdf", "sello.png", "out.pdf");
        options.mode = "plantilla".to_string();
        assert!(matches!(mode_args(&options), Err(FrontendError::InvalidArgument(_))));
        options.interval = Some(2);
        options.page = 3;
        assert_eq!(mode_args(&options).unwrap(), vec!["template", "2", "3"]);

        options.mode = "selective".to_string();
        options.pages = Some("1,3".to_string());
        options.exclude = Some("3".to_string());
        assert_eq!(mode_args(&options).unwrap(), vec!["selective", "1,3", "3"]);

        options.mode = "spiral".to_string();
        assert!(mode_args(&options).is_err());
    }

    #[test]
    fn signature_sources_are_prioritised() {
        let config = AppConfig::default();
        let image = Size2::new(300.0, 150.0);
        let profile = SignatureProfile {
            position: ProfilePosition { x: 40.0, y: 60.0 },
            size: SizeSetting {
                width: 80.0,
                height: 30.0,
            },
            rotation: 12.0,
        };

        let stamp = Path::new("sello.png");
        let mut options = SignOptions::new("in.pdf", "sello.png", "out.pdf");
        assert!(build_signature(&config, &options, stamp, image, None).is_err());

        let from_profile =
            build_signature(&config, &options, stamp, image, Some(&profile)).unwrap();
        assert_eq!(from_profile.position, Point2::new(40.0, 60.0));
        assert_eq!(from_profile.size, Size2::new(80.0, 30.0));
        assert_eq!(from_profile.rotation_deg, 12.0);

        options.x = Some(100.0);
        options.y = Some(200.0);
        options.page = 2;
        let defaults = build_signature(&config, &options, stamp, image, None).unwrap();
        assert_eq!(defaults.page_index, 1);
        assert_eq!(defaults.size, Size2::new(100.0, 50.0));

        options.width = Some(120.0);
        let explicit = build_signature(&config, &options, stamp, image, Some(&profile)).unwrap();
        assert_eq!(explicit.position, Point2::new(100.0, 200.0));
        assert_eq!(explicit.size, Size2::new(120.0, 60.0));

        options.page = 0;
        assert!(build_signature(&config, &options, Path::new("sello.png"), image, None).is_err());
    }
}
