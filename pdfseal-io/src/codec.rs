use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use pdfseal_core::geometry::Size2;
use tracing::trace;

use crate::{ImageCodec, IoError};

/// 基于 `image` crate 的编解码实现。
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl RasterCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RasterCodec {
    fn load(&self, path: &Path) -> Result<RgbaImage, IoError> {
        let image = image::open(path).map_err(|source| IoError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(image.to_rgba8())
    }

    fn resize(&self, image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, IoError> {
        if width == 0 || height == 0 {
            return Err(IoError::InvalidImageSize { width, height });
        }
        Ok(imageops::resize(image, width, height, FilterType::Lanczos3))
    }

    fn rotate(&self, image: &RgbaImage, angle_deg: f64) -> RgbaImage {
        let normalized = angle_deg.rem_euclid(360.0);
        if normalized.abs() < 1e-9 || (360.0 - normalized).abs() < 1e-9 {
            return image.clone();
        }
        // 直角旋转走无损路径；imageops::rotate90 为顺时针
        if (normalized - 90.0).abs() < 1e-9 {
            return imageops::rotate270(image);
        }
        if (normalized - 180.0).abs() < 1e-9 {
            return imageops::rotate180(image);
        }
        if (normalized - 270.0).abs() < 1e-9 {
            return imageops::rotate90(image);
        }
        rotate_expand_bilinear(image, normalized)
    }
}

fn rotate_expand_bilinear(image: &RgbaImage, angle_deg: f64) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    let bounds = Size2::new(src_w as f64, src_h as f64).rotated_bounds(angle_deg);
    let dst_w = (bounds.width.ceil() as u32).max(1);
    let dst_h = (bounds.height.ceil() as u32).max(1);
    trace!(src_w, src_h, dst_w, dst_h, angle_deg, "任意角度旋转");

    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let src_cx = src_w as f64 / 2.0;
    let src_cy = src_h as f64 / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let mut output = RgbaImage::from_pixel(dst_w, dst_h, Rgba([0, 0, 0, 0]));
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        // 图像坐标 Y 向下：逆映射对应视觉上的顺时针旋转
        let sx = dx * cos - dy * sin + src_cx - 0.5;
        let sy = dx * sin + dy * cos + src_cy - 0.5;
        *pixel = sample_bilinear(image, sx, sy);
    }
    output
}

fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = image.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let fetch = |ix: f64, iy: f64| -> [f64; 4] {
        if ix < 0.0 || iy < 0.0 || ix >= w as f64 || iy >= h as f64 {
            return [0.0; 4];
        }
        let Rgba(channels) = *image.get_pixel(ix as u32, iy as u32);
        channels.map(f64::from)
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1.0, y0);
    let p01 = fetch(x0, y0 + 1.0);
    let p11 = fetch(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 4];
    for channel in 0..4 {
        let top = p00[channel] * (1.0 - fx) + p10[channel] * fx;
        let bottom = p01[channel] * (1.0 - fx) + p11[channel] * fx;
        out[channel] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}
