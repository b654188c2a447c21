use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbaImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pdfseal_core::document::PageGeometry;
use pdfseal_core::geometry::Rect;
use tracing::{debug, trace, warn};

use crate::{IoError, PageRenderer, PageSource};

const XOBJECT_PREFIX: &str = "PdfSealIm";

/// 已打开的 PDF。页面对象 ID 与 MediaBox 原点在打开时缓存。
#[derive(Debug)]
pub struct PdfHandle {
    path: PathBuf,
    document: Document,
    pages: Vec<PageEntry>,
    next_image: usize,
}

#[derive(Debug, Clone, Copy)]
struct PageEntry {
    id: ObjectId,
    origin: (f64, f64),
    geometry: PageGeometry,
}

impl PdfHandle {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// 本次会话中已嵌入的印章图像数量。
    #[inline]
    pub fn embedded_images(&self) -> usize {
        self.next_image
    }

    fn entry(&self, index: usize) -> Result<PageEntry, IoError> {
        self.pages
            .get(index)
            .copied()
            .ok_or(IoError::PageOutOfRange {
                page: index,
                total_pages: self.pages.len(),
            })
    }
}

/// 基于 `lopdf` 的页面来源与合成器。
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }

    /// 从内存打开，主要用于测试与预览。
    pub fn open_bytes(
        &self,
        label: impl Into<PathBuf>,
        bytes: &[u8],
    ) -> Result<PdfHandle, IoError> {
        let path = label.into();
        let document = Document::load_mem(bytes).map_err(|err| IoError::Pdf {
            path: path.clone(),
            message: err.to_string(),
        })?;
        build_handle(path, document)
    }
}

impl PageSource for LopdfBackend {
    type Handle = PdfHandle;

    fn open_document(&self, path: &Path) -> Result<PdfHandle, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.open_bytes(path, &bytes)
    }

    fn page_count(&self, handle: &PdfHandle) -> usize {
        handle.pages.len()
    }

    fn page_rect(&self, handle: &PdfHandle, index: usize) -> Result<PageGeometry, IoError> {
        Ok(handle.entry(index)?.geometry)
    }
}

impl PageRenderer for LopdfBackend {
    fn draw_image(
        &self,
        handle: &mut PdfHandle,
        page_index: usize,
        rect: Rect,
        image: &RgbaImage,
        overlay: bool,
    ) -> Result<(), IoError> {
        let entry = handle.entry(page_index)?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(IoError::InvalidImageSize { width, height });
        }

        let name = format!("{XOBJECT_PREFIX}{}", handle.next_image);
        let document = &mut handle.document;
        let image_id = embed_rgba(document, image);
        register_xobject(document, entry.id, &name, image_id)?;

        let x = rect.x0 + entry.origin.0;
        let y = rect.y0 + entry.origin.1;
        let content = format!(
            "q\n{:.4} 0 0 {:.4} {:.4} {:.4} cm\n/{name} Do\nQ\n",
            rect.width(),
            rect.height(),
            x,
            y
        );
        append_content(document, entry.id, content.into_bytes(), overlay)?;
        handle.next_image += 1;

        trace!(
            page = page_index,
            xobject = %name,
            x,
            y,
            w = rect.width(),
            h = rect.height(),
            "已嵌入图像"
        );
        Ok(())
    }

    /// 先写入 `<output>.partial`，成功后再重命名；任一步失败都会删除临时文件。
    fn save(&self, handle: &mut PdfHandle, output: &Path) -> Result<(), IoError> {
        let partial = partial_path(output);
        handle.document.compress();
        let result = write_partial(&mut handle.document, &partial, output).and_then(|()| {
            fs::rename(&partial, output).map_err(|source| IoError::WriteError {
                path: output.to_path_buf(),
                source,
            })
        });
        if let Err(err) = result {
            if partial.exists() {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    warn!(path = %partial.display(), error = %cleanup, "临时文件删除失败");
                }
            }
            return Err(err);
        }
        debug!(output = %output.display(), "PDF 已保存");
        Ok(())
    }
}

fn write_partial(document: &mut Document, partial: &Path, output: &Path) -> Result<(), IoError> {
    let write_error = |source| IoError::WriteError {
        path: partial.to_path_buf(),
        source,
    };
    let file = fs::File::create(partial).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    document.save_to(&mut writer).map_err(|err| IoError::Pdf {
        path: output.to_path_buf(),
        message: err.to_string(),
    })?;
    writer.flush().map_err(write_error)?;
    Ok(())
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

fn build_handle(path: PathBuf, document: Document) -> Result<PdfHandle, IoError> {
    let mut pages = Vec::new();
    for (number, id) in document.get_pages() {
        let media_box = inherited_attribute(&document, id, b"MediaBox").ok_or_else(|| {
            IoError::InvalidDocument(format!("page {number} has no MediaBox"))
        })?;
        let [x0, y0, x1, y1] = parse_box(&document, &media_box).ok_or_else(|| {
            IoError::InvalidDocument(format!("page {number} has a malformed MediaBox"))
        })?;
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (bottom, top) = (y0.min(y1), y0.max(y1));
        let geometry = PageGeometry::new(right - left, top - bottom).ok_or_else(|| {
            IoError::InvalidDocument(format!("page {number} has an empty MediaBox"))
        })?;
        pages.push(PageEntry {
            id,
            origin: (left, bottom),
            geometry,
        });
    }
    debug!(path = %path.display(), pages = pages.len(), "已打开 PDF");
    Ok(PdfHandle {
        path,
        document,
        pages,
        next_image: 0,
    })
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn parse_box(document: &Document, object: &Object) -> Option<[f64; 4]> {
    let array = resolve(document, object)?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = number(resolve(document, item)?)?;
    }
    Some(values)
}

/// 沿 `Parent` 链查找可继承的页面属性。
fn inherited_attribute(document: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = document.get_dictionary(page_id).ok()?;
    // 防止畸形文件中的循环引用
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_dictionary(parent).ok()?;
    }
    None
}

fn embed_rgba(document: &mut Document, image: &RgbaImage) -> ObjectId {
    let (width, height) = image.dimensions();
    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let smask_id = document.add_object(Stream::new(
        image_dictionary(width, height, b"DeviceGray"),
        alpha,
    ));
    let mut dict = image_dictionary(width, height, b"DeviceRGB");
    dict.set("SMask", Object::Reference(smask_id));
    document.add_object(Stream::new(dict, rgb))
}

fn image_dictionary(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(width)));
    dict.set("Height", Object::Integer(i64::from(height)));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

fn invalid(message: impl Into<String>) -> IoError {
    IoError::InvalidDocument(message.into())
}

/// 将图像登记到页面资源的 `/XObject` 字典中。
///
/// 内联或继承的资源字典会被提升为独立对象，之后统一按引用修改。
fn register_xobject(
    document: &mut Document,
    page_id: ObjectId,
    name: &str,
    image_id: ObjectId,
) -> Result<(), IoError> {
    let own_resources = document
        .get_dictionary(page_id)
        .map_err(|err| invalid(err.to_string()))?
        .get(b"Resources")
        .ok()
        .cloned();

    let resources_id = match own_resources {
        Some(Object::Reference(id)) => id,
        other => {
            let dict = match other {
                Some(Object::Dictionary(dict)) => dict,
                _ => match inherited_attribute(document, page_id, b"Resources") {
                    Some(object) => resolve(document, &object)
                        .and_then(|object| object.as_dict().ok())
                        .cloned()
                        .unwrap_or_default(),
                    None => Dictionary::new(),
                },
            };
            let id = document.add_object(Object::Dictionary(dict));
            document
                .get_dictionary_mut(page_id)
                .map_err(|err| invalid(err.to_string()))?
                .set("Resources", Object::Reference(id));
            id
        }
    };

    let xobject_ref = document
        .get_dictionary(resources_id)
        .map_err(|err| invalid(err.to_string()))?
        .get(b"XObject")
        .ok()
        .and_then(|object| object.as_reference().ok());

    let xobjects = match xobject_ref {
        Some(id) => document
            .get_dictionary_mut(id)
            .map_err(|err| invalid(err.to_string()))?,
        None => {
            let resources = document
                .get_dictionary_mut(resources_id)
                .map_err(|err| invalid(err.to_string()))?;
            if !matches!(resources.get(b"XObject"), Ok(Object::Dictionary(_))) {
                resources.set("XObject", Object::Dictionary(Dictionary::new()));
            }
            resources
                .get_mut(b"XObject")
                .and_then(Object::as_dict_mut)
                .map_err(|err| invalid(err.to_string()))?
        }
    };
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(image_id));
    Ok(())
}

/// 追加内容流。覆盖模式下原有内容被 `q`/`Q` 包裹，防止未闭合的图形状态影响印章。
fn append_content(
    document: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
    overlay: bool,
) -> Result<(), IoError> {
    let existing: Vec<Object> = match document
        .get_dictionary(page_id)
        .map_err(|err| invalid(err.to_string()))?
        .get(b"Contents")
    {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(items)) => items.clone(),
        Ok(_) => return Err(invalid("page Contents is neither a reference nor an array")),
        Err(_) => Vec::new(),
    };

    let stamp_id = document.add_object(Stream::new(Dictionary::new(), content));
    let mut contents = Vec::with_capacity(existing.len() + 3);
    if overlay {
        if !existing.is_empty() {
            let save_id = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let restore_id = document.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));
            contents.push(Object::Reference(save_id));
            contents.extend(existing);
            contents.push(Object::Reference(restore_id));
        }
        contents.push(Object::Reference(stamp_id));
    } else {
        contents.push(Object::Reference(stamp_id));
        contents.extend(existing);
    }

    document
        .get_dictionary_mut(page_id)
        .map_err(|err| invalid(err.to_string()))?
        .set("Contents", Object::Array(contents));
    Ok(())
}
