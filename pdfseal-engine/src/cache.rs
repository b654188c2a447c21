use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use pdfseal_io::{ImageCodec, IoError, RgbaImage};
use tracing::{debug, trace};

/// 图像缓存的底层存储。
pub trait CacheStorage {
    /// 查找并刷新该条目的使用顺序。
    fn get(&mut self, path: &Path) -> Option<Arc<RgbaImage>>;
    /// 写入条目，返回因容量不足被淘汰的路径。
    fn insert(&mut self, path: PathBuf, image: Arc<RgbaImage>) -> Option<PathBuf>;
    fn remove(&mut self, path: &Path) -> bool;
    fn contains(&self, path: &Path) -> bool;
    fn len(&self) -> usize;
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 基于 `LruCache` 的默认存储；容量为 0 时不保存任何条目。
#[derive(Debug)]
pub struct LruStorage {
    entries: Option<LruCache<PathBuf, Arc<RgbaImage>>>,
}

impl LruStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.cap().get())
    }
}

impl CacheStorage for LruStorage {
    fn get(&mut self, path: &Path) -> Option<Arc<RgbaImage>> {
        self.entries.as_mut()?.get(path).cloned()
    }

    fn insert(&mut self, path: PathBuf, image: Arc<RgbaImage>) -> Option<PathBuf> {
        let entries = self.entries.as_mut()?;
        let (previous, _) = entries.push(path.clone(), image)?;
        (previous != path).then_some(previous)
    }

    fn remove(&mut self, path: &Path) -> bool {
        self.entries
            .as_mut()
            .is_some_and(|entries| entries.pop(path).is_some())
    }

    fn contains(&self, path: &Path) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.contains(path))
    }

    fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// 按路径缓存已解码的印章图像，超出容量时淘汰最久未使用的条目。
///
/// 由组合根持有并显式传入合成流程。
#[derive(Debug)]
pub struct ImageCache<S = LruStorage> {
    storage: S,
    stats: CacheStats,
}

impl ImageCache<LruStorage> {
    pub fn new(capacity: usize) -> Self {
        Self::with_storage(LruStorage::new(capacity))
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }
}

impl<S: CacheStorage> ImageCache<S> {
    pub fn with_storage(storage: S) -> Self {
        Self {
            storage,
            stats: CacheStats::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.storage.contains(path)
    }

    /// 命中则返回缓存图像，否则通过解码器加载并写入缓存。
    pub fn get_or_load<C: ImageCodec + ?Sized>(
        &mut self,
        path: &Path,
        codec: &C,
    ) -> Result<Arc<RgbaImage>, IoError> {
        if let Some(image) = self.storage.get(path) {
            self.stats.hits += 1;
            trace!(path = %path.display(), "图像缓存命中");
            return Ok(image);
        }

        self.stats.misses += 1;
        let image = Arc::new(codec.load(path)?);
        if let Some(evicted) = self.storage.insert(path.to_path_buf(), Arc::clone(&image)) {
            self.stats.evictions += 1;
            debug!(path = %evicted.display(), "图像缓存淘汰");
        }
        Ok(image)
    }

    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.storage.remove(path)
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }
}
