use crate::error::InkError;
use crate::perf::{PerfLogger, timed};
use crate::raster::{RenderTarget, render_page_png};
use crate::source::PageSource;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 200;
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/png";
pub const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=60";

/// Identifies one cached thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// `None` when the page source reports no owning container.
    pub container_id: Option<String>,
    pub page_id: String,
}

impl CacheKey {
    pub fn new(container_id: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            container_id: Some(container_id.into()),
            page_id: page_id.into(),
        }
    }

    pub fn unowned(page_id: impl Into<String>) -> Self {
        Self {
            container_id: None,
            page_id: page_id.into(),
        }
    }

    /// `<container>/<page>.png`, each id passed through `encode_segment`.
    pub fn relative_path(&self) -> PathBuf {
        let container = match &self.container_id {
            Some(id) => encode_segment(id),
            None => UNOWNED_CONTAINER_SEGMENT.to_string(),
        };
        Path::new(&container).join(format!("{}.png", encode_segment(&self.page_id)))
    }
}

/// Directory for pages whose source reports no owning container.
///
/// `_u` is never produced by `encode_segment`, so no real container id maps here.
pub const UNOWNED_CONTAINER_SEGMENT: &str = "_unowned";

/// One-to-one, filesystem-safe rendering of an id.
///
/// ASCII letters, digits and `-` pass through, `_` doubles to `__` and every other byte
/// becomes `_XX` in upper-case hex. The empty id is `_`.
fn encode_segment(raw: &str) -> String {
    if raw.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' => out.push(char::from(byte)),
            b'_' => out.push_str("__"),
            _ => out.push_str(&format!("_{byte:02X}")),
        }
    }
    out
}

/// Backing store for thumbnail bytes.
///
/// `write` must replace an entry as a whole: a concurrent `read` sees either the old or the
/// new bytes, never a mix. `remove` reports whether an entry existed.
pub trait CacheStorage: Send + Sync {
    fn read(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>>;
    fn write(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()>;
    fn remove(&self, key: &CacheKey) -> io::Result<bool>;
}

/// One PNG file per page under a root directory.
#[derive(Debug, Clone)]
pub struct FsCacheStorage {
    root: PathBuf,
}

impl FsCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

impl CacheStorage for FsCacheStorage {
    fn read(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir)?;
        // Same directory as the target so the final rename stays on one filesystem.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> io::Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    entries: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> io::Error {
    io::Error::other("thumbnail cache lock poisoned")
}

impl CacheStorage for MemoryCacheStorage {
    fn read(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> io::Result<bool> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.remove(key).is_some())
    }
}

/// Bytes plus the headers a caller should send with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailResponse {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub cache_control: &'static str,
    pub etag: String,
}

/// Per-page thumbnail cache: `uncached <-> cached`, keyed by the page's owning container.
pub struct ThumbnailCache<S: CacheStorage> {
    pages: Arc<dyn PageSource>,
    storage: S,
    width: u32,
    perf: Option<PerfLogger>,
}

impl<S: CacheStorage> ThumbnailCache<S> {
    pub fn new(pages: Arc<dyn PageSource>, storage: S) -> Self {
        Self {
            pages,
            storage,
            width: DEFAULT_THUMBNAIL_WIDTH,
            perf: None,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn with_perf(mut self, perf: Option<PerfLogger>) -> Self {
        self.perf = perf;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn key_for(&self, page_id: &str) -> CacheKey {
        match self.pages.page_owner_container(page_id) {
            Some(container_id) => CacheKey::new(container_id, page_id),
            None => CacheKey::unowned(page_id),
        }
    }

    /// Existing cache bytes; never renders.
    pub fn get_cached(&self, page_id: &str) -> Result<Option<Vec<u8>>, InkError> {
        Ok(self.storage.read(&self.key_for(page_id))?)
    }

    /// Renders at the configured width, overwrites the cache entry and returns the bytes.
    pub fn generate_and_cache(&self, page_id: &str) -> Result<Option<Vec<u8>>, InkError> {
        let Some(strokes) = self.pages.strokes(page_id) else {
            return Ok(None);
        };
        let key = self.key_for(page_id);
        let target = RenderTarget::fit_width(self.width);
        let bytes = timed(self.perf.as_ref(), "thumbnail.render", Some(page_id), || {
            render_page_png(&strokes, &target)
        })?;
        self.storage.write(&key, &bytes)?;
        log::debug!(
            "cached thumbnail for page {page_id} at {} ({} bytes)",
            key.relative_path().display(),
            bytes.len()
        );
        Ok(Some(bytes))
    }

    /// Drops the cache entry; a no-op for uncached or unknown pages.
    pub fn invalidate(&self, page_id: &str) -> Result<(), InkError> {
        if self.storage.remove(&self.key_for(page_id))? {
            log::debug!("invalidated thumbnail for page {page_id}");
        }
        Ok(())
    }

    /// Cached bytes when present, otherwise generated ones. `None` for unknown pages.
    pub fn serve(&self, page_id: &str) -> Result<Option<ThumbnailResponse>, InkError> {
        let bytes = match self.get_cached(page_id)? {
            Some(bytes) => bytes,
            None => match self.generate_and_cache(page_id)? {
                Some(bytes) => bytes,
                None => return Ok(None),
            },
        };
        let etag = etag_for(&bytes);
        Ok(Some(ThumbnailResponse {
            bytes,
            content_type: THUMBNAIL_CONTENT_TYPE,
            cache_control: THUMBNAIL_CACHE_CONTROL,
            etag,
        }))
    }
}

/// Strong entity tag: quoted hex SHA-256.
pub fn etag_for(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}
