//! Image cache — decode once per path, hand out shared handles.
//!
//! Both outcomes are memoized: a path that failed to decode stays failed
//! until [`ImageCache::invalidate`], so a broken file referenced by a slot
//! costs one decode attempt per session, not one per frame.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageError, RgbaImage};
use thiserror::Error;

/// Why a source image could not be decoded.  Always recoverable: the caller
/// treats the slot as having no image and draws the remaining layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("image not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported or corrupt image: {0}")]
    InvalidFormat(PathBuf),
}

/// Per-path decode memo.  Single-threaded renders use it directly; embedders
/// with multiple render threads wrap it in the `Arc<Mutex<_>>` the pipelines
/// already share, which serializes decode-and-insert.
#[derive(Default)]
pub struct ImageCache {
    entries: HashMap<PathBuf, Result<Arc<RgbaImage>, DecodeError>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded image for `path`.  Decodes at most once per distinct path
    /// until invalidated; repeated calls return the same handle.
    pub fn get(&mut self, path: &Path) -> Result<Arc<RgbaImage>, DecodeError> {
        if let Some(entry) = self.entries.get(path) {
            return entry.clone();
        }

        let result = decode(path);
        match &result {
            Ok(img) => {
                log_info!(
                    "decoded {} ({}x{})",
                    path.display(),
                    img.width(),
                    img.height()
                );
            }
            Err(e) => log_warn!("decode failed: {}", e),
        }
        self.entries.insert(path.to_path_buf(), result.clone());
        result
    }

    /// Drop the memo for `path`; the next `get` re-decodes.  Returns whether
    /// an entry existed.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let existed = self.entries.remove(path).is_some();
        if existed {
            log_info!("invalidated decode cache for {}", path.display());
        }
        existed
    }

    /// Drop every memo (e.g. on wholesale preset replacement).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode(path: &Path) -> Result<Arc<RgbaImage>, DecodeError> {
    let img = image::open(path).map_err(|e| match e {
        ImageError::IoError(ref io) if io.kind() == ErrorKind::NotFound => {
            DecodeError::NotFound(path.to_path_buf())
        }
        _ => DecodeError::InvalidFormat(path.to_path_buf()),
    })?;

    let rgba = img.to_rgba8();
    // A zero-dimension decode is as unusable as a corrupt one.
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(DecodeError::InvalidFormat(path.to_path_buf()));
    }
    Ok(Arc::new(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chromaskin_cache_{}_{}", std::process::id(), name))
    }

    fn write_test_png(path: &Path) {
        let img = RgbaImage::from_pixel(6, 4, Rgba([10, 20, 30, 255]));
        img.save(path).expect("write test png");
    }

    #[test]
    fn missing_path_is_not_found() {
        let mut cache = ImageCache::new();
        let err = cache
            .get(Path::new("/definitely/not/here.png"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn corrupt_file_is_invalid_format() {
        let path = temp_path("corrupt.png");
        fs::write(&path, b"this is not a png").unwrap();
        let mut cache = ImageCache::new();
        let err = cache.get(&path).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFormat(_)));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn repeated_get_returns_same_handle() {
        let path = temp_path("memo.png");
        write_test_png(&path);
        let mut cache = ImageCache::new();
        let first = cache.get(&path).unwrap();
        let second = cache.get(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn failures_are_memoized_until_invalidated() {
        let path = temp_path("late.png");
        fs::remove_file(&path).ok();

        let mut cache = ImageCache::new();
        assert!(cache.get(&path).is_err());

        // The file appears after the failed attempt: still the memoized
        // failure until the caller invalidates.
        write_test_png(&path);
        assert!(cache.get(&path).is_err());

        assert!(cache.invalidate(&path));
        assert!(cache.get(&path).is_ok());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn invalidate_unknown_path_reports_absence() {
        let mut cache = ImageCache::new();
        assert!(!cache.invalidate(Path::new("/nope.png")));
    }
}
