//! Host-keyed disk cache for resolved icons.
//!
//! One file per host under the cache directory, named by the host alone;
//! the content-type of a hit is sniffed from the bytes at read time, so
//! entries stay correct even if classification changes between writes.
//! Writes go to a `.part` temp file and are renamed into place, so a
//! concurrent reader never observes a partial file; the last writer wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::mime;

/// Temporary file suffix used before atomic rename.
const TEMP_SUFFIX: &str = ".part";

/// Metadata for a cached icon file, derived from a stat.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub length: u64,
    /// File mtime as an HTTP date; doubles as the `Last-Modified` header.
    pub last_modified: String,
    /// Keyed hash of the mtime; changes on every re-write without hashing
    /// the content.
    pub etag: String,
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    etag_salt: String,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, etag_salt: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            etag_salt: etag_salt.into(),
        }
    }

    /// Create the cache directory. Startup fails if this does.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create cache directory: {}", self.dir.display()))?;
        Ok(())
    }

    pub fn path_for(&self, host: &str) -> PathBuf {
        self.dir.join(file_name_for_host(host))
    }

    /// Look up the entry for a host. A miss (or an unstattable file) is
    /// `None`, never an error.
    pub fn lookup(&self, host: &str) -> Option<CacheEntry> {
        let path = self.path_for(host);
        if !path.exists() {
            return None;
        }
        match self.entry_for(&path) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cache entry unreadable");
                None
            }
        }
    }

    /// Write icon bytes for a host, replacing any prior entry, and return
    /// the fresh metadata. Write-to-temp-then-rename keeps the swap atomic.
    pub fn write(&self, host: &str, bytes: &[u8]) -> Result<CacheEntry> {
        let path = self.path_for(host);
        let temp = temp_path(&path);

        fs::write(&temp, bytes)
            .with_context(|| format!("cannot write cache temp file: {}", temp.display()))?;
        fs::rename(&temp, &path).with_context(|| {
            format!("cannot rename {} to {}", temp.display(), path.display())
        })?;

        self.entry_for(&path)
    }

    /// Read the bytes for a hit, along with a freshly sniffed content-type.
    pub fn read(&self, entry: &CacheEntry) -> Result<(Vec<u8>, &'static str)> {
        let bytes = fs::read(&entry.path)
            .with_context(|| format!("cannot read cache file: {}", entry.path.display()))?;
        let content_type = mime::sniff_or_default(&bytes);
        Ok((bytes, content_type))
    }

    /// Remove the entry for a host, if any. Returns whether a file was removed.
    pub fn remove(&self, host: &str) -> Result<bool> {
        let path = self.path_for(host);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("cannot remove cache file: {}", path.display()))?;
        Ok(true)
    }

    fn entry_for(&self, path: &Path) -> Result<CacheEntry> {
        let meta = fs::metadata(path)
            .with_context(|| format!("cannot stat cache file: {}", path.display()))?;
        let mtime = meta.modified().context("filesystem has no mtime")?;
        let last_modified = http_date(mtime);
        let etag = etag_for(&last_modified, &self.etag_salt);
        Ok(CacheEntry {
            path: path.to_path_buf(),
            length: meta.len(),
            last_modified,
            etag,
        })
    }
}

/// RFC 7231 IMF-fixdate, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`.
fn http_date(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn etag_for(last_modified: &str, salt: &str) -> String {
    let digest = Sha256::digest(format!("{last_modified}{salt}").as_bytes());
    hex::encode(digest)
}

/// Hosts come from parsed URLs so they are already constrained, but keep
/// the filename safe regardless.
fn file_name_for_host(host: &str) -> String {
    host.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

    fn cache() -> (tempfile::TempDir, DiskCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "salt");
        cache.ensure_dir().unwrap();
        (dir, cache)
    }

    #[test]
    fn write_then_read_roundtrip() {
        let (_dir, cache) = cache();
        let entry = cache.write("www.example.com", PNG).unwrap();
        assert_eq!(entry.length, PNG.len() as u64);

        let hit = cache.lookup("www.example.com").unwrap();
        assert_eq!(hit.length, PNG.len() as u64);
        assert_eq!(hit.etag, entry.etag);

        let (bytes, content_type) = cache.read(&hit).unwrap();
        assert_eq!(bytes, PNG);
        assert_eq!(content_type, "image/png");
    }

    #[test]
    fn lookup_miss_is_none() {
        let (_dir, cache) = cache();
        assert!(cache.lookup("nothing.example").is_none());
    }

    #[test]
    fn write_replaces_prior_entry() {
        let (_dir, cache) = cache();
        cache.write("h.example", b"old-bytes-here").unwrap();
        cache.write("h.example", PNG).unwrap();
        let hit = cache.lookup("h.example").unwrap();
        let (bytes, _) = cache.read(&hit).unwrap();
        assert_eq!(bytes, PNG);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let (dir, cache) = cache();
        cache.write("h.example", PNG).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn etag_is_keyed_by_salt() {
        let dir = tempfile::tempdir().unwrap();
        let a = DiskCache::new(dir.path(), "salt-a");
        let b = DiskCache::new(dir.path(), "salt-b");
        a.ensure_dir().unwrap();
        let entry = a.write("h.example", PNG).unwrap();
        let other = b.lookup("h.example").unwrap();
        assert_eq!(entry.last_modified, other.last_modified);
        assert_ne!(entry.etag, other.etag);
    }

    #[test]
    fn sniffed_type_ignores_write_time_claims() {
        // Bytes decide the served type, whatever the fetch reported.
        let (_dir, cache) = cache();
        cache.write("h.example", b"GIF89a......").unwrap();
        let hit = cache.lookup("h.example").unwrap();
        let (_, content_type) = cache.read(&hit).unwrap();
        assert_eq!(content_type, "image/gif");
    }

    #[test]
    fn unknown_bytes_sniff_to_ico() {
        let (_dir, cache) = cache();
        cache.write("h.example", b"not-an-image").unwrap();
        let hit = cache.lookup("h.example").unwrap();
        let (_, content_type) = cache.read(&hit).unwrap();
        assert_eq!(content_type, "image/x-icon");
    }

    #[test]
    fn host_names_are_sanitized() {
        assert_eq!(file_name_for_host("www.example.com"), "www.example.com");
        assert_eq!(file_name_for_host("[::1]"), "_::1_".replace(':', "_"));
        assert_eq!(file_name_for_host("a/b\\c"), "a_b_c");
    }

    #[test]
    fn remove_reports_presence() {
        let (_dir, cache) = cache();
        assert!(!cache.remove("h.example").unwrap());
        cache.write("h.example", PNG).unwrap();
        assert!(cache.remove("h.example").unwrap());
        assert!(cache.lookup("h.example").is_none());
    }
}
