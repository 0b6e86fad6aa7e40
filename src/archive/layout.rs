//! On-disk layout of the content-addressed store
//!
//! Content lives at `<root>/by-<algorithm>/<h0>/<h1>/<hex>`, where `h0` and
//! `h1` are the first two hex characters of the digest. The path depends only
//! on `(algorithm, digest)`, which is what makes writes idempotent.

use crate::document::DigestAlgorithm;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Derives the storage path for a digest
pub fn content_path(root: &Path, algorithm: DigestAlgorithm, hex_digest: &str) -> PathBuf {
    let hex = hex_digest.to_ascii_lowercase();
    let first = hex.get(0..1).unwrap_or("_").to_string();
    let second = hex.get(1..2).unwrap_or("_").to_string();
    root.join(format!("by-{}", algorithm.name()))
        .join(first)
        .join(second)
        .join(hex)
}

/// Writes `content` to `path` unless a file is already there
///
/// The content is written to a uniquely named temporary file in the target
/// directory and renamed into place, so readers never observe a partial file.
/// Concurrent writers of the same digest race harmlessly: both rename
/// identical bytes onto the same path.
///
/// # Returns
///
/// * `Ok(true)` - The content was written by this call
/// * `Ok(false)` - The file already existed; nothing was written
pub fn write_if_absent(path: &Path, content: &[u8]) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "content path has no parent"))?;
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    Ok(true)
}
