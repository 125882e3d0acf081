//! File-oriented writeback plumbing
//!
//! File modules lock the target URL for the duration of the update and tell
//! the miner to pause re-indexing of the subject before touching the file.
//! The lock table is process wide and advisory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, RwLock};

use lazy_static::lazy_static;

use crate::storage::MetadataStore;
use crate::writeback::module::Writeback;
use crate::writeback::{Cancellation, WritebackRows};

struct FileLockTable {
    locked: Mutex<HashSet<String>>,
    released: Condvar,
}

lazy_static! {
    static ref FILE_LOCKS: FileLockTable = FileLockTable {
        locked: Mutex::new(HashSet::new()),
        released: Condvar::new(),
    };
    static ref MINER_NOTIFIER: RwLock<Arc<dyn MinerNotifier>> =
        RwLock::new(Arc::new(LoggingMinerNotifier));
}

/// Advisory lock on one file URL. Released on drop.
pub struct FileLock {
    url: String,
}

impl FileLock {
    /// Block until the URL is free, then take the lock
    pub fn acquire(url: &str) -> FileLock {
        let mut locked = FILE_LOCKS.locked.lock().unwrap();
        while locked.contains(url) {
            locked = FILE_LOCKS.released.wait(locked).unwrap();
        }
        locked.insert(url.to_string());
        FileLock {
            url: url.to_string(),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let mut locked = FILE_LOCKS.locked.lock().unwrap();
        locked.remove(&self.url);
        FILE_LOCKS.released.notify_all();
    }
}

/// Seam towards the miner: file modules announce the subjects they are about
/// to rewrite so re-indexing pauses for them.
pub trait MinerNotifier: Send + Sync {
    fn notify_writeback(&self, subjects: &[String]);
}

struct LoggingMinerNotifier;

impl MinerNotifier for LoggingMinerNotifier {
    fn notify_writeback(&self, subjects: &[String]) {
        tracing::debug!("pausing indexing for {subjects:?}");
    }
}

/// Replace the process-wide miner notifier
pub fn set_miner_notifier(notifier: Arc<dyn MinerNotifier>) {
    *MINER_NOTIFIER.write().unwrap() = notifier;
}

fn miner_notifier() -> Arc<dyn MinerNotifier> {
    MINER_NOTIFIER.read().unwrap().clone()
}

/// The file-module side of the writeback contract
pub trait FileWriteback: Send {
    fn write_file_metadata(
        &mut self,
        path: &Path,
        rows: &WritebackRows,
        store: &MetadataStore,
        cancellation: &Cancellation,
    ) -> bool;
}

/// Adapts a [`FileWriteback`] to the module contract: resolves the first
/// row's URL, takes the advisory lock, pauses the miner, then delegates.
pub struct FileWritebackHost<W: FileWriteback> {
    inner: W,
}

impl<W: FileWriteback> FileWritebackHost<W> {
    pub fn new(inner: W) -> Self {
        FileWritebackHost { inner }
    }
}

impl<W: FileWriteback> Writeback for FileWritebackHost<W> {
    fn update_metadata(
        &mut self,
        rows: &WritebackRows,
        store: &MetadataStore,
        cancellation: &Cancellation,
    ) -> bool {
        let Some(url) = rows.first().and_then(|row| row.first()) else {
            tracing::warn!("writeback request carried no rows");
            return false;
        };
        let Some(path) = file_path_from_uri(url) else {
            tracing::warn!("writeback target is not a file URL: {url}");
            return false;
        };

        let _lock = FileLock::acquire(url);
        miner_notifier().notify_writeback(std::slice::from_ref(url));

        self.inner
            .write_file_metadata(&path, rows, store, cancellation)
    }
}

/// Turn a `file://` URL into a filesystem path
pub fn file_path_from_uri(url: &str) -> Option<PathBuf> {
    let path = url.strip_prefix("file://")?;
    Some(PathBuf::from(percent_decode(path)))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Best-effort content type from a URL's extension; `None` when unknown
pub fn guess_content_type(url: &str) -> Option<&'static str> {
    let extension = url.rsplit('.').next()?.to_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "tif" | "tiff" => Some("image/tiff"),
        "gif" => Some("image/gif"),
        "mp3" => Some("audio/mpeg"),
        "ogg" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "m3u" => Some("audio/x-mpegurl"),
        "m3u8" => Some("application/vnd.apple.mpegurl"),
        "pls" => Some("audio/x-scpls"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_from_uri() {
        assert_eq!(
            file_path_from_uri("file:///tmp/a.jpg"),
            Some(PathBuf::from("/tmp/a.jpg"))
        );
        assert_eq!(
            file_path_from_uri("file:///tmp/with%20space.jpg"),
            Some(PathBuf::from("/tmp/with space.jpg"))
        );
        assert_eq!(file_path_from_uri("http://example.org/a.jpg"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("file:///a/b.png"), Some("image/png"));
        assert_eq!(guess_content_type("file:///a/b.JPG"), Some("image/jpeg"));
        assert_eq!(guess_content_type("file:///a/b.weird"), None);
    }

    #[test]
    fn test_lock_round_trip() {
        let url = "file:///tmp/locked.bin";
        {
            let _lock = FileLock::acquire(url);
            assert!(FILE_LOCKS.locked.lock().unwrap().contains(url));
        }
        assert!(!FILE_LOCKS.locked.lock().unwrap().contains(url));
    }
}
