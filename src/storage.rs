//! Byte sources for a database image.
//!
//! A database is either fully buffered in memory (raw bytes, a file read in
//! one go, an HTTP download) or memory-mapped from a local file so the page
//! cache serves sparse reads on demand. Both expose the same immutable slice.
//!
//! # Safety
//!
//! A memory map is only sound while nobody truncates or rewrites the file
//! underneath it. Databases are rebuilt offline and swapped in with a rename,
//! which leaves the mapped inode intact, so a mapped image stays valid for
//! its whole lifetime.

use memmap2::Mmap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Distinguishes temp files of concurrent writers within one process
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Storage for a database image - either owned or memory-mapped
pub enum Storage {
    /// Fully buffered image
    Owned(Vec<u8>),
    /// Read-only mapping of a local file
    Mmap(Mmap),
}

impl Storage {
    /// Read a whole file into an owned buffer
    pub fn read<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Storage::Owned(std::fs::read(path)?))
    }

    /// Memory-map a file read-only
    pub fn map<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and database files are replaced by
        // rename, never modified in place (see module docs).
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Storage::Mmap(mmap))
    }

    /// The whole image
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mmap(m) => &m[..],
        }
    }

    /// Image size in bytes
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the image is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this image is memory-mapped
    pub fn is_mapped(&self) -> bool {
        matches!(self, Storage::Mmap(_))
    }
}

impl From<Vec<u8>> for Storage {
    fn from(bytes: Vec<u8>) -> Self {
        Storage::Owned(bytes)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("size", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// Write `bytes` to `path` so readers never observe a partial file.
///
/// The bytes go to a sibling temp file which is synced and then renamed over
/// the destination. Parent directories are created as needed. Each call uses
/// its own temp file, so concurrent writers never clobber each other's
/// partial output; the last rename wins.
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_sibling(path);
    let written = File::create(&tmp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });

    if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    sync_parent_dir(path)
}

/// `<path>.<pid>.<n>.tmp`, unique per call
fn temp_sibling(path: &Path) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.{}.tmp", std::process::id(), n));
    PathBuf::from(name)
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                File::open(parent)?.sync_all()?;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
