//! Locked reads and atomic replacement of data files.
//!
//! Writers fill a temp file in the target's directory, sync it and rename it
//! over the target, so readers see either the old or the new contents.
//! Load-modify-save sequences additionally hold a sidecar `<file>.lock`.

use crate::{Error, Result};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Read a whole file under a shared lock
pub(crate) fn read_locked(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;
    Ok(contents)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Replace `path` with whatever `write` puts into a fresh temp file
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&File) -> Result<()>,
{
    let parent = parent_dir(path);
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;
    write(temp.as_file())?;
    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Replace `path` with `value` as pretty-printed JSON
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |file| {
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    })
}

/// Exclusive lock on `<path>.lock`, released on drop
pub(crate) struct SidecarLock {
    file: File,
}

impl SidecarLock {
    /// Block until no other holder has the lock for `path`
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        let lock_path = Self::path_for(path);
        std::fs::create_dir_all(parent_dir(&lock_path))?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    pub(crate) fn path_for(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        path.with_file_name(name)
    }
}

impl Drop for SidecarLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release lock file: {}", e);
        }
    }
}
