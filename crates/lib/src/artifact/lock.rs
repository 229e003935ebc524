//! Advisory lock on an artifact root.
//!
//! Builds take the lock exclusively; read-only commands take it shared.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LOCK_FILENAME: &str = ".lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum ArtifactLockError {
  #[error(
    "artifact root is locked by another process: {command} (PID {pid}, started at unix time {started_at_unix})\n\
     If no nforge process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "artifact root is locked (could not read lock metadata)\n\
     If no nforge process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create artifact root: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Held for as long as the value lives; released on drop.
#[derive(Debug)]
pub struct ArtifactRootLock {
  file: File,
  lock_path: PathBuf,
}

impl ArtifactRootLock {
  pub fn acquire(root: &Path, mode: LockMode, command: &str) -> Result<Self, ArtifactLockError> {
    std::fs::create_dir_all(root).map_err(ArtifactLockError::CreateDir)?;
    let lock_path = root.join(LOCK_FILENAME);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(ArtifactLockError::OpenFile)?;

    if let Err(err) = try_lock(&file, mode) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(contention_error(&lock_path));
      }
      return Err(ArtifactLockError::LockFailed(err));
    }

    if mode == LockMode::Exclusive {
      write_metadata(&file, command, root)?;
    }

    debug!(path = ?lock_path, ?mode, "artifact root locked");
    Ok(Self { file, lock_path })
  }

  /// Read the metadata through the held handle (a second handle would fail on
  /// Windows, where locks are mandatory).
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, command: &str, root: &Path) -> Result<(), ArtifactLockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    command: command.to_string(),
    root: root.to_path_buf(),
  };

  file.set_len(0).map_err(ArtifactLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  writer.seek(SeekFrom::Start(0)).map_err(ArtifactLockError::WriteMetadata)?;
  serde_json::to_writer_pretty(&mut writer, &metadata)
    .map_err(|e| ArtifactLockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(ArtifactLockError::WriteMetadata)?;
  Ok(())
}

fn contention_error(lock_path: &Path) -> ArtifactLockError {
  if let Ok(contents) = std::fs::read_to_string(lock_path)
    && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
  {
    return ArtifactLockError::Contention {
      command: metadata.command,
      pid: metadata.pid,
      started_at_unix: metadata.started_at_unix,
      lock_path: lock_path.to_path_buf(),
    };
  }

  ArtifactLockError::ContentionUnknown {
    lock_path: lock_path.to_path_buf(),
  }
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = match mode {
    LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
    LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is owned by `file`.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn exclusive_lock_writes_metadata() {
    let temp = TempDir::new().unwrap();
    let lock = ArtifactRootLock::acquire(temp.path(), LockMode::Exclusive, "build").unwrap();

    assert!(lock.lock_path().exists());
    let metadata = lock.read_metadata().unwrap();
    assert_eq!(metadata.version, 1);
    assert_eq!(metadata.command, "build");
    assert_eq!(metadata.pid, std::process::id());
  }

  #[test]
  fn shared_locks_coexist() {
    let temp = TempDir::new().unwrap();
    let first = ArtifactRootLock::acquire(temp.path(), LockMode::Shared, "status").unwrap();
    let second = ArtifactRootLock::acquire(temp.path(), LockMode::Shared, "graph").unwrap();
    assert_eq!(first.lock_path(), second.lock_path());
  }

  #[cfg(unix)]
  #[test]
  fn exclusive_lock_reports_contention() {
    let temp = TempDir::new().unwrap();
    let _held = ArtifactRootLock::acquire(temp.path(), LockMode::Exclusive, "build").unwrap();

    let err = ArtifactRootLock::acquire(temp.path(), LockMode::Exclusive, "build").unwrap_err();
    assert!(matches!(err, ArtifactLockError::Contention { command, .. } if command == "build"));
  }

  #[test]
  fn lock_released_on_drop() {
    let temp = TempDir::new().unwrap();
    {
      let _lock = ArtifactRootLock::acquire(temp.path(), LockMode::Exclusive, "first").unwrap();
    }
    ArtifactRootLock::acquire(temp.path(), LockMode::Exclusive, "second").unwrap();
  }
}
