//! Filesystem helpers shared by the lifecycle executor and the artifact index.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Write `contents` to `path` atomically (temp file + rename).
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
  let file_name = path
    .file_name()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
  let temp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(&temp_path, contents)?;
  fs::rename(&temp_path, path)
}

/// Remove a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Symlinks are copied as the files they point to.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
  fs::create_dir_all(dst)?;

  for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::copy(entry.path(), &target)?;
    }
  }

  Ok(())
}

/// Move a directory, falling back to copy + delete when a rename is not possible
/// (e.g. across filesystems). Any existing `dst` is replaced.
pub fn move_dir(src: &Path, dst: &Path) -> io::Result<()> {
  remove_dir_if_exists(dst)?;
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent)?;
  }

  if fs::rename(src, dst).is_ok() {
    return Ok(());
  }

  copy_dir_all(src, dst)?;
  remove_dir_if_exists(src)
}

/// Total size in bytes of all regular files below `path`.
pub fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}
