//! Unpacking of downloaded source archives (`.zip`, `.tar.gz`, `.tgz`).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::lifecycle::types::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
  Zip,
  TarGz,
}

fn detect_kind(path: &Path) -> Option<ArchiveKind> {
  let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
  if name.ends_with(".zip") {
    Some(ArchiveKind::Zip)
  } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    Some(ArchiveKind::TarGz)
  } else {
    None
  }
}

/// Unpack `archive` into `dest`, creating `dest` if needed.
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<(), ToolError> {
  let archive_err = |message: String| ToolError::Archive {
    path: archive.to_path_buf(),
    message,
  };

  let kind = detect_kind(archive).ok_or_else(|| archive_err("unsupported archive format".to_string()))?;
  std::fs::create_dir_all(dest)?;
  let file = BufReader::new(File::open(archive)?);

  debug!(archive = ?archive, dest = ?dest, ?kind, "unpacking");
  match kind {
    ArchiveKind::Zip => {
      let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;
      zip.extract(dest).map_err(|e| archive_err(e.to_string()))
    }
    ArchiveKind::TarGz => {
      let mut tar = tar::Archive::new(GzDecoder::new(file));
      tar.unpack(dest).map_err(|e| archive_err(e.to_string()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::TempDir;

  #[test]
  fn detects_kinds() {
    assert_eq!(detect_kind(Path::new("glfw-3.3.4.zip")), Some(ArchiveKind::Zip));
    assert_eq!(detect_kind(Path::new("spdlog-1.10.0.TAR.GZ")), Some(ArchiveKind::TarGz));
    assert_eq!(detect_kind(Path::new("x.tgz")), Some(ArchiveKind::TarGz));
    assert_eq!(detect_kind(Path::new("x.rar")), None);
  }

  #[test]
  fn unpacks_tar_gz() {
    let temp = TempDir::new().unwrap();
    let archive_path = temp.path().join("spdlog-1.10.0.tar.gz");
    {
      let encoder = flate2::write::GzEncoder::new(File::create(&archive_path).unwrap(), flate2::Compression::default());
      let mut builder = tar::Builder::new(encoder);
      let data = b"cmake_minimum_required(VERSION 3.10)\n";
      let mut header = tar::Header::new_gnu();
      header.set_size(data.len() as u64);
      header.set_mode(0o644);
      header.set_cksum();
      builder
        .append_data(&mut header, "spdlog-1.10.0/CMakeLists.txt", &data[..])
        .unwrap();
      builder.into_inner().unwrap().finish().unwrap();
    }

    let dest = temp.path().join("src");
    unpack_archive(&archive_path, &dest).unwrap();
    assert!(dest.join("spdlog-1.10.0/CMakeLists.txt").exists());
  }

  #[test]
  fn unpacks_zip() {
    let temp = TempDir::new().unwrap();
    let archive_path = temp.path().join("glm-0.9.9.8.zip");
    {
      let mut writer = zip::ZipWriter::new(File::create(&archive_path).unwrap());
      writer
        .start_file("glm/glm.hpp", zip::write::SimpleFileOptions::default())
        .unwrap();
      writer.write_all(b"#pragma once\n").unwrap();
      writer.finish().unwrap();
    }

    let dest = temp.path().join("src");
    unpack_archive(&archive_path, &dest).unwrap();
    assert_eq!(std::fs::read_to_string(dest.join("glm/glm.hpp")).unwrap(), "#pragma once\n");
  }

  #[test]
  fn rejects_unknown_format() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("source.rar");
    std::fs::write(&path, b"data").unwrap();
    assert!(matches!(
      unpack_archive(&path, &temp.path().join("out")),
      Err(ToolError::Archive { .. })
    ));
  }
}
