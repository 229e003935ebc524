//! Source retrieval.
//!
//! The executor only sees the [`SourceFetcher`] trait. [`DefaultFetcher`]
//! downloads archives over HTTP(S) with optional SHA-256 verification and a
//! download cache, and clones git repositories with `gix`.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::lifecycle::archive::unpack_archive;
use crate::lifecycle::types::ToolError;
use crate::util::hash::hash_file;

/// A source that has to be retrieved before it can be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSource {
  Archive { url: String, sha256: Option<String> },
  /// `rev` names a branch or tag; `None` checks out the remote HEAD.
  Git { url: String, rev: Option<String> },
}

impl RemoteSource {
  pub fn url(&self) -> &str {
    match self {
      Self::Archive { url, .. } | Self::Git { url, .. } => url,
    }
  }
}

/// Retrieves sources into a directory.
///
/// `dest` does not exist yet; on success it holds the unpacked tree.
pub trait SourceFetcher: Send + Sync + 'static {
  fn fetch(&self, source: &RemoteSource, dest: &Path) -> impl Future<Output = Result<(), ToolError>> + Send;
}

#[derive(Debug, Clone)]
pub struct DefaultFetcher {
  downloads_dir: PathBuf,
}

impl DefaultFetcher {
  pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
    Self {
      downloads_dir: downloads_dir.into(),
    }
  }

  /// Download `url` into the download cache and return the cached file.
  ///
  /// A cached file whose hash matches `expected_sha256` is reused.
  async fn download(&self, url: &str, expected_sha256: Option<&str>) -> Result<PathBuf, ToolError> {
    tokio::fs::create_dir_all(&self.downloads_dir).await?;
    let dest_path = self.downloads_dir.join(url_to_filename(url));

    if let Some(expected) = expected_sha256
      && dest_path.exists()
    {
      match hash_file(&dest_path) {
        Ok(actual) if actual.0.eq_ignore_ascii_case(expected) => {
          info!(path = ?dest_path, "using cached download");
          return Ok(dest_path);
        }
        Ok(actual) => debug!(expected = %expected, actual = %actual, "cached download hash mismatch, re-downloading"),
        Err(e) => debug!(error = %e, "cannot hash cached download, re-downloading"),
      }
    }

    info!(url = %url, "downloading");
    let download_err = |message: String| ToolError::Download {
      url: url.to_string(),
      message,
    };

    let response = reqwest::get(url).await.map_err(|e| download_err(e.to_string()))?;
    if !response.status().is_success() {
      return Err(download_err(format!("HTTP {}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| download_err(e.to_string()))?;

    let actual = hex::encode(Sha256::digest(&bytes));
    if let Some(expected) = expected_sha256
      && !actual.eq_ignore_ascii_case(expected)
    {
      return Err(ToolError::HashMismatch {
        url: url.to_string(),
        expected: expected.to_string(),
        actual,
      });
    }

    let downloads_dir = self.downloads_dir.clone();
    let target = dest_path.clone();
    let size = bytes.len();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
      let mut temp = tempfile::NamedTempFile::new_in(&downloads_dir)?;
      temp.write_all(&bytes)?;
      temp.persist(&target).map_err(|e| e.error)?;
      Ok(())
    })
    .await
    .map_err(std::io::Error::other)??;

    info!(path = ?dest_path, size, "download complete");
    Ok(dest_path)
  }
}

impl SourceFetcher for DefaultFetcher {
  async fn fetch(&self, source: &RemoteSource, dest: &Path) -> Result<(), ToolError> {
    match source {
      RemoteSource::Archive { url, sha256 } => {
        let archive = self.download(url, sha256.as_deref()).await?;
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_archive(&archive, &dest))
          .await
          .map_err(std::io::Error::other)?
      }
      RemoteSource::Git { url, rev } => {
        let (url, rev, dest) = (url.clone(), rev.clone(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || clone_repo(&url, rev.as_deref(), &dest))
          .await
          .map_err(std::io::Error::other)?
      }
    }
  }
}

/// Clone `url` into `dest`, checking out `rev` when given.
fn clone_repo(url: &str, rev: Option<&str>, dest: &Path) -> Result<(), ToolError> {
  let git_err = |message: String| ToolError::Git {
    url: url.to_string(),
    message,
  };

  info!(url = %url, rev = ?rev, "cloning");
  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| git_err(e.to_string()))?;
  if let Some(rev) = rev {
    prepared = prepared
      .with_ref_name(Some(rev))
      .map_err(|e| git_err(format!("invalid ref '{rev}': {e}")))?;
  }

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| git_err(e.to_string()))?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| git_err(e.to_string()))?;

  let mut head = repo.head().map_err(|e| git_err(e.to_string()))?;
  let commit = head.peel_to_commit().map_err(|e| git_err(e.to_string()))?;
  debug!(url = %url, commit = %commit.id, "checked out");
  Ok(())
}

/// Convert a URL to a safe cache filename.
///
/// Uses the last path segment; falls back to a hash of the URL.
fn url_to_filename(url: &str) -> String {
  if let Some(segment) = url.rsplit('/').next() {
    let segment = segment.split(['?', '#']).next().unwrap_or(segment);
    let sanitized: String = segment
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      // Prefix a short URL hash so equal names from different hosts do not collide.
      let digest = hex::encode(Sha256::digest(url.as_bytes()));
      return format!("{}-{}", &digest[..8], sanitized);
    }
  }

  let digest = hex::encode(Sha256::digest(url.as_bytes()));
  format!("download_{}", &digest[..16])
}
