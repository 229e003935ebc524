use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Environment variable overriding the default artifact root.
pub const ARTIFACT_ROOT_ENV: &str = "NFORGE_ARTIFACT_ROOT";

/// Returns the user's home directory, or the temp dir when none is set.
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var_os("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(std::env::temp_dir)
}

/// Returns the user's home directory, or the temp dir when none is set.
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var_os("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(std::env::temp_dir)
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  std::env::var_os("LOCALAPPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|| home_dir().join("AppData").join("Local"))
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Default location of the shared artifact store.
///
/// `NFORGE_ARTIFACT_ROOT` wins over the per-user cache directory.
pub fn default_artifact_root() -> PathBuf {
  match std::env::var_os(ARTIFACT_ROOT_ENV) {
    Some(root) if !root.is_empty() => PathBuf::from(root),
    _ => cache_dir().join("artifacts"),
  }
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn xdg_cache_home_takes_precedence() {
    temp_env::with_vars(
      [("XDG_CACHE_HOME", Some("/custom/cache")), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(cache_dir(), PathBuf::from("/custom/cache").join(APP_NAME));
      },
    );
  }

  #[test]
  #[serial]
  fn cache_falls_back_to_home() {
    temp_env::with_vars(
      [("XDG_CACHE_HOME", None::<&str>), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(cache_dir(), PathBuf::from("/home/user/.cache").join(APP_NAME));
      },
    );
  }

  #[test]
  #[serial]
  fn artifact_root_env_override() {
    temp_env::with_vars(
      [(ARTIFACT_ROOT_ENV, Some("/srv/artifacts")), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(default_artifact_root(), PathBuf::from("/srv/artifacts"));
      },
    );
    temp_env::with_vars(
      [
        (ARTIFACT_ROOT_ENV, None::<&str>),
        ("XDG_CACHE_HOME", None::<&str>),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(
          default_artifact_root(),
          PathBuf::from("/home/user/.cache").join(APP_NAME).join("artifacts")
        );
      },
    );
  }
}
