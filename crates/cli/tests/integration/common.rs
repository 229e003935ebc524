//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Stand-in for `cmake`: records configure calls and installs one header and
/// one library on `--install`.
pub const FAKE_CMAKE: &str = r#"#!/bin/sh
set -e
case "$1" in
  --build)
    echo "build $2" >> "$2/build.log"
    ;;
  --install)
    mkdir -p "$4/include" "$4/lib"
    echo "// fake" > "$4/include/fake.h"
    : > "$4/lib/libfake.a"
    ;;
  *)
    echo "$@" >> "$(pwd)/configure.log"
    ;;
esac
"#;

/// Stand-in for `glslc`: copies the source to the output, failing for any
/// source whose name contains `broken`.
pub const FAKE_GLSLC: &str = r#"#!/bin/sh
case "$1" in
  *broken*)
    echo "$1: error: syntax error" >&2
    exit 1
    ;;
esac
cp "$1" "$3"
"#;

/// Isolated project directory with fake tools.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  /// Create a project whose `forge.toml` has the given `[project]` table
  /// body, pointing tools at the fake scripts and the artifact root inside
  /// the temp directory.
  pub fn new(project: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("forge.toml");
    let content = format!(
      "[project]\n{project}\n\n\
       [build]\nplatform = \"x86_64-linux\"\njobs = 2\nartifact_root = \"store\"\n\n\
       [tools]\ncmake = \"tools/cmake\"\n\n\
       [shaders]\ncompiler = \"tools/glslc\"\n"
    );
    std::fs::write(&config_path, content).unwrap();

    let env = Self { temp, config_path };
    env.write_script("tools/cmake", FAKE_CMAKE);
    env.write_script("tools/glslc", FAKE_GLSLC);
    env
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  fn write_script(&self, relative_path: &str, content: &str) {
    self.write_file(relative_path, content);
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      let path = self.temp.path().join(relative_path);
      std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
  }

  /// Artifact root used by the project.
  pub fn store_path(&self) -> PathBuf {
    let p = self.temp.path().join("store");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Installed project tree for the default variant.
  pub fn install_path(&self) -> PathBuf {
    let p = self.temp.path().join("build").join("release").join("install");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Get a Command for the nforge binary bound to this project.
  pub fn nforge_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("nforge");
    cmd.arg("--config").arg(&self.config_path);
    cmd.env_remove("NFORGE_ARTIFACT_ROOT");
    cmd
  }
}
