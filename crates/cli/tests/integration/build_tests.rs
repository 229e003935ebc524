//! Build command integration tests, run against shell-script stand-ins for
//! `cmake` and `glslc`.

#![cfg(unix)]

use predicates::prelude::*;

use super::common::TestEnv;

const MATHLIB: &str = r#"
name = "mathlib"
version = "1.0"

[source]
type = "path"
path = "vendor/mathlib"
"#;

const GLM: &str = r#"
name = "glm"
version = "0.9.9.8"

[source]
type = "path"
path = "vendor/glm-{version}"

[build]
kind = "header_only"

[[package]]
from = "glm"
to = "include/glm"
patterns = ["*.hpp"]
"#;

fn renderer() -> TestEnv {
  let env = TestEnv::new("name = \"renderer\"\nversion = \"0.1.0\"\nrequires = [\"mathlib/1.0\", \"glm/0.9.9.8\"]");
  env.write_file("recipes/mathlib/1.0.toml", MATHLIB);
  env.write_file("recipes/glm/0.9.9.8.toml", GLM);
  env.write_file("vendor/mathlib/CMakeLists.txt", "project(mathlib)\n");
  env.write_file("vendor/glm-0.9.9.8/glm/glm.hpp", "#pragma once\n");
  env.write_file("vendor/glm-0.9.9.8/glm/README.md", "docs\n");
  env.write_file("CMakeLists.txt", "project(renderer)\n");
  env.write_file("media/shaders/triangle.vert", "#version 450\n");
  env.write_file("media/shaders/triangle.frag", "#version 450\n");
  env
}

#[test]
fn build_publishes_dependencies_and_installs_the_project() {
  let env = renderer();

  env
    .nforge_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("mathlib/1.0 (built)"))
    .stdout(predicate::str::contains("glm/0.9.9.8 (built)"))
    .stdout(predicate::str::contains("Compiled 2 shader(s)"))
    .stdout(predicate::str::contains("Build complete"));

  assert!(env.store_path().join("index.json").exists());

  let install = env.install_path();
  assert!(install.join("include").join("fake.h").exists());
  assert!(install.join("bin").join("triangleVert.spv").exists());
  assert!(install.join("bin").join("triangleFrag.spv").exists());

  let configure_log = std::fs::read_to_string(env.path().join("build/release/configure.log")).unwrap();
  assert!(configure_log.contains("-DCMAKE_BUILD_TYPE=Release"));
  assert!(configure_log.contains("-DCMAKE_PREFIX_PATH="));
}

#[test]
fn header_only_packages_follow_copy_rules() {
  let env = renderer();

  env.nforge_cmd().args(["build", "--skip-shaders"]).assert().success();

  let index = std::fs::read_to_string(env.store_path().join("index.json")).unwrap();
  assert!(index.contains("glm"));

  let versions = env.store_path().join("packages").join("glm").join("0.9.9.8");
  let glm_dir = std::fs::read_dir(&versions)
    .unwrap()
    .map(|e| e.unwrap().path())
    .next()
    .expect("glm package directory");
  assert!(glm_dir.join("include/glm/glm.hpp").exists());
  assert!(!glm_dir.join("include/glm/README.md").exists());
}

#[test]
fn second_build_reuses_published_artifacts() {
  let env = renderer();

  env.nforge_cmd().args(["build", "--skip-shaders"]).assert().success();

  env
    .nforge_cmd()
    .args(["build", "--skip-shaders"])
    .assert()
    .success()
    .stdout(predicate::str::contains("mathlib/1.0 (reused)"))
    .stdout(predicate::str::contains("glm/0.9.9.8 (reused)"));

  env
    .nforge_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("2 published"));

  env
    .nforge_cmd()
    .args(["status", "--verbose"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Artifact index:"))
    .stdout(predicate::str::contains("glm/0.9.9.8-"))
    .stdout(predicate::str::contains("mathlib/1.0-"));

  let output = env.nforge_cmd().args(["status", "--json"]).output().unwrap();
  let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(status["artifacts"].as_array().unwrap().len(), 2);
  assert_eq!(status["artifacts"][0]["key"]["name"], "glm");
}

#[test]
fn failing_dependency_skips_its_dependents() {
  let env = renderer();
  std::fs::remove_dir_all(env.path().join("vendor/mathlib")).unwrap();

  env
    .nforge_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("mathlib/1.0 failed during fetch"))
    .stderr(predicate::str::contains("renderer/0.1.0 skipped"));

  assert!(!env.install_path().join("bin").exists());
}

#[test]
fn broken_shader_fails_the_build_but_keeps_the_others() {
  let env = renderer();
  env.write_file("media/shaders/broken.frag", "not glsl\n");

  env
    .nforge_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("1 of 3 shader(s) failed"));

  let bin = env.install_path().join("bin");
  assert!(bin.join("triangleVert.spv").exists());
  assert!(bin.join("triangleFrag.spv").exists());
  assert!(!bin.join("brokenFrag.spv").exists());
}

#[test]
fn shaders_command_compiles_without_building() {
  let env = renderer();

  env
    .nforge_cmd()
    .arg("shaders")
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiled: 2"));

  assert!(env.install_path().join("bin").join("triangleVert.spv").exists());
  assert!(!env.store_path().join("index.json").exists());
}

#[test]
fn build_json_report() {
  let env = renderer();

  let output = env
    .nforge_cmd()
    .args(["build", "--skip-shaders", "--json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["schedule"]["published"].as_array().unwrap().len(), 3);
  assert!(report["shaders"].is_null());
  assert_eq!(report["plan"]["nodes"][2]["role"], "project");
}
