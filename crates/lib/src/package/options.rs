//! Package options, build variants and the option fingerprint.
//!
//! Options are typed where the orchestrator understands them (`shared`) and
//! fall back to a map of scalar values for everything recipe-specific. The
//! mapping from options to build-tool flags is a pure function so it can be
//! checked without running a tool.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::package::types::{BuildKind, PackageDescriptor};
use crate::platform::Platform;
use crate::util::hash::{HashError, Hashable, ObjectHash};

/// A scalar option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
  Bool(bool),
  Int(i64),
  Str(String),
}

impl OptionValue {
  /// Rendering used for `-D` definitions: booleans become `ON`/`OFF`.
  pub fn to_flag_value(&self) -> String {
    match self {
      Self::Bool(true) => "ON".to_string(),
      Self::Bool(false) => "OFF".to_string(),
      Self::Int(i) => i.to_string(),
      Self::Str(s) => s.clone(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub shared: Option<bool>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, OptionValue>,
}

/// Build configuration, mapped onto `CMAKE_BUILD_TYPE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
  Debug,
  #[default]
  Release,
  RelWithDebInfo,
  MinSizeRel,
}

impl BuildVariant {
  pub fn cmake_name(&self) -> &'static str {
    match self {
      Self::Debug => "Debug",
      Self::Release => "Release",
      Self::RelWithDebInfo => "RelWithDebInfo",
      Self::MinSizeRel => "MinSizeRel",
    }
  }

  /// Lowercase identifier used in directory names.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debug => "debug",
      Self::Release => "release",
      Self::RelWithDebInfo => "relwithdebinfo",
      Self::MinSizeRel => "minsizerel",
    }
  }
}

impl fmt::Display for BuildVariant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for BuildVariant {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "debug" => Ok(Self::Debug),
      "release" => Ok(Self::Release),
      "relwithdebinfo" => Ok(Self::RelWithDebInfo),
      "minsizerel" => Ok(Self::MinSizeRel),
      other => Err(format!("unknown build variant '{other}'")),
    }
  }
}

#[derive(Serialize)]
#[serde(untagged)]
enum FingerprintInput<'a> {
  HeaderOnly {
    header_only: bool,
  },
  Compiled {
    options: &'a PackageOptions,
    platform: Platform,
    variant: BuildVariant,
    requires: Vec<String>,
  },
}

impl Hashable for FingerprintInput<'_> {}

/// Fingerprint of everything that changes a package's built output.
///
/// Header-only packages produce the same tree for every configuration, so
/// their fingerprint ignores options, platform and variant.
pub fn option_fingerprint(
  descriptor: &PackageDescriptor,
  platform: Platform,
  variant: BuildVariant,
) -> Result<ObjectHash, HashError> {
  let input = if descriptor.is_header_only() {
    FingerprintInput::HeaderOnly { header_only: true }
  } else {
    FingerprintInput::Compiled {
      options: &descriptor.options,
      platform,
      variant,
      requires: descriptor.requires.iter().map(|r| r.id().to_string()).collect(),
    }
  };
  input.compute_hash()
}

/// Map a descriptor's options to CMake configure arguments.
///
/// Emits, in order: the build type, the shared-library toggle (if the package
/// has a `shared` option), each extra option, the recipe's fixed definitions,
/// and `CMAKE_PREFIX_PATH` listing dependency artifacts. Non-CMake packages
/// get no arguments.
pub fn cmake_args(descriptor: &PackageDescriptor, variant: BuildVariant, dependency_prefixes: &[PathBuf]) -> Vec<String> {
  let BuildKind::CMake {
    definitions,
    shared_flag,
    option_flags,
  } = &descriptor.build
  else {
    return Vec::new();
  };

  let mut args = vec![format!("-DCMAKE_BUILD_TYPE={}", variant.cmake_name())];

  if let Some(shared) = descriptor.options.shared {
    let flag = shared_flag.as_deref().unwrap_or("BUILD_SHARED_LIBS");
    args.push(format!("-D{}={}", flag, OptionValue::Bool(shared).to_flag_value()));
  }

  for (name, value) in &descriptor.options.extra {
    let flag = option_flags
      .get(name)
      .cloned()
      .unwrap_or_else(|| name.to_ascii_uppercase());
    args.push(format!("-D{}={}", flag, value.to_flag_value()));
  }

  for (name, value) in definitions {
    args.push(format!("-D{name}={value}"));
  }

  if !dependency_prefixes.is_empty() {
    let joined = dependency_prefixes
      .iter()
      .map(|p| p.to_string_lossy().replace('\\', "/"))
      .collect::<Vec<_>>()
      .join(";");
    args.push(format!("-DCMAKE_PREFIX_PATH={joined}"));
  }

  args
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::arch::Arch;
  use crate::platform::os::Os;

  fn linux() -> Platform {
    Platform::new(Arch::X86_64, Os::Linux)
  }

  fn spdlog() -> PackageDescriptor {
    let mut descriptor = PackageDescriptor::new("spdlog", "1.10.0");
    descriptor.options.shared = Some(false);
    descriptor.options.extra.insert("wchar_api".into(), OptionValue::Bool(false));
    descriptor.build = BuildKind::CMake {
      definitions: BTreeMap::from([("SPDLOG_BUILD_EXAMPLE".to_string(), "OFF".to_string())]),
      shared_flag: Some("SPDLOG_BUILD_SHARED".to_string()),
      option_flags: BTreeMap::new(),
    };
    descriptor
  }

  #[test]
  fn options_parse_typed_and_extra() {
    let options: PackageOptions = toml::from_str("shared = true\nwchar_filename = false\nlevel = 3\nmode = \"fast\"").unwrap();
    assert_eq!(options.shared, Some(true));
    assert_eq!(options.extra["wchar_filename"], OptionValue::Bool(false));
    assert_eq!(options.extra["level"], OptionValue::Int(3));
    assert_eq!(options.extra["mode"], OptionValue::Str("fast".into()));
  }

  #[test]
  fn cmake_args_map_options_to_flags() {
    let args = cmake_args(&spdlog(), BuildVariant::Debug, &[PathBuf::from("/a"), PathBuf::from("/b")]);
    assert_eq!(
      args,
      vec![
        "-DCMAKE_BUILD_TYPE=Debug",
        "-DSPDLOG_BUILD_SHARED=OFF",
        "-DWCHAR_API=OFF",
        "-DSPDLOG_BUILD_EXAMPLE=OFF",
        "-DCMAKE_PREFIX_PATH=/a;/b",
      ]
    );
  }

  #[test]
  fn option_flags_rename_extra_options() {
    let mut descriptor = spdlog();
    descriptor.options.extra.insert("wchar_filename".into(), OptionValue::Bool(true));
    if let BuildKind::CMake { option_flags, .. } = &mut descriptor.build {
      option_flags.insert("wchar_api".into(), "SPDLOG_WCHAR_SUPPORT".into());
      option_flags.insert("wchar_filename".into(), "SPDLOG_WCHAR_FILENAMES".into());
    }
    let args = cmake_args(&descriptor, BuildVariant::Release, &[]);
    assert!(args.contains(&"-DSPDLOG_WCHAR_SUPPORT=OFF".to_string()));
    assert!(args.contains(&"-DSPDLOG_WCHAR_FILENAMES=ON".to_string()));
    assert!(!args.iter().any(|a| a.starts_with("-DWCHAR_")));
  }

  #[test]
  fn shared_defaults_to_build_shared_libs() {
    let mut descriptor = PackageDescriptor::new("vulkanrenderer", "0.1.0");
    descriptor.options.shared = Some(true);
    let args = cmake_args(&descriptor, BuildVariant::Release, &[]);
    assert_eq!(args, vec!["-DCMAKE_BUILD_TYPE=Release", "-DBUILD_SHARED_LIBS=ON"]);
  }

  #[test]
  fn header_only_has_no_cmake_args() {
    let mut descriptor = PackageDescriptor::new("glm", "0.9.9.8");
    descriptor.build = BuildKind::HeaderOnly;
    assert!(cmake_args(&descriptor, BuildVariant::Release, &[]).is_empty());
  }

  #[test]
  fn fingerprint_changes_with_options_and_variant() {
    let base = option_fingerprint(&spdlog(), linux(), BuildVariant::Release).unwrap();
    assert_eq!(base, option_fingerprint(&spdlog(), linux(), BuildVariant::Release).unwrap());
    assert_ne!(base, option_fingerprint(&spdlog(), linux(), BuildVariant::Debug).unwrap());

    let mut shared = spdlog();
    shared.options.shared = Some(true);
    assert_ne!(base, option_fingerprint(&shared, linux(), BuildVariant::Release).unwrap());

    let windows = Platform::new(Arch::X86_64, Os::Windows);
    assert_ne!(base, option_fingerprint(&spdlog(), windows, BuildVariant::Release).unwrap());
  }

  #[test]
  fn header_only_fingerprint_ignores_configuration() {
    let mut glm = PackageDescriptor::new("glm", "0.9.9.8");
    glm.build = BuildKind::HeaderOnly;
    let windows = Platform::new(Arch::X86_64, Os::Windows);
    assert_eq!(
      option_fingerprint(&glm, linux(), BuildVariant::Release).unwrap(),
      option_fingerprint(&glm, windows, BuildVariant::Debug).unwrap()
    );
  }

  #[test]
  fn variant_round_trips_through_str() {
    assert_eq!("RelWithDebInfo".parse::<BuildVariant>().unwrap(), BuildVariant::RelWithDebInfo);
    assert!("fastest".parse::<BuildVariant>().is_err());
  }
}
