//! Packaging: copy rules, library discovery and artifact description.

use std::collections::BTreeSet;
use std::path::Path;

use glob::{MatchOptions, Pattern};
use tracing::debug;
use walkdir::WalkDir;

use crate::artifact::Artifact;
use crate::lifecycle::types::ToolError;
use crate::package::{CopyRule, PackageDescriptor};
use crate::platform::os::Os;

/// Compiled copy-rule patterns. `*` is allowed to cross directory separators.
pub struct CopyPatterns {
  patterns: Vec<Pattern>,
}

impl CopyPatterns {
  const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
  };

  pub fn new(patterns: &[String]) -> Result<Self, ToolError> {
    let patterns = patterns
      .iter()
      .map(|p| {
        Pattern::new(p).map_err(|e| ToolError::InvalidPattern {
          pattern: p.clone(),
          message: e.msg.to_string(),
        })
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { patterns })
  }

  /// True when no patterns were given or any pattern matches `rel`.
  pub fn matches(&self, rel: &Path) -> bool {
    self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches_path_with(rel, Self::OPTIONS))
  }
}

/// Apply one copy rule from `source_root` into `stage`. Returns files copied.
pub fn apply_copy_rule(
  rule: &CopyRule,
  descriptor: &PackageDescriptor,
  source_root: &Path,
  stage: &Path,
) -> Result<usize, ToolError> {
  let patterns = CopyPatterns::new(&rule.patterns)?;
  let from = source_root.join(descriptor.expand(&rule.from));
  let to = stage.join(descriptor.expand(&rule.to));
  if !from.exists() {
    return Err(ToolError::MissingSource(from));
  }

  let mut copied = 0;
  let walker = WalkDir::new(&from).follow_links(true).into_iter().filter_entry(|e| {
    e.depth() == 0
      || !e.file_type().is_dir()
      || !rule.exclude.iter().any(|ex| e.file_name().to_string_lossy() == ex.as_str())
  });

  for entry in walker {
    let entry = entry.map_err(std::io::Error::other)?;
    if !entry.file_type().is_file() {
      continue;
    }
    let rel = entry.path().strip_prefix(&from).map_err(std::io::Error::other)?;
    if !patterns.matches(rel) {
      continue;
    }

    let target = to.join(rel);
    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(entry.path(), &target)?;
    copied += 1;
  }

  debug!(package = %descriptor.id(), from = ?from, to = ?to, copied, "applied copy rule");
  Ok(copied)
}

/// Library names found in `lib_dir`, as a linker would spell them.
///
/// `libfoo.a`, `libfoo.so.1.2` and `foo.lib` all yield `foo`. Sorted, no duplicates.
pub fn collect_libs(lib_dir: &Path, os: Os) -> Vec<String> {
  let mut names = BTreeSet::new();
  let Ok(entries) = std::fs::read_dir(lib_dir) else {
    return Vec::new();
  };

  for entry in entries.flatten() {
    let file_name = entry.file_name().to_string_lossy().into_owned();
    for ext in os.library_extensions() {
      let needle = format!(".{ext}");
      let Some(pos) = file_name.find(&needle) else {
        continue;
      };
      let suffix = &file_name[pos + needle.len()..];
      // Versioned shared objects: libfoo.so.1.2
      if !(suffix.is_empty() || suffix.starts_with('.')) {
        continue;
      }
      let stem = &file_name[..pos];
      let name = match os {
        Os::Windows => stem,
        Os::Linux | Os::MacOs => stem.strip_prefix("lib").unwrap_or(stem),
      };
      if !name.is_empty() {
        names.insert(name.to_string());
      }
      break;
    }
  }

  names.into_iter().collect()
}

/// Describe the packaged tree rooted at `package_dir`.
pub fn describe_artifact(package_dir: &Path, descriptor: &PackageDescriptor, os: Os) -> Artifact {
  let mut artifact = Artifact::new(package_dir);

  let include = package_dir.join("include");
  if include.is_dir() {
    artifact.include_dirs.insert(include);
  }
  let lib = package_dir.join("lib");
  if lib.is_dir() {
    artifact.lib_dirs.insert(lib.clone());
  }

  artifact.libs = match descriptor.link.declared_for(os) {
    Some(libs) => libs.to_vec(),
    None if descriptor.is_header_only() => Vec::new(),
    None => collect_libs(&lib, os),
  };
  artifact
}
