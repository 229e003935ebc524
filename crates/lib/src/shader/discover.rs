use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::shader::{CompileError, CompileStatus, ShaderError, ShaderStage, ShaderWorkItem};

/// Find shader sources under `media_dir`, sorted by path.
///
/// Each source maps to `<output_dir>/<stem><StageTag>.spv`. When two sources
/// map to the same output, the later one is returned already failed so no
/// output is written twice.
pub fn discover(media_dir: &Path, output_dir: &Path) -> Result<Vec<ShaderWorkItem>, ShaderError> {
  if !media_dir.is_dir() {
    return Err(ShaderError::MissingMediaDir(media_dir.to_path_buf()));
  }

  let mut items = Vec::new();
  let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

  for entry in WalkDir::new(media_dir).sort_by_file_name() {
    let entry = entry.map_err(|e| ShaderError::Scan {
      path: media_dir.to_path_buf(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let path = entry.path();
    let Some(stage) = path
      .extension()
      .and_then(|ext| ext.to_str())
      .and_then(ShaderStage::from_extension)
    else {
      continue;
    };
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
      continue;
    };

    let output = output_dir.join(format!("{stem}{}.spv", stage.tag()));
    let status = match claimed.get(&output) {
      Some(first) => {
        let err = CompileError::OutputClaimed {
          output: output.clone(),
          claimed_by: first.clone(),
        };
        warn!(source = ?path, error = %err, "skipping shader");
        CompileStatus::Failed(err.to_string())
      }
      None => {
        claimed.insert(output.clone(), path.to_path_buf());
        CompileStatus::Pending
      }
    };

    items.push(ShaderWorkItem {
      source: path.to_path_buf(),
      output,
      stage,
      status,
    });
  }

  debug!(media_dir = ?media_dir, count = items.len(), "discovered shaders");
  Ok(items)
}
