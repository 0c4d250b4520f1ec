use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_QUARANTINE_DIR_NAME: &str = "duplicate_pics";

/// Copies `source` into `quarantine_dir`, creating the directory if needed.
///
/// The source is never moved or removed. An existing file of the same name in
/// the quarantine is left alone and the copy gets a ` (n)` suffix instead.
pub fn copy_to_quarantine(source: &Path, quarantine_dir: &Path) -> Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        Error::InvalidArgument(format!("not a file path: {}", source.to_string_lossy()))
    })?;
    fs::create_dir_all(quarantine_dir)?;

    let dest = unique_destination(quarantine_dir, file_name);
    fs::copy(source, &dest)?;
    Ok(dest)
}

fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1u32;
    loop {
        let numbered = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
