use std::path::{Path, PathBuf};

use crate::core::errors::{AppError, AppResult};
use crate::ingest::folder::{classify, RawFile};

/// Reads every accepted file under `root`. Paths are made relative to the
/// parent of `root`, so files directly inside it group under its own name.
pub fn scan_directory(root: &Path) -> AppResult<Vec<RawFile>> {
    if !root.is_dir() {
        return Err(AppError::NotFound(format!(
            "input directory {}",
            root.display()
        )));
    }
    // `.` and `..` have no usable parent until resolved.
    let root = root.canonicalize()?;
    let base = root.parent().unwrap_or(&root).to_path_buf();

    let mut paths = Vec::new();
    collect_files(&root, &mut paths)?;
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let relative = relative_path(&base, &path);
        if classify(&relative, None).is_none() {
            continue;
        }
        let bytes = std::fs::read(&path)
            .map_err(|err| AppError::Io(format!("cannot read {}: {err}", path.display())))?;
        files.push(RawFile::new(relative, bytes));
    }
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> AppResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_path(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
