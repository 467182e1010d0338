use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Source files under `roots` whose extension is in `extensions`
/// (case-insensitive), walked recursively in file-name order. Roots that do
/// not exist are logged and skipped.
pub fn discover(roots: &[PathBuf], extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        if !root.exists() {
            warn!(root = %root.display(), "source root does not exist, skipping");
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name().into_iter() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "unreadable entry, skipping");
                    continue;
                }
            };
            if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                files.push(entry.into_path());
            }
        }
    }
    files
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}
