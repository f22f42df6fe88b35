use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Every directory under `root`, `root` included, in walk order.
pub fn collect_dirs(root: &Path) -> Vec<PathBuf> {
    walk(root)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Every regular file under `dir`, recursively, in walk order.
pub fn collect_files(dir: &Path) -> Vec<PathBuf> {
    walk(dir)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn walk(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
}

/// Lower-cased text after the final `.` of the file name.
pub fn file_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

pub fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in exts {
        let ext = ext
            .trim()
            .trim_matches('"')
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        if ext.is_empty() || out.contains(&ext) {
            continue;
        }
        out.push(ext);
    }
    out
}
