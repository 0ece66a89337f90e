use std::fs;
use std::path::Path;

/// Names of the non-hidden data files in a store directory (hint files and
/// reader snapshots excluded).
pub fn data_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(|s| s.to_owned()))
        .filter(|n| !n.starts_with('.') && !n.starts_with("hintfile") && !n.starts_with("keydir"))
        .collect();
    names.sort();
    names
}

pub fn count_data_files(dir: &Path) -> usize {
    data_file_names(dir).len()
}

pub fn count_with_prefix(dir: &Path, prefix: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(|s| s.to_owned()))
        .filter(|n| n.starts_with(prefix))
        .count()
}

pub fn count_hint_files(dir: &Path) -> usize {
    count_with_prefix(dir, "hintfile")
}

pub fn count_snapshot_files(dir: &Path) -> usize {
    count_with_prefix(dir, "keydir")
}
