use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Case-insensitive extension check; `extensions` are given without the dot
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Files under `root` with a matching extension, sorted by name.
/// Only the top level unless `recursive`.
pub fn collect_files(root: &Path, extensions: &[String], recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    let walker = if recursive { walker } else { walker.max_depth(1) };

    walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, extensions))
        .collect()
}

/// Same relative location under `output_root` as `path` has under `input_root`
pub fn mirror_path(input_root: &Path, output_root: &Path, path: &Path) -> PathBuf {
    let relative = pathdiff::diff_paths(path, input_root)
        .filter(|rel| !rel.starts_with(".."))
        .or_else(|| path.file_name().map(PathBuf::from))
        .unwrap_or_default();
    output_root.join(relative)
}
