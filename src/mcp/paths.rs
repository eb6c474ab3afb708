use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{EvalError, EvalResult};

/// Resolve `requested` against `root` and require the canonical result to stay inside it.
///
/// `root` must already be canonical. Missing targets are rejected the same way as
/// escapes so a caller can never probe for files outside the project.
pub fn resolve_within(root: &Path, requested: &str) -> EvalResult<PathBuf> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Err(EvalError::InvalidPath("empty path".into()));
    }

    let candidate = {
        let p = Path::new(requested);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            root.join(p)
        }
    };

    let canonical = candidate
        .canonicalize()
        .map_err(|_| EvalError::InvalidPath(format!("{} does not exist", requested)))?;

    if !canonical.starts_with(root) {
        warn!("Rejected path outside project root: {}", requested);
        return Err(EvalError::InvalidPath(format!(
            "{} resolves outside the project root",
            requested
        )));
    }

    Ok(canonical)
}

/// Project-relative display form with forward slashes
pub fn relative_display(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Exclusion is matched on components below `root` only
pub fn is_excluded(root: &Path, path: &Path, exclude_list: &[String]) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|component| match component {
        Component::Normal(name) => name
            .to_str()
            .map(|n| exclude_list.iter().any(|e| e == n))
            .unwrap_or(false),
        _ => false,
    })
}

/// All files under `dir`, sorted by path, skipping excluded directories
pub fn walk_files(root: &Path, dir: &Path, exclude: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(root, e.path(), exclude))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Walk error: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files
}

/// Indented `[DIR]`/`[FILE]` listing of `dir`, at most `max_depth` levels deep
pub fn render_tree(root: &Path, dir: &Path, max_depth: usize, exclude: &[String]) -> String {
    let mut lines = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(root, e.path(), exclude))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Walk error: {}", e);
                continue;
            }
        };

        let indent = "  ".repeat(entry.depth() - 1);
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            lines.push(format!("{}[DIR] {}/", indent, name));
        } else {
            lines.push(format!("{}[FILE] {}", indent, name));
        }
    }

    lines.join("\n")
}
