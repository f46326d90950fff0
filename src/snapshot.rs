use crate::ignore_patterns::{IgnorePatterns, relative_path};
use anyhow::Result;
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Lists every non-ignored path under `root` in one traversal: directories end in
/// `/`, files carry their size. With `snippet_max_lines > 0` each text file is
/// followed by an indented excerpt of its first lines.
pub fn build_snapshot(
    root: &Path,
    patterns: &IgnorePatterns,
    snippet_max_lines: usize,
) -> Result<String> {
    let mut structure = String::new();

    for entry in patterns.walker(root).build() {
        let entry = entry?;
        let Some(relative) = relative_path(root, entry.path()) else {
            continue;
        };
        if patterns.matches(&relative) {
            continue;
        }

        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        if is_dir {
            writeln!(structure, "{relative}/")?;
            continue;
        }

        let size = entry.metadata()?.len();
        writeln!(structure, "{relative} ({size} bytes)")?;

        if snippet_max_lines > 0 {
            if let Some(excerpt) = excerpt(entry.path(), snippet_max_lines) {
                structure.push_str(&excerpt);
            }
        }
    }

    Ok(structure)
}

fn excerpt(path: &Path, max_lines: usize) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    if content.is_empty() {
        return None;
    }
    let mut excerpt = String::new();
    let mut lines = content.lines();
    for line in lines.by_ref().take(max_lines) {
        excerpt.push_str("    ");
        excerpt.push_str(line);
        excerpt.push('\n');
    }
    if lines.next().is_some() {
        excerpt.push_str("    ...\n");
    }
    Some(excerpt)
}
