use console::style;
use similar::TextDiff;

const CONTEXT_LINES: usize = 3;

/// Unified diff between two versions of `file_path`, or an empty string when
/// they are identical.
pub fn unified_diff(old_content: &str, new_content: &str, file_path: &str) -> String {
    TextDiff::from_lines(old_content, new_content)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&format!("a/{file_path}"), &format!("b/{file_path}"))
        .to_string()
}

/// Styles each line of a unified diff: additions green, deletions red, hunk
/// headers cyan and file headers dimmed.
pub fn colorize_diff(unified: &str) -> String {
    unified
        .lines()
        .map(|line| {
            if line.starts_with("+++ ") || line.starts_with("--- ") {
                style(line).dim().to_string()
            } else if line.starts_with('+') {
                style(line).green().to_string()
            } else if line.starts_with('-') {
                style(line).red().to_string()
            } else if line.starts_with("@@") {
                style(line).cyan().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
