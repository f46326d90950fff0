//! # Ignore Patterns
//!
//! Glob rules that keep paths out of the project structure listing and out of
//! `get_file_contents`. The set is the union of a built-in list, the user's
//! `~/.errandignore` and every `.errandignore` found in the project, where the
//! patterns of a nested file are rooted at that file's directory.

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

pub const IGNORE_FILE_NAME: &str = ".errandignore";

const DEFAULT_PATTERNS: &[&str] = &[
    ".git",
    ".git/**",
    ".idea/**",
    "**/.*ignore",
    "LICENSE",
    "Cargo.lock",
    "go.sum",
    "target",
    "target/**",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternOrigin {
    Default,
    Home,
    /// A project ignore file; the value is its directory relative to the root.
    Directory(String),
}

#[derive(Clone, Debug)]
pub struct IgnorePattern {
    pub glob: String,
    pub origin: PatternOrigin,
}

#[derive(Clone, Debug)]
pub struct IgnorePatterns {
    patterns: Vec<IgnorePattern>,
    set: GlobSet,
}

impl IgnorePatterns {
    /// Loads the full pattern set for the project at `root`, including the
    /// override file in the user's home directory.
    pub fn load(root: &Path) -> Result<Self> {
        let home_file = dirs::home_dir().map(|home| home.join(IGNORE_FILE_NAME));
        Self::load_with_home(root, home_file.as_deref())
    }

    pub fn load_with_home(root: &Path, home_file: Option<&Path>) -> Result<Self> {
        let mut patterns: Vec<IgnorePattern> = DEFAULT_PATTERNS
            .iter()
            .map(|glob| IgnorePattern {
                glob: glob.to_string(),
                origin: PatternOrigin::Default,
            })
            .collect();

        if let Some(home_file) = home_file.filter(|path| path.is_file()) {
            for glob in read_ignore_file(home_file) {
                patterns.push(IgnorePattern {
                    glob,
                    origin: PatternOrigin::Home,
                });
            }
        }

        // Directories excluded by the defaults or the home file are never searched
        // for project ignore files.
        let base = Self::from_patterns(patterns.clone());
        for ignore_file in base.find_ignore_files(root) {
            let dir = parent_dir(&ignore_file);
            let file_patterns = read_ignore_file(&root.join(&ignore_file));
            debug!(file = %ignore_file, count = file_patterns.len(), "loaded ignore file");
            for glob in file_patterns {
                let rooted = if dir.is_empty() {
                    glob
                } else {
                    format!("{dir}/{}", glob.trim_start_matches('/'))
                };
                patterns.push(IgnorePattern {
                    glob: rooted,
                    origin: PatternOrigin::Directory(dir.clone()),
                });
            }
        }

        Ok(Self::from_patterns(patterns))
    }

    /// Builds a matcher from explicit patterns. Globs that fail to compile are
    /// dropped with a warning rather than failing the whole set.
    pub fn from_patterns(patterns: Vec<IgnorePattern>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            match GlobBuilder::new(&pattern.glob)
                .literal_separator(true)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                    kept.push(pattern);
                }
                Err(e) => warn!(pattern = %pattern.glob, error = %e, "skipping invalid ignore pattern"),
            }
        }
        let set = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to build ignore pattern set");
            GlobSet::empty()
        });
        Self {
            patterns: kept,
            set,
        }
    }

    pub fn patterns(&self) -> &[IgnorePattern] {
        &self.patterns
    }

    /// True if the path itself matches at least one pattern.
    pub fn matches(&self, path: &str) -> bool {
        let normalized = normalize(path);
        !normalized.is_empty() && self.set.is_match(&normalized)
    }

    /// True if the path or any of its parent directories matches. A file inside an
    /// ignored directory is never listed, so it is not readable either.
    pub fn is_ignored(&self, path: &str) -> bool {
        let normalized = normalize(path);
        let mut prefix = String::new();
        for part in normalized.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if self.set.is_match(&prefix) {
                return true;
            }
        }
        false
    }

    fn find_ignore_files(&self, root: &Path) -> Vec<String> {
        let mut found = Vec::new();
        for entry in self.walker(root).build().filter_map(|entry| entry.ok()) {
            if entry.file_name() == IGNORE_FILE_NAME
                && entry.file_type().is_some_and(|t| t.is_file())
            {
                if let Some(relative) = relative_path(root, entry.path()) {
                    found.push(relative);
                }
            }
        }
        found
    }

    /// A walker over `root` that never descends into ignored directories. Ignored
    /// files are still yielded; callers filter them as needed.
    pub fn walker(&self, root: &Path) -> WalkBuilder {
        let set = self.set.clone();
        let walk_root = root.to_path_buf();
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                match relative_path(&walk_root, entry.path()) {
                    Some(relative) => !set.is_match(&relative),
                    None => true,
                }
            });
        builder
    }
}

/// Strips `./` prefixes and uses `/` as separator, the form patterns are written in.
pub fn normalize(path: &str) -> String {
    Path::new(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let normalized = normalize(&relative.to_string_lossy());
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Resolves `path` against `root` without touching the filesystem and returns it
/// relative to the root, with `.` and `..` folded away. `None` when the path lies
/// outside the root.
pub fn resolve_within(root: &Path, path: &Path) -> Option<String> {
    let root = fold(&std::path::absolute(root).ok()?);
    let full = if path.is_absolute() {
        fold(path)
    } else {
        fold(&root.join(path))
    };
    let relative = full.strip_prefix(&root).ok()?;
    Some(normalize(&relative.to_string_lossy()))
}

fn fold(path: &Path) -> PathBuf {
    let mut folded = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other.as_os_str()),
        }
    }
    folded
}

fn parent_dir(relative_file: &str) -> String {
    match relative_file.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Reads the patterns of one ignore file. An unreadable file contributes nothing.
fn read_ignore_file(path: &Path) -> Vec<String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "skipping unreadable ignore file");
            return Vec::new();
        }
    };
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
