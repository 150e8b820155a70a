use glob::{MatchOptions, Pattern};

use crate::document::LoadError;

/// Directories whose contents are never indexed, matched against any path component.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".idea",
    ".vscode",
    ".next",
    ".nuxt",
    ".gradle",
    ".venv",
    "venv",
    "__pycache__",
    "node_modules",
    "bower_components",
    "vendor",
    "dist",
    "build",
    "target",
    "coverage",
];

/// File name patterns for lockfiles, generated assets and binary formats.
const IGNORED_FILES: &[&str] = &[
    // lockfiles
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
    "*.lock",
    // generated
    "*.min.js",
    "*.min.css",
    "*.map",
    ".DS_Store",
    // images
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.bmp",
    "*.ico",
    "*.svg",
    "*.webp",
    "*.tiff",
    // fonts
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.otf",
    "*.eot",
    // media
    "*.mp3",
    "*.mp4",
    "*.wav",
    "*.ogg",
    "*.flac",
    "*.avi",
    "*.mov",
    "*.webm",
    // archives
    "*.zip",
    "*.tar",
    "*.gz",
    "*.tgz",
    "*.bz2",
    "*.xz",
    "*.7z",
    "*.rar",
    "*.jar",
    "*.war",
    // binaries and documents
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.bin",
    "*.o",
    "*.a",
    "*.class",
    "*.pyc",
    "*.wasm",
    "*.pdf",
];

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Deny-list deciding which repository paths are skipped.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    file_patterns: Vec<Pattern>,
    /// Extra patterns matched against the full repository-relative path.
    path_patterns: Vec<Pattern>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            file_patterns: IGNORED_FILES
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
            path_patterns: Vec::new(),
        }
    }
}

impl IgnoreRules {
    /// Built-in rules plus `extra` glob patterns (e.g. `docs/**`, `*.snap`).
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Pattern` if any extra pattern is not a valid glob.
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> Result<Self, LoadError> {
        let mut rules = Self::default();
        for raw in extra {
            let raw = raw.as_ref();
            let pattern = Pattern::new(raw).map_err(|e| LoadError::Pattern {
                pattern: raw.to_owned(),
                message: e.to_string(),
            })?;
            rules.path_patterns.push(pattern);
        }
        Ok(rules)
    }

    /// Whether `path` (repository-relative, `/`-separated) should be skipped.
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
        let mut file_name = "";
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                file_name = component;
            } else if IGNORED_DIRS.contains(&component) {
                return true;
            }
        }

        self.file_patterns
            .iter()
            .any(|p| p.matches_with(file_name, CASE_INSENSITIVE))
            || self
                .path_patterns
                .iter()
                .any(|p| p.matches_with(path, CASE_INSENSITIVE) || p.matches(file_name))
    }
}
