/// Ignore rules for note paths
///
/// Comma-separated globs; `*` and `?` stay within one path segment, `**`
/// spans segments. A pattern without `/` also matches the bare file name.
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    /// Build from a comma-separated pattern list. Invalid globs are logged and skipped.
    pub fn new(spec: &str) -> Self {
        let patterns = spec
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!("Skipping invalid ignore pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches the vault-relative note path
    pub fn is_ignored(&self, note_path: &str) -> bool {
        let path = note_path.replace('\\', "/");
        let path = path.trim_start_matches('/');
        let file_name = path.rsplit('/').next().unwrap_or(path);

        self.patterns.iter().any(|pattern| {
            pattern.matches_with(path, MATCH_OPTIONS)
                || (!pattern.as_str().contains('/')
                    && pattern.matches_with(file_name, MATCH_OPTIONS))
        })
    }
}
