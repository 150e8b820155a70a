/// Namespace used when none is supplied or the repository URL cannot be parsed.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Derive the vector-store namespace of a repository: the last path segment of
/// its URL with any `.git` suffix removed.
///
/// Falls back to [`DEFAULT_NAMESPACE`] for unparsable URLs or URLs without a path.
#[must_use]
pub fn namespace_from_url(repo_url: &str) -> String {
    let Ok(url) = url::Url::parse(repo_url.trim()) else {
        return DEFAULT_NAMESPACE.to_owned();
    };
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|last| last.strip_suffix(".git").unwrap_or(last))
        .filter(|name| !name.is_empty())
        .map_or_else(|| DEFAULT_NAMESPACE.to_owned(), str::to_owned)
}
