//! GitHub REST loader: default branch → recursive tree → blobs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::{StreamExt as _, TryStreamExt as _, stream};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{DocumentLoader, IgnoreRules};
use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, LoadError};
use crate::vector_store::BoxFuture;

const GITHUB_API: &str = "https://api.github.com";
const DEFAULT_CONCURRENCY: usize = 8;

/// `owner/repo` pair parsed from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse `https://github.com/{owner}/{repo}[.git][/]`.
    ///
    /// Deeper paths such as `/tree/main/src` are rejected: the namespace is the
    /// last path segment, so it must be the repository name.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Validation` for non-URLs, hosts other than GitHub, or
    /// URLs whose path is not exactly `owner/repo`.
    pub fn parse(repo_url: &str) -> Result<Self, LoadError> {
        let url = url::Url::parse(repo_url.trim()).map_err(|e| {
            LoadError::Validation(format!("repository URL is not a valid URL: {e}"))
        })?;
        if !matches!(url.host_str(), Some("github.com" | "www.github.com")) {
            return Err(LoadError::Validation(
                "repository URL must point to github.com".into(),
            ));
        }
        let mut segments = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty());
        let owner = segments.next();
        let repo = segments
            .next()
            .map(|r| r.strip_suffix(".git").unwrap_or(r))
            .filter(|r| !r.is_empty());
        let extra = segments.next().is_some();
        match (owner, repo) {
            (Some(owner), Some(repo)) if !extra => Ok(Self {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
            }),
            _ => Err(LoadError::Validation(
                "repository URL must have the form https://github.com/<owner>/<repo>".into(),
            )),
        }
    }

    fn api_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}

/// Check a repository URL and token without touching the network.
///
/// # Errors
///
/// Returns `LoadError::Validation` for non-ASCII input, an empty token, or a URL
/// that `RepoRef::parse` rejects.
pub fn validate_request(repo_url: &str, token: &str) -> Result<RepoRef, LoadError> {
    if !repo_url.is_ascii() {
        return Err(LoadError::Validation(
            "repository URL must contain only ASCII characters".into(),
        ));
    }
    if token.trim().is_empty() {
        return Err(LoadError::Validation("access token is required".into()));
    }
    if !token.is_ascii() {
        return Err(LoadError::Validation(
            "access token must contain only ASCII characters".into(),
        ));
    }
    RepoRef::parse(repo_url)
}

/// Loads every text file of a GitHub repository's default branch.
#[derive(Clone)]
pub struct GithubLoader {
    client: reqwest::Client,
    api_base: String,
    concurrency: usize,
    max_file_size: u64,
    ignore: IgnoreRules,
}

impl std::fmt::Debug for GithubLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubLoader")
            .field("api_base", &self.api_base)
            .field("concurrency", &self.concurrency)
            .field("max_file_size", &self.max_file_size)
            .finish_non_exhaustive()
    }
}

impl Default for GithubLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: repochat_llm::http::default_client(),
            api_base: GITHUB_API.to_owned(),
            concurrency: DEFAULT_CONCURRENCY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            ignore: IgnoreRules::default(),
        }
    }

    /// Point the loader at another API root (GitHub Enterprise, test servers).
    #[must_use]
    pub fn with_base_url(mut self, mut base: String) -> Self {
        while base.ends_with('/') {
            base.pop();
        }
        self.api_base = base;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Number of blob downloads in flight at once. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn with_ignore_rules(mut self, rules: IgnoreRules) -> Self {
        self.ignore = rules;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, LoadError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        tracing::warn!(%status, path, "GitHub API error: {message}");
        Err(match status.as_u16() {
            401 | 403 => LoadError::Auth {
                status: status.as_u16(),
                message,
            },
            404 => LoadError::NotFound(format!("{path}: {message}")),
            code => LoadError::Upstream {
                status: code,
                message,
            },
        })
    }

    async fn load_repo(&self, repo: &RepoRef, token: &str) -> Result<Vec<Document>, LoadError> {
        let base = repo.api_path();
        let info: RepoInfo = self.get_json(&base, token).await?;
        let tree: TreeResponse = self
            .get_json(
                &format!("{base}/git/trees/{}?recursive=1", info.default_branch),
                token,
            )
            .await?;
        if tree.truncated {
            tracing::warn!(
                repo = %base,
                "repository tree truncated by GitHub; some files will be missing"
            );
        }

        let total = tree.tree.len();
        let entries: Vec<TreeEntry> = tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .filter(|e| !self.ignore.is_ignored(&e.path))
            .filter(|e| e.size.unwrap_or(0) <= self.max_file_size)
            .collect();
        tracing::info!(
            repo = %base,
            branch = %info.default_branch,
            entries = total,
            selected = entries.len(),
            "fetched repository tree"
        );

        let documents: Vec<Option<Document>> = stream::iter(entries)
            .map(|entry| self.fetch_blob(repo, &base, token, entry))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(documents.into_iter().flatten().collect())
    }

    /// Download one blob; `None` when it is too large or not UTF-8 text.
    async fn fetch_blob(
        &self,
        repo: &RepoRef,
        base: &str,
        token: &str,
        entry: TreeEntry,
    ) -> Result<Option<Document>, LoadError> {
        let blob: BlobResponse = self
            .get_json(&format!("{base}/git/blobs/{}", entry.sha), token)
            .await?;

        let bytes = if blob.encoding == "base64" {
            let compact: String = blob
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            match STANDARD.decode(compact) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(path = %entry.path, "skipping blob with invalid base64: {e}");
                    return Ok(None);
                }
            }
        } else {
            blob.content.into_bytes()
        };

        if bytes.len() as u64 > self.max_file_size {
            tracing::debug!(path = %entry.path, size = bytes.len(), "skipping large file");
            return Ok(None);
        }
        let Ok(text) = String::from_utf8(bytes) else {
            tracing::debug!(path = %entry.path, "skipping non-UTF-8 file");
            return Ok(None);
        };
        if text.contains('\0') {
            tracing::debug!(path = %entry.path, "skipping binary file");
            return Ok(None);
        }

        let mut document = Document::new(entry.path, text);
        document.metadata.extra.insert(
            "repository".into(),
            format!("{}/{}", repo.owner, repo.repo),
        );
        document.metadata.extra.insert("sha".into(), entry.sha);
        Ok(Some(document))
    }
}

impl DocumentLoader for GithubLoader {
    fn validate(&self, source: &str, credential: &str) -> Result<(), LoadError> {
        validate_request(source, credential).map(|_| ())
    }

    fn load(
        &self,
        source: &str,
        credential: &str,
    ) -> BoxFuture<'_, Result<Vec<Document>, LoadError>> {
        let source = source.to_owned();
        let token = credential.to_owned();
        Box::pin(async move {
            let repo = validate_request(&source, &token)?;
            self.load_repo(&repo, &token).await
        })
    }
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Deserialize)]
struct BlobResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
