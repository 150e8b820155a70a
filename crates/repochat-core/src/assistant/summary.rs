use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use super::RetrievedChunk;
use crate::languages::language_for_path;

pub(crate) const EMPTY_CONTEXT_SUMMARY: &str =
    "No code context found for this repository. Ingest it first.";

const FALLBACK_PATTERNS: [&str; 3] = [
    "Modular architecture",
    "Separation of concerns",
    "Configuration-driven setup",
];

pub(crate) const SUMMARY_SYSTEM_PROMPT: &str = "You are a senior software architect. \
Analyze the repository excerpts you are given and answer with a single JSON object and nothing else. \
Do not wrap it in a code fence. Use exactly this shape: \
{\"summary\": string, \"techStack\": string[], \"patterns\": string[]}. \
`summary` is two or three sentences about purpose and architecture. \
`techStack` lists languages, frameworks and notable libraries. \
`patterns` lists architectural or design patterns in use.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryMetadata {
    pub summary: String,
    pub tech_stack: Vec<String>,
    pub patterns: Vec<String>,
    pub stats: RepoStats,
}

impl RepositoryMetadata {
    pub(crate) fn empty() -> Self {
        Self {
            summary: EMPTY_CONTEXT_SUMMARY.to_owned(),
            tech_stack: Vec::new(),
            patterns: Vec::new(),
            stats: RepoStats {
                files: 0,
                lines: "0k".to_owned(),
                languages: 0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoStats {
    /// Distinct source files among the retrieved chunks.
    pub files: usize,
    /// Approximate line count in thousands, e.g. `"12k"` or `"1.5k"`.
    pub lines: String,
    pub languages: usize,
}

/// Figures derived from retrieved chunks without asking the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContextStats {
    pub files: usize,
    pub lines: usize,
    pub languages: BTreeSet<&'static str>,
}

impl ContextStats {
    pub(crate) fn from_chunks(chunks: &[RetrievedChunk]) -> Self {
        let files: BTreeSet<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        let lines = chunks
            .iter()
            .map(|c| c.text.matches('\n').count() + 1)
            .sum();
        let languages = files
            .iter()
            .filter_map(|path| language_for_path(path))
            .collect();
        Self {
            files: files.len(),
            lines,
            languages,
        }
    }

    pub(crate) fn to_repo_stats(&self) -> RepoStats {
        RepoStats {
            files: self.files,
            lines: format_kilo_lines(self.lines),
            languages: self.languages.len(),
        }
    }

    fn fallback_summary(&self) -> String {
        format!(
            "This repository contains {} source files written in {} languages.",
            self.files,
            self.languages.len()
        )
    }
}

/// `1500` → `"1.5k"`, `12_000` → `"12k"`, `40` → `"0k"`.
pub(crate) fn format_kilo_lines(lines: usize) -> String {
    let tenths = (lines + 50) / 100;
    let (whole, frac) = (tenths / 10, tenths % 10);
    if frac == 0 {
        format!("{whole}k")
    } else {
        format!("{whole}.{frac}k")
    }
}

/// Fields recovered from the model's answer. `None` means absent or malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryFields {
    pub summary: Option<String>,
    pub tech_stack: Option<Vec<String>>,
    pub patterns: Option<Vec<String>>,
}

/// Outcome of reading the model's summary answer as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSummary {
    Parsed(SummaryFields),
    Unparsable { reason: String },
}

impl ModelSummary {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let body = strip_code_fence(raw);
        let value = match serde_json::from_str::<Value>(body) {
            Ok(value) => value,
            Err(first) => match outer_object(body).map(serde_json::from_str::<Value>) {
                Some(Ok(value)) => value,
                _ => {
                    return Self::Unparsable {
                        reason: first.to_string(),
                    };
                }
            },
        };
        let Value::Object(map) = value else {
            return Self::Unparsable {
                reason: "expected a JSON object".to_owned(),
            };
        };

        Self::Parsed(SummaryFields {
            summary: map
                .get("summary")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            tech_stack: map.get("techStack").and_then(string_list),
            patterns: map.get("patterns").and_then(string_list),
        })
    }

    /// Fill whatever the model did not provide from locally computed figures.
    pub(crate) fn into_metadata(self, stats: &ContextStats) -> RepositoryMetadata {
        let fields = match self {
            Self::Parsed(fields) => fields,
            Self::Unparsable { reason } => {
                tracing::warn!("model summary is not valid JSON, using fallback: {reason}");
                SummaryFields::default()
            }
        };
        RepositoryMetadata {
            summary: fields
                .summary
                .unwrap_or_else(|| stats.fallback_summary()),
            tech_stack: fields.tech_stack.unwrap_or_else(|| {
                stats.languages.iter().map(|&l| l.to_owned()).collect()
            }),
            patterns: fields
                .patterns
                .unwrap_or_else(|| FALLBACK_PATTERNS.iter().map(|&p| p.to_owned()).collect()),
            stats: stats.to_repo_stats(),
        }
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let list: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    (!list.is_empty()).then_some(list)
}

/// Remove a surrounding Markdown code fence (with or without a language tag).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Slice from the first `{` to the last `}`, for answers with prose around the object.
fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
