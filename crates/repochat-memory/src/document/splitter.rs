use std::collections::VecDeque;

use super::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Upper bound of a chunk, in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
    /// Separators tried in order; the empty string splits into characters.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: ["\n\n", "\n", " ", ""].map(str::to_owned).to_vec(),
        }
    }
}

/// Recursive character splitter: breaks text on the coarsest separator that
/// occurs, recursing into pieces that are still too long, then greedily merges
/// pieces back up to `chunk_size` with `chunk_overlap` characters of overlap.
#[derive(Debug, Clone, Default)]
pub struct TextSplitter {
    config: SplitterConfig,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    /// Split every document, preserving document order and chunk order within each.
    #[must_use]
    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.split(d)).collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let chunk_size = self.config.chunk_size.max(1);

        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()));
        let (separator, rest) = match position {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => ("", &[][..]),
        };

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if rest.is_empty() {
                if !piece.trim().is_empty() {
                    chunks.push(piece.to_owned());
                }
            } else {
                chunks.extend(self.split_recursive(piece, rest));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    /// Greedily join `pieces` with `separator` into chunks of at most `chunk_size`
    /// characters, keeping up to `chunk_overlap` trailing characters for the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap;
        let sep_len = char_len(separator);

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = |window: &VecDeque<&str>| if window.is_empty() { 0 } else { sep_len };

            if total + len + joined_len(&window) > chunk_size {
                if !window.is_empty() {
                    push_chunk(&mut chunks, &window, separator);
                    while total > overlap
                        || (total > 0 && total + len + joined_len(&window) > chunk_size)
                    {
                        let Some(front) = window.pop_front() else {
                            break;
                        };
                        total -= char_len(front);
                        if !window.is_empty() {
                            total -= sep_len;
                        }
                    }
                }
            }

            if !window.is_empty() {
                total += sep_len;
            }
            window.push_back(piece);
            total += len;
        }

        if !window.is_empty() {
            push_chunk(&mut chunks, &window, separator);
        }
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_owned());
    }
}
