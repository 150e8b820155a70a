use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    /// Repository-relative file path.
    pub source: String,
    pub content_type: String,
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Build a document for `source`, guessing the content type from its extension.
    #[must_use]
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        let source = source.into();
        let content_type = content_type_for(&source).to_owned();
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source,
                content_type,
                extra: HashMap::new(),
            },
        }
    }
}

fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map_or("", |(_, ext)| ext);
    match ext.to_ascii_lowercase().as_str() {
        "md" | "markdown" | "mdx" => "text/markdown",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        _ => "text/plain",
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
}
