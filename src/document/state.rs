//! Document state management for the SuperCollider LSP.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::{Position, Url};

use crate::eval::{evaluation_selection, Selection};

use super::text::LineIndex;

/// State for a single open document.
///
/// There is no parse pass here: the evaluation scanner works directly on
/// the source text per query, so the only derived state worth keeping is
/// the line index.
#[derive(Debug, Clone)]
pub struct DocumentState {
    /// Pre-computed line index for position conversion.
    pub line_index: LineIndex,
    /// Document version from the client.
    pub version: i32,
}

impl DocumentState {
    /// Create a new document state from the full source text.
    pub fn new(source: String, version: i32) -> Self {
        Self {
            line_index: LineIndex::new(source),
            version,
        }
    }

    /// The document's source text.
    pub fn source(&self) -> &str {
        self.line_index.source()
    }

    /// Resolve the evaluation target at an LSP position: the enclosing
    /// evaluable block, or the trimmed current line when none is found.
    pub fn evaluation_selection(&self, position: Position) -> Selection {
        let offset = self.line_index.position_to_offset(position);
        evaluation_selection(self.source(), offset)
    }
}

/// Thread-safe storage for open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<DocumentState>>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open or update a document with the given source text.
    pub fn open(&self, uri: Url, source: String, version: i32) -> Arc<DocumentState> {
        let state = Arc::new(DocumentState::new(source, version));
        self.documents.insert(uri, Arc::clone(&state));
        state
    }

    /// Close a document.
    pub fn close(&self, uri: &Url) {
        self.documents.remove(uri);
    }

    /// Get a document's state.
    pub fn get(&self, uri: &Url) -> Option<Arc<DocumentState>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }
}
