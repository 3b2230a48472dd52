//! Named documents shown as editor tabs.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const UNTITLED_PREFIX: &str = "Untitled ";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document `{0}` does not exist")]
    NotFound(Uuid),
    #[error("document name must not be blank")]
    BlankName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub content: String,
}

impl Document {
    fn new(name: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            content,
        }
    }
}

/// Ordered, never-empty list of documents with one active entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSet {
    documents: Vec<Document>,
    active: Uuid,
}

impl Default for DocumentSet {
    fn default() -> Self {
        Self::with_content(String::new())
    }
}

impl DocumentSet {
    /// A set holding a single `Untitled 1` document with `content`.
    pub fn with_content(content: String) -> Self {
        let document = Document::new(format!("{UNTITLED_PREFIX}1"), content);
        Self {
            active: document.id,
            documents: vec![document],
        }
    }

    /// Rebuild from persisted state.
    ///
    /// An empty `stored` list falls back to `legacy` single-buffer content. A
    /// missing or stale `active` id selects the first document.
    pub fn restore(stored: Vec<Document>, active: Option<Uuid>, legacy: Option<String>) -> Self {
        if stored.is_empty() {
            return Self::with_content(legacy.unwrap_or_default());
        }

        let active = active
            .filter(|id| stored.iter().any(|doc| doc.id == *id))
            .unwrap_or(stored[0].id);
        Self {
            documents: stored,
            active,
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn active_id(&self) -> Uuid {
        self.active
    }

    pub fn active(&self) -> &Document {
        self.documents
            .iter()
            .find(|doc| doc.id == self.active)
            .unwrap_or(&self.documents[0])
    }

    pub fn set_active_content(&mut self, content: String) {
        let active = self.active;
        if let Some(doc) = self.documents.iter_mut().find(|doc| doc.id == active) {
            doc.content = content;
        }
    }

    /// Append a fresh `Untitled N` document and make it active.
    pub fn create(&mut self) -> Uuid {
        let document = Document::new(
            format!("{UNTITLED_PREFIX}{}", self.next_untitled_number()),
            String::new(),
        );
        let id = document.id;
        self.documents.push(document);
        self.active = id;
        id
    }

    pub fn rename(&mut self, id: Uuid, name: &str) -> Result<(), DocumentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DocumentError::BlankName);
        }
        let doc = self
            .documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or(DocumentError::NotFound(id))?;
        doc.name = name.to_string();
        Ok(())
    }

    pub fn switch_to(&mut self, id: Uuid) -> Result<(), DocumentError> {
        if !self.documents.iter().any(|doc| doc.id == id) {
            return Err(DocumentError::NotFound(id));
        }
        self.active = id;
        Ok(())
    }

    /// Remove a document. Closing the active one activates its right
    /// neighbour, or the left one when it was last; closing the only document
    /// replaces it with an empty one.
    pub fn close(&mut self, id: Uuid) -> Result<(), DocumentError> {
        let index = self
            .documents
            .iter()
            .position(|doc| doc.id == id)
            .ok_or(DocumentError::NotFound(id))?;

        if self.documents.len() == 1 {
            *self = Self::default();
            return Ok(());
        }

        self.documents.remove(index);
        if self.active == id {
            let neighbour = index.min(self.documents.len() - 1);
            self.active = self.documents[neighbour].id;
        }
        Ok(())
    }

    fn next_untitled_number(&self) -> usize {
        self.documents
            .iter()
            .filter_map(|doc| doc.name.strip_prefix(UNTITLED_PREFIX))
            .filter_map(|suffix| suffix.parse::<usize>().ok())
            .max()
            .map_or(1, |max| max + 1)
    }
}
