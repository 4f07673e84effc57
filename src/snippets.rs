use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnippetError {
    #[error("please enter some text to save")]
    EmptyText,
    #[error("no snippet with id {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub text: String,
}

/// Saved snippets in the order shortcuts number them (`type_snippet_1` is the
/// first entry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnippetBook(Vec<Snippet>);

impl SnippetBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snippet, or updates the one with `id`. Text and name are
    /// trimmed; blank text is rejected.
    pub fn save(&mut self, id: Option<&str>, name: &str, text: &str) -> Result<&Snippet, SnippetError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SnippetError::EmptyText);
        }
        let name = name.trim();

        let index = match id {
            Some(id) => {
                let index = self.position(id)?;
                let snippet = &mut self.0[index];
                if !name.is_empty() {
                    snippet.name = name.to_string();
                }
                snippet.text = text.to_string();
                debug!(id, "snippet updated");
                index
            }
            None => {
                let name = if name.is_empty() {
                    format!("Snippet {}", self.0.len() + 1)
                } else {
                    name.to_string()
                };
                self.0.push(Snippet {
                    id: Uuid::new_v4().to_string(),
                    name,
                    text: text.to_string(),
                });
                debug!(count = self.0.len(), "snippet created");
                self.0.len() - 1
            }
        };
        Ok(&self.0[index])
    }

    pub fn get(&self, id: &str) -> Option<&Snippet> {
        self.0.iter().find(|s| s.id == id)
    }

    /// One-based, matching shortcut numbering.
    pub fn by_number(&self, number: usize) -> Option<&Snippet> {
        number.checked_sub(1).and_then(|i| self.0.get(i))
    }

    pub fn delete(&mut self, id: &str) -> Result<Snippet, SnippetError> {
        let index = self.position(id)?;
        Ok(self.0.remove(index))
    }

    pub fn list(&self) -> &[Snippet] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, id: &str) -> Result<usize, SnippetError> {
        self.0
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SnippetError::NotFound(id.to_string()))
    }
}
