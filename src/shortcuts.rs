//! Keyboard shortcuts turned into page commands.

use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::messages::{Command, TypePayload};

const LAST_SNIPPET: &str = "type_last_snippet";
const SNIPPET_PREFIX: &str = "type_snippet_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    TypeLastSnippet,
    /// One-based.
    TypeSnippet(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown shortcut `{0}`")]
pub struct UnknownShortcut(pub String);

impl FromStr for Shortcut {
    type Err = UnknownShortcut;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LAST_SNIPPET {
            return Ok(Shortcut::TypeLastSnippet);
        }
        s.strip_prefix(SNIPPET_PREFIX)
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse().ok())
            .map(Shortcut::TypeSnippet)
            .ok_or_else(|| UnknownShortcut(s.to_string()))
    }
}

impl Shortcut {
    /// The command to send to the active page, or `None` while the extension
    /// is disabled.
    pub fn to_command(self, settings: &Settings) -> Option<Command> {
        if !settings.extension_enabled {
            warn!("extension is disabled, ignoring keyboard shortcut");
            return None;
        }

        let text = match self {
            Shortcut::TypeLastSnippet => settings.last_snippet.clone(),
            Shortcut::TypeSnippet(number) => match settings.saved_snippets.by_number(number) {
                Some(snippet) => {
                    debug!(number, name = %snippet.name, chars = snippet.text.chars().count(), "typing saved snippet");
                    snippet.text.clone()
                }
                None => {
                    warn!(number, saved = settings.saved_snippets.len(), "snippet not found");
                    return Some(Command::error(format!(
                        "Snippet #{number} not found. Please save it first in the popup."
                    )));
                }
            },
        };
        Some(Command::Type(TypePayload::from(&settings.request_for(text))))
    }
}
