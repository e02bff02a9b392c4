//! Document model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Checksum;
use crate::error::Error;

/// Identifier of the widget instance that owns a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a widget instance id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("document id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// How a document's content is interpreted by the editing surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Plain text
    #[default]
    Simple,
    /// Rich text markup
    Rich,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Rich => "rich",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "plain" => Ok(Self::Simple),
            "rich" => Ok(Self::Rich),
            other => Err(Error::InvalidInput(format!("unknown document mode '{other}'"))),
        }
    }
}

/// Current state of a note widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Owning widget instance
    pub id: DocumentId,
    /// Opaque payload (markup or plain text)
    pub content: String,
    pub mode: Mode,
    /// Logical timestamp (Unix ms), the only conflict-resolution key
    pub updated_at: i64,
}

impl Document {
    /// A never-edited document: empty content, timestamp zero
    #[must_use]
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            content: String::new(),
            mode: Mode::default(),
            updated_at: 0,
        }
    }

    /// Checksum of the current content
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        Checksum::of(&self.content)
    }

    /// Check if content is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        let doc = Document::empty(DocumentId::new("widget-1"));
        assert!(doc.is_empty());
        assert_eq!(doc.updated_at, 0);
        assert_eq!(doc.mode, Mode::Simple);
        assert_eq!(doc.checksum(), Checksum::of(""));
    }

    #[test]
    fn test_document_id_parse_rejects_blank() {
        assert!("   ".parse::<DocumentId>().is_err());
        assert_eq!(
            " note-7 ".parse::<DocumentId>().unwrap(),
            DocumentId::new("note-7")
        );
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("rich".parse::<Mode>().unwrap(), Mode::Rich);
        assert_eq!("SIMPLE".parse::<Mode>().unwrap(), Mode::Simple);
        assert!("html".parse::<Mode>().is_err());
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = Document {
            id: DocumentId::new("w"),
            content: "hi".into(),
            mode: Mode::Rich,
            updated_at: 42,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["updatedAt"], 42);
        assert_eq!(json["mode"], "rich");
        assert_eq!(json["id"], "w");
    }
}
