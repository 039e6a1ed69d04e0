//! UI-agnostic conversation types
//!
//! Messages, roles and the analysis mode are shared by the controller, the
//! renderer and the headless CLI and don't depend on the terminal.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Session-unique message identifier. Later messages always get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    pub fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Polarity reported by the sentiment service.
///
/// Labels outside the documented three are kept verbatim in `Other` so that
/// whatever the service returns can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Other(String),
}

impl Sentiment {
    pub fn from_label(label: &str) -> Self {
        match label {
            "positive" => Sentiment::Positive,
            "neutral" => Sentiment::Neutral,
            "negative" => Sentiment::Negative,
            other => Sentiment::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::Other(label) => label,
        }
    }
}

impl From<String> for Sentiment {
    fn from(label: String) -> Self {
        Sentiment::from_label(&label)
    }
}

impl From<Sentiment> for String {
    fn from(sentiment: Sentiment) -> Self {
        match sentiment {
            Sentiment::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result fields attached to an assistant reply for a text analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentimentMetadata {
    pub sentiment: Sentiment,
    pub clean_text: String,
    pub insight: String,
}

/// A chat message in the transcript. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    timestamp: DateTime<Local>,
    metadata: Option<SentimentMetadata>,
}

impl Message {
    fn build(role: Role, content: String, metadata: Option<SentimentMetadata>) -> Self {
        Self {
            id: MessageId::next(),
            role,
            content,
            timestamp: Local::now(),
            metadata,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::build(Role::Assistant, content.into(), None)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::build(Role::System, content.into(), None)
    }

    /// Assistant reply for a text analysis. The only constructor that attaches
    /// metadata.
    pub fn sentiment_reply(metadata: SentimentMetadata) -> Self {
        let content = format!(
            "Sentiment: {}\n\nCleaned Text: {}\n\nInsight: {}",
            metadata.sentiment, metadata.clean_text, metadata.insight
        );
        Self::build(Role::Assistant, content, Some(metadata))
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn metadata(&self) -> Option<&SentimentMetadata> {
        self.metadata.as_ref()
    }

    pub fn sentiment(&self) -> Option<&Sentiment> {
        self.metadata.as_ref().map(|m| &m.sentiment)
    }

    /// Assistant replies without a sentiment badge get a copy action.
    pub fn is_copyable(&self) -> bool {
        self.role == Role::Assistant && self.metadata.is_none()
    }
}

/// Which input affordance is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    #[default]
    Text,
    Csv,
}

impl AnalysisMode {
    pub fn toggle(self) -> Self {
        match self {
            AnalysisMode::Text => AnalysisMode::Csv,
            AnalysisMode::Csv => AnalysisMode::Text,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisMode::Text => "Text Analysis",
            AnalysisMode::Csv => "CSV Analysis",
        }
    }
}
