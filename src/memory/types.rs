//! Memory Types - Sessions, messages and search results
//!
//! A Session groups an ordered sequence of role-tagged Messages; a SearchHit
//! is one ranked match out of the message corpus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default title for sessions created without one (including sessions
/// auto-created on first write to an unknown session id).
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

/// A logical conversation thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Human-readable label
    pub title: String,
    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,
    /// Number of messages currently stored under this session
    pub message_count: usize,
}

impl Session {
    /// Create a new session with the given title (or the default placeholder)
    pub fn new(title: Option<&str>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.unwrap_or(DEFAULT_SESSION_TITLE).to_string(),
            created_at: Utc::now(),
            message_count: 0,
        }
    }
}

/// The speaker of a message.
///
/// Serializes as a plain lowercase string so the on-disk format stays
/// compatible with histories written by other tools; unknown roles round-trip
/// through `Other` without loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of conversation text belonging to exactly one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    /// Owning session
    pub session_id: String,
    /// Who said it
    pub role: Role,
    /// The text, the unit of semantic search
    pub content: String,
    /// Creation timestamp, immutable
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One ranked result from a semantic search over the message corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub score: f32,
    pub session_id: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub sessions: usize,
    pub messages: usize,
    pub size_bytes: u64,
    pub storage_path: PathBuf,
}
