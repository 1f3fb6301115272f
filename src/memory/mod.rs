//! Memory System - Conversational memory with semantic search
//!
//! Sessions group role-tagged messages; search ranks every stored message
//! against a query via an injected `Ranker`. State is mirrored to a single
//! JSON file that is rewritten wholesale on every mutation.

pub mod ranker;
pub mod types;

pub use ranker::{EmbeddingRanker, NoopRanker, Ranker};
pub use types::{MemoryStats, Message, Role, SearchHit, Session};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// On-disk layout of the store. `chats` is the global append-only message
/// log (array order = insertion order); `sessions` is keyed by session id.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    chats: Vec<Message>,
    sessions: HashMap<String, Session>,
}

/// The conversational memory store.
///
/// Owns all session and message records; every mutation goes through its
/// methods and is persisted to disk before the call returns. Mutators take
/// `&mut self`, so a single instance cannot be written concurrently from
/// safe code. Two processes pointed at the same file still race with
/// last-writer-wins on the whole-file rewrite; this store assumes a single
/// writer.
///
/// No method here returns an error to the caller: this is a best-effort
/// local helper, not a system of record. Disk and ranker failures degrade
/// to empty results or a `false` return and a logged warning.
pub struct ConversationStore {
    storage_path: PathBuf,
    state: StoreState,
    ranker: Box<dyn Ranker>,
}

impl ConversationStore {
    /// Open (or create) a store backed by the JSON file at `storage_path`.
    ///
    /// A missing file starts an empty store. An unreadable or malformed file
    /// also starts an empty store, with a warning; startup never fails on
    /// bad data.
    pub fn new(storage_path: PathBuf, ranker: Box<dyn Ranker>) -> Result<Self> {
        if let Some(parent) = storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let state = Self::load_state(&storage_path);
        info!(
            path = %storage_path.display(),
            sessions = state.sessions.len(),
            messages = state.chats.len(),
            "memory store opened"
        );

        Ok(Self {
            storage_path,
            state,
            ranker,
        })
    }

    /// Create a new session and persist it. Returns the new session id.
    pub fn create_session(&mut self, title: Option<&str>) -> String {
        let session = Session::new(title);
        let id = session.id.clone();
        debug!(session = %id, title = %session.title, "created session");
        self.state.sessions.insert(id.clone(), session);
        self.persist_or_warn();
        id
    }

    /// Append a message to a session and persist the store. Returns the new
    /// message id.
    ///
    /// An unknown `session_id` is not an error: a minimal session with the
    /// default title is created under that id first, so every stored message
    /// always has an owning session.
    pub fn add_message(&mut self, session_id: &str, role: Role, content: &str) -> String {
        if !self.state.sessions.contains_key(session_id) {
            let mut session = Session::new(None);
            session.id = session_id.to_string();
            debug!(session = %session_id, "auto-created session on first write");
            self.state.sessions.insert(session_id.to_string(), session);
        }

        let message = Message::new(session_id, role, content);
        let id = message.id.clone();
        self.state.chats.push(message);
        if let Some(session) = self.state.sessions.get_mut(session_id) {
            session.message_count += 1;
        }
        self.persist_or_warn();
        id
    }

    /// Search all messages across all sessions, most relevant first.
    ///
    /// Returns at most `limit` hits; empty when the ranker is not ready or
    /// the store holds no messages. Never errors.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        self.search_scoped(query, limit, None)
    }

    /// Like [`search`](Self::search), but optionally restricted to one
    /// session's messages. `None` keeps the default global scope.
    pub fn search_scoped(
        &self,
        query: &str,
        limit: usize,
        session_id: Option<&str>,
    ) -> Vec<SearchHit> {
        // Candidate list in global insertion order; corpus indices returned
        // by the ranker index into this list
        let candidates: Vec<&Message> = self
            .state
            .chats
            .iter()
            .filter(|m| session_id.is_none_or(|sid| m.session_id == sid))
            .collect();

        if !self.ranker.is_ready() || candidates.is_empty() {
            debug!("search fallback: ranker unavailable or empty corpus");
            return Vec::new();
        }

        let corpus: Vec<&str> = candidates.iter().map(|m| m.content.as_str()).collect();
        let ranked = self.ranker.rank(query, &corpus);

        let mut hits = Vec::new();
        for (corpus_index, score) in ranked.into_iter().take(limit) {
            match candidates.get(corpus_index) {
                Some(message) => hits.push(SearchHit {
                    content: message.content.clone(),
                    score,
                    session_id: message.session_id.clone(),
                    role: message.role.clone(),
                    timestamp: message.timestamp,
                }),
                None => {
                    // Ranker returned an index we never gave it
                    warn!(corpus_index, corpus_len = corpus.len(), "ranker index out of bounds, skipping");
                }
            }
        }
        hits
    }

    /// The most recent `limit` messages of a session, in insertion order.
    ///
    /// Unknown sessions yield an empty list; reads never auto-create.
    pub fn get_session_messages(&self, session_id: &str, limit: usize) -> Vec<Message> {
        let messages: Vec<Message> = self
            .state
            .chats
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();

        let skip = messages.len().saturating_sub(limit);
        messages.into_iter().skip(skip).collect()
    }

    /// All sessions, ordered by creation time (id as tiebreaker) so repeated
    /// calls are stable.
    pub fn get_all_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.state.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    /// Look up a single session
    pub fn get_session(&self, session_id: &str) -> Option<&Session> {
        self.state.sessions.get(session_id)
    }

    /// Wipe all sessions and messages and persist the empty state.
    ///
    /// Returns `false` if the empty state could not be written; the in-memory
    /// store is cleared either way and stays usable.
    pub fn clear_memory(&mut self) -> bool {
        self.state = StoreState::default();
        match self.persist() {
            Ok(()) => {
                info!("cleared all conversation memory");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to persist cleared state");
                false
            }
        }
    }

    /// Store statistics, including the on-disk size of the backing file
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            sessions: self.state.sessions.len(),
            messages: self.state.chats.len(),
            size_bytes: fs::metadata(&self.storage_path).map(|m| m.len()).unwrap_or(0),
            storage_path: self.storage_path.clone(),
        }
    }

    fn load_state(path: &PathBuf) -> StoreState {
        if !path.exists() {
            return StoreState::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read memory file, starting empty");
                return StoreState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed memory file, starting empty");
                StoreState::default()
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        fs::write(&self.storage_path, json)?;
        debug!(path = %self.storage_path.display(), messages = self.state.chats.len(), "persisted store");
        Ok(())
    }

    fn persist_or_warn(&self) {
        if let Err(e) = self.persist() {
            warn!(path = %self.storage_path.display(), error = %e, "failed to persist store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    /// Deterministic ranker returning a fixed pair list regardless of input
    struct StubRanker {
        pairs: Vec<(usize, f32)>,
    }

    impl Ranker for StubRanker {
        fn is_ready(&self) -> bool {
            true
        }

        fn rank(&self, _query: &str, _corpus: &[&str]) -> Vec<(usize, f32)> {
            self.pairs.clone()
        }
    }

    fn store_at(dir: &tempfile::TempDir) -> ConversationStore {
        ConversationStore::new(
            dir.path().join("memory.json"),
            Box::new(EmbeddingRanker::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_message_count_invariant() {
        let dir = tempdir().unwrap();
        let mut store = store_at(&dir);

        let sid = store.create_session(Some("Counting"));
        for i in 0..5 {
            store.add_message(&sid, Role::User, &format!("message {}", i));
            let session = store.get_session(&sid).unwrap();
            let actual = store.get_session_messages(&sid, 100).len();
            assert_eq!(session.message_count, actual);
        }
        assert_eq!(store.get_session(&sid).unwrap().message_count, 5);
    }

    #[test]
    fn test_id_uniqueness() {
        let dir = tempdir().unwrap();
        let mut store = store_at(&dir);

        let mut ids = HashSet::new();
        for _ in 0..10 {
            let sid = store.create_session(None);
            assert!(ids.insert(sid.clone()));
            assert!(ids.insert(store.add_message(&sid, Role::User, "hi")));
        }
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_insertion_order_and_limit() {
        let dir = tempdir().unwrap();
        let mut store = store_at(&dir);

        let sid = store.create_session(None);
        for i in 0..10 {
            store.add_message(&sid, Role::User, &format!("msg {}", i));
        }

        let last3 = store.get_session_messages(&sid, 3);
        assert_eq!(last3.len(), 3);
        assert_eq!(last3[0].content, "msg 7");
        assert_eq!(last3[1].content, "msg 8");
        assert_eq!(last3[2].content, "msg 9");
    }

    #[test]
    fn test_auto_creates_session_on_write() {
        let dir = tempdir().unwrap();
        let mut store = store_at(&dir);

        store.add_message("unknown-id", Role::User, "hi");

        let sessions = store.get_all_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "unknown-id");
        assert_eq!(sessions[0].title, types::DEFAULT_SESSION_TITLE);
        assert_eq!(sessions[0].message_count, 1);
    }

    #[test]
    fn test_unknown_session_read_does_not_create() {
        let dir = tempdir().unwrap();
        let store = store_at(&dir);

        assert!(store.get_session_messages("nope", 20).is_empty());
        assert!(store.get_all_sessions().is_empty());
    }

    #[test]
    fn test_search_empty_store_returns_empty() {
        let dir = tempdir().unwrap();
        let store = store_at(&dir);
        assert!(store.search("anything", 5).is_empty());
    }

    #[test]
    fn test_search_without_ranker_returns_empty() {
        let dir = tempdir().unwrap();
        let mut store =
            ConversationStore::new(dir.path().join("memory.json"), Box::new(NoopRanker)).unwrap();

        let sid = store.create_session(None);
        store.add_message(&sid, Role::User, "searchable content");

        assert!(store.search("searchable", 5).is_empty());
    }

    #[test]
    fn test_search_maps_ranked_indices_back() {
        let dir = tempdir().unwrap();
        let stub = StubRanker {
            pairs: vec![(2, 0.9), (0, 0.5), (1, 0.1)],
        };
        let mut store =
            ConversationStore::new(dir.path().join("memory.json"), Box::new(stub)).unwrap();

        let sid = store.create_session(None);
        store.add_message(&sid, Role::User, "first");
        store.add_message(&sid, Role::Assistant, "second");
        store.add_message(&sid, Role::User, "third");

        let hits = store.search("q", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "third");
        assert_eq!(hits[0].score, 0.9);
        assert_eq!(hits[1].content, "first");
        assert_eq!(hits[1].score, 0.5);
    }

    #[test]
    fn test_search_skips_out_of_bounds_indices() {
        let dir = tempdir().unwrap();
        let stub = StubRanker {
            pairs: vec![(7, 0.9), (0, 0.5)],
        };
        let mut store =
            ConversationStore::new(dir.path().join("memory.json"), Box::new(stub)).unwrap();

        let sid = store.create_session(None);
        store.add_message(&sid, Role::User, "only message");

        let hits = store.search("q", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "only message");
    }

    #[test]
    fn test_search_scoped_to_session() {
        let dir = tempdir().unwrap();
        let mut store = store_at(&dir);

        let s1 = store.create_session(Some("rust"));
        let s2 = store.create_session(Some("cooking"));
        store.add_message(&s1, Role::User, "borrow checker rules");
        store.add_message(&s2, Role::User, "borrow a cup of sugar");

        let scoped = store.search_scoped("borrow", 5, Some(&s2));
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].session_id, s2);

        let global = store.search("borrow", 5);
        assert_eq!(global.len(), 2);
    }

    #[test]
    fn test_clear_leaves_store_usable() {
        let dir = tempdir().unwrap();
        let mut store = store_at(&dir);

        let sid = store.create_session(Some("Doomed"));
        store.add_message(&sid, Role::User, "gone soon");

        assert!(store.clear_memory());
        assert!(store.get_all_sessions().is_empty());
        assert!(store.search("gone", 5).is_empty());

        // Still usable after clear
        let sid2 = store.create_session(Some("Fresh"));
        store.add_message(&sid2, Role::User, "back again");
        assert_eq!(store.get_session(&sid2).unwrap().message_count, 1);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let (sid, title) = {
            let mut store =
                ConversationStore::new(path.clone(), Box::new(EmbeddingRanker::default()))
                    .unwrap();
            let sid = store.create_session(Some("Persisted"));
            store.add_message(&sid, Role::User, "hello");
            store.add_message(&sid, Role::Assistant, "hi there");
            (sid, "Persisted".to_string())
        };

        let reloaded =
            ConversationStore::new(path, Box::new(EmbeddingRanker::default())).unwrap();
        let session = reloaded.get_session(&sid).unwrap();
        assert_eq!(session.title, title);
        assert_eq!(session.message_count, 2);

        let messages = reloaded.get_session_messages(&sid, 20);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].content, "hi there");
    }

    #[test]
    fn test_malformed_file_starts_empty_and_usable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let mut store =
            ConversationStore::new(path, Box::new(EmbeddingRanker::default())).unwrap();
        assert!(store.get_all_sessions().is_empty());

        let sid = store.create_session(None);
        store.add_message(&sid, Role::User, "recovered");
        assert_eq!(store.get_session(&sid).unwrap().message_count, 1);
    }

    #[test]
    fn test_disk_format_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let mut store =
            ConversationStore::new(path.clone(), Box::new(EmbeddingRanker::default())).unwrap();
        let sid = store.create_session(Some("Layout"));
        store.add_message(&sid, Role::User, "check the file");

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["chats"].is_array());
        assert_eq!(value["chats"][0]["role"], "user");
        assert_eq!(value["chats"][0]["session_id"], sid);
        assert!(value["sessions"][&sid]["created_at"].is_string());
        assert_eq!(value["sessions"][&sid]["message_count"], 1);
    }

    #[test]
    fn test_concrete_conversation_scenario() {
        let dir = tempdir().unwrap();
        let mut store = store_at(&dir);

        let sid = store.create_session(Some("Demo"));
        let mid1 = store.add_message(&sid, Role::User, "How does search work?");
        let mid2 = store.add_message(&sid, Role::Assistant, "It ranks by similarity.");
        assert_ne!(mid1, mid2);

        let messages = store.get_session_messages(&sid, 20);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "How does search work?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "It ranks by similarity.");
        assert_eq!(store.get_session(&sid).unwrap().message_count, 2);
    }
}
