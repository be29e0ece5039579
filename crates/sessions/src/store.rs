//! Session store.
//!
//! Persists session state — the message log and a metadata map — in a
//! single `sessions.json` under the configured state directory. This
//! implements the Session port: `GetOrCreate`, ordered message append,
//! windowed read, metadata get/set, save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tl_domain::error::{Error, Result};
use tl_domain::tool::Message;
use tl_domain::trace::TraceEvent;

/// A single session's message log and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_key: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: Vec<Message>,
    metadata: HashMap<String, String>,
}

impl Session {
    fn new(session_key: &str) -> Self {
        let now = Utc::now();
        Self {
            session_key: session_key.to_owned(),
            session_id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `n` messages, oldest first.
    pub fn window(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn get_metadata(&self, field: &str) -> Option<&str> {
        self.metadata.get(field).map(String::as_str)
    }

    pub fn set_metadata(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(field.into(), value.into());
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

/// Session store backed by a single JSON snapshot file.
pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<String, Session>>,
    message_window: usize,
}

impl SessionStore {
    /// Load or create the session store under `state_dir/sessions.json`.
    pub fn new(state_dir: &Path, message_window: usize) -> Result<Self> {
        std::fs::create_dir_all(state_dir).map_err(Error::Io)?;

        let sessions_path = state_dir.join("sessions.json");
        let sessions = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(sessions),
            message_window,
        })
    }

    /// Resolve or create a session for the given key. Returns `(session, is_new)`.
    pub fn get_or_create(&self, session_key: &str) -> (Session, bool) {
        {
            let sessions = self.sessions.read();
            if let Some(entry) = sessions.get(session_key) {
                return (entry.clone(), false);
            }
        }

        let entry = Session::new(session_key);
        let mut sessions = self.sessions.write();
        let len_before = sessions.len();
        // Another writer may have raced us; prefer whichever was inserted first.
        let entry = sessions.entry(session_key.to_owned()).or_insert(entry).clone();
        let inserted = sessions.len() != len_before;
        if inserted {
            self.persist_locked(&sessions);
        }
        drop(sessions);

        if inserted {
            TraceEvent::SessionResolved {
                session_key: session_key.to_owned(),
                is_new: true,
            }
            .emit();
        }

        (entry, inserted)
    }

    pub fn append_message(&self, session_key: &str, message: Message) {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .entry(session_key.to_owned())
            .or_insert_with(|| Session::new(session_key));
        entry.append(message);
        self.persist_locked(&sessions);
    }

    /// The configured trailing window of messages for a session.
    pub fn window(&self, session_key: &str) -> Vec<Message> {
        let sessions = self.sessions.read();
        match sessions.get(session_key) {
            Some(entry) => entry.window(self.message_window).to_vec(),
            None => Vec::new(),
        }
    }

    pub fn set_metadata(&self, session_key: &str, field: &str, value: &str) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_key) {
            entry.set_metadata(field, value);
            self.persist_locked(&sessions);
        }
    }

    pub fn get_metadata(&self, session_key: &str, field: &str) -> Option<String> {
        self.sessions
            .read()
            .get(session_key)
            .and_then(|e| e.get_metadata(field).map(str::to_owned))
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// Persist the current session state to disk.
    pub fn save(&self) -> Result<()> {
        let sessions = self.sessions.read();
        self.write_to_disk(&sessions)
    }

    /// Write `sessions` to disk while the caller already holds the lock.
    /// Mutating methods are fire-and-forget about persistence — a write
    /// failure is logged rather than propagated, matching the in-memory
    /// state staying authoritative for the rest of the process lifetime.
    fn persist_locked(&self, sessions: &HashMap<String, Session>) {
        if let Err(e) = self.write_to_disk(sessions) {
            tracing::warn!(error = %e, path = %self.sessions_path.display(), "failed to persist session store");
        }
    }

    fn write_to_disk(&self, sessions: &HashMap<String, Session>) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)
            .map_err(|e| Error::Other(format!("serializing sessions: {e}")))?;
        std::fs::write(&self.sessions_path, json).map_err(Error::Io)?;
        Ok(())
    }
}
