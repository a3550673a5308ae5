// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use fsagent_model::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One conversation between a user and the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    /// Free-form state attached by the caller.
    pub state: HashMap<String, Value>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        state: HashMap<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            app_name: app_name.into(),
            user_id: user_id.into(),
            state,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.updated_at = Utc::now();
    }
}

/// Process-local session store keyed by `(app_name, user_id, session_id)`.
#[derive(Default)]
pub struct InMemorySessionService {
    sessions: Mutex<HashMap<(String, String, String), Session>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        state: HashMap<String, Value>,
    ) -> Session {
        let session = Session::new(app_name, user_id, state);
        self.lock().insert(key(app_name, user_id, &session.id), session.clone());
        session
    }

    pub fn get_session(&self, app_name: &str, user_id: &str, session_id: &str) -> Option<Session> {
        self.lock().get(&key(app_name, user_id, session_id)).cloned()
    }

    /// Sessions of one user, oldest first.
    pub fn list_sessions(&self, app_name: &str, user_id: &str) -> Vec<Session> {
        let mut out: Vec<Session> = self
            .lock()
            .values()
            .filter(|s| s.app_name == app_name && s.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.created_at);
        out
    }

    /// Returns `true` if a session was removed.
    pub fn delete_session(&self, app_name: &str, user_id: &str, session_id: &str) -> bool {
        self.lock().remove(&key(app_name, user_id, session_id)).is_some()
    }

    /// Store `session` back, replacing the previous copy.
    pub fn update_session(&self, session: Session) {
        let k = key(&session.app_name, &session.user_id, &session.id);
        self.lock().insert(k, session);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String, String), Session>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn key(app_name: &str, user_id: &str, session_id: &str) -> (String, String, String) {
    (app_name.to_string(), user_id.to_string(), session_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get() {
        let svc = InMemorySessionService::new();
        let s = svc.create_session("app", "u1", HashMap::new());
        assert!(Uuid::parse_str(&s.id).is_ok());
        let got = svc.get_session("app", "u1", &s.id).unwrap();
        assert_eq!(got.id, s.id);
        assert!(got.messages.is_empty());
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut state = HashMap::new();
        state.insert("target_dir".to_string(), Value::from("/tmp/work"));
        let mut s = Session::new("app", "u1", state);
        s.push(Message::user("list files"));

        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, s.id);
        assert_eq!(back.state["target_dir"], "/tmp/work");
        assert_eq!(back.messages, s.messages);
    }

    #[test]
    fn get_is_scoped_by_app_and_user() {
        let svc = InMemorySessionService::new();
        let s = svc.create_session("app", "u1", HashMap::new());
        assert!(svc.get_session("app", "u2", &s.id).is_none());
        assert!(svc.get_session("other", "u1", &s.id).is_none());
    }

    #[test]
    fn list_and_delete() {
        let svc = InMemorySessionService::new();
        let a = svc.create_session("app", "u1", HashMap::new());
        let _b = svc.create_session("app", "u1", HashMap::new());
        let _c = svc.create_session("app", "u2", HashMap::new());
        assert_eq!(svc.list_sessions("app", "u1").len(), 2);

        assert!(svc.delete_session("app", "u1", &a.id));
        assert!(!svc.delete_session("app", "u1", &a.id));
        assert_eq!(svc.list_sessions("app", "u1").len(), 1);
    }

    #[test]
    fn update_replaces_stored_copy() {
        let svc = InMemorySessionService::new();
        let mut s = svc.create_session("app", "u1", HashMap::new());
        s.push(Message::user("hello"));
        svc.update_session(s.clone());
        let got = svc.get_session("app", "u1", &s.id).unwrap();
        assert_eq!(got.messages.len(), 1);
    }

    #[test]
    fn initial_state_is_kept() {
        let svc = InMemorySessionService::new();
        let mut state = HashMap::new();
        state.insert("target".to_string(), Value::from("/tmp/x"));
        let s = svc.create_session("app", "u1", state);
        assert_eq!(s.state["target"], "/tmp/x");
    }
}
