//! Gateway-owned method session store.
//!
//! Persists one [`MethodSession`] per owner in `sessions/methods.json` under
//! the configured state path. Every change is written through to disk via a
//! temporary file and a rename, so the file on disk is always a complete
//! snapshot of the map.
//!
//! Records are decoded one by one. A record that no longer decodes is kept
//! verbatim and reported as [`Error::Serialization`] to its owner only, until
//! the owner replaces or deletes it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use st_domain::error::{Error, Result};
use st_domain::trace::TraceEvent;

use crate::session::MethodSession;

/// One owner's record as held in the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Stored {
    Session(MethodSession),
    /// Kept as written so that other writes do not lose it.
    Unreadable(Value),
}

impl Stored {
    fn session(&self, owner: &str) -> Result<MethodSession> {
        match self {
            Self::Session(session) => Ok(session.clone()),
            Self::Unreadable(raw) => {
                let reason = serde_json::from_value::<MethodSession>(raw.clone())
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                Err(Error::Serialization(format!(
                    "stored session for owner {owner} cannot be read ({reason}); create a new session"
                )))
            }
        }
    }

    fn id(&self) -> String {
        match self {
            Self::Session(session) => session.id.clone(),
            Self::Unreadable(raw) => raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<String, Stored>>,
    /// Serializes file writes; the map lock is never held across I/O.
    io: Mutex<()>,
}

impl SessionStore {
    /// Load or create the store at `state_path/sessions/methods.json`.
    ///
    /// A file that is not a JSON object at all is moved aside to
    /// `methods.json.corrupt` before the store starts empty.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let sessions_path = dir.join("methods.json");
        let sessions: HashMap<String, Stored> = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    let aside = sessions_path.with_extension("json.corrupt");
                    std::fs::rename(&sessions_path, &aside).map_err(Error::Io)?;
                    tracing::error!(
                        error = %e,
                        moved_to = %aside.display(),
                        "session file unreadable, moved aside; starting empty"
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        for (owner, stored) in &sessions {
            if let Stored::Unreadable(_) = stored {
                tracing::warn!(owner = %owner, "stored session cannot be read; kept until replaced");
            }
        }
        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(sessions),
            io: Mutex::new(()),
        })
    }

    /// The session owned by `owner`, if any. Fails with
    /// [`Error::Serialization`] when the owner's record cannot be read.
    pub fn get(&self, owner: &str) -> Result<Option<MethodSession>> {
        self.sessions
            .read()
            .get(owner)
            .map(|stored| stored.session(owner))
            .transpose()
    }

    /// Like [`get`](Self::get) but fails with [`Error::NotFound`].
    pub fn require(&self, owner: &str) -> Result<MethodSession> {
        self.get(owner)?
            .ok_or_else(|| Error::NotFound(format!("no method session for owner {owner}")))
    }

    /// Replace the owner's session with `session` and persist. Returns
    /// whether a record, readable or not, was replaced.
    ///
    /// If the write fails the previous record is put back, so the store
    /// never holds a state that is not on disk.
    pub fn upsert(&self, session: MethodSession) -> Result<bool> {
        let _io = self.io.lock();
        let owner = session.owner.clone();
        let previous = self
            .sessions
            .write()
            .insert(owner.clone(), Stored::Session(session));
        if let Err(e) = self.persist() {
            let mut sessions = self.sessions.write();
            match previous {
                Some(p) => {
                    sessions.insert(owner, p);
                }
                None => {
                    sessions.remove(&owner);
                }
            }
            return Err(e);
        }
        Ok(previous.is_some())
    }

    /// Drop the owner's record and persist. Returns the id of the removed
    /// session.
    pub fn remove(&self, owner: &str) -> Result<Option<String>> {
        let _io = self.io.lock();
        let removed = self.sessions.write().remove(owner);
        if let Some(stored) = &removed {
            if let Err(e) = self.persist() {
                self.sessions.write().insert(owner.to_owned(), stored.clone());
                return Err(e);
            }
        }
        Ok(removed.map(|stored| stored.id()))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// List all readable sessions.
    pub fn list(&self) -> Vec<MethodSession> {
        self.sessions
            .read()
            .values()
            .filter_map(|stored| match stored {
                Stored::Session(session) => Some(session.clone()),
                Stored::Unreadable(_) => None,
            })
            .collect()
    }

    /// Persist the current state to disk.
    pub fn flush(&self) -> Result<()> {
        let started = Instant::now();
        let _io = self.io.lock();
        self.persist()?;
        TraceEvent::StoreFlushed {
            sessions: self.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let json = {
            let sessions = self.sessions.read();
            serde_json::to_string_pretty(&*sessions)
                .map_err(|e| Error::Other(format!("serializing sessions: {e}")))?
        };
        let tmp = self.sessions_path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp, json) {
            let _ = std::fs::remove_file(&tmp);
            return Err(Error::Io(e));
        }
        std::fs::rename(&tmp, &self.sessions_path).map_err(Error::Io)
    }

    pub fn path(&self) -> &Path {
        &self.sessions_path
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::fresh_session;
    use crate::session::SessionState;

    #[test]
    fn upsert_replaces_the_owners_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let first = fresh_session("u1");
        assert!(!store.upsert(first.clone()).unwrap());

        let second = fresh_session("u1");
        assert!(store.upsert(second.clone()).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("u1").unwrap().unwrap().id, second.id);
    }

    #[test]
    fn owners_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.upsert(fresh_session("u1")).unwrap();
        store.upsert(fresh_session("u2")).unwrap();
        assert_eq!(store.len(), 2);
        store.remove("u1").unwrap();
        assert!(store.get("u1").unwrap().is_none());
        assert!(store.get("u2").unwrap().is_some());
    }

    #[test]
    fn reload_sees_committed_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let session = {
            let store = SessionStore::new(dir.path()).unwrap();
            let mut engine = fresh_session("u1").snapshot().unwrap().restore().unwrap();
            let base = fresh_session("u1");
            let pending = engine.start().unwrap();
            let started = base.started(&engine.snapshot(), pending).unwrap();
            store.upsert(started.clone()).unwrap();
            started
        };

        let store = SessionStore::new(dir.path()).unwrap();
        let loaded = store.get("u1").unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.state, SessionState::Iterating);
        assert!(!dir.path().join("sessions/methods.json.tmp").exists());
    }

    #[test]
    fn unreadable_record_fails_only_its_owner() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SessionStore::new(dir.path()).unwrap();
            store.upsert(fresh_session("u1")).unwrap();
            store.upsert(fresh_session("u2")).unwrap();
        }
        let path = dir.path().join("sessions/methods.json");
        let mut raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        raw["u1"]["state"] = Value::from("paused");
        std::fs::write(&path, raw.to_string()).unwrap();

        let store = SessionStore::new(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(matches!(store.require("u1"), Err(Error::Serialization(_))));
        assert!(store.get("u2").unwrap().is_some());

        store.upsert(fresh_session("u3")).unwrap();
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["u1"]["state"], "paused");
        assert!(on_disk.get("u2").is_some());
        assert!(on_disk.get("u3").is_some());

        // Re-creating replaces the unreadable record.
        assert!(store.upsert(fresh_session("u1")).unwrap());
        assert!(store.get("u1").unwrap().is_some());
    }

    #[test]
    fn unreadable_record_can_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sessions")).unwrap();
        std::fs::write(
            dir.path().join("sessions/methods.json"),
            r#"{"u1": {"id": "s-1", "state": "paused"}}"#,
        )
        .unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert_eq!(store.remove("u1").unwrap().as_deref(), Some("s-1"));
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sessions")).unwrap();
        std::fs::write(dir.path().join("sessions/methods.json"), "{not json").unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.is_empty());

        store.upsert(fresh_session("u1")).unwrap();
        let aside = std::fs::read_to_string(dir.path().join("sessions/methods.json.corrupt")).unwrap();
        assert_eq!(aside, "{not json");
    }

    #[test]
    fn require_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(matches!(store.require("nobody"), Err(Error::NotFound(_))));
        assert!(store.remove("nobody").unwrap().is_none());
    }
}
