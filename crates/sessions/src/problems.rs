//! Problem store collaborator.
//!
//! Problems are owned by users and looked up by `(owner, id)`. A problem
//! that exists but belongs to someone else is reported exactly like a
//! missing one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use st_domain::error::{Error, Result};
use st_domain::problem::ProblemRecord;

/// Read access to the problems an owner may start sessions on.
#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get(&self, owner: &str, problem_id: u64) -> Result<Option<ProblemRecord>>;
}

type ProblemMap = HashMap<(String, u64), ProblemRecord>;

fn index(records: Vec<ProblemRecord>, source: &str) -> ProblemMap {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        if let Err(e) = record.validate() {
            tracing::warn!(source, error = %e, "skipping invalid problem");
            continue;
        }
        map.insert((record.owner.clone(), record.id), record);
    }
    map
}

// ── JSON file ───────────────────────────────────────────────────────

/// Problems read from `problems.json` (a JSON array of records) under the
/// state path. The file is optional; without it every lookup misses.
pub struct JsonProblemStore {
    path: PathBuf,
    problems: RwLock<ProblemMap>,
}

impl JsonProblemStore {
    pub fn new(state_path: &Path) -> Result<Self> {
        let path = state_path.join("problems.json");
        let store = Self {
            path,
            problems: RwLock::new(HashMap::new()),
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-read the file. Invalid records are skipped with a warning.
    pub fn reload(&self) -> Result<usize> {
        let records: Vec<ProblemRecord> = if self.path.exists() {
            let raw = std::fs::read_to_string(&self.path).map_err(Error::Io)?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::Config(format!("{}: {e}", self.path.display()))
            })?
        } else {
            Vec::new()
        };
        let map = index(records, "problems.json");
        let count = map.len();
        *self.problems.write() = map;
        tracing::info!(problems = count, path = %self.path.display(), "problem store loaded");
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.problems.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.read().is_empty()
    }
}

#[async_trait]
impl ProblemStore for JsonProblemStore {
    async fn get(&self, owner: &str, problem_id: u64) -> Result<Option<ProblemRecord>> {
        Ok(self
            .problems
            .read()
            .get(&(owner.to_owned(), problem_id))
            .cloned())
    }
}

// ── In memory ───────────────────────────────────────────────────────

/// Problem store held entirely in memory. Used by tests and embedders.
#[derive(Default)]
pub struct InMemoryProblemStore {
    problems: RwLock<ProblemMap>,
}

impl InMemoryProblemStore {
    pub fn new(records: Vec<ProblemRecord>) -> Self {
        Self {
            problems: RwLock::new(index(records, "memory")),
        }
    }

    pub fn insert(&self, record: ProblemRecord) -> Result<()> {
        record.validate()?;
        self.problems
            .write()
            .insert((record.owner.clone(), record.id), record);
        Ok(())
    }
}

#[async_trait]
impl ProblemStore for InMemoryProblemStore {
    async fn get(&self, owner: &str, problem_id: u64) -> Result<Option<ProblemRecord>> {
        Ok(self
            .problems
            .read()
            .get(&(owner.to_owned(), problem_id))
            .cloned())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::table_problem;

    #[tokio::test]
    async fn lookups_are_scoped_to_the_owner() {
        let store = InMemoryProblemStore::new(vec![table_problem("alice", 1)]);
        assert!(store.get("alice", 1).await.unwrap().is_some());
        assert!(store.get("bob", 1).await.unwrap().is_none());
        assert!(store.get("alice", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_file_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProblemStore::new(dir.path()).unwrap();
        assert!(store.is_empty());
        assert!(store.get("alice", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_file_skips_invalid_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut broken = table_problem("alice", 2);
        broken.minimize = vec![1];
        let records = vec![table_problem("alice", 1), broken];
        std::fs::write(
            dir.path().join("problems.json"),
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();

        let store = JsonProblemStore::new(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("alice", 1).await.unwrap().unwrap().name, "front");
        assert!(store.get("alice", 2).await.unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("problems.json"), "[{").unwrap();
        assert!(matches!(
            JsonProblemStore::new(dir.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn insert_validates() {
        let store = InMemoryProblemStore::default();
        let mut p = table_problem("alice", 3);
        p.ideal = vec![];
        assert!(store.insert(p).is_err());
        assert!(store.insert(table_problem("alice", 4)).is_ok());
    }
}
