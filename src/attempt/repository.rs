use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use log::{debug, trace};

use crate::attempt::Attempt;
use crate::error::StorageError;

/// Storage port for attempt records.
///
/// The drill engine only needs two things from a backend: an atomic
/// per-record `save`, and lookups ordered most recent first. Retry policy,
/// if any, belongs to the implementation.
pub trait AttemptRepository: Send + Sync {
    fn save(&self, attempt: &Attempt) -> Result<(), StorageError>;

    fn find_by_user_and_scenario(
        &self,
        user_id: &str,
        scenario_id: &str,
    ) -> Result<Vec<Attempt>, StorageError>;

    /// Every attempt of a user, across scenarios.
    fn find_by_user(&self, user_id: &str) -> Result<Vec<Attempt>, StorageError>;
}

/// Most recent first; among equal timestamps the later-saved record wins.
fn newest_first<'a>(records: impl DoubleEndedIterator<Item = &'a Attempt>) -> Vec<Attempt> {
    let mut out: Vec<Attempt> = records.rev().cloned().collect();
    out.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    out
}

// ---------------------------------------------------------------------------
// In-memory adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryAttemptRepository {
    records: RwLock<Vec<Attempt>>,
}

impl InMemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttemptRepository for InMemoryAttemptRepository {
    fn save(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        records.push(attempt.clone());
        Ok(())
    }

    fn find_by_user_and_scenario(
        &self,
        user_id: &str,
        scenario_id: &str,
    ) -> Result<Vec<Attempt>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(newest_first(records.iter().filter(|a| {
            a.user_id == user_id && a.scenario_id == scenario_id
        })))
    }

    fn find_by_user(&self, user_id: &str) -> Result<Vec<Attempt>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(newest_first(records.iter().filter(|a| a.user_id == user_id)))
    }
}

// ---------------------------------------------------------------------------
// JSON-lines file adapter
// ---------------------------------------------------------------------------

/// Appends one JSON object per line. Each record goes out in a single write
/// while holding the writer lock, so a record is either fully present or
/// absent.
#[derive(Debug)]
pub struct JsonlAttemptRepository {
    path: PathBuf,
    writer: Mutex<()>,
}

impl JsonlAttemptRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Attempt>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        trace!("Loaded {} attempts from {}", out.len(), self.path.display());
        Ok(out)
    }
}

impl AttemptRepository for JsonlAttemptRepository {
    fn save(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(attempt)?;
        line.push('\n');

        let _guard = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        debug!("Attempt {} appended to {}", attempt.id, self.path.display());
        Ok(())
    }

    fn find_by_user_and_scenario(
        &self,
        user_id: &str,
        scenario_id: &str,
    ) -> Result<Vec<Attempt>, StorageError> {
        let records = self.load()?;
        Ok(newest_first(records.iter().filter(|a| {
            a.user_id == user_id && a.scenario_id == scenario_id
        })))
    }

    fn find_by_user(&self, user_id: &str) -> Result<Vec<Attempt>, StorageError> {
        let records = self.load()?;
        Ok(newest_first(records.iter().filter(|a| a.user_id == user_id)))
    }
}
