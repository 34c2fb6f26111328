//! The current NOTAM snapshot and its single backing JSON file.
//!
//! The in-memory dataset is an immutable [`Snapshot`] behind a swappable
//! `Arc`. Readers grab the `Arc` once per request and never observe a
//! half-replaced list; writers build a new snapshot and swap it in with
//! [`NotamStore::replace_all`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::Notam;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub notams: Vec<Notam>,
    pub last_update: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(notams: Vec<Notam>, last_update: Option<DateTime<Utc>>) -> Self {
        Self {
            notams,
            last_update,
        }
    }

    pub fn find(&self, id: &str) -> Option<&Notam> {
        self.notams.iter().find(|notam| notam.id == id)
    }
}

/// Result of reading the backing file. Only `Loaded` carries data; what to
/// do with the other cases is up to the caller.
#[derive(Debug, PartialEq)]
pub enum LoadOutcome {
    Loaded(Snapshot),
    /// The file parsed but holds no records.
    Empty,
    Missing,
    Corrupt(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRef<'a> {
    notams: &'a [Notam],
    last_update: Option<DateTime<Utc>>,
    total: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Persisted {
    #[serde(default)]
    notams: Vec<Notam>,
    #[serde(default)]
    last_update: Option<DateTime<Utc>>,
}

pub struct NotamStore {
    path: PathBuf,
    current: RwLock<Arc<Snapshot>>,
}

impl NotamStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The snapshot readers should work on for the rest of their request.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace_all(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }

    pub async fn load(&self) -> Result<LoadOutcome> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no NOTAM file at {}", self.path.display());
                return Ok(LoadOutcome::Missing);
            }
            Err(e) => return Err(e.into()),
        };

        let persisted: Persisted = match serde_json::from_str(&data) {
            Ok(persisted) => persisted,
            Err(e) => return Ok(LoadOutcome::Corrupt(e.to_string())),
        };
        if persisted.notams.is_empty() {
            return Ok(LoadOutcome::Empty);
        }

        info!(
            "loaded {} NOTAMs from {}",
            persisted.notams.len(),
            self.path.display()
        );
        Ok(LoadOutcome::Loaded(Snapshot::new(
            persisted.notams,
            persisted.last_update,
        )))
    }

    /// Writes the snapshot next to the target and renames it into place, so
    /// the file is never left half-written.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let body = serde_json::to_vec_pretty(&PersistedRef {
            notams: &snapshot.notams,
            last_update: snapshot.last_update,
            total: snapshot.notams.len(),
        })?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(
            "saved {} NOTAMs to {}",
            snapshot.notams.len(),
            self.path.display()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "notams.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
