//! Owner of the NOTAM dataset lifecycle: bootstrap, refresh, expired-notice
//! cleanup and the read operations served by the API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::Notam;
use crate::query::{self, NotamFilter, NotamStats, RadiusFilter};
use crate::source::DataSource;
use crate::store::{LoadOutcome, NotamStore, Snapshot};

pub struct NotamService {
    store: NotamStore,
    source: Box<dyn DataSource>,
    fetch_timeout: Duration,
    /// Serializes writers. Refresh rejects overlap, cleanup waits its turn.
    writer: Mutex<()>,
}

impl NotamService {
    pub fn new(store: NotamStore, source: Box<dyn DataSource>, fetch_timeout: Duration) -> Self {
        Self {
            store,
            source,
            fetch_timeout,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &NotamStore {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    /// Installs the persisted dataset, or fetches a fresh one when the file is
    /// missing, empty or unreadable as JSON.
    pub async fn bootstrap(&self) -> Result<Arc<Snapshot>> {
        match self.store.load().await? {
            LoadOutcome::Loaded(snapshot) => Ok(self.store.replace_all(snapshot)),
            LoadOutcome::Missing => {
                info!("No NOTAM file found, fetching initial dataset...");
                self.refresh().await
            }
            LoadOutcome::Empty => {
                info!("NOTAM file holds no records, fetching initial dataset...");
                self.refresh().await
            }
            LoadOutcome::Corrupt(reason) => {
                warn!(
                    "NOTAM file {} is unreadable ({reason}), fetching a fresh dataset...",
                    self.store.path().display()
                );
                self.refresh().await
            }
        }
    }

    /// Replaces the dataset with a fresh fetch. On any failure the previous
    /// snapshot stays in place, in memory and on disk.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let _guard = self
            .writer
            .try_lock()
            .map_err(|_| Error::RefreshInProgress)?;

        info!("Refreshing NOTAM data from {}...", self.source.name());
        let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| {
                Error::UpstreamFetch(format!(
                    "{} did not answer within {:?}",
                    self.source.name(),
                    self.fetch_timeout
                ))
            })??;

        let fetched_len = fetched.len();
        let notams: Vec<Notam> = fetched
            .into_iter()
            .filter(|notam| match notam.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Dropping invalid NOTAM: {e}");
                    false
                }
            })
            .collect();
        if notams.len() < fetched_len {
            warn!(
                "Dropped {} of {fetched_len} fetched NOTAMs",
                fetched_len - notams.len()
            );
        }

        let snapshot = Snapshot::new(notams, Some(Utc::now()));
        self.store.save(&snapshot).await?;
        let snapshot = self.store.replace_all(snapshot);
        info!("Refreshed {} NOTAMs", snapshot.notams.len());
        Ok(snapshot)
    }

    /// Drops every notice whose end date is not after `now`, persists the
    /// result and swaps it in. Returns the number of removed notices.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.writer.lock().await;

        let current = self.store.snapshot();
        let retained: Vec<Notam> = current
            .notams
            .iter()
            .filter(|notam| notam.end_date > now)
            .cloned()
            .collect();
        let removed = current.notams.len() - retained.len();

        let snapshot = Snapshot::new(retained, current.last_update);
        self.store.save(&snapshot).await?;
        self.store.replace_all(snapshot);
        info!("Cleaned up {removed} expired NOTAMs");
        Ok(removed)
    }

    pub fn query(&self, filter: &NotamFilter) -> (Vec<Notam>, Option<DateTime<Utc>>) {
        let snapshot = self.store.snapshot();
        (filter.apply(&snapshot.notams), snapshot.last_update)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Notam> {
        self.store
            .snapshot()
            .find(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("NOTAM {id}")))
    }

    pub fn by_airport(&self, icao: &str) -> Vec<Notam> {
        self.query(&NotamFilter::default().with_airport(icao)).0
    }

    pub fn by_radius(&self, lat: f64, lng: f64, radius_km: f64) -> Result<Vec<Notam>> {
        let filter = NotamFilter::default().with_radius(RadiusFilter::new(lat, lng, radius_km)?);
        Ok(self.query(&filter).0)
    }

    pub fn stats(&self) -> NotamStats {
        query::stats(&self.store.snapshot())
    }
}
