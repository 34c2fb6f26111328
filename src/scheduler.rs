//! Fixed-cadence background jobs.
//!
//! Three jobs run when the scheduler is enabled:
//!
//! - `notam-refresh` replaces the dataset from the data source,
//! - `notam-cleanup` drops notices whose end date has passed,
//! - `cache-sweep` evicts expired API response cache entries.
//!
//! A failing run is logged and the job simply waits for its next tick; there
//! is no retry with backoff.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::cache::ExpiringCache;
use crate::config::{Config, MAX_INTERVAL};
use crate::error::{Error, Result};
use crate::service::NotamService;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: usize,
    pub name: &'static str,
    pub running: bool,
    pub interval_secs: u64,
    pub next_run: DateTime<Utc>,
    pub last_error: Option<String>,
}

struct JobState {
    running: AtomicBool,
    next_run: Mutex<DateTime<Utc>>,
    last_error: Mutex<Option<String>>,
}

struct Job {
    name: &'static str,
    period: Duration,
    state: Arc<JobState>,
}

pub struct Scheduler {
    jobs: Vec<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl JobState {
    fn set_next_run(&self, next_run: DateTime<Utc>) {
        *self.next_run.lock().unwrap_or_else(PoisonError::into_inner) = next_run;
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }
}

fn next_run_after(period: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(period)
        .ok()
        .and_then(|period| Utc::now().checked_add_signed(period))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Scheduler {
    /// A scheduler without jobs.
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            handles: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Spawns the refresh, cleanup and cache-sweep jobs with the intervals
    /// from `config`.
    pub fn start<V>(
        service: Arc<NotamService>,
        cache: Arc<ExpiringCache<V>>,
        config: &Config,
    ) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        info!("Setting up scheduled NOTAM jobs...");
        let mut scheduler = Self::new();

        let refresh_service = service.clone();
        scheduler.spawn_job("notam-refresh", config.refresh_interval, move || {
            let service = refresh_service.clone();
            async move {
                let snapshot = service.refresh().await?;
                Ok(format!("{} NOTAMs", snapshot.notams.len()))
            }
        });

        scheduler.spawn_job("notam-cleanup", config.cleanup_interval, move || {
            let service = service.clone();
            async move {
                let removed = service.cleanup_expired(Utc::now()).await?;
                Ok(format!("removed {removed} expired NOTAMs"))
            }
        });

        scheduler.spawn_job("cache-sweep", config.cache_sweep_interval, move || {
            let cache = cache.clone();
            async move {
                let evicted = cache.cleanup();
                Ok(format!("evicted {evicted} cache entries"))
            }
        });

        info!("Scheduled {} jobs", scheduler.jobs.len());
        scheduler
    }

    /// Runs `task` every `period`, first one period from now. Periods above
    /// one year are clamped.
    pub fn spawn_job<F, Fut>(&mut self, name: &'static str, period: Duration, task: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let period = period.min(MAX_INTERVAL);
        let state = Arc::new(JobState {
            running: AtomicBool::new(true),
            next_run: Mutex::new(next_run_after(period)),
            last_error: Mutex::new(None),
        });
        let mut shutdown = self.shutdown.subscribe();
        let job_state = state.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.changed() => break,
                }

                info!("Running scheduled job {name}...");
                let outcome = task().await;
                job_state.set_next_run(next_run_after(period));
                match outcome {
                    Ok(summary) => {
                        info!("Scheduled job {name} completed: {summary}");
                        job_state.set_last_error(None);
                    }
                    Err(Error::RefreshInProgress) => {
                        warn!("Scheduled job {name} skipped: a refresh is already running");
                    }
                    Err(e) => {
                        error!("Error in scheduled job {name}: {e}");
                        job_state.set_last_error(Some(e.to_string()));
                    }
                }
            }
            job_state.running.store(false, Ordering::SeqCst);
        });

        self.jobs.push(Job {
            name,
            period,
            state,
        });
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    pub fn status(&self) -> Vec<JobStatus> {
        self.jobs
            .iter()
            .enumerate()
            .map(|(id, job)| JobStatus {
                id,
                name: job.name,
                running: job.state.running.load(Ordering::SeqCst),
                interval_secs: job.period.as_secs(),
                next_run: *job
                    .state
                    .next_run
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
                last_error: job
                    .state
                    .last_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            })
            .collect()
    }

    /// Stops all jobs and waits for them to finish their current run.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Scheduled job terminated abnormally: {e}");
            }
        }
        info!("All scheduled jobs stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
