//! Producers of fresh NOTAM record sets.
//!
//! A refresh asks one [`DataSource`] for the complete dataset. The binary
//! picks the implementation from configuration: an HTTP feed when
//! `NOTAM_SOURCE_URL` is set, otherwise generated sample data, optionally
//! merged with a manually maintained JSON file.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Airport, KSA_AIRPORTS, Notam, NotamStatus, NotamType, Priority};

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Notam>>;
}

/// Accepted feed layouts: a bare array, or the persisted-file object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Feed {
    List(Vec<Notam>),
    Wrapped { notams: Vec<Notam> },
}

impl Feed {
    fn into_notams(self) -> Vec<Notam> {
        match self {
            Feed::List(notams) | Feed::Wrapped { notams } => notams,
        }
    }
}

/// Generates two to four plausible notices per KSA airport.
#[derive(Debug, Clone, Default)]
pub struct SampleDataSource {
    seed: Option<u64>,
}

impl SampleDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch yields the same types, counts and dates for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn generate(&self) -> Vec<Notam> {
        match self.seed {
            Some(seed) => generate_sample(&mut StdRng::seed_from_u64(seed)),
            None => generate_sample(&mut rand::thread_rng()),
        }
    }
}

#[async_trait]
impl DataSource for SampleDataSource {
    fn name(&self) -> &str {
        "sample"
    }

    async fn fetch(&self) -> Result<Vec<Notam>> {
        Ok(self.generate())
    }
}

const STATUSES: [NotamStatus; 3] = NotamStatus::ALL;

fn generate_sample<R: Rng>(rng: &mut R) -> Vec<Notam> {
    let now = Utc::now();
    let mut notams = Vec::new();

    for airport in &KSA_AIRPORTS {
        let count = rng.gen_range(2..=4);
        for _ in 0..count {
            let start_date = now - ChronoDuration::days(rng.gen_range(0..30));
            let end_date = start_date + ChronoDuration::days(rng.gen_range(1..=90));
            let notam_type = *NotamType::ALL.choose(rng).unwrap_or(&NotamType::Ad);
            let status = *STATUSES.choose(rng).unwrap_or(&NotamStatus::Active);
            let priority = if rng.gen_bool(0.3) {
                Priority::High
            } else {
                Priority::Normal
            };

            notams.push(Notam {
                id: format!("KSA{}{}", airport.icao, Uuid::new_v4().simple()),
                number: format!("A{:04}/{}", rng.gen_range(0..9999), now.year()),
                notam_type,
                status,
                priority,
                airport: airport.icao.to_string(),
                airport_name: airport.name.to_string(),
                latitude: Some(airport.lat + rng.gen_range(-0.05..0.05)),
                longitude: Some(airport.lng + rng.gen_range(-0.05..0.05)),
                start_date,
                end_date,
                description: sample_description(rng, airport),
                message: format!(
                    "A{} RWY 15/33 CLSD DUE TO MAINTENANCE. ACFT USE RWY 10/28.",
                    airport.icao
                ),
                category: notam_type.category().to_string(),
                created: now,
                updated: now,
            });
        }
    }
    notams
}

fn sample_description<R: Rng>(rng: &mut R, airport: &Airport) -> String {
    let name = airport.name;
    match rng.gen_range(0..5) {
        0 => format!("Runway maintenance at {name}"),
        1 => format!("Navigation aid unserviceable at {name}"),
        2 => format!("Communication facility maintenance at {name}"),
        3 => format!("Obstruction near {name}"),
        _ => format!("Aerodrome work in progress at {name}"),
    }
}

/// Pulls the dataset from an HTTP endpoint serving NOTAM JSON.
pub struct HttpDataSource {
    client: reqwest::Client,
    url: String,
}

impl HttpDataSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ksa-notams/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<Notam>> {
        info!("Fetching NOTAMs from {}", self.url);
        let feed: Feed = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(feed.into_notams())
    }
}

/// Locally maintained notices. A missing file contributes nothing.
pub struct ManualFileSource {
    path: PathBuf,
}

impl ManualFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for ManualFileSource {
    fn name(&self) -> &str {
        "manual"
    }

    async fn fetch(&self) -> Result<Vec<Notam>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no manual NOTAM file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::UpstreamFetch(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };
        let feed: Feed = serde_json::from_str(&data)
            .map_err(|e| Error::UpstreamFetch(format!("{}: {e}", self.path.display())))?;
        Ok(feed.into_notams())
    }
}

/// Concatenates the records of several sources. Any failing source fails the
/// whole fetch.
pub struct MergedSource {
    sources: Vec<Box<dyn DataSource>>,
}

impl MergedSource {
    pub fn new(sources: Vec<Box<dyn DataSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl DataSource for MergedSource {
    fn name(&self) -> &str {
        "merged"
    }

    async fn fetch(&self) -> Result<Vec<Notam>> {
        let mut notams = Vec::new();
        for source in &self.sources {
            let batch = source.fetch().await?;
            debug!("{} NOTAMs from {}", batch.len(), source.name());
            notams.extend(batch);
        }
        Ok(notams)
    }
}

/// Serves a fixed record set, e.g. a curated dataset or test fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    notams: Vec<Notam>,
}

impl StaticSource {
    pub fn new(notams: Vec<Notam>) -> Self {
        Self { notams }
    }
}

#[async_trait]
impl DataSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<Notam>> {
        Ok(self.notams.clone())
    }
}

/// Builds the source described by the configuration: the HTTP feed when a URL
/// is set, generated sample data otherwise, merged with the manual file if one
/// is configured.
pub fn from_config(config: &Config) -> Result<Box<dyn DataSource>> {
    let primary: Box<dyn DataSource> = match &config.source_url {
        Some(url) => Box::new(HttpDataSource::new(url.clone(), config.fetch_timeout)?),
        None => Box::new(SampleDataSource::new()),
    };
    Ok(match &config.manual_file {
        Some(path) => Box::new(MergedSource::new(vec![
            primary,
            Box::new(ManualFileSource::new(path.clone())),
        ])),
        None => primary,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::model::fixtures::notam;

    #[test]
    fn test_sample_covers_every_airport() {
        let notams = SampleDataSource::new().generate();
        for airport in &KSA_AIRPORTS {
            let count = notams.iter().filter(|n| n.airport == airport.icao).count();
            assert!((2..=4).contains(&count), "{}: {count}", airport.icao);
        }
    }

    #[test]
    fn test_sample_records_are_valid() {
        let year = Utc::now().year();
        for n in SampleDataSource::with_seed(7).generate() {
            n.validate().unwrap();
            assert!(n.end_date > n.start_date);
            assert_eq!(n.category, n.notam_type.category());
            assert!(n.number.starts_with('A') && n.number.ends_with(&format!("/{year}")));
            assert_eq!(n.number.len(), "A0000/".len() + year.to_string().len());
            assert!(n.priority != Priority::Low);
        }
    }

    #[test]
    fn test_sample_ids_are_unique() {
        let notams = SampleDataSource::with_seed(1).generate();
        let mut ids: Vec<_> = notams.iter().map(|n| n.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), notams.len());
    }

    #[test]
    fn test_seeded_sample_is_repeatable() {
        let source = SampleDataSource::with_seed(42);
        let shape = || -> Vec<_> {
            source
                .generate()
                .into_iter()
                .map(|n| (n.airport, n.notam_type))
                .collect()
        };
        assert_eq!(shape(), shape());
    }

    #[tokio::test]
    async fn test_manual_file_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let source = ManualFileSource::new(dir.path().join("manual.json"));
        assert!(source.fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_file_accepts_both_layouts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.json");
        let records = vec![notam("m1", NotamType::Obst, "OEMA")];

        tokio::fs::write(&path, serde_json::to_vec(&records).unwrap())
            .await
            .unwrap();
        assert_eq!(ManualFileSource::new(&path).fetch().await.unwrap(), records);

        let wrapped = serde_json::json!({ "notams": records, "total": 1 });
        tokio::fs::write(&path, serde_json::to_vec(&wrapped).unwrap())
            .await
            .unwrap();
        assert_eq!(ManualFileSource::new(&path).fetch().await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_manual_file_garbage_is_upstream_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.json");
        tokio::fs::write(&path, b"[{").await.unwrap();
        let err = ManualFileSource::new(&path).fetch().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(_)));
    }

    #[tokio::test]
    async fn test_merged_source_concatenates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.json");
        let manual = vec![notam("m1", NotamType::Obst, "OEMA")];
        tokio::fs::write(&path, serde_json::to_vec(&manual).unwrap())
            .await
            .unwrap();

        let merged = MergedSource::new(vec![
            Box::new(SampleDataSource::with_seed(3)),
            Box::new(ManualFileSource::new(&path)),
        ]);
        let notams = merged.fetch().await.unwrap();
        let sample_len = SampleDataSource::with_seed(3).generate().len();
        assert_eq!(notams.len(), sample_len + 1);
        assert_eq!(notams.last().map(|n| n.id.as_str()), Some("m1"));
    }

    #[test]
    fn test_from_config_picks_source() {
        let config = Config::default();
        assert_eq!(from_config(&config).unwrap().name(), "sample");

        let config = Config {
            source_url: Some("https://example.test/notams".to_string()),
            ..Config::default()
        };
        assert_eq!(
            from_config(&config).unwrap().name(),
            "https://example.test/notams"
        );

        let config = Config {
            manual_file: Some("manual.json".into()),
            ..Config::default()
        };
        assert_eq!(from_config(&config).unwrap().name(), "merged");
    }

    #[tokio::test]
    async fn test_http_source_unreachable_is_upstream_failure() {
        // port 9 (discard) on localhost is not expected to serve HTTP
        let source =
            HttpDataSource::new("http://127.0.0.1:9/notams", Duration::from_millis(500)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(_)));
    }
}
