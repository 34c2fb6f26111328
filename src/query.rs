//! Filtering and aggregate statistics over a NOTAM snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::model::{Notam, NotamStatus, NotamType, Priority};
use crate::store::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusFilter {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl RadiusFilter {
    pub fn new(lat: f64, lng: f64, radius_km: f64) -> Result<Self> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(Error::Validation(format!(
                "radius must be a non-negative number of kilometres, got {radius_km}"
            )));
        }
        let center = GeoPoint::new(lat, lng).map_err(|e| Error::Validation(e.to_string()))?;
        Ok(Self { center, radius_km })
    }

    /// Records without a usable location never match.
    pub fn contains(&self, notam: &Notam) -> bool {
        notam
            .location()
            .is_some_and(|point| self.center.distance_km(&point) <= self.radius_km)
    }
}

/// Conjunctive filter; unset criteria match everything. All string matching
/// ignores case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotamFilter {
    /// Substring of the type code.
    pub notam_type: Option<String>,
    pub airport: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub radius: Option<RadiusFilter>,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl NotamFilter {
    pub fn with_type(mut self, notam_type: impl Into<String>) -> Self {
        self.notam_type = non_empty(notam_type);
        self
    }

    pub fn with_airport(mut self, airport: impl Into<String>) -> Self {
        self.airport = non_empty(airport);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = non_empty(status);
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = non_empty(priority);
        self
    }

    pub fn with_radius(mut self, radius: RadiusFilter) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn matches(&self, notam: &Notam) -> bool {
        if let Some(wanted) = &self.notam_type {
            let wanted = wanted.to_ascii_uppercase();
            if !notam.notam_type.as_str().contains(wanted.as_str()) {
                return false;
            }
        }
        if let Some(airport) = &self.airport {
            if !notam.airport.eq_ignore_ascii_case(airport) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if !notam.status.as_str().eq_ignore_ascii_case(status) {
                return false;
            }
        }
        if let Some(priority) = &self.priority {
            if !notam.priority.as_str().eq_ignore_ascii_case(priority) {
                return false;
            }
        }
        if let Some(radius) = &self.radius {
            if !radius.contains(notam) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, notams: &[Notam]) -> Vec<Notam> {
        notams
            .iter()
            .filter(|notam| self.matches(notam))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotamStats {
    pub total: usize,
    pub by_type: BTreeMap<NotamType, usize>,
    pub by_airport: BTreeMap<String, usize>,
    pub by_status: BTreeMap<NotamStatus, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub top_airports: Vec<AirportCount>,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirportCount {
    pub airport: String,
    pub count: usize,
}

/// Airports listed in the summary's `topAirports`.
pub const TOP_AIRPORTS: usize = 5;

pub fn stats(snapshot: &Snapshot) -> NotamStats {
    let mut stats = NotamStats {
        total: snapshot.notams.len(),
        by_type: BTreeMap::new(),
        by_airport: BTreeMap::new(),
        by_status: BTreeMap::new(),
        by_priority: BTreeMap::new(),
        top_airports: Vec::new(),
        last_update: snapshot.last_update,
    };

    for notam in &snapshot.notams {
        *stats.by_type.entry(notam.notam_type).or_default() += 1;
        *stats.by_airport.entry(notam.airport.clone()).or_default() += 1;
        *stats.by_status.entry(notam.status).or_default() += 1;
        *stats.by_priority.entry(notam.priority).or_default() += 1;
    }
    stats.top_airports = top_airports(&stats.by_airport, TOP_AIRPORTS);
    stats
}

/// The `n` airports with the most notices. Equal counts are ordered by ICAO
/// code, so the ranking does not depend on record order.
pub fn top_airports(by_airport: &BTreeMap<String, usize>, n: usize) -> Vec<AirportCount> {
    let mut ranked: Vec<AirportCount> = by_airport
        .iter()
        .map(|(airport, &count)| AirportCount {
            airport: airport.clone(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(n);
    ranked
}
