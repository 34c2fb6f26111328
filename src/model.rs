//! NOTAM records, their enumerated codes and the KSA airport reference list.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotamType {
    Rwy,
    Nav,
    Com,
    Obst,
    Ad,
}

impl NotamType {
    pub const ALL: [NotamType; 5] = [
        NotamType::Rwy,
        NotamType::Nav,
        NotamType::Com,
        NotamType::Obst,
        NotamType::Ad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotamType::Rwy => "RWY",
            NotamType::Nav => "NAV",
            NotamType::Com => "COM",
            NotamType::Obst => "OBST",
            NotamType::Ad => "AD",
        }
    }

    /// Human-readable category shown by clients next to the type code.
    pub fn category(&self) -> &'static str {
        match self {
            NotamType::Rwy => "Runway",
            NotamType::Nav => "Navigation",
            NotamType::Com => "Communication",
            NotamType::Obst => "Obstruction",
            NotamType::Ad => "Aerodrome",
        }
    }
}

impl fmt::Display for NotamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known state of a notice. It is stored as delivered by the data source
/// and is not recomputed from the date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotamStatus {
    Active,
    Expired,
    Pending,
}

impl NotamStatus {
    pub const ALL: [NotamStatus; 3] = [
        NotamStatus::Active,
        NotamStatus::Expired,
        NotamStatus::Pending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotamStatus::Active => "ACTIVE",
            NotamStatus::Expired => "EXPIRED",
            NotamStatus::Pending => "PENDING",
        }
    }
}

impl fmt::Display for NotamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Normal => "NORMAL",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notam {
    pub id: String,
    pub number: String,
    #[serde(rename = "type")]
    pub notam_type: NotamType,
    pub status: NotamStatus,
    pub priority: Priority,
    pub airport: String,
    pub airport_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub message: String,
    pub category: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Notam {
    /// Point location of the notice, if both coordinates are present and valid.
    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::new(self.latitude?, self.longitude?).ok()
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(Error::Validation(format!(
                "NOTAM {} ends ({}) before it starts ({})",
                self.id, self.end_date, self.start_date
            )));
        }
        if let (Some(lat), Some(lng)) = (self.latitude, self.longitude) {
            GeoPoint::new(lat, lng)
                .map_err(|e| Error::Validation(format!("NOTAM {}: {e}", self.id)))?;
        }
        Ok(())
    }
}

/// Entry of the fixed KSA airport reference list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Airport {
    pub icao: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

const fn airport(icao: &'static str, name: &'static str, lat: f64, lng: f64) -> Airport {
    Airport {
        icao,
        name,
        lat,
        lng,
    }
}

pub const KSA_AIRPORTS: [Airport; 10] = [
    airport("OERK", "King Khalid International Airport", 24.9578, 46.6989),
    airport("OEJN", "King Abdulaziz International Airport", 21.6805, 39.1565),
    airport("OEDF", "King Fahd International Airport", 26.4712, 49.7979),
    airport("OEMA", "Prince Mohammad bin Abdulaziz Airport", 24.5534, 39.7051),
    airport("OESH", "King Abdullah bin Abdulaziz Airport", 17.4669, 47.1214),
    airport("OETB", "Tabuk Regional Airport", 28.3654, 36.6189),
    airport("OEGS", "King Khalid Military City Airport", 27.9008, 45.5282),
    airport("OERY", "Riyadh Air Base", 24.7098, 46.7252),
    airport("OEAH", "Al Ahsa International Airport", 25.2853, 49.4856),
    airport("OEGN", "King Abdullah Economic City Airport", 22.7559, 39.1731),
];

pub fn find_airport(icao: &str) -> Option<&'static Airport> {
    KSA_AIRPORTS
        .iter()
        .find(|airport| airport.icao.eq_ignore_ascii_case(icao))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone};

    use super::*;

    pub fn notam(id: &str, notam_type: NotamType, airport: &str) -> Notam {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let ap = find_airport(airport).expect("fixture airport must exist");
        Notam {
            id: id.to_string(),
            number: "A0001/2026".to_string(),
            notam_type,
            status: NotamStatus::Active,
            priority: Priority::Normal,
            airport: ap.icao.to_string(),
            airport_name: ap.name.to_string(),
            latitude: Some(ap.lat),
            longitude: Some(ap.lng),
            start_date: start,
            end_date: start + Duration::days(30),
            description: format!("Runway maintenance at {}", ap.name),
            message: format!("A{} RWY 15/33 CLSD", ap.icao),
            category: notam_type.category().to_string(),
            created: start,
            updated: start,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::fixtures::notam;
    use super::*;

    #[test]
    fn test_serializes_with_wire_names() {
        let n = notam("n1", NotamType::Obst, "OERK");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "OBST");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["priority"], "NORMAL");
        assert_eq!(json["airportName"], "King Khalid International Airport");
        assert_eq!(json["category"], "Obstruction");
        assert!(json["startDate"].as_str().unwrap().starts_with("2026-01-01T00:00:00"));
        assert!(json.get("notam_type").is_none());
    }

    #[test]
    fn test_missing_coordinates_deserialize_as_none() {
        let mut json = serde_json::to_value(notam("n1", NotamType::Rwy, "OEJN")).unwrap();
        let obj = json.as_object_mut().unwrap();
        obj.remove("latitude");
        obj.remove("longitude");
        let n: Notam = serde_json::from_value(json).unwrap();
        assert!(n.latitude.is_none());
        assert!(n.location().is_none());
    }

    #[test]
    fn test_validate_rejects_inverted_dates() {
        let mut n = notam("n1", NotamType::Rwy, "OERK");
        assert!(n.validate().is_ok());
        n.end_date = n.start_date - Duration::hours(1);
        assert!(matches!(n.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_coordinates() {
        let mut n = notam("n1", NotamType::Rwy, "OERK");
        n.latitude = Some(120.0);
        assert!(n.validate().is_err());
    }

    #[test]
    fn test_find_airport_is_case_insensitive() {
        assert_eq!(find_airport("oerk").map(|a| a.icao), Some("OERK"));
        assert!(find_airport("KJFK").is_none());
    }
}
