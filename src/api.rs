//! REST surface consumed by the NOTAM web client.

use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::cache::ExpiringCache;
use crate::error::Error;
use crate::model::Notam;
use crate::query::{NotamFilter, NotamStats, RadiusFilter};
use crate::scheduler::{JobStatus, Scheduler};
use crate::service::NotamService;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Same-origin by default; the web client pulls fonts, scripts and map tiles
/// from a few CDNs.
const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    style-src 'self' 'unsafe-inline' https://fonts.googleapis.com https://unpkg.com; \
    script-src 'self' 'unsafe-inline' https://unpkg.com https://cdn.jsdelivr.net; \
    font-src 'self' https://fonts.gstatic.com; \
    img-src 'self' data: https: blob:; \
    connect-src 'self' https://api.openweathermap.org https://api.aviationapi.com";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NotamService>,
    pub cache: Arc<ExpiringCache<NotamsResponse>>,
    pub cache_ttl: Duration,
    pub scheduler: Arc<Scheduler>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    /// Maps a service error, answering unexpected failures with `message`.
    fn from_service(err: Error, message: &str) -> Self {
        match err {
            Error::NotFound(_) => ApiError::NotFound("NOTAM not found".to_string()),
            Error::Validation(msg) | Error::InvalidArgument(msg) => ApiError::BadRequest(msg),
            Error::RefreshInProgress => ApiError::Conflict(Error::RefreshInProgress.to_string()),
            err => {
                error!("{message}: {err}");
                ApiError::Internal(message.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NotamsQuery {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub notam_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<String>,
    /// Not echoed back; `true` skips the response cache lookup.
    #[serde(default, skip_serializing)]
    pub refresh: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn key_segment(value: Option<&str>) -> String {
    match value {
        None => "all".to_string(),
        Some(v) if v.eq_ignore_ascii_case("all") || v.contains(['_', '=']) => {
            format!("={}", v.replace('=', "=e").replace('_', "=u"))
        }
        Some(v) => v.to_string(),
    }
}

fn parse_number(name: &str, value: &str) -> Result<f64, ApiError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ApiError::BadRequest(format!("{name} must be a number, got {value:?}")))
}

impl NotamsQuery {
    /// `notams_<type>_<airport>_<radius>`, with `all` for unset parts. The
    /// status, priority and center segments are only appended when one of
    /// them is set, so plain queries keep the short key.
    ///
    /// A supplied value that reads as `all` or contains `_` or `=` is written
    /// as `=` followed by the value with `=` and `_` escaped, so it can never
    /// collide with an unset part or a segment boundary.
    pub fn cache_key(&self) -> String {
        let part = |value: &Option<String>| key_segment(present(value));
        let mut key = format!(
            "notams_{}_{}_{}",
            part(&self.notam_type),
            part(&self.airport),
            part(&self.radius)
        );
        if [&self.status, &self.priority, &self.lat, &self.lng]
            .iter()
            .any(|v| present(v).is_some())
        {
            key.push_str(&format!(
                "_{}_{}_{}_{}",
                part(&self.status),
                part(&self.priority),
                part(&self.lat),
                part(&self.lng)
            ));
        }
        key
    }

    pub fn bypass_cache(&self) -> bool {
        present(&self.refresh).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }

    /// Radius filtering needs `radius`, `lat` and `lng`; a partial set is
    /// ignored, but any supplied number must parse.
    pub fn to_filter(&self) -> Result<NotamFilter, ApiError> {
        let mut filter = NotamFilter::default();
        if let Some(t) = present(&self.notam_type) {
            filter = filter.with_type(t);
        }
        if let Some(airport) = present(&self.airport) {
            filter = filter.with_airport(airport);
        }
        if let Some(status) = present(&self.status) {
            filter = filter.with_status(status);
        }
        if let Some(priority) = present(&self.priority) {
            filter = filter.with_priority(priority);
        }

        let radius = present(&self.radius)
            .map(|v| parse_number("radius", v))
            .transpose()?;
        let lat = present(&self.lat)
            .map(|v| parse_number("lat", v))
            .transpose()?;
        let lng = present(&self.lng)
            .map(|v| parse_number("lng", v))
            .transpose()?;
        if let (Some(radius), Some(lat), Some(lng)) = (radius, lat, lng) {
            let radius = RadiusFilter::new(lat, lng, radius)
                .map_err(|e| ApiError::from_service(e, "Failed to fetch NOTAMs"))?;
            filter = filter.with_radius(radius);
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotamsResponse {
    pub notams: Vec<Notam>,
    pub total: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub filters: NotamsQuery,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/notams", get(list_notams))
        .route("/api/notams/refresh", post(refresh_notams))
        .route("/api/notams/stats/summary", get(stats_summary))
        .route("/api/notams/airport/:icao", get(airport_notams))
        .route("/api/notams/radius/:lat/:lng/:radius", get(radius_notams))
        .route("/api/notams/:id", get(get_notam))
        .route("/api/jobs", get(list_jobs))
}

/// Tracing, CORS, gzip, security headers and the request timeout, applied
/// to every route including the client fallback.
fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn router(state: AppState) -> Router {
    with_middleware(routes(), state)
}

/// The API router plus the built web client: unknown paths serve files from
/// `dir` and fall back to its `index.html`.
pub fn router_with_client(state: AppState, dir: &FsPath) -> Router {
    let client = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
    with_middleware(routes().fallback_service(client), state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
    })
}

async fn list_notams(
    State(state): State<AppState>,
    Query(query): Query<NotamsQuery>,
) -> Result<Json<NotamsResponse>, ApiError> {
    let key = query.cache_key();
    if !query.bypass_cache() {
        if let Some(cached) = state.cache.get(&key) {
            debug!("serving {key} from cache");
            return Ok(Json(cached));
        }
    }

    let filter = query.to_filter()?;
    let (notams, last_update) = state.service.query(&filter);
    let response = NotamsResponse {
        total: notams.len(),
        notams,
        last_update,
        filters: NotamsQuery {
            refresh: None,
            ..query
        },
    };
    state.cache.set(key, response.clone(), state.cache_ttl);
    Ok(Json(response))
}

async fn get_notam(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notam>, ApiError> {
    state
        .service
        .get_by_id(&id)
        .map(Json)
        .map_err(|e| ApiError::from_service(e, "Failed to fetch NOTAM"))
}

async fn airport_notams(
    State(state): State<AppState>,
    Path(icao): Path<String>,
) -> Json<Vec<Notam>> {
    Json(state.service.by_airport(&icao))
}

async fn radius_notams(
    State(state): State<AppState>,
    Path((lat, lng, radius)): Path<(String, String, String)>,
) -> Result<Json<Vec<Notam>>, ApiError> {
    let lat = parse_number("lat", &lat)?;
    let lng = parse_number("lng", &lng)?;
    let radius = parse_number("radius", &radius)?;
    state
        .service
        .by_radius(lat, lng, radius)
        .map(Json)
        .map_err(|e| ApiError::from_service(e, "Failed to fetch radius NOTAMs"))
}

async fn refresh_notams(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    state
        .service
        .refresh()
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to refresh NOTAM data"))?;
    Ok(Json(MessageResponse {
        message: "NOTAM data refreshed successfully",
    }))
}

async fn stats_summary(State(state): State<AppState>) -> Json<NotamStats> {
    Json(state.service.stats())
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobStatus>> {
    Json(state.scheduler.status())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> NotamsQuery {
        let mut q = NotamsQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "type" => q.notam_type = v,
                "airport" => q.airport = v,
                "status" => q.status = v,
                "priority" => q.priority = v,
                "lat" => q.lat = v,
                "lng" => q.lng = v,
                "radius" => q.radius = v,
                "refresh" => q.refresh = v,
                _ => unreachable!(),
            }
        }
        q
    }

    #[test]
    fn test_cache_key_short_form() {
        assert_eq!(query(&[]).cache_key(), "notams_all_all_all");
        assert_eq!(
            query(&[("type", "RWY"), ("airport", "OERK")]).cache_key(),
            "notams_RWY_OERK_all"
        );
        assert_eq!(
            query(&[("radius", "50"), ("refresh", "true")]).cache_key(),
            "notams_all_all_50"
        );
    }

    #[test]
    fn test_cache_key_extended_form() {
        assert_eq!(
            query(&[("status", "ACTIVE")]).cache_key(),
            "notams_all_all_all_ACTIVE_all_all_all"
        );
        assert_eq!(
            query(&[("radius", "50"), ("lat", "24.9"), ("lng", "46.7")]).cache_key(),
            "notams_all_all_50_all_all_24.9_46.7"
        );
    }

    #[test]
    fn test_cache_key_never_collides_with_unset_parts() {
        let plain = query(&[]).cache_key();
        for value in ["all", "ALL", "All"] {
            assert_ne!(query(&[("type", value)]).cache_key(), plain);
        }
        assert_eq!(query(&[("type", "all")]).cache_key(), "notams_=all_all_all");

        // an underscore must not shift the segment boundaries
        assert_ne!(
            query(&[("type", "RWY_OERK")]).cache_key(),
            query(&[("type", "RWY"), ("airport", "OERK")]).cache_key()
        );
        assert_ne!(
            query(&[("type", "=all")]).cache_key(),
            query(&[("type", "all")]).cache_key()
        );
        assert_ne!(
            query(&[("status", "all")]).cache_key(),
            query(&[("priority", "x")]).cache_key()
        );
    }

    #[test]
    fn test_bypass_cache() {
        assert!(query(&[("refresh", "true")]).bypass_cache());
        assert!(query(&[("refresh", "1")]).bypass_cache());
        assert!(!query(&[("refresh", "false")]).bypass_cache());
        assert!(!query(&[]).bypass_cache());
    }

    #[test]
    fn test_to_filter_rejects_non_numeric_radius() {
        let err = query(&[("radius", "far")]).to_filter().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_to_filter_needs_full_radius_triple() {
        let filter = query(&[("radius", "50"), ("lat", "24.9")]).to_filter().unwrap();
        assert!(filter.radius.is_none());

        let filter = query(&[("radius", "50"), ("lat", "24.9"), ("lng", "46.7")])
            .to_filter()
            .unwrap();
        assert_eq!(filter.radius.map(|r| r.radius_km), Some(50.0));
    }

    #[test]
    fn test_filters_echo_omits_unset_fields() {
        let json = serde_json::to_value(query(&[("type", "NAV"), ("refresh", "true")])).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "NAV" }));
    }
}
