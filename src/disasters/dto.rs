use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{AlertLevel, AlertLevelCount, Disaster, DisasterEvent, EventType, TypeStats};

/// GeoJSON point: `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Serialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub location: Location,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub alert_level: AlertLevel,
    pub severity: f64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
    pub approximate_location: bool,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<OffsetDateTime>,
}

impl From<DisasterEvent> for DisasterDto {
    fn from(e: DisasterEvent) -> Self {
        Self {
            id: None,
            event_type: e.event_type,
            location: Location {
                kind: "Point",
                coordinates: [e.location.longitude, e.location.latitude],
            },
            date: e.date,
            alert_level: e.alert_level,
            severity: e.severity,
            title: e.title,
            description: e.description,
            source: e.source,
            magnitude: e.magnitude,
            wind_speed: e.wind_speed,
            affected_area: e.affected_area,
            population: e.population,
            approximate_location: e.approximate_location,
            last_updated: None,
        }
    }
}

impl From<Disaster> for DisasterDto {
    fn from(d: Disaster) -> Self {
        Self {
            id: Some(d.id),
            last_updated: Some(d.last_updated),
            ..DisasterDto::from(d.event)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub alert_level: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AreaQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Kilometers.
    pub radius: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisasterRequest {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub severity: Option<f64>,
    pub alert_level: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// RFC 3339; defaults to now.
    pub date: Option<String>,
    pub source: Option<String>,
    pub magnitude: Option<f64>,
    pub wind_speed: Option<f64>,
    pub affected_area: Option<f64>,
    pub population: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub message: String,
    pub updated: usize,
    pub using_sample_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveResponse {
    pub using_sample_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub disasters: Vec<DisasterDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertLevelCountDto {
    pub alert_level: AlertLevel,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStatsDto {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub count: i64,
    pub avg_severity: f64,
    pub by_alert_level: Vec<AlertLevelCountDto>,
}

impl From<TypeStats> for TypeStatsDto {
    fn from(s: TypeStats) -> Self {
        Self {
            event_type: s.event_type,
            count: s.count,
            avg_severity: s.avg_severity,
            by_alert_level: s
                .by_alert_level
                .into_iter()
                .map(|AlertLevelCount { alert_level, count }| AlertLevelCountDto { alert_level, count })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HeatPoint {
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
}
