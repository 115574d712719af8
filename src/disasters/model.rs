use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// GDACS event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "EQ")]
    Earthquake,
    #[serde(rename = "TC")]
    TropicalCyclone,
    #[serde(rename = "FL")]
    Flood,
    #[serde(rename = "VO")]
    Volcano,
    #[serde(rename = "DR")]
    Drought,
    #[serde(rename = "WF")]
    Wildfire,
    Unknown,
}

impl EventType {
    pub const KNOWN: [EventType; 6] = [
        EventType::Earthquake,
        EventType::TropicalCyclone,
        EventType::Flood,
        EventType::Volcano,
        EventType::Drought,
        EventType::Wildfire,
    ];

    pub fn code(self) -> &'static str {
        match self {
            EventType::Earthquake => "EQ",
            EventType::TropicalCyclone => "TC",
            EventType::Flood => "FL",
            EventType::Volcano => "VO",
            EventType::Drought => "DR",
            EventType::Wildfire => "WF",
            EventType::Unknown => "Unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventType::Earthquake => "Earthquake",
            EventType::TropicalCyclone => "Tropical cyclone",
            EventType::Flood => "Flood",
            EventType::Volcano => "Volcanic activity",
            EventType::Drought => "Drought",
            EventType::Wildfire => "Wildfire",
            EventType::Unknown => "Disaster",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        let upper = code.to_ascii_uppercase();
        if upper == "UNKNOWN" {
            return Ok(EventType::Unknown);
        }
        EventType::KNOWN
            .into_iter()
            .find(|t| t.code() == upper)
            .ok_or_else(|| format!("unknown event type `{code}`"))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Coarse severity classification, Red > Orange > Green.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertLevel {
    Red,
    Orange,
    Green,
}

impl AlertLevel {
    pub const ALL: [AlertLevel; 3] = [AlertLevel::Red, AlertLevel::Orange, AlertLevel::Green];

    /// Case-insensitive substring scan; `None` when no keyword is present.
    /// Callers store `Green` in that case.
    pub fn detect(raw: &str) -> Option<Self> {
        let level = raw.to_lowercase();
        if level.contains("red") {
            Some(AlertLevel::Red)
        } else if level.contains("orange") {
            Some(AlertLevel::Orange)
        } else if level.contains("green") {
            Some(AlertLevel::Green)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Red => "Red",
            AlertLevel::Orange => "Orange",
            AlertLevel::Green => "Green",
        }
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(AlertLevel::Red),
            "orange" => Ok(AlertLevel::Orange),
            "green" => Ok(AlertLevel::Green),
            other => Err(format!("unknown alert level `{other}`")),
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Builds a point from a `(lat, lon)` pair, rejecting anything
    /// [`GeoPoint::is_valid`] would reject.
    pub fn from_lat_lon(latitude: f64, longitude: f64) -> Option<Self> {
        let p = Self::new(longitude, latitude);
        p.is_valid().then_some(p)
    }

    /// Finite, in range, and not the `(0,0)` "missing" marker.
    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude)
            && !(self.longitude == 0.0 && self.latitude == 0.0)
    }
}

/// Type-specific magnitude signals fed to the severity scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Magnitudes {
    pub magnitude: Option<f64>,
    pub wind_speed: Option<f64>,
    pub affected_area: Option<f64>,
    pub population: Option<f64>,
    /// Numeric flood severity indicator (GDACS flood severity value).
    pub flood_indicator: Option<f64>,
}

/// Canonical disaster record, as produced by the normalizer or the
/// creation endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DisasterEvent {
    pub event_type: EventType,
    pub location: GeoPoint,
    pub date: OffsetDateTime,
    pub alert_level: AlertLevel,
    pub severity: f64,
    pub title: String,
    pub description: Option<String>,
    pub source: String,
    pub magnitude: Option<f64>,
    pub wind_speed: Option<f64>,
    pub affected_area: Option<f64>,
    pub population: Option<f64>,
    /// Set when the location is a per-type default rather than a geocoded point.
    pub approximate_location: bool,
}

/// Deduplication key: (type, coordinates, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    event_type: EventType,
    longitude: u64,
    latitude: u64,
    date: i128,
}

impl DisasterEvent {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            event_type: self.event_type,
            longitude: self.location.longitude.to_bits(),
            latitude: self.location.latitude.to_bits(),
            date: self.date.unix_timestamp_nanos(),
        }
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq)]
pub struct Disaster {
    pub id: Uuid,
    pub event: DisasterEvent,
    pub last_updated: OffsetDateTime,
}

/// Listing filter; `since` is already resolved from a relative day count.
#[derive(Debug, Clone, Default)]
pub struct DisasterFilter {
    pub event_type: Option<EventType>,
    pub alert_level: Option<AlertLevel>,
    pub since: Option<OffsetDateTime>,
}

impl DisasterFilter {
    pub fn is_empty(&self) -> bool {
        self.event_type.is_none() && self.alert_level.is_none() && self.since.is_none()
    }

    pub fn matches(&self, event: &DisasterEvent) -> bool {
        self.event_type.map_or(true, |t| t == event.event_type)
            && self.alert_level.map_or(true, |a| a == event.alert_level)
            && self.since.map_or(true, |s| event.date >= s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertLevelCount {
    pub alert_level: AlertLevel,
    pub count: i64,
}

/// Aggregate for one event type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeStats {
    pub event_type: EventType,
    pub count: i64,
    pub avg_severity: f64,
    pub by_alert_level: Vec<AlertLevelCount>,
}
