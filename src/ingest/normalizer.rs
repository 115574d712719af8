//! Feed item → canonical [`DisasterEvent`].
//!
//! Items are loosely-typed JSON values (see `ingest::rss`). Field names and
//! nesting vary by source, so every lookup tries a short list of shapes in a
//! fixed order and falls through on anything missing or unparseable.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    OffsetDateTime,
};
use tracing::{debug, warn};

use super::{fallback, rss::TEXT_KEY, severity};
use crate::disasters::model::{AlertLevel, DisasterEvent, EventType, GeoPoint, Magnitudes};

/// Name of the nested, source-specific block (`gdacs:*` elements).
const SOURCE_BLOCK: &str = "gdacs";

const LAT_KEYS: &[&str] = &["lat", "latitude", "geo:lat"];
const LON_KEYS: &[&str] = &["long", "lon", "lng", "longitude", "geo:long"];

lazy_static! {
    static ref TITLE_ALERT_RE: Regex =
        Regex::new(r"(?i)\b(red|orange|green)\b(?:\s+[a-z]+){0,2}\s+alert\b").unwrap();
    static ref DESC_LAT_RE: Regex =
        Regex::new(r"(?i)\blat(?:itude)?\s*[=:]\s*(-?\d+(?:\.\d+)?)").unwrap();
    static ref DESC_LON_RE: Regex =
        Regex::new(r"(?i)\b(?:lon|lng|long|longitude)\s*[=:]\s*(-?\d+(?:\.\d+)?)").unwrap();
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("feed item is not a record")]
    NotARecord,
    #[error("feed item has no fields")]
    EmptyRecord,
}

/// Text content of a loosely-typed value.
fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => o.get(TEXT_KEY).and_then(scalar),
        Value::Array(items) => items.iter().find_map(scalar),
        _ => None,
    }
}

/// Finite number carried by a value; for element objects the `value`
/// attribute wins over the text.
fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(o) => o
            .get("@value")
            .and_then(number)
            .or_else(|| o.get(TEXT_KEY).and_then(number)),
        Value::Array(items) => items.iter().find_map(number),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Case-insensitive lookup of the first present key.
fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|want| {
        map.iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(want) && !v.is_null())
            .map(|(_, v)| v)
    })
}

/// Lookup inside the source block: either `{gdacs: {key}}` or a flat
/// `gdacs:key` field.
fn nested<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let block = field(map, &[SOURCE_BLOCK]).and_then(Value::as_object);
    keys.iter().find_map(|key| {
        let flat = format!("{SOURCE_BLOCK}:{key}");
        block
            .and_then(|b| field(b, &[*key]))
            .or_else(|| field(map, &[flat.as_str()]))
    })
}

fn pair(a: Option<f64>, b: Option<f64>) -> Option<(f64, f64)> {
    Some((a?, b?))
}

fn split_numbers(raw: &str, sep: impl Fn(char) -> bool) -> Option<(f64, f64)> {
    let mut parts = raw.split(sep).map(str::trim).filter(|p| !p.is_empty());
    let a = parts.next()?.parse::<f64>().ok()?;
    let b = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((a, b))
}

fn lat_lon_in(map: &Map<String, Value>) -> Option<GeoPoint> {
    let (lat, lon) = pair(
        field(map, LAT_KEYS).and_then(number),
        field(map, LON_KEYS).and_then(number),
    )?;
    GeoPoint::from_lat_lon(lat, lon)
}

/// 1. dedicated latitude/longitude fields on the source block (or top level).
fn from_dedicated_fields(item: &Map<String, Value>) -> Option<GeoPoint> {
    let (lat, lon) = pair(
        nested(item, &["latitude", "lat"]).and_then(number),
        nested(item, &["longitude", "lon", "long"]).and_then(number),
    )
    .or_else(|| {
        pair(
            field(item, &["latitude"]).and_then(number),
            field(item, &["longitude"]).and_then(number),
        )
    })?;
    GeoPoint::from_lat_lon(lat, lon)
}

/// 2. `"lat lon"` point string.
fn from_point_string(item: &Map<String, Value>) -> Option<GeoPoint> {
    let raw = field(item, &["georss:point", "point"])
        .or_else(|| {
            field(item, &["georss"])
                .and_then(Value::as_object)
                .and_then(|g| field(g, &["point"]))
        })
        .and_then(scalar)?;
    let (lat, lon) = split_numbers(&raw, char::is_whitespace)?;
    GeoPoint::from_lat_lon(lat, lon)
}

/// 3. `"lon,lat"` coordinates string.
fn from_coordinates_string(item: &Map<String, Value>) -> Option<GeoPoint> {
    let raw = field(item, &["coordinates"])
        .or_else(|| nested(item, &["coordinates"]))
        .and_then(scalar)?;
    let (lon, lat) = split_numbers(&raw, |c| c == ',')?;
    GeoPoint::from_lat_lon(lat, lon)
}

/// 4. any nested object (two levels deep) holding a `{lat, long}` pair.
fn from_nested_pair(item: &Map<String, Value>) -> Option<GeoPoint> {
    item.iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case(SOURCE_BLOCK))
        .filter_map(|(_, v)| v.as_object())
        .find_map(|obj| {
            lat_lon_in(obj).or_else(|| {
                obj.values()
                    .filter_map(Value::as_object)
                    .find_map(lat_lon_in)
            })
        })
}

/// 5. `lat=… lon=…` embedded in the description.
fn from_description(item: &Map<String, Value>) -> Option<GeoPoint> {
    let text = field(item, &["description", "summary"]).and_then(scalar)?;
    let capture = |re: &Regex| {
        re.captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };
    let (lat, lon) = pair(capture(&DESC_LAT_RE), capture(&DESC_LON_RE))?;
    GeoPoint::from_lat_lon(lat, lon)
}

/// Returns the point and whether it is a per-type default.
fn extract_location(item: &Map<String, Value>, event_type: EventType) -> (GeoPoint, bool) {
    let found = from_dedicated_fields(item)
        .or_else(|| from_point_string(item))
        .or_else(|| from_coordinates_string(item))
        .or_else(|| from_nested_pair(item))
        .or_else(|| from_description(item));
    match found {
        Some(p) => (p, false),
        None => (fallback::default_location(event_type), true),
    }
}

/// `None` when the item carries no alert signal at all.
fn extract_alert_level(item: &Map<String, Value>, title: Option<&str>) -> Option<AlertLevel> {
    const KEYS: &[&str] = &["alertlevel", "alert_level", "alert"];
    field(item, KEYS)
        .and_then(scalar)
        .and_then(|s| AlertLevel::detect(&s))
        .or_else(|| nested(item, KEYS).and_then(scalar).and_then(|s| AlertLevel::detect(&s)))
        .or_else(|| {
            let caps = TITLE_ALERT_RE.captures(title?)?;
            AlertLevel::detect(caps.get(1)?.as_str())
        })
}

fn extract_event_type(item: &Map<String, Value>) -> EventType {
    const KEYS: &[&str] = &["eventtype", "event_type", "type"];
    let known = |v: &Value| scalar(v).and_then(|s| s.parse::<EventType>().ok());
    field(item, KEYS)
        .and_then(known)
        .or_else(|| nested(item, KEYS).and_then(known))
        .unwrap_or(EventType::Unknown)
}

fn parse_date(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(d) = OffsetDateTime::parse(raw, &Rfc2822) {
        return Some(d);
    }
    if let Ok(d) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(d);
    }
    // RSS feeds commonly spell the zone as a name.
    let numeric = raw
        .strip_suffix(" GMT")
        .or_else(|| raw.strip_suffix(" UTC"))
        .or_else(|| raw.strip_suffix(" UT"))?;
    OffsetDateTime::parse(&format!("{numeric} +0000"), &Rfc2822).ok()
}

fn extract_date(item: &Map<String, Value>) -> Option<OffsetDateTime> {
    field(item, &["pubdate", "published", "updated", "date"])
        .or_else(|| nested(item, &["fromdate"]))
        .and_then(scalar)
        .and_then(|s| parse_date(&s))
}

fn extract_magnitudes(item: &Map<String, Value>, event_type: EventType) -> Magnitudes {
    let num = |keys: &[&str]| {
        field(item, keys)
            .and_then(number)
            .or_else(|| nested(item, keys).and_then(number))
    };
    let source_severity = nested(item, &["severity"]).and_then(number);
    Magnitudes {
        magnitude: num(&["magnitude"])
            .or(source_severity.filter(|_| event_type == EventType::Earthquake)),
        wind_speed: num(&["windspeed", "wind_speed"])
            .or(source_severity.filter(|_| event_type == EventType::TropicalCyclone)),
        affected_area: num(&["affectedarea", "affected_area"]),
        population: num(&["population"]),
        flood_indicator: source_severity
            .or_else(|| field(item, &["severity"]).and_then(number))
            .filter(|_| event_type == EventType::Flood),
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    source_name: String,
}

impl Normalizer {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
        }
    }

    pub fn normalize(&self, item: &Value, now: OffsetDateTime) -> Result<DisasterEvent, NormalizeError> {
        let item = item.as_object().ok_or(NormalizeError::NotARecord)?;
        if item.is_empty() {
            return Err(NormalizeError::EmptyRecord);
        }

        let event_type = extract_event_type(item);
        let title = field(item, &["title"]).and_then(scalar);
        let detected_alert = extract_alert_level(item, title.as_deref());
        let (location, approximate_location) = extract_location(item, event_type);
        let m = extract_magnitudes(item, event_type);
        let score = severity::severity(event_type, detected_alert, &m);

        let is = |t: EventType| event_type == t;
        Ok(DisasterEvent {
            event_type,
            location,
            date: extract_date(item).unwrap_or(now),
            alert_level: detected_alert.unwrap_or(AlertLevel::Green),
            severity: score,
            title: title.unwrap_or_else(|| format!("{} alert", event_type.label())),
            description: field(item, &["description", "summary"]).and_then(scalar),
            source: field(item, &["source"])
                .and_then(scalar)
                .unwrap_or_else(|| self.source_name.clone()),
            magnitude: m.magnitude.filter(|_| is(EventType::Earthquake)),
            wind_speed: m.wind_speed.filter(|_| is(EventType::TropicalCyclone)),
            affected_area: m.affected_area.filter(|_| is(EventType::Flood)),
            population: m.population.filter(|_| is(EventType::Flood)),
            approximate_location,
        })
    }

    /// Normalizes every usable item; bad items are logged and skipped.
    pub fn normalize_batch(&self, items: &[Value], now: OffsetDateTime) -> Vec<DisasterEvent> {
        let events: Vec<_> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match self.normalize(item, now) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "dropping feed item");
                    None
                }
            })
            .collect();
        debug!(total = items.len(), kept = events.len(), "normalized feed items");
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

    fn normalizer() -> Normalizer {
        Normalizer::new("GDACS")
    }

    #[test]
    fn normalizes_flat_earthquake_item() {
        let item = json!({
            "eventtype": "EQ",
            "alertlevel": "Red",
            "magnitude": "7.8",
            "georss:point": "35.682 139.767"
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.event_type, EventType::Earthquake);
        assert_eq!(e.alert_level, AlertLevel::Red);
        assert_eq!(e.location, GeoPoint::new(139.767, 35.682));
        assert!((e.severity - 0.78).abs() < 1e-9);
        assert_eq!(e.magnitude, Some(7.8));
        assert_eq!(e.date, NOW);
        assert_eq!(e.source, "GDACS");
        assert_eq!(e.title, "Earthquake alert");
        assert!(!e.approximate_location);
    }

    #[test]
    fn reads_nested_source_block() {
        let item = json!({
            "title": "Orange flood alert in Bangladesh",
            "pubDate": "Sat, 01 Jun 2024 10:15:00 GMT",
            "gdacs:eventtype": "FL",
            "gdacs:alertlevel": "Orange",
            "gdacs:severity": { "@value": "1.5", "#text": "Magnitude 1.5" },
            "gdacs:population": { "@value": "500000" },
            "gdacs": { "latitude": "23.7", "longitude": "90.4" }
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.event_type, EventType::Flood);
        assert_eq!(e.alert_level, AlertLevel::Orange);
        assert_eq!(e.location, GeoPoint::new(90.4, 23.7));
        assert_eq!(e.date, datetime!(2024-06-01 10:15 UTC));
        assert_eq!(e.population, Some(500_000.0));
        assert!((e.severity - 0.7 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn coordinates_string_is_lon_lat() {
        let item = json!({ "eventtype": "VO", "coordinates": "110.446, -7.541" });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.location, GeoPoint::new(110.446, -7.541));
    }

    #[test]
    fn nested_lat_long_pair() {
        let item = json!({
            "eventtype": "TC",
            "geo:Point": { "geo:lat": "14.599", "geo:long": "120.984" }
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.location, GeoPoint::new(120.984, 14.599));
        assert!(!e.approximate_location);
    }

    #[test]
    fn description_coordinates_are_last_resort() {
        let item = json!({
            "eventtype": "WF",
            "description": "Fire front near lat=-33.9 lon=151.2, spreading east"
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.location, GeoPoint::new(151.2, -33.9));
    }

    #[test]
    fn earlier_strategies_win() {
        let item = json!({
            "eventtype": "EQ",
            "georss:point": "35.0 139.0",
            "coordinates": "1.0,2.0",
            "description": "lat=10 lon=10"
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.location, GeoPoint::new(139.0, 35.0));
    }

    #[test]
    fn invalid_coordinates_fall_through() {
        let item = json!({
            "eventtype": "EQ",
            "georss:point": "0 0",
            "coordinates": "200,10",
            "description": "lat=12.5 lon=45.25"
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.location, GeoPoint::new(45.25, 12.5));
    }

    #[test]
    fn missing_coordinates_use_type_default() {
        for t in EventType::KNOWN {
            let item = json!({ "eventtype": t.code(), "title": "somewhere" });
            let e = normalizer().normalize(&item, NOW).unwrap();
            assert_eq!(e.location, fallback::default_location(t));
            assert!(e.approximate_location);
        }
        let e = normalizer()
            .normalize(&json!({ "eventtype": "TS" }), NOW)
            .unwrap();
        assert_eq!(e.event_type, EventType::Unknown);
        assert_eq!(e.location, fallback::GLOBAL_DEFAULT_LOCATION);
    }

    #[test]
    fn alert_level_from_title_phrase() {
        let item = json!({
            "eventtype": "TC",
            "title": "Red tropical cyclone alert for MAWAR-23"
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.alert_level, AlertLevel::Red);
    }

    #[test]
    fn missing_alert_defaults_to_green_with_low_base() {
        let item = json!({ "eventtype": "EQ", "magnitude": 5, "title": "Quake in the redwoods" });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.alert_level, AlertLevel::Green);
        assert!((e.severity - 0.3 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn type_specific_fields_only_for_their_type() {
        let item = json!({ "eventtype": "VO", "magnitude": "4", "windspeed": "100" });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.magnitude, None);
        assert_eq!(e.wind_speed, None);
    }

    #[test]
    fn cyclone_wind_speed_from_source_severity() {
        let item = json!({
            "gdacs:eventtype": "TC",
            "gdacs:alertlevel": "Red",
            "gdacs:severity": { "@unit": "km/h", "@value": "180" }
        });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.wind_speed, Some(180.0));
        assert!((e.severity - 0.9).abs() < 1e-9);
    }

    #[test]
    fn unparseable_date_uses_now() {
        let item = json!({ "eventtype": "DR", "pubDate": "yesterday-ish" });
        let e = normalizer().normalize(&item, NOW).unwrap();
        assert_eq!(e.date, NOW);
    }

    #[test]
    fn non_records_are_rejected() {
        assert_eq!(
            normalizer().normalize(&json!("just text"), NOW),
            Err(NormalizeError::NotARecord)
        );
        assert_eq!(
            normalizer().normalize(&json!({}), NOW),
            Err(NormalizeError::EmptyRecord)
        );
    }

    #[test]
    fn batch_skips_bad_items() {
        let items = vec![
            json!({ "eventtype": "EQ", "alertlevel": "Orange" }),
            json!(42),
            json!({}),
            json!({ "eventtype": "FL", "coordinates": "not,numbers" }),
        ];
        let events = normalizer().normalize_batch(&items, NOW);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Earthquake);
        assert_eq!(events[1].event_type, EventType::Flood);
        assert!(events[1].approximate_location);
    }

    #[test]
    fn parses_real_feed_shape() {
        let xml = r#"<rss xmlns:gdacs="g" xmlns:geo="w" xmlns:georss="r"><channel><item>
            <title>Green earthquake alert (Magnitude 5.1M, Depth:10km) in Japan</title>
            <pubDate>Sat, 01 Jun 2024 10:15:00 GMT</pubDate>
            <gdacs:eventtype>EQ</gdacs:eventtype>
            <gdacs:severity unit="M" value="5.1">Magnitude 5.1M</gdacs:severity>
            <geo:Point><geo:lat>36.1</geo:lat><geo:long>140.1</geo:long></geo:Point>
        </item></channel></rss>"#;
        let items = crate::ingest::rss::parse_items(xml).unwrap();
        let events = normalizer().normalize_batch(&items, NOW);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.alert_level, AlertLevel::Green);
        assert_eq!(e.magnitude, Some(5.1));
        assert_eq!(e.location, GeoPoint::new(140.1, 36.1));
        assert!((e.severity - 0.4 * 0.51).abs() < 1e-9);
    }
}
