//! Ingestion-time severity score.
//!
//! This is the only place stored `severity` values are derived. The heat-map
//! weighting in `disasters::intensity` is a separate transform with its own
//! tables.

use crate::disasters::model::{AlertLevel, EventType, Magnitudes};

/// Base used when the item carried no recognizable alert level.
pub const UNRECOGNIZED_ALERT_BASE: f64 = 0.3;

/// Multiplier for types without a type-specific magnitude signal.
pub const DEFAULT_TYPE_MULTIPLIER: f64 = 0.7;

pub fn alert_base(alert_level: Option<AlertLevel>) -> f64 {
    match alert_level {
        Some(AlertLevel::Red) => 1.0,
        Some(AlertLevel::Orange) => 0.7,
        Some(AlertLevel::Green) => 0.4,
        None => UNRECOGNIZED_ALERT_BASE,
    }
}

fn ratio(value: f64, scale: f64) -> f64 {
    (value / scale).min(1.0)
}

fn type_multiplier(event_type: EventType, m: &Magnitudes) -> f64 {
    match event_type {
        EventType::Earthquake => m.magnitude.map_or(1.0, |v| ratio(v, 10.0)),
        EventType::TropicalCyclone => m.wind_speed.map_or(1.0, |v| ratio(v, 200.0)),
        EventType::Flood => match (m.population, m.flood_indicator, m.affected_area) {
            (Some(pop), Some(ind), _) => 0.4 * ratio(pop, 1_000_000.0) + 0.6 * ratio(ind, 3.0),
            (_, _, Some(area)) => ratio(area, 10_000.0),
            _ => 1.0,
        },
        _ => DEFAULT_TYPE_MULTIPLIER,
    }
}

/// Severity in `[0, 1]`. Pure: identical inputs always give the same score.
pub fn severity(event_type: EventType, alert_level: Option<AlertLevel>, m: &Magnitudes) -> f64 {
    let score = alert_base(alert_level) * type_multiplier(event_type, m);
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}
