//! Heat-map weighting.
//!
//! Kept apart from the stored severity score: it folds in recency and has a
//! visibility floor, and its tables are tuned for display only.

use time::OffsetDateTime;

use super::model::{AlertLevel, EventType};

pub const MIN_INTENSITY: f64 = 0.25;
const RECENT_WINDOW_DAYS: f64 = 1.0;
const MIN_RECENCY: f64 = 0.4;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// The fields the heat layer looks at.
#[derive(Debug, Clone, Copy)]
pub struct IntensityInput {
    pub event_type: EventType,
    pub severity: Option<f64>,
    pub alert_level: Option<AlertLevel>,
    pub date: Option<OffsetDateTime>,
}

fn display_base(alert_level: Option<AlertLevel>) -> f64 {
    match alert_level {
        Some(AlertLevel::Red) => 1.0,
        Some(AlertLevel::Orange) => 0.75,
        Some(AlertLevel::Green) => 0.5,
        None => 0.3,
    }
}

pub fn type_weight(event_type: EventType) -> f64 {
    match event_type {
        EventType::Earthquake => 1.3,
        EventType::TropicalCyclone => 1.2,
        EventType::Flood => 1.1,
        EventType::Drought => 0.9,
        EventType::Volcano => 1.2,
        EventType::Wildfire => 1.0,
        EventType::Unknown => 1.0,
    }
}

/// 1.0 inside the last day, then a log decay that bottoms out at 0.4.
pub fn recency_factor(days_since: f64) -> f64 {
    let days = days_since.max(0.0);
    if days <= RECENT_WINDOW_DAYS {
        1.0
    } else {
        (1.0 - 0.15 * (days + 1.0).log10()).max(MIN_RECENCY)
    }
}

pub fn days_between(then: OffsetDateTime, now: OffsetDateTime) -> f64 {
    ((now - then).as_seconds_f64() / SECONDS_PER_DAY).max(0.0)
}

/// Rendering weight in `[0.25, 1]`.
pub fn intensity(input: &IntensityInput, now: OffsetDateTime) -> f64 {
    let base = match input.severity {
        Some(s) if s.is_finite() => s.clamp(0.0, 1.0),
        _ => display_base(input.alert_level),
    };
    let recency = input
        .date
        .map_or(1.0, |d| recency_factor(days_between(d, now)));
    let value = base * type_weight(input.event_type) * recency;
    value.clamp(MIN_INTENSITY, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, Duration};

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

    fn input(severity: Option<f64>, alert: Option<AlertLevel>, t: EventType) -> IntensityInput {
        IntensityInput {
            event_type: t,
            severity,
            alert_level: alert,
            date: Some(NOW),
        }
    }

    #[test]
    fn severity_takes_precedence_over_alert_level() {
        let i = intensity(&input(Some(0.5), Some(AlertLevel::Red), EventType::Wildfire), NOW);
        assert!((i - 0.5).abs() < 1e-9);
    }

    #[test]
    fn alert_level_table_applies_without_severity() {
        let orange = intensity(&input(None, Some(AlertLevel::Orange), EventType::Wildfire), NOW);
        assert!((orange - 0.75).abs() < 1e-9);
        let green = intensity(&input(None, Some(AlertLevel::Green), EventType::Drought), NOW);
        assert!((green - 0.45).abs() < 1e-9);
        let unknown = intensity(&input(None, None, EventType::Wildfire), NOW);
        assert!((unknown - 0.3).abs() < 1e-9);
    }

    #[test]
    fn type_weight_is_capped_at_one() {
        let i = intensity(&input(Some(0.9), None, EventType::Earthquake), NOW);
        assert_eq!(i, 1.0);
    }

    #[test]
    fn recent_events_are_not_decayed() {
        assert_eq!(recency_factor(0.0), 1.0);
        assert_eq!(recency_factor(1.0), 1.0);
        assert!(recency_factor(1.5) < 1.0);
        assert_eq!(recency_factor(1e9), 0.4);
    }

    #[test]
    fn intensity_never_increases_with_age() {
        let mut prev = f64::INFINITY;
        for days in [0, 1, 2, 3, 7, 14, 30, 90, 365, 3650] {
            let mut e = input(Some(0.6), None, EventType::Flood);
            e.date = Some(NOW - Duration::days(days));
            let i = intensity(&e, NOW);
            assert!(i <= prev, "intensity rose at {days} days");
            assert!(i >= MIN_INTENSITY);
            prev = i;
        }
    }

    #[test]
    fn floor_keeps_weak_points_visible() {
        let mut e = input(Some(0.0), None, EventType::Drought);
        e.date = Some(NOW - Duration::days(400));
        assert_eq!(intensity(&e, NOW), MIN_INTENSITY);
    }

    #[test]
    fn future_dates_count_as_recent() {
        let mut e = input(Some(0.5), None, EventType::Wildfire);
        e.date = Some(NOW + Duration::days(3));
        assert!((intensity(&e, NOW) - 0.5).abs() < 1e-9);
    }
}
