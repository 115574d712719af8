//! Static data used when the feed cannot be geocoded or reached.

use time::OffsetDateTime;

use crate::disasters::model::{AlertLevel, DisasterEvent, EventType, GeoPoint};

/// Used for types with no representative location of their own.
pub const GLOBAL_DEFAULT_LOCATION: GeoPoint = GeoPoint::new(77.0, 20.0);

pub const SAMPLE_SOURCE: &str = "sample";

/// Representative point per event type.
pub fn default_location(event_type: EventType) -> GeoPoint {
    match event_type {
        EventType::Earthquake => GeoPoint::new(139.767, 35.682),
        EventType::Flood => GeoPoint::new(100.501, 13.754),
        EventType::TropicalCyclone => GeoPoint::new(120.984, 14.599),
        EventType::Drought => GeoPoint::new(151.209, -33.868),
        EventType::Volcano => GeoPoint::new(110.446, -7.541),
        EventType::Wildfire => GeoPoint::new(-118.243, 34.052),
        EventType::Unknown => GLOBAL_DEFAULT_LOCATION,
    }
}

fn sample(
    event_type: EventType,
    alert_level: AlertLevel,
    severity: f64,
    title: &str,
    description: &str,
    now: OffsetDateTime,
) -> DisasterEvent {
    DisasterEvent {
        event_type,
        location: default_location(event_type),
        date: now,
        alert_level,
        severity,
        title: title.into(),
        description: Some(description.into()),
        source: SAMPLE_SOURCE.into(),
        magnitude: None,
        wind_speed: None,
        affected_area: None,
        population: None,
        approximate_location: false,
    }
}

/// Placeholder dataset served while the upstream feed is unavailable.
pub fn sample_events(now: OffsetDateTime) -> Vec<DisasterEvent> {
    let mut quake = sample(
        EventType::Earthquake,
        AlertLevel::Orange,
        0.7,
        "Earthquake in Japan",
        "6.5 magnitude earthquake",
        now,
    );
    quake.magnitude = Some(6.5);
    vec![
        quake,
        sample(
            EventType::Flood,
            AlertLevel::Red,
            0.9,
            "Flooding in Thailand",
            "Severe flooding affecting Bangkok area",
            now,
        ),
        sample(
            EventType::TropicalCyclone,
            AlertLevel::Red,
            0.85,
            "Tropical Cyclone in Philippines",
            "Category 3 tropical cyclone",
            now,
        ),
        sample(
            EventType::Drought,
            AlertLevel::Green,
            0.4,
            "Drought in Australia",
            "Ongoing drought conditions",
            now,
        ),
        sample(
            EventType::Volcano,
            AlertLevel::Orange,
            0.65,
            "Volcanic Activity in Indonesia",
            "Increased activity at Mt. Merapi",
            now,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_location_is_valid() {
        for t in EventType::KNOWN {
            assert!(default_location(t).is_valid(), "{t}");
        }
        assert_eq!(default_location(EventType::Unknown), GLOBAL_DEFAULT_LOCATION);
    }

    #[test]
    fn sample_events_are_well_formed() {
        let now = OffsetDateTime::now_utc();
        let events = sample_events(now);
        assert_eq!(events.len(), 5);
        for e in &events {
            assert!(e.location.is_valid());
            assert!((0.0..=1.0).contains(&e.severity));
            assert_eq!(e.source, SAMPLE_SOURCE);
            assert_eq!(e.date, now);
        }
    }
}
