use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
use tracing::info;

use super::{
    dto::{AreaQuery, CreateDisasterRequest, HeatPoint, ListQuery, RefreshResponse},
    intensity::{intensity, IntensityInput},
    model::{AlertLevel, Disaster, DisasterEvent, DisasterFilter, EventType, GeoPoint, Magnitudes},
    repo::DisasterStore,
};
use crate::{
    error::AppError,
    ingest::{
        feed::{fetch_events, FeedOutcome, FeedSource},
        normalizer::Normalizer,
        severity,
    },
};

/// Row cap for an unfiltered listing.
pub const UNFILTERED_LIMIT: i64 = 1000;
/// Row cap once any filter is applied.
pub const FILTERED_LIMIT: i64 = 100;
pub const AREA_LIMIT: i64 = 1000;
/// Widest `days` window a listing accepts (about a century).
pub const MAX_DAYS: i64 = 36_500;

const MANUAL_SOURCE: &str = "manual";

pub fn parse_filter(q: &ListQuery, now: OffsetDateTime) -> Result<DisasterFilter, AppError> {
    let event_type = non_blank(q.event_type.as_deref())
        .map(|raw| {
            raw.parse::<EventType>()
                .map_err(|e| AppError::validation("type", e))
        })
        .transpose()?;
    let alert_level = non_blank(q.alert_level.as_deref())
        .map(|raw| {
            raw.parse::<AlertLevel>()
                .map_err(|e| AppError::validation("alertLevel", e))
        })
        .transpose()?;
    let since = match q.days {
        Some(days) if days < 0 => {
            return Err(AppError::validation("days", "days must not be negative"))
        }
        Some(days) if days > MAX_DAYS => {
            return Err(AppError::validation(
                "days",
                format!("days must be at most {MAX_DAYS}"),
            ))
        }
        Some(days) => Some(
            now.checked_sub(Duration::days(days))
                .ok_or_else(|| AppError::validation("days", "days is out of range"))?,
        ),
        None => None,
    };
    Ok(DisasterFilter {
        event_type,
        alert_level,
        since,
    })
}

pub fn list_limit(filter: &DisasterFilter) -> i64 {
    if filter.is_empty() {
        UNFILTERED_LIMIT
    } else {
        FILTERED_LIMIT
    }
}

/// Resolves `lat`/`lng`/`radius` (km) into a center and a radius in meters.
pub fn parse_area(q: &AreaQuery) -> Result<(GeoPoint, f64), AppError> {
    let lat = q
        .lat
        .ok_or_else(|| AppError::validation("lat", "lat is required"))?;
    let lng = q
        .lng
        .ok_or_else(|| AppError::validation("lng", "lng is required"))?;
    let radius_km = q
        .radius
        .ok_or_else(|| AppError::validation("radius", "radius is required"))?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::validation("lat", "lat must be within [-90, 90]"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::validation("lng", "lng must be within [-180, 180]"));
    }
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(AppError::validation("radius", "radius must be a non-negative number"));
    }
    Ok((GeoPoint::new(lng, lat), radius_km * 1000.0))
}

/// Validates a manual report. Severity is scored when the caller omits it.
pub fn event_from_request(
    req: CreateDisasterRequest,
    now: OffsetDateTime,
) -> Result<DisasterEvent, AppError> {
    let event_type = non_blank(req.event_type.as_deref())
        .ok_or_else(|| AppError::validation("type", "type is required"))?
        .parse::<EventType>()
        .map_err(|e| AppError::validation("type", e))?;

    let longitude = req
        .longitude
        .ok_or_else(|| AppError::validation("longitude", "longitude is required"))?;
    let latitude = req
        .latitude
        .ok_or_else(|| AppError::validation("latitude", "latitude is required"))?;
    let location = GeoPoint::from_lat_lon(latitude, longitude).ok_or_else(|| {
        AppError::validation("location", "coordinates are out of range or missing")
    })?;

    let alert_level = non_blank(req.alert_level.as_deref())
        .map(|raw| {
            raw.parse::<AlertLevel>()
                .map_err(|e| AppError::validation("alertLevel", e))
        })
        .transpose()?;

    let date = match non_blank(req.date.as_deref()) {
        Some(raw) => OffsetDateTime::parse(raw, &Rfc3339)
            .map_err(|_| AppError::validation("date", "date must be RFC 3339"))?,
        None => now,
    };

    let magnitudes = Magnitudes {
        magnitude: req.magnitude,
        wind_speed: req.wind_speed,
        affected_area: req.affected_area,
        population: req.population,
        flood_indicator: None,
    };
    let severity = match req.severity {
        Some(s) if (0.0..=1.0).contains(&s) => s,
        Some(_) => {
            return Err(AppError::validation(
                "severity",
                "severity must be within [0, 1]",
            ))
        }
        None => severity::severity(event_type, alert_level, &magnitudes),
    };

    Ok(DisasterEvent {
        event_type,
        location,
        date,
        alert_level: alert_level.unwrap_or(AlertLevel::Green),
        severity,
        title: non_blank(req.title.as_deref())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{} report", event_type.label())),
        description: non_blank(req.description.as_deref()).map(str::to_owned),
        source: non_blank(req.source.as_deref())
            .unwrap_or(MANUAL_SOURCE)
            .to_owned(),
        magnitude: req.magnitude,
        wind_speed: req.wind_speed,
        affected_area: req.affected_area,
        population: req.population,
        approximate_location: false,
    })
}

/// Pulls the feed and upserts what it yields. A degraded pull persists
/// nothing so sample data never lands in the store.
pub async fn refresh(
    store: &dyn DisasterStore,
    feed: &dyn FeedSource,
    normalizer: &Normalizer,
    now: OffsetDateTime,
) -> Result<RefreshResponse, AppError> {
    match fetch_events(feed, normalizer, now).await {
        FeedOutcome::Live(events) => {
            let updated = store.upsert_many(&events).await?;
            info!(updated, "disasters refreshed from feed");
            Ok(RefreshResponse {
                message: format!("Updated {updated} disasters"),
                updated,
                using_sample_data: false,
                reason: None,
            })
        }
        FeedOutcome::Degraded { reason, .. } => Ok(RefreshResponse {
            message: "Feed unavailable; nothing was updated".into(),
            updated: 0,
            using_sample_data: true,
            reason: Some(reason),
        }),
    }
}

/// Heat-layer points; events without a usable location are skipped.
pub fn heat_points(rows: &[Disaster], now: OffsetDateTime) -> Vec<HeatPoint> {
    rows.iter()
        .map(|d| &d.event)
        .filter(|e| e.location.is_valid())
        .map(|e| HeatPoint {
            lat: e.location.latitude,
            lng: e.location.longitude,
            intensity: intensity(
                &IntensityInput {
                    event_type: e.event_type,
                    severity: Some(e.severity),
                    alert_level: Some(e.alert_level),
                    date: Some(e.date),
                },
                now,
            ),
        })
        .collect()
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
