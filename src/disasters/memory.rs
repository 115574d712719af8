use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use geo::{Distance, Haversine, Point};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    model::{
        AlertLevel, AlertLevelCount, Disaster, DisasterEvent, DisasterFilter, GeoPoint, NaturalKey,
        TypeStats,
    },
    repo::DisasterStore,
};
use crate::error::StoreResult;

/// Process-local store with the same upsert semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryDisasterStore {
    rows: RwLock<HashMap<NaturalKey, Disaster>>,
}

impl MemoryDisasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(rows: &mut HashMap<NaturalKey, Disaster>, event: &DisasterEvent) -> Disaster {
        let now = OffsetDateTime::now_utc();
        let row = rows
            .entry(event.natural_key())
            .and_modify(|d| {
                d.event = event.clone();
                d.last_updated = now;
            })
            .or_insert_with(|| Disaster {
                id: Uuid::new_v4(),
                event: event.clone(),
                last_updated: now,
            });
        row.clone()
    }

    fn newest_first(mut rows: Vec<Disaster>, limit: i64) -> Vec<Disaster> {
        rows.sort_by(|a, b| b.event.date.cmp(&a.event.date));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        rows
    }
}

fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    Haversine.distance(
        Point::new(a.longitude, a.latitude),
        Point::new(b.longitude, b.latitude),
    )
}

#[async_trait]
impl DisasterStore for MemoryDisasterStore {
    async fn upsert(&self, event: &DisasterEvent) -> StoreResult<Disaster> {
        let mut rows = self.rows.write().await;
        Ok(Self::write(&mut rows, event))
    }

    async fn upsert_many(&self, events: &[DisasterEvent]) -> StoreResult<usize> {
        let mut rows = self.rows.write().await;
        for event in events {
            Self::write(&mut rows, event);
        }
        Ok(events.len())
    }

    async fn list(&self, filter: &DisasterFilter, limit: i64) -> StoreResult<Vec<Disaster>> {
        let rows = self.rows.read().await;
        let matching = rows
            .values()
            .filter(|d| filter.matches(&d.event))
            .cloned()
            .collect();
        Ok(Self::newest_first(matching, limit))
    }

    async fn within_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        limit: i64,
    ) -> StoreResult<Vec<Disaster>> {
        let rows = self.rows.read().await;
        let matching = rows
            .values()
            .filter(|d| distance_m(center, d.event.location) <= radius_m)
            .cloned()
            .collect();
        Ok(Self::newest_first(matching, limit))
    }

    async fn stats(&self) -> StoreResult<Vec<TypeStats>> {
        let rows = self.rows.read().await;
        let mut groups: BTreeMap<_, Vec<&DisasterEvent>> = BTreeMap::new();
        for d in rows.values() {
            groups.entry(d.event.event_type).or_default().push(&d.event);
        }
        Ok(groups
            .into_iter()
            .map(|(event_type, events)| {
                let count = events.len() as i64;
                let total: f64 = events.iter().map(|e| e.severity).sum();
                TypeStats {
                    event_type,
                    count,
                    avg_severity: total / count as f64,
                    by_alert_level: AlertLevel::ALL
                        .iter()
                        .map(|&alert_level| AlertLevelCount {
                            alert_level,
                            count: events.iter().filter(|e| e.alert_level == alert_level).count()
                                as i64,
                        })
                        .collect(),
                }
            })
            .collect())
    }
}
