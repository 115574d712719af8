use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{
    AlertLevel, AlertLevelCount, Disaster, DisasterEvent, DisasterFilter, EventType, GeoPoint,
    TypeStats,
};
use crate::error::{StoreError, StoreResult};

/// Mean Earth radius in meters; matches `geo::Haversine`.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Persistence for canonical events. Writes are upserts on the natural key.
#[async_trait]
pub trait DisasterStore: Send + Sync {
    async fn upsert(&self, event: &DisasterEvent) -> StoreResult<Disaster>;

    /// Returns the number of events written.
    async fn upsert_many(&self, events: &[DisasterEvent]) -> StoreResult<usize>;

    /// Newest first, at most `limit` rows.
    async fn list(&self, filter: &DisasterFilter, limit: i64) -> StoreResult<Vec<Disaster>>;

    /// Events within `radius_m` meters of `center`, newest first.
    async fn within_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        limit: i64,
    ) -> StoreResult<Vec<Disaster>>;

    async fn stats(&self) -> StoreResult<Vec<TypeStats>>;
}

#[derive(Debug, FromRow)]
struct DisasterRow {
    id: Uuid,
    event_type: String,
    longitude: f64,
    latitude: f64,
    date: OffsetDateTime,
    alert_level: String,
    severity: f64,
    title: String,
    description: Option<String>,
    source: String,
    magnitude: Option<f64>,
    wind_speed: Option<f64>,
    affected_area: Option<f64>,
    population: Option<f64>,
    approximate_location: bool,
    last_updated: OffsetDateTime,
}

impl TryFrom<DisasterRow> for Disaster {
    type Error = StoreError;

    fn try_from(r: DisasterRow) -> Result<Self, Self::Error> {
        let event_type = r.event_type.parse::<EventType>().map_err(StoreError::Corrupt)?;
        let alert_level = r.alert_level.parse::<AlertLevel>().map_err(StoreError::Corrupt)?;
        Ok(Disaster {
            id: r.id,
            event: DisasterEvent {
                event_type,
                location: GeoPoint::new(r.longitude, r.latitude),
                date: r.date,
                alert_level,
                severity: r.severity,
                title: r.title,
                description: r.description,
                source: r.source,
                magnitude: r.magnitude,
                wind_speed: r.wind_speed,
                affected_area: r.affected_area,
                population: r.population,
                approximate_location: r.approximate_location,
            },
            last_updated: r.last_updated,
        })
    }
}

fn into_disasters(rows: Vec<DisasterRow>) -> StoreResult<Vec<Disaster>> {
    rows.into_iter().map(Disaster::try_from).collect()
}

const COLUMNS: &str = r#"id, event_type, longitude, latitude, date, alert_level, severity,
    title, description, source, magnitude, wind_speed, affected_area, population,
    approximate_location, last_updated"#;

#[derive(Clone)]
pub struct PgDisasterStore {
    db: PgPool,
}

impl PgDisasterStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn upsert_with<'e, E>(executor: E, event: &DisasterEvent) -> StoreResult<Disaster>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO disasters (id, event_type, longitude, latitude, date, alert_level,
                severity, title, description, source, magnitude, wind_speed, affected_area,
                population, approximate_location, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, now())
            ON CONFLICT (event_type, longitude, latitude, date) DO UPDATE SET
                alert_level = EXCLUDED.alert_level,
                severity = EXCLUDED.severity,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                source = EXCLUDED.source,
                magnitude = EXCLUDED.magnitude,
                wind_speed = EXCLUDED.wind_speed,
                affected_area = EXCLUDED.affected_area,
                population = EXCLUDED.population,
                approximate_location = EXCLUDED.approximate_location,
                last_updated = now()
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DisasterRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(event.event_type.code())
            .bind(event.location.longitude)
            .bind(event.location.latitude)
            .bind(event.date)
            .bind(event.alert_level.as_str())
            .bind(event.severity)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.source)
            .bind(event.magnitude)
            .bind(event.wind_speed)
            .bind(event.affected_area)
            .bind(event.population)
            .bind(event.approximate_location)
            .fetch_one(executor)
            .await?;
        Disaster::try_from(row)
    }
}

#[async_trait]
impl DisasterStore for PgDisasterStore {
    async fn upsert(&self, event: &DisasterEvent) -> StoreResult<Disaster> {
        Self::upsert_with(&self.db, event).await
    }

    async fn upsert_many(&self, events: &[DisasterEvent]) -> StoreResult<usize> {
        let mut tx = self.db.begin().await?;
        for event in events {
            Self::upsert_with(&mut *tx, event).await?;
        }
        tx.commit().await?;
        Ok(events.len())
    }

    async fn list(&self, filter: &DisasterFilter, limit: i64) -> StoreResult<Vec<Disaster>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM disasters WHERE TRUE"));
        if let Some(t) = filter.event_type {
            qb.push(" AND event_type = ").push_bind(t.code());
        }
        if let Some(a) = filter.alert_level {
            qb.push(" AND alert_level = ").push_bind(a.as_str());
        }
        if let Some(since) = filter.since {
            qb.push(" AND date >= ").push_bind(since);
        }
        qb.push(" ORDER BY date DESC LIMIT ").push_bind(limit);

        let rows = qb.build_query_as::<DisasterRow>().fetch_all(&self.db).await?;
        into_disasters(rows)
    }

    async fn within_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        limit: i64,
    ) -> StoreResult<Vec<Disaster>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM disasters
            WHERE $3 * 2 * asin(least(1.0, sqrt(
                    power(sin(radians(latitude - $1) / 2), 2)
                    + cos(radians($1)) * cos(radians(latitude))
                      * power(sin(radians(longitude - $2) / 2), 2)
                  ))) <= $4
            ORDER BY date DESC
            LIMIT $5
            "#
        );
        let rows = sqlx::query_as::<_, DisasterRow>(&sql)
            .bind(center.latitude)
            .bind(center.longitude)
            .bind(EARTH_RADIUS_M)
            .bind(radius_m)
            .bind(limit)
            .fetch_all(&self.db)
            .await?;
        into_disasters(rows)
    }

    async fn stats(&self) -> StoreResult<Vec<TypeStats>> {
        let rows = sqlx::query_as::<_, (String, i64, f64, i64, i64, i64)>(
            r#"
            SELECT event_type,
                   COUNT(*)::BIGINT,
                   AVG(severity)::DOUBLE PRECISION,
                   COUNT(*) FILTER (WHERE alert_level = 'Red')::BIGINT,
                   COUNT(*) FILTER (WHERE alert_level = 'Orange')::BIGINT,
                   COUNT(*) FILTER (WHERE alert_level = 'Green')::BIGINT
            FROM disasters
            GROUP BY event_type
            ORDER BY event_type
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(event_type, count, avg_severity, red, orange, green)| {
                Ok(TypeStats {
                    event_type: event_type.parse().map_err(StoreError::Corrupt)?,
                    count,
                    avg_severity,
                    by_alert_level: vec![
                        AlertLevelCount { alert_level: AlertLevel::Red, count: red },
                        AlertLevelCount { alert_level: AlertLevel::Orange, count: orange },
                        AlertLevelCount { alert_level: AlertLevel::Green, count: green },
                    ],
                })
            })
            .collect()
    }
}
