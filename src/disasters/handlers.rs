use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dto::{
        AreaQuery, CreateDisasterRequest, DisasterDto, HeatPoint, ListQuery, LiveResponse,
        RefreshResponse, TypeStatsDto,
    },
    services::{self, AREA_LIMIT},
};
use crate::{error::AppError, extract::ValidJson, ingest::feed::fetch_events, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/disasters", get(list_disasters))
        .route("/disasters/area", get(disasters_in_area))
        .route("/disasters/disaster-stats", get(disaster_stats))
        .route("/disasters/heatmap", get(heatmap))
        .route("/disasters/live", get(live_feed))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/disasters", post(create_disaster))
        .route("/disasters/update-gdacs", post(update_from_feed))
}

#[instrument(skip(state))]
pub async fn list_disasters(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<DisasterDto>>, AppError> {
    let filter = services::parse_filter(&q, OffsetDateTime::now_utc())?;
    let rows = state
        .disasters
        .list(&filter, services::list_limit(&filter))
        .await?;
    Ok(Json(rows.into_iter().map(DisasterDto::from).collect()))
}

#[instrument(skip(state))]
pub async fn disasters_in_area(
    State(state): State<AppState>,
    Query(q): Query<AreaQuery>,
) -> Result<Json<Vec<DisasterDto>>, AppError> {
    let (center, radius_m) = services::parse_area(&q)?;
    let rows = state
        .disasters
        .within_radius(center, radius_m, AREA_LIMIT)
        .await?;
    Ok(Json(rows.into_iter().map(DisasterDto::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_disaster(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateDisasterRequest>,
) -> Result<(StatusCode, Json<DisasterDto>), AppError> {
    let event = services::event_from_request(payload, OffsetDateTime::now_utc())?;
    let saved = state.disasters.upsert(&event).await?;
    info!(id = %saved.id, event_type = %saved.event.event_type, "disaster reported");
    Ok((StatusCode::CREATED, Json(DisasterDto::from(saved))))
}

#[instrument(skip(state))]
pub async fn update_from_feed(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, AppError> {
    let resp = services::refresh(
        state.disasters.as_ref(),
        state.feed.as_ref(),
        &state.normalizer,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(resp))
}

#[instrument(skip(state))]
pub async fn disaster_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<TypeStatsDto>>, AppError> {
    let stats = state.disasters.stats().await?;
    Ok(Json(stats.into_iter().map(TypeStatsDto::from).collect()))
}

#[instrument(skip(state))]
pub async fn heatmap(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<HeatPoint>>, AppError> {
    let now = OffsetDateTime::now_utc();
    let filter = services::parse_filter(&q, now)?;
    let rows = state
        .disasters
        .list(&filter, services::list_limit(&filter))
        .await?;
    Ok(Json(services::heat_points(&rows, now)))
}

#[instrument(skip(state))]
pub async fn live_feed(State(state): State<AppState>) -> Json<LiveResponse> {
    let outcome = fetch_events(
        state.feed.as_ref(),
        &state.normalizer,
        OffsetDateTime::now_utc(),
    )
    .await;
    let using_sample_data = outcome.is_degraded();
    let reason = outcome.reason().map(str::to_owned);
    Json(LiveResponse {
        using_sample_data,
        reason,
        disasters: outcome
            .into_data()
            .into_iter()
            .map(DisasterDto::from)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn call(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> (u16, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status().as_u16();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn refresh_then_list() {
        let app = build_app(AppState::fake());

        let (status, body) = call(&app, Method::GET, "/api/disasters", None).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!([]));

        let (status, body) = call(&app, Method::POST, "/api/disasters/update-gdacs", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["updated"], 1);
        assert_eq!(body["usingSampleData"], false);

        let (_, body) = call(&app, Method::GET, "/api/disasters?type=EQ", None).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["type"], "EQ");
        assert_eq!(list[0]["alertLevel"], "Red");
        assert_eq!(list[0]["location"]["coordinates"], json!([139.767, 35.682]));

        let (_, body) = call(&app, Method::GET, "/api/disasters?type=FL", None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn invalid_filter_is_rejected() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/disasters?alertLevel=purple", None).await;
        assert_eq!(status, 400);
        assert_eq!(body["field"], "alertLevel");
    }

    #[tokio::test]
    async fn oversized_days_window_is_rejected() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/disasters?days=10000000", None).await;
        assert_eq!(status, 400);
        assert_eq!(body["field"], "days");

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/disasters/heatmap?days=9223372036854775807",
            None,
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["field"], "days");
    }

    #[tokio::test]
    async fn wrong_typed_body_field_is_a_field_error() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/disasters",
            Some(json!({ "type": "EQ", "longitude": 139.767, "latitude": "35" })),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["field"], "latitude");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/disasters")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("field").is_none());
    }

    #[tokio::test]
    async fn create_and_query_by_area() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/disasters",
            Some(json!({
                "type": "FL",
                "longitude": 100.501,
                "latitude": 13.754,
                "alertLevel": "Orange",
                "title": "River flooding"
            })),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(body["title"], "River flooding");
        assert!(body["id"].is_string());

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/disasters/area?lat=13.754&lng=100.501&radius=0",
            None,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = call(
            &app,
            Method::GET,
            "/api/disasters/area?lat=35.682&lng=139.767&radius=100",
            None,
        )
        .await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn create_without_coordinates_is_a_field_error() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/disasters",
            Some(json!({ "type": "EQ", "longitude": 10.0 })),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["field"], "latitude");

        let (_, body) = call(&app, Method::GET, "/api/disasters", None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn stats_and_heatmap() {
        let app = build_app(AppState::fake());
        call(&app, Method::POST, "/api/disasters/update-gdacs", None).await;

        let (status, body) = call(&app, Method::GET, "/api/disasters/disaster-stats", None).await;
        assert_eq!(status, 200);
        assert_eq!(body[0]["type"], "EQ");
        assert_eq!(body[0]["count"], 1);
        assert_eq!(body[0]["byAlertLevel"][0], json!({ "alertLevel": "Red", "count": 1 }));

        let (status, body) = call(&app, Method::GET, "/api/disasters/heatmap", None).await;
        assert_eq!(status, 200);
        let points = body.as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["lat"], 35.682);
        let intensity = points[0]["intensity"].as_f64().unwrap();
        assert!((0.25..=1.0).contains(&intensity));
    }

    #[tokio::test]
    async fn live_feed_does_not_persist() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/disasters/live", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["usingSampleData"], false);
        assert_eq!(body["disasters"].as_array().unwrap().len(), 1);

        let (_, body) = call(&app, Method::GET, "/api/disasters", None).await;
        assert_eq!(body, json!([]));
    }
}
