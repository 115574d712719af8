use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, ProtectedResponse, PublicUser,
            RegisterRequest, SessionResponse,
        },
        extractors::{AuthUser, MaybeAuthUser},
        jwt::JwtKeys,
        services,
    },
    error::AppError,
    extract::ValidJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/protected", get(protected))
        .route("/auth/me", get(get_me))
}

type WithCookie<T> = ([(header::HeaderName, String); 1], Json<T>);

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let user = services::register(state.users.as_ref(), payload).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<WithCookie<LoginResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let (user, token) = services::login(state.users.as_ref(), &keys, payload).await?;
    info!(user_id = %user.id, "user logged in");

    let cookie = services::session_cookie(
        &token,
        keys.ttl().as_secs(),
        state.config.environment.is_production(),
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Login successful".into(),
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> WithCookie<MessageResponse> {
    let cookie = services::cleared_session_cookie(state.config.environment.is_production());
    (
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    )
}

#[instrument(skip_all)]
pub async fn protected(AuthUser(user_id): AuthUser) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "You have access to this protected route!".into(),
        user_id,
    })
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip_all)]
pub async fn session(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
) -> Result<Json<SessionResponse>, AppError> {
    let user = match user_id {
        Some(id) => state.users.find_by_id(id).await?,
        None => None,
    };
    Ok(Json(SessionResponse {
        is_authenticated: user.is_some(),
        user: user.map(PublicUser::from),
    }))
}
