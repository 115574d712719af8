use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::UserRepo,
    repo_types::{NewUser, User},
};
use crate::error::{AppError, StoreError};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";
pub const MIN_PASSWORD_LEN: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub async fn register(repo: &dyn UserRepo, req: RegisterRequest) -> Result<User, AppError> {
    let name = req.name.trim().to_owned();
    let email = normalize_email(&req.email);
    if name.is_empty() {
        return Err(AppError::validation("name", "Name is required"));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("email", "Invalid email"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if repo.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::BadRequest(
            "User with this email already exists".into(),
        ));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task")??;

    match repo
        .create(NewUser {
            name,
            email,
            password_hash,
        })
        .await
    {
        Ok(user) => Ok(user),
        // Lost a race with a concurrent registration.
        Err(StoreError::Duplicate(_)) => Err(AppError::BadRequest(
            "User with this email already exists".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Checks credentials and issues a session token.
pub async fn login(
    repo: &dyn UserRepo,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<(User, String), AppError> {
    let email = normalize_email(&req.email);
    let Some(user) = repo.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::BadRequest(INVALID_CREDENTIALS.into()));
    };

    let password = req.password;
    let hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("password verification task")??;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    let token = keys.sign(user.id)?;
    Ok((user, token))
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the session cookie.
pub fn cleared_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Finds the session token in a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|v| !v.is_empty())
}
