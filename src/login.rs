use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::{Query, State, rejection::FormRejection},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::pages::{Flash, redirect_with};
use crate::store::{Store, User};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Longest session lifetime; longer requests are clamped.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Shortest password accepted by a password change.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Credential data for login
///
/// Used to receive the login form. Missing fields deserialize as empty so a
/// malformed post is just a failed login.
#[derive(Debug, Default, Deserialize)]
pub struct UserCredentials {
    #[serde(default)]
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    #[serde(default)]
    pub password: String,
}

/// The authenticated user, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

/// User session data
#[derive(Debug, Clone)]
struct Session {
    user: CurrentUser,
    expires_at: Instant,
}

/// Server-side session table
///
/// Maps random session ids (the cookie value) to the user they belong to.
/// Owned by [`AppState`]; nothing survives a restart.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty table. `ttl` is clamped to [`MAX_SESSION_TTL`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: ttl.min(MAX_SESSION_TTL),
        }
    }

    /// Session lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a new session for `user` and return its id.
    pub fn create(&self, user: &User) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            user: CurrentUser {
                id: user.id,
                username: user.username.clone(),
            },
            expires_at: Instant::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > Instant::now());
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// The user behind a session id, if the session exists and has not expired.
    pub fn validate(&self, session_id: &str) -> Option<CurrentUser> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.user.clone())
    }

    pub fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
    }
}

/// Hash a password using Argon2
///
/// # Errors
/// * Returns an error if the password hashing fails
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash
///
/// A hash that is not a valid PHC string never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a PHC string");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Outcome of a password change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChange {
    Updated,
    TooShort,
}

/// Replace a user's password.
///
/// Passwords shorter than [`MIN_PASSWORD_LEN`] characters are refused
/// without touching the store.
pub async fn change_password(
    store: &Store,
    user_id: i64,
    new_password: &str,
) -> Result<PasswordChange, AppError> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Ok(PasswordChange::TooShort);
    }

    let hash = hash_password(new_password)?;
    store.set_password_hash(user_id, &hash).await?;
    tracing::info!(user_id, "Password updated");
    Ok(PasswordChange::Updated)
}

/// Serve the login page
pub async fn serve_login_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<Flash>,
) -> Response {
    state
        .pages
        .page("login", &serde_json::json!({ "flash": flash }))
}

/// Handle user login requests
///
/// Verifies the credentials against the stored argon2 hash and, on success,
/// creates a session and sets the session cookie.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    credentials: Result<Form<UserCredentials>, FormRejection>,
) -> Response {
    let credentials = crate::app::form_or_log(credentials).unwrap_or_default();
    let username = credentials.username.trim();

    match state.store.find_user_by_name(username).await {
        Ok(Some(user)) if verify_password(&credentials.password, &user.password_hash) => {
            let session_id = state.sessions.create(&user);
            let max_age = i64::try_from(state.sessions.ttl().as_secs()).unwrap_or(i64::MAX);
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(max_age));

            tracing::info!(username, "Login succeeded");
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Ok(_) => {
            tracing::info!(username, "Login rejected");
            redirect_with("/login", &Flash::error("Invalid credentials")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "User lookup failed during login");
            redirect_with("/login", &Flash::error("Login unavailable, try again")).into_response()
        }
    }
}

/// Handle user logout
///
/// Drops the server-side session and clears the cookie.
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }

    let removal = Cookie::build((SESSION_COOKIE, "")).path("/");
    (jar.remove(removal), Redirect::to("/login")).into_response()
}

/// Authentication middleware
///
/// Lets the request through with a [`CurrentUser`] extension when the session
/// cookie is valid, otherwise redirects to the login page.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let user = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.validate(cookie.value()));

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => Redirect::to("/login").into_response(),
    }
}
