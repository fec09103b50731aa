use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Form, Router,
    extract::{Query, State, rejection::FormRejection},
    http::header,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::downloader::XLSX_MIME;
use crate::error::{AppError, StoreError};
use crate::export::export_day;
use crate::finalize::is_finalized;
use crate::login::{self, CurrentUser, PasswordChange, SessionStore};
use crate::pages::{Flash, Pages, redirect_with};
use crate::store::{NewSet, RECENT_LIMIT, Store, date_key, parse_date};
use crate::wipe::{WipeOutcome, wipe_day};

/// State shared by every handler.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub sessions: SessionStore,
    pub pages: Pages,
}

impl AppState {
    /// # Errors
    ///
    /// Fails if an embedded template does not compile.
    pub fn new(config: Config, store: Store) -> Result<Self, AppError> {
        let sessions =
            SessionStore::new(Duration::from_secs(config.session_minutes.saturating_mul(60)));
        Ok(Self {
            config,
            store,
            sessions,
            pages: Pages::new()?,
        })
    }
}

/// Form carrying a single target day (finish, reset, wipe).
#[derive(Debug, Default, Deserialize)]
struct DateForm {
    date: Option<String>,
}

/// Set entry form. Every field is optional so that a malformed post is
/// rejected by validation rather than by the extractor.
#[derive(Debug, Default, Deserialize)]
struct SetForm {
    date: Option<String>,
    time: Option<String>,
    exercise: Option<String>,
    reps: Option<String>,
    weight: Option<String>,
    sets: Option<String>,
    notes: Option<String>,
}

impl SetForm {
    /// Validate the raw form into a set ready for the store.
    fn into_new_set(self, ts: String, user_id: i64) -> Option<NewSet> {
        let date = parse_date(self.date.as_deref()?)?;
        let time = parse_time(self.time.as_deref()?)?;
        let exercise_id = self.exercise.as_deref()?.trim().parse().ok()?;
        let reps = self.reps.as_deref()?.trim().parse().ok()?;
        let sets = self.sets.as_deref()?.trim().parse().ok()?;
        let weight_kg = self
            .weight
            .as_deref()?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite())?;

        Some(NewSet {
            ts,
            date,
            time: time.format("%H:%M").to_string(),
            exercise_id,
            reps,
            weight_kg,
            sets,
            notes: self.notes.unwrap_or_default(),
            user_id: Some(user_id),
        })
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminForm {
    action: Option<String>,
    name: Option<String>,
    id: Option<String>,
    new_password: Option<String>,
}

/// Start the web server: open the store, seed it and serve until shutdown.
pub async fn run(config: Config) -> Result<(), AppError> {
    let store = Store::open(&config.database_path).await?;
    store.bootstrap(&config).await?;

    let addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, store)?);
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    let protected = Router::new()
        .route("/", get(workout))
        .route("/submit", post(submit))
        .route("/finish", post(finish))
        .route("/history", get(history))
        .route("/admin", get(admin_page).post(admin_action))
        .route("/wipe_today", get(redirect_home).post(wipe))
        .route("/reset_day", get(redirect_home).post(wipe))
        .route("/reset", get(redirect_home).post(redirect_home))
        .route("/logout", get(login::handle_logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .merge(protected)
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn redirect_home() -> Redirect {
    Redirect::to("/")
}

/// Unwrap a form body; a rejected body (wrong content type, bad encoding)
/// is treated like an empty form.
pub(crate) fn form_or_log<T>(form: Result<Form<T>, FormRejection>) -> Option<T> {
    match form {
        Ok(Form(form)) => Some(form),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Ignoring unreadable form body");
            None
        }
    }
}

/// Day view: today's sets in entry order plus the entry form.
async fn workout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(flash): Query<Flash>,
) -> Response {
    let now = state.config.now();
    let today = now.date_naive();

    let exercises = state.store.active_exercises().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load exercises");
        Vec::new()
    });
    let rows = state.store.sets_on(today).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load today's sets");
        Vec::new()
    });
    let finalized_today = is_finalized(&state.store, &state.config.export_dirs, today).await;

    state.pages.page(
        "workout",
        &json!({
            "username": user.username,
            "today": date_key(today),
            "current_time": now.format("%H:%M").to_string(),
            "exercises": exercises,
            "rows": rows,
            "finalized_today": finalized_today,
            "flash": flash,
        }),
    )
}

/// Log one set. Invalid input is dropped silently.
async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    form: Result<Form<SetForm>, FormRejection>,
) -> Response {
    let Some(form) = form_or_log(form) else {
        return Redirect::to("/").into_response();
    };
    let ts = state.config.now().to_rfc3339();
    let Some(set) = form.into_new_set(ts, user.id) else {
        tracing::debug!("Ignoring incomplete set submission");
        return Redirect::to("/").into_response();
    };

    // Late entries into an exported day are accepted; the exported file
    // will not include them.
    if is_finalized(&state.store, &state.config.export_dirs, set.date).await {
        tracing::warn!(date = %set.date, "Set logged into a finalized day");
    }

    match state.store.insert_set(&set).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(StoreError::UnknownExercise { exercise_id }) => {
            tracing::info!(exercise_id, "Set submitted for unknown exercise");
            redirect_with("/", &Flash::error("Unknown exercise.")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save set");
            redirect_with("/", &Flash::error("Could not save set.")).into_response()
        }
    }
}

/// Export the day and send the workbook back as a download.
async fn finish(
    State(state): State<Arc<AppState>>,
    form: Result<Form<DateForm>, FormRejection>,
) -> Response {
    let date = form_or_log(form).and_then(|f| f.date);
    let Some(date) = date.as_deref().and_then(parse_date) else {
        return Redirect::to("/").into_response();
    };

    let finalized_at = state.config.now().to_rfc3339();
    match export_day(&state.store, &state.config.export_dirs, date, &finalized_at).await {
        Ok(export) => (
            [
                (header::CONTENT_TYPE, XLSX_MIME.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.file_name),
                ),
            ],
            export.bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(%date, error = %e, "Daily export failed");
            redirect_with("/", &Flash::error("Export failed.")).into_response()
        }
    }
}

/// Range view when both bounds parse, otherwise the most recent sets.
async fn history(State(state): State<Arc<AppState>>, Query(query): Query<HistoryQuery>) -> Response {
    let start = query.start.as_deref().and_then(parse_date);
    let end = query.end.as_deref().and_then(parse_date);

    let rows = match (start, end) {
        (Some(start), Some(end)) => state.store.sets_between(start, end).await,
        _ => state.store.recent_sets(RECENT_LIMIT).await,
    }
    .unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load history");
        Vec::new()
    });

    state.pages.page(
        "history",
        &json!({
            "rows": rows,
            "start": start.map(date_key),
            "end": end.map(date_key),
        }),
    )
}

async fn admin_page(State(state): State<Arc<AppState>>, Query(flash): Query<Flash>) -> Response {
    let exercises = state.store.all_exercises().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load exercises");
        Vec::new()
    });

    state
        .pages
        .page("admin", &json!({ "exercises": exercises, "flash": flash }))
}

/// Catalogue and password actions. Always lands back on the admin page.
async fn admin_action(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    form: Result<Form<AdminForm>, FormRejection>,
) -> Response {
    let form = form_or_log(form).unwrap_or_default();
    let flash = match form.action.as_deref() {
        Some("add_ex") => {
            let name = form.name.as_deref().unwrap_or_default().trim();
            if name.is_empty() {
                Flash::default()
            } else {
                match state.store.add_exercise(name).await {
                    Ok(_) => {
                        tracing::info!(name, "Exercise added");
                        Flash::default()
                    }
                    Err(StoreError::DuplicateExercise { .. }) => {
                        Flash::error("Exercise may already exist.")
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to add exercise");
                        Flash::error("Exercise may already exist.")
                    }
                }
            }
        }
        Some("toggle_ex") => {
            if let Some(id) = form.id.as_deref().and_then(|id| id.trim().parse::<i64>().ok()) {
                if let Err(e) = state.store.toggle_exercise(id).await {
                    tracing::error!(id, error = %e, "Failed to toggle exercise");
                }
            }
            Flash::default()
        }
        Some("set_password") => {
            let new_password = form.new_password.unwrap_or_default();
            match login::change_password(&state.store, user.id, &new_password).await {
                Ok(PasswordChange::Updated) => Flash::ok("Password updated."),
                Ok(PasswordChange::TooShort) => Flash::error("Password too short."),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to change password");
                    Flash::error("Password not updated.")
                }
            }
        }
        _ => Flash::default(),
    };

    redirect_with("/admin", &flash).into_response()
}

/// Reset/wipe a day. A missing or malformed date is a no-op.
async fn wipe(
    State(state): State<Arc<AppState>>,
    form: Result<Form<DateForm>, FormRejection>,
) -> Redirect {
    let date = form_or_log(form).and_then(|f| f.date);
    let Some(date) = date.as_deref().and_then(parse_date) else {
        return Redirect::to("/");
    };

    match wipe_day(&state.store, &state.config.export_dirs, date).await {
        Ok(WipeOutcome::Finalized) | Ok(WipeOutcome::Wiped { .. }) => {}
        Err(e) => tracing::error!(%date, error = %e, "Wipe failed"),
    }

    Redirect::to("/")
}
