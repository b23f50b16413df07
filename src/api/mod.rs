// HTTP API routes: game index, resources and attempt submission/status/results.

use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::Error;
use crate::games::GameRegistry;
use crate::identity::{CredentialPolicy, Identity};
use crate::lifecycle::{self, SubmissionLocks};
use crate::metrics;

/// Multipart field carrying the submitted attempt.
pub const ATTEMPT_FIELD: &str = "attempt";

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub games: Arc<GameRegistry>,
    pub locks: SubmissionLocks,
    pub credentials: CredentialPolicy,
}

impl AppState {
    pub fn new(games: GameRegistry, credentials: CredentialPolicy) -> Self {
        Self {
            games: Arc::new(games),
            locks: SubmissionLocks::new(),
            credentials,
        }
    }
}

impl FromRef<AppState> for CredentialPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.credentials.clone()
    }
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct IndexItem {
    pub caption: String,
    pub href: String,
}

#[derive(Debug, Serialize)]
pub struct IndexPage {
    pub title: String,
    pub items: Vec<IndexItem>,
}

impl IndexPage {
    fn new(title: impl Into<String>, items: Vec<IndexItem>) -> Self {
        Self {
            title: title.into(),
            items,
        }
    }
}

fn item(caption: impl Into<String>, href: impl Into<String>) -> IndexItem {
    IndexItem {
        caption: caption.into(),
        href: href.into(),
    }
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_not_found() {
            return json_error(StatusCode::NOT_FOUND, &self.to_string());
        }
        if let Error::AttemptsExhausted { .. } = self {
            tracing::warn!("Rejected submission: {self}");
            return json_error(StatusCode::CONFLICT, &self.to_string());
        }
        tracing::error!("Request failed: {self}");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

/// Run filesystem-bound lifecycle work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState, max_submission_bytes: usize) -> Router {
    metrics::register_metrics();

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/", get(list_games))
        .route("/{game}", get(game_index))
        .route("/{game}/", get(game_index))
        // Resources
        .route("/{game}/resources/", get(list_resources))
        .route("/{game}/resources/{name}", get(get_resource))
        // Attempts
        .route(
            "/{game}/attempts/",
            get(list_attempts)
                .post(submit_attempt)
                .layer(DefaultBodyLimit::max(max_submission_bytes)),
        )
        .route("/{game}/attempts/{attempt}", get(attempt_index))
        .route("/{game}/attempts/{attempt}/", get(attempt_index))
        .route("/{game}/attempts/{attempt}/status", get(attempt_status))
        .route("/{game}/attempts/{attempt}/results", get(attempt_results))
        .layer(axum::middleware::from_fn(metrics::track_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "trespasser-backend" }))
}

async fn get_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

// ── Game handlers ─────────────────────────────────────────────────────

async fn list_games(State(state): State<AppState>) -> Json<IndexPage> {
    let items = state
        .games
        .keys()
        .map(|game| item(game, format!("/{game}/")))
        .collect();
    Json(IndexPage::new("index", items))
}

async fn game_index(
    State(state): State<AppState>,
    Path(game): Path<String>,
) -> Result<Json<IndexPage>, Error> {
    let game = state.games.get(&game)?;
    let items = vec![
        item("attempts", format!("/{}/attempts/", game.key)),
        item("resources", format!("/{}/resources/", game.key)),
    ];
    Ok(Json(IndexPage::new(game.key.as_str(), items)))
}

// ── Resource handlers ─────────────────────────────────────────────────

async fn list_resources(
    State(state): State<AppState>,
    Path(game): Path<String>,
) -> Result<Json<IndexPage>, Error> {
    let game = state.games.get(&game)?;
    let items = game
        .resources
        .keys()
        .map(|name| item(name.as_str(), format!("/{}/resources/{name}", game.key)))
        .collect();
    Ok(Json(IndexPage::new("resources", items)))
}

async fn get_resource(
    State(state): State<AppState>,
    Path((game, name)): Path<(String, String)>,
) -> Result<Response, Error> {
    let game = state.games.get(&game)?;
    let Some(path) = game.resource_path(&name) else {
        return Ok(json_error(StatusCode::NOT_FOUND, "Resource not found"));
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            StatusCode::OK,
            [
                (CONTENT_TYPE, "application/octet-stream"),
                (CACHE_CONTROL, "max-age=60"),
            ],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Resource {name} of {} is configured but missing", game.key);
            Ok(json_error(StatusCode::NOT_FOUND, "Resource not found"))
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

// ── Attempt handlers ──────────────────────────────────────────────────

async fn list_attempts(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(game): Path<String>,
) -> Result<Json<IndexPage>, Error> {
    let game = state.games.get(&game)?.clone();
    let key = game.key.clone();
    let attempts = blocking(move || lifecycle::enumerate_attempts(&game, &user)).await?;

    let items = attempts
        .into_iter()
        .map(|attempt| item(attempt.to_string(), format!("/{key}/attempts/{attempt}/")))
        .collect();
    Ok(Json(IndexPage::new("attempts", items)))
}

async fn submit_attempt(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(game): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, Error> {
    let game = state.games.get(&game)?.clone();

    let mut contents = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(ATTEMPT_FIELD) => match field.bytes().await {
                Ok(bytes) => {
                    contents = Some(bytes);
                    break;
                }
                Err(e) => return Ok(json_error(e.status(), &e.body_text())),
            },
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return Ok(json_error(e.status(), &e.body_text())),
        }
    }
    let Some(contents) = contents else {
        return Ok(json_error(
            StatusCode::BAD_REQUEST,
            "multipart field `attempt` is required",
        ));
    };

    let key = game.key.clone();
    let size = contents.len();
    let locks = state.locks.clone();
    let attempt = blocking(move || lifecycle::submit(&game, &user, &contents, &locks)).await?;

    metrics::ATTEMPTS_SUBMITTED_TOTAL
        .with_label_values(&[key.as_str()])
        .inc();
    metrics::SUBMISSION_BYTES.observe(size as f64);

    let location = format!("/{key}/attempts/{attempt}/");
    let page = IndexPage::new(
        "new attempt",
        vec![item(attempt.to_string(), location.as_str())],
    );
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(page)).into_response())
}

async fn attempt_index(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path((game, attempt)): Path<(String, u64)>,
) -> Result<Json<IndexPage>, Error> {
    let game = state.games.get(&game)?.clone();
    let key = game.key.clone();

    let has_results = blocking(move || {
        if !lifecycle::enumerate_attempts(&game, &user)?.contains(&attempt) {
            return Err(Error::AttemptNotFound(attempt));
        }
        lifecycle::has_results(&game, &user, attempt)
    })
    .await?;

    let mut items = vec![item(
        "status",
        format!("/{key}/attempts/{attempt}/status"),
    )];
    if has_results {
        items.push(item(
            "results",
            format!("/{key}/attempts/{attempt}/results"),
        ));
    }
    Ok(Json(IndexPage::new(attempt.to_string(), items)))
}

async fn attempt_status(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path((game, attempt)): Path<(String, u64)>,
) -> Result<Response, Error> {
    let game = state.games.get(&game)?.clone();
    let key = game.key.clone();
    let status = blocking(move || lifecycle::resolve_status(&game, &user, attempt)).await?;

    metrics::STATUS_QUERIES_TOTAL
        .with_label_values(&[key.as_str(), status.as_str()])
        .inc();

    Ok((
        StatusCode::OK,
        [(CACHE_CONTROL, "no-store")],
        Json(status),
    )
        .into_response())
}

async fn attempt_results(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path((game, attempt)): Path<(String, u64)>,
) -> Result<Response, Error> {
    let game = state.games.get(&game)?.clone();
    let key = game.key.clone();
    let bytes = blocking(move || lifecycle::resolve_results(&game, &user, attempt)).await?;

    metrics::RESULTS_SERVED_TOTAL
        .with_label_values(&[key.as_str()])
        .inc();

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/octet-stream"),
            (CACHE_CONTROL, "no-store"),
        ],
        bytes,
    )
        .into_response())
}
