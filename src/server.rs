//! Inbound HTTP surface.
//!
//! Starts a standalone axum server and dispatches to four routes:
//! 1. `POST /logthiswin`: signed slash command that appends one win.
//! 2. `POST /send-summaries`: DMs every user with wins their digest.
//! 3. `POST /test-dm`: one fixed test DM to a given user.
//! 4. `GET /test`: liveness probe.
//!
//! Slash-command replies are always the ephemeral JSON shape Slack renders
//! privately, success and failure alike.

use crate::broadcast;
use crate::config::Config;
use crate::notify::{Notifier, SlackNotifier, TEST_DM_TEXT};
use crate::signature::{
    AuthError, RequestVerifier, SlackSignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use crate::store::{FileStore, StoreError, WinLedger, WinRecord};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Cap on inbound bodies. Slash-command payloads are around a kilobyte;
/// anything much larger is not Slack.
const MAX_BODY_BYTES: usize = 64 * 1024;

// ── Shared state ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub ledger: WinLedger,
    /// `None` when no signing secret is configured; `/logthiswin` then
    /// refuses every request instead of accepting unsigned ones.
    pub verifier: Option<Box<dyn RequestVerifier>>,
    pub notifier: Arc<dyn Notifier>,
}

// ── Wire types ────────────────────────────────────────────────────────────────

/// Slash-command reply visible only to the sender.
#[derive(Debug, Serialize)]
struct Ephemeral {
    response_type: &'static str,
    text: String,
}

impl Ephemeral {
    fn new(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral",
            text: text.into(),
        }
    }
}

/// Form fields Slack posts with a slash command, reduced to the four we keep.
/// Slack sends plenty more (`token`, `team_id`, `command`, ...); unknown keys
/// are ignored.
#[derive(Debug, Deserialize)]
struct WinSubmission {
    user_id: Option<String>,
    user_name: Option<String>,
    text: Option<String>,
    channel_id: Option<String>,
}

/// A submission that passed the required-field gate.
struct NewWin {
    user_id: String,
    text: String,
    channel_id: Option<String>,
    user_name: Option<String>,
}

impl WinSubmission {
    /// Required-field gate: `user_id` and `text` must be present and
    /// non-empty. Nothing has been written when this rejects.
    fn validate(self) -> Result<NewWin, CommandError> {
        let user_id = self.user_id.filter(|v| !v.is_empty());
        let text = self.text.filter(|v| !v.is_empty());
        match (user_id, text) {
            (Some(user_id), Some(text)) => Ok(NewWin {
                user_id,
                text,
                channel_id: self.channel_id,
                user_name: self.user_name,
            }),
            (Some(_), None) => Err(CommandError::MissingFields(vec!["text"])),
            (None, Some(_)) => Err(CommandError::MissingFields(vec!["user_id"])),
            (None, None) => Err(CommandError::MissingFields(vec!["user_id", "text"])),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TestDmForm {
    user_id: Option<String>,
}

// ── Error mapping ─────────────────────────────────────────────────────────────

/// Everything that can go wrong on the slash-command path. Converted to the
/// wire shape (status + ephemeral JSON) in exactly one place.
#[derive(Debug)]
enum CommandError {
    Auth(AuthError),
    SecretNotConfigured,
    MalformedForm,
    MissingFields(Vec<&'static str>),
    Storage(StoreError),
}

impl From<AuthError> for CommandError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        match &self {
            CommandError::Auth(e) => tracing::warn!("logthiswin: rejected: {e}"),
            CommandError::SecretNotConfigured => {
                tracing::error!("logthiswin: rejecting request: signing secret not configured");
            }
            CommandError::MalformedForm => {
                tracing::warn!("logthiswin: rejected: body is not form data");
            }
            CommandError::MissingFields(names) => {
                tracing::warn!("logthiswin: rejected: missing {}", names.join(", "));
            }
            CommandError::Storage(e) => tracing::error!("logthiswin: store failure: {e}"),
        }

        let (status, text) = match self {
            CommandError::Auth(AuthError::MissingHeaders) => (
                StatusCode::BAD_REQUEST,
                "❌ Missing required Slack headers".to_string(),
            ),
            CommandError::Auth(AuthError::BadTimestamp) => (
                StatusCode::BAD_REQUEST,
                "❌ Malformed request timestamp".to_string(),
            ),
            CommandError::Auth(AuthError::Stale) => {
                (StatusCode::FORBIDDEN, "❌ Request too old".to_string())
            }
            CommandError::Auth(AuthError::Mismatch) => {
                (StatusCode::FORBIDDEN, "❌ Invalid signature".to_string())
            }
            CommandError::SecretNotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "❌ Server configuration error: SLACK_SIGNING_SECRET not set".to_string(),
            ),
            CommandError::MalformedForm => (
                StatusCode::BAD_REQUEST,
                "❌ Request body is not valid form data".to_string(),
            ),
            CommandError::MissingFields(names) => {
                let verb = if names.len() == 1 { "is" } else { "are" };
                (
                    StatusCode::BAD_REQUEST,
                    format!(
                        "❌ Missing required fields: {} {verb} required",
                        names.join(" and ")
                    ),
                )
            }
            CommandError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("❌ Failed to log your win: {e}"),
            ),
        };
        (status, Json(Ephemeral::new(text))).into_response()
    }
}

// ── Route handlers ────────────────────────────────────────────────────────────

/// POST /logthiswin: verify, validate, append one win.
async fn log_win(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Ephemeral>, CommandError> {
    let verifier = state
        .verifier
        .as_deref()
        .ok_or(CommandError::SecretNotConfigured)?;

    // The signature covers the body bytes exactly as received.
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let signature = header_str(&headers, SIGNATURE_HEADER);
    verifier.verify(&body, timestamp, signature)?;

    let submission: WinSubmission =
        serde_urlencoded::from_bytes(&body).map_err(|_| CommandError::MalformedForm)?;
    let win = submission.validate()?;

    let record = WinRecord::logged_now(win.text.clone(), win.channel_id, win.user_name);
    state.ledger.append(&win.user_id, record)?;
    tracing::info!("logthiswin: recorded win for {}", win.user_id);

    Ok(Json(Ephemeral::new(format!(
        "✅ Logged your win: *{}*",
        win.text
    ))))
}

/// POST /send-summaries: DM every user with wins their digest.
async fn send_summaries(State(state): State<Arc<AppState>>) -> Response {
    let log = match state.ledger.snapshot() {
        Ok(log) => log,
        Err(e) => {
            tracing::error!("send-summaries: cannot read win log: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("Failed to send summaries: {e}") })),
            )
                .into_response();
        }
    };

    if log.is_empty() {
        return Json(serde_json::json!({
            "message": "No wins logged yet",
            "users_notified": 0
        }))
        .into_response();
    }

    let outcome = broadcast::send_summaries(&log, state.notifier.as_ref()).await;
    tracing::info!(
        "send-summaries: notified {}/{} users",
        outcome.notified,
        outcome.attempted
    );
    Json(serde_json::json!({
        "message": format!("Win summaries sent to {} users", outcome.notified),
        "users_notified": outcome.notified
    }))
    .into_response()
}

/// POST /test-dm: fixed smoke-test DM to one user.
async fn test_dm(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let form: TestDmForm = serde_urlencoded::from_bytes(&body).unwrap_or_default();
    let Some(user_id) = form.user_id.filter(|v| !v.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "user_id required" })),
        )
            .into_response();
    };

    match state.notifier.send_dm(&user_id, TEST_DM_TEXT).await {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "Test DM sent"
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("test-dm: delivery to {user_id} failed: {e}");
            Json(serde_json::json!({
                "success": false,
                "message": "Failed to send test DM"
            }))
            .into_response()
        }
    }
}

/// GET /test: liveness probe.
async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "wintally is running" }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ── Server startup ────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/logthiswin", post(log_win))
        .route("/send-summaries", post(send_summaries))
        .route("/test-dm", post(test_dm))
        .route("/test", get(liveness))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Start the HTTP listener. Runs until cancelled.
///
/// Missing secrets are startup warnings, not errors: without the signing
/// secret `/logthiswin` answers 500, and without the bot token deliveries
/// fail. Either way the service stays up and says why.
pub async fn run(config: Config) -> Result<()> {
    let store_path = config.store_path();
    let store = FileStore::open(&store_path)
        .with_context(|| format!("cannot open win log {}", store_path.display()))?;

    let verifier: Option<Box<dyn RequestVerifier>> = match config.slack.signing_secret.clone() {
        Some(secret) => Some(Box::new(SlackSignatureVerifier::new(secret))),
        None => {
            tracing::warn!(
                "server: SLACK_SIGNING_SECRET not set; /logthiswin will refuse all requests"
            );
            None
        }
    };
    if config.slack.bot_token.is_none() {
        tracing::warn!("server: SLACK_BOT_TOKEN not set; summaries cannot be delivered");
    }

    let state = Arc::new(AppState {
        ledger: WinLedger::new(Box::new(store)),
        verifier,
        notifier: Arc::new(SlackNotifier::new(config.slack.bot_token.clone())),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    tracing::info!("server: listening on {addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
