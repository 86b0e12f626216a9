//! HTTP surface: `POST /api/evaluate` (alias `/api/grade`) and `GET /health`.
//!
//! The handler only translates between multipart and [`GradingRequest`];
//! every decision about the document is made by [`Grader::grade`]. Errors
//! become `{"error": "<message>"}` with the status from
//! [`GradeError::status`].

use crate::error::GradeError;
use crate::grade::{Assignment, Grader, GradingRequest, Upload};
use crate::output::Evaluation;
use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared by every request.
pub struct ServerState {
    pub grader: Grader,
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// A [`GradeError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub GradeError);

impl From<GradeError> for ApiError {
    fn from(err: GradeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_client_error() {
            warn!(status = status.as_u16(), "Rejected request: {}", self.0);
        } else {
            error!(status = status.as_u16(), "Grading failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    let body_limit = state.grader.config().max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let graded_routes = Router::new()
        .route("/api/evaluate", post(evaluate))
        .route("/api/grade", post(evaluate))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(trace_layer);

    Router::new()
        .merge(graded_routes)
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(grader: Grader, addr: SocketAddr) -> std::io::Result<()> {
    let state = Arc::new(ServerState { grader });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "OK"
}

async fn evaluate(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Evaluation>, ApiError> {
    let limit = state.grader.config().max_upload_bytes;
    let multipart = multipart.map_err(|e| GradeError::MalformedRequest(e.body_text()))?;
    let request = read_form(multipart, limit).await?;
    let evaluation = state.grader.grade(request).await?;
    Ok(Json(evaluation))
}

/// Collect the known form fields; anything else is ignored.
async fn read_form(mut multipart: Multipart, limit: usize) -> Result<GradingRequest, GradeError> {
    let malformed = |err: MultipartError| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GradeError::UploadTooLarge { limit }
        } else {
            GradeError::MalformedRequest(err.body_text())
        }
    };

    let mut assignment = Assignment::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                file = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "assignmentTitle" => assignment.title = field.text().await.map_err(malformed)?,
            "subject" => assignment.subject = field.text().await.map_err(malformed)?,
            "instructions" => assignment.instructions = field.text().await.map_err(malformed)?,
            "criteria" => assignment.criteria = field.text().await.map_err(malformed)?,
            _ => {}
        }
    }

    Ok(GradingRequest { assignment, file })
}
