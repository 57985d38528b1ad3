//! The HTTP upload surface.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};
use uuid::Uuid;

use crate::{
    criteria::CriteriaField,
    pipeline::{Pipeline, Submission},
    prelude::*,
    submission::{Rejection, Upload},
};

/// The multipart field holding the problem and answer.
pub const PROBLEM_FIELD: &str = "problem-answer";

/// The multipart field holding an optional criteria document.
pub const CRITERIA_DOCUMENT_FIELD: &str = "feedback-criteria";

/// Response header saying whether the body is feedback or an error message.
pub const FEEDBACK_STATUS_HEADER: &str = "x-feedback-status";

/// Build our router.
pub fn router(pipeline: Arc<Pipeline>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    info_span!(
                        "request",
                        id = %Uuid::new_v4(),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(pipeline)
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// `POST /analyze`: run one submission through the pipeline.
///
/// Anything that gets past classification is a `200`, even if the body is a
/// provider error. Check [`FEEDBACK_STATUS_HEADER`] to tell them apart.
async fn analyze(
    State(pipeline): State<Arc<Pipeline>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, Rejection> {
    let multipart = multipart.map_err(|err| Rejection::MalformedUpload {
        reason: err.body_text(),
    })?;
    let submission = read_submission(multipart).await?;
    let result = pipeline.run(submission).await?;
    Ok(([(FEEDBACK_STATUS_HEADER, result.status())], result.into_text()).into_response())
}

/// The body of a `GET /health` response.
#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

/// `GET /health`.
async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Collect the fields we care about from a multipart form.
async fn read_submission(mut multipart: Multipart) -> Result<Submission, Rejection> {
    let mut submission = Submission::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if name == PROBLEM_FIELD || name == CRITERIA_DOCUMENT_FIELD {
            // A plain text field with a file field's name is not a file.
            let Some(filename) = field.file_name().map(str::to_owned) else {
                debug!(field = %name, "Ignoring file field without a filename");
                continue;
            };
            let data = field.bytes().await.map_err(malformed)?;
            debug!(field = %name, %filename, bytes = data.len(), "Received file");
            let upload = Some(Upload::new(filename, data.to_vec()));
            if name == PROBLEM_FIELD {
                submission.problem = upload;
            } else {
                submission.criteria_document = upload;
            }
        } else if let Some(criteria_field) = CriteriaField::from_label(&name) {
            let value = field.text().await.map_err(malformed)?;
            submission.criteria_fields.set(criteria_field, value);
        } else {
            debug!(field = %name, "Ignoring unknown form field");
        }
    }
    Ok(submission)
}

fn malformed(err: MultipartError) -> Rejection {
    warn!(error = %err, "Malformed multipart upload");
    Rejection::MalformedUpload {
        reason: err.body_text(),
    }
}
