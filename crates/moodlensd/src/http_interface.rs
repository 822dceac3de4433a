//! HTTP interface for the moodlens daemon.
//!
//! Routes:
//! - `GET /` service banner
//! - `GET /health` liveness check
//! - `POST /analyze` multipart upload, field `file`
//! - `POST /analyze-base64` JSON `{"image": "<data URI or base64>"}`

use crate::engine::{EngineError, EngineHandle};
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use moodlens_core::AnalysisResult;
use serde_json::{json, Value};
use std::io::Cursor;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const SERVICE_NAME: &str = "EdenMind Face Sentiment Analysis";
const UPLOAD_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    /// Body rejected by the framework (size limit, content type).
    #[error("{1}")]
    Rejected(StatusCode, String),
    #[error("Error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(status, _) => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Clone)]
struct AppState {
    engine: EngineHandle,
}

/// Build the router with CORS, request tracing and the upload size limit.
pub fn router(engine: EngineHandle, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze", post(analyze_upload))
        .route("/analyze-base64", post(analyze_base64))
        .with_state(AppState { engine })
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn analyze_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let mut multipart = multipart.map_err(|e| match e {
        // Not a multipart request at all: no file could have been sent.
        MultipartRejection::InvalidBoundary(_) => ApiError::BadRequest("No file provided".into()),
        other => ApiError::Rejected(other.status(), other.body_text()),
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
            upload = Some(data);
            break;
        }
    }
    let data = upload.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    tracing::debug!(bytes = data.len(), "multipart upload received");

    let image = decode_image(data).await?;
    Ok(Json(state.engine.analyze(image).await?))
}

async fn analyze_base64(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let body = body.map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
    let encoded = image_field(&body)?;
    let data = decode_base64(&encoded)?;
    tracing::debug!(bytes = data.len(), "base64 image received");

    let image = decode_image(data).await?;
    Ok(Json(state.engine.analyze(image).await?))
}

/// Extract the non-empty `image` string from a JSON body.
fn image_field(body: &[u8]) -> Result<String, ApiError> {
    let missing = || ApiError::BadRequest("No image data provided".into());
    let value: Value = serde_json::from_slice(body).map_err(|_| missing())?;
    match value.get("image").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(missing()),
    }
}

/// Decode a data URI or bare base64 payload. Everything up to and
/// including the first comma is treated as a header and dropped.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match encoded.split_once(',') {
        Some((_, rest)) => rest,
        None => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64: {e}")))
}

/// Decode an uploaded image on the blocking pool.
async fn decode_image<B>(data: B) -> Result<RgbImage, ApiError>
where
    B: AsRef<[u8]> + Send + 'static,
{
    let decoded = tokio::task::spawn_blocking(move || decode_oriented(data.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("image decode task failed: {e}")))?;
    match decoded {
        Ok(img) => Ok(img),
        Err(e) => {
            tracing::debug!(error = %e, "image decode failed");
            Err(ApiError::BadRequest("Invalid image format".into()))
        }
    }
}

/// Decode and rotate/flip upright according to the EXIF orientation tag.
fn decode_oriented(data: &[u8]) -> image::ImageResult<RgbImage> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img.to_rgb8())
}
