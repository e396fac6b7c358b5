//! retouch-server: HTTP transport over the retouch [`Editor`].
//!
//! Every route that touches pixels moves the editor call onto tokio's
//! blocking pool, so a slow render never stalls request intake.
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | POST | `/upload` | default render of the uploaded `image` field |
//! | POST | `/update_preview` | preview render, sequence headers |
//! | POST | `/apply` | committed render |
//! | POST | `/undo` | restored render, or `{"empty": true}` |
//! | GET | `/download` | current render as an attachment |
//! | GET | `/health` | `ok` |

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use retouch_pipeline::{OutputFormat, ParameterVector, PipelineError, RenderedImage, codec};
use retouch_session::{Editor, EditorError, UndoOutcome};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Response header carrying the sequence number a preview was stamped
/// with.
pub const SEQUENCE_HEADER: &str = "x-retouch-sequence";

/// Response header set to `true` when a newer preview already won.
pub const SUPERSEDED_HEADER: &str = "x-retouch-superseded";

/// Default request body limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Multipart field holding the uploaded image.
const IMAGE_FIELD: &str = "image";

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
///
/// Extractor rejections are captured here too, so malformed requests
/// get the same JSON shape as editor failures.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The editor rejected the operation.
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// The rendered image could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[source] PipelineError),

    /// The multipart body was malformed or over the size limit.
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    /// The upload was not a `multipart/form-data` request.
    #[error("expected a multipart form: {0}")]
    NotMultipart(#[from] MultipartRejection),

    /// The query string could not be parsed.
    #[error("invalid query string: {0}")]
    Query(#[from] QueryRejection),

    /// The request body could not be read.
    #[error("invalid request body: {0}")]
    Body(#[from] BytesRejection),

    /// The upload had no `image` field.
    #[error("missing multipart field `{0}`")]
    MissingField(&'static str),

    /// The parameter body was not a JSON object.
    #[error("invalid parameters: {0}")]
    Params(#[from] serde_json::Error),

    /// A response header could not be built.
    #[error("invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),

    /// The blocking task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Multipart(err) => err.status(),
            Self::Body(err) => err.status(),
            Self::Editor(EditorError::Decode(_))
            | Self::NotMultipart(_)
            | Self::Query(_)
            | Self::MissingField(_)
            | Self::Params(_) => StatusCode::BAD_REQUEST,
            Self::Editor(EditorError::NoActiveSession) => StatusCode::CONFLICT,
            Self::Editor(EditorError::Render(_))
            | Self::Encode(_)
            | Self::Header(_)
            | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    editor: Arc<Editor>,
    format: OutputFormat,
}

impl AppState {
    /// State serving renders from `editor` encoded as `format`.
    #[must_use]
    pub const fn new(editor: Arc<Editor>, format: OutputFormat) -> Self {
        Self { editor, format }
    }
}

/// Build the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/update_preview", post(update_preview))
        .route("/apply", post(apply))
        .route("/undo", post(undo))
        .route("/download", get(download))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run `f` on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn encode(image: &RenderedImage, format: OutputFormat) -> Result<Vec<u8>, ApiError> {
    codec::encode(image, format).map_err(ApiError::Encode)
}

fn image_response(format: OutputFormat, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, format.mime_type())], bytes).into_response()
}

/// Parse a parameter body. An empty body means all defaults.
fn parse_params(body: &[u8]) -> Result<ParameterVector, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParameterVector::default());
    }
    Ok(serde_json::from_slice(body)?)
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    seq: Option<u64>,
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart?;
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            image = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = image.ok_or(ApiError::MissingField(IMAGE_FIELD))?;

    let AppState { editor, format } = state;
    let encoded = blocking(move || encode(&editor.upload(&bytes)?, format)).await?;
    Ok(image_response(format, encoded))
}

async fn update_preview(
    State(state): State<AppState>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let params = parse_params(&body?)?;
    let AppState { editor, format } = state;
    let (preview, encoded) = blocking(move || {
        let preview = editor.preview(params, query.seq)?;
        let encoded = encode(&preview.image, format)?;
        Ok((preview, encoded))
    })
    .await?;

    let mut response = image_response(format, encoded);
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(SEQUENCE_HEADER),
        HeaderValue::from(preview.sequence),
    );
    if !preview.accepted {
        headers.insert(
            HeaderName::from_static(SUPERSEDED_HEADER),
            HeaderValue::from_static("true"),
        );
    }
    Ok(response)
}

async fn apply(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let params = parse_params(&body?)?;
    let AppState { editor, format } = state;
    let encoded = blocking(move || encode(&editor.commit(params)?, format)).await?;
    Ok(image_response(format, encoded))
}

async fn undo(State(state): State<AppState>) -> Result<Response, ApiError> {
    let AppState { editor, format } = state;
    let encoded = blocking(move || match editor.undo()? {
        UndoOutcome::Restored(snapshot) => encode(&snapshot.image, format).map(Some),
        UndoOutcome::Empty => Ok(None),
    })
    .await?;

    Ok(match encoded {
        Some(bytes) => image_response(format, bytes),
        None => axum::Json(serde_json::json!({ "empty": true })).into_response(),
    })
}

async fn download(State(state): State<AppState>) -> Result<Response, ApiError> {
    let AppState { editor, format } = state;
    let encoded = blocking(move || encode(&editor.download()?, format)).await?;

    let disposition = HeaderValue::try_from(format!(
        "attachment; filename=\"retouched.{}\"",
        format.extension()
    ))?;
    let mut response = image_response(format, encoded);
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use image::ImageEncoder;
    use retouch_pipeline::RgbImage;
    use retouch_session::EditorConfig;
    use tower::ServiceExt;

    use super::*;

    const BOUNDARY: &str = "retouch-test-boundary";

    fn app(format: OutputFormat) -> Router {
        app_with_limit(format, DEFAULT_MAX_UPLOAD_BYTES)
    }

    fn app_with_limit(format: OutputFormat, max_upload_bytes: usize) -> Router {
        let editor = Arc::new(Editor::new(EditorConfig::default()));
        router(AppState::new(editor, format), max_upload_bytes)
    }

    fn png() -> Vec<u8> {
        let img = RgbImage::from_fn(12, 8, |x, y| {
            image::Rgb([
                u8::try_from(x * 20).unwrap(),
                u8::try_from(y * 30).unwrap(),
                64,
            ])
        });
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), 12, 8, image::ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    fn multipart_request(field: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_owned()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app(OutputFormat::Png)
            .oneshot(empty_request("GET", "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"ok");
    }

    #[tokio::test]
    async fn download_before_upload_is_conflict() {
        let response = app(OutputFormat::Png)
            .oneshot(empty_request("GET", "/download"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"], "no active image; upload one first");
    }

    #[tokio::test]
    async fn upload_returns_png_of_original() {
        let bytes = png();
        let response = app(OutputFormat::Png)
            .oneshot(multipart_request("image", &bytes))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = body_bytes(response).await;
        let returned = image::load_from_memory(&body).unwrap().to_rgb8();
        let original = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(returned, original);
    }

    #[tokio::test]
    async fn upload_of_garbage_is_bad_request() {
        let response = app(OutputFormat::Png)
            .oneshot(multipart_request("image", b"definitely not an image"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("decode"));
    }

    #[tokio::test]
    async fn upload_without_image_field_is_bad_request() {
        let response = app(OutputFormat::Png)
            .oneshot(multipart_request("file", &png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_multipart_upload_is_json_bad_request() {
        let response = app(OutputFormat::Png)
            .oneshot(json_request("/upload", r#"{"image": "nope"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("expected a multipart form"));
    }

    #[tokio::test]
    async fn non_numeric_sequence_is_json_bad_request() {
        let app = app(OutputFormat::Png);
        app.clone().oneshot(multipart_request("image", &png())).await.unwrap();
        let response = app
            .oneshot(json_request("/update_preview?seq=abc", r#"{"brightness": 5}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("invalid query string"));
    }

    #[tokio::test]
    async fn oversized_body_is_json_payload_too_large() {
        let response = app_with_limit(OutputFormat::Png, 16)
            .oneshot(json_request("/apply", r#"{"brightness": 10, "contrast": 120}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn preview_sets_sequence_headers() {
        let app = app(OutputFormat::Png);
        app.clone().oneshot(multipart_request("image", &png())).await.unwrap();

        let response = app
            .clone()
            .oneshot(json_request("/update_preview?seq=5", r#"{"brightness": "20"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SEQUENCE_HEADER], "5");
        assert!(response.headers().get(SUPERSEDED_HEADER).is_none());

        let stale = app
            .oneshot(json_request("/update_preview?seq=4", r#"{"brightness": 10}"#))
            .await
            .unwrap();
        assert_eq!(stale.status(), StatusCode::OK);
        assert_eq!(stale.headers()[SUPERSEDED_HEADER], "true");
    }

    #[tokio::test]
    async fn malformed_params_are_bad_request() {
        let app = app(OutputFormat::Png);
        app.clone().oneshot(multipart_request("image", &png())).await.unwrap();
        let response = app
            .oneshot(json_request("/apply", "[1, 2, 3]"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn apply_then_undo_twice() {
        let app = app(OutputFormat::Png);
        app.clone().oneshot(multipart_request("image", &png())).await.unwrap();

        let first = app
            .clone()
            .oneshot(json_request("/apply", r#"{"contrast": 150}"#))
            .await
            .unwrap();
        let first = body_bytes(first).await;
        app.clone()
            .oneshot(json_request("/apply", r#"{"contrast": 200}"#))
            .await
            .unwrap();

        let restored = app
            .clone()
            .oneshot(empty_request("POST", "/undo"))
            .await
            .unwrap();
        assert_eq!(restored.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(body_bytes(restored).await, first);

        let empty = app
            .oneshot(empty_request("POST", "/undo"))
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::OK);
        assert_eq!(body_json(empty).await, serde_json::json!({"empty": true}));
    }

    #[tokio::test]
    async fn download_is_an_attachment() {
        let app = app(OutputFormat::default());
        app.clone().oneshot(multipart_request("image", &png())).await.unwrap();
        let response = app
            .oneshot(empty_request("GET", "/download"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"retouched.jpg\""
        );
    }
}
