//! HTTP API server: axum router and request handlers.
//!
//! Handlers are thin. Scanning, EXIF parsing and file writes block, so
//! they run on tokio's blocking pool via `spawn_blocking` and the async
//! workers stay free for other requests.
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Json`, `Query`, `Multipart`, `Request`
//! - `#[serde(untagged)]` for a response that is one of two shapes
//! - `tower-http` services (`ServeFile`, `ServeDir`) mounted in the router

use crate::catalog;
use crate::config::GalleryConfig;
use crate::error::{ApiError, CatalogError, UploadError};
use crate::metadata::{self, ImageMetadata};
use crate::selection::{self, Selection};
use crate::upload;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Query, Request, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
///
/// Rust concept: IMMUTABLE SHARED STATE
/// Nothing in here changes after startup, so there is no `Mutex`. The
/// viewer's seen-set travels with each request instead of living here.
/// `Arc<Path>` keeps the per-request clone to a reference-count bump.
#[derive(Clone)]
pub struct AppState {
    /// Canonical root of the photo library
    pub images_dir: Arc<Path>,
    /// Static pages (index.html, edit.html, script.js)
    pub public_dir: Arc<Path>,
    /// Body limit for uploads
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &GalleryConfig) -> Self {
        Self {
            images_dir: Arc::from(config.images_dir.as_path()),
            public_dir: Arc::from(config.public_dir.as_path()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        post_random_image,
        get_image_file,
        post_update_metadata,
        post_upload_image,
    ),
    components(schemas(
        RandomImageRequest,
        RandomImageResponse,
        ImagePayload,
        UpdateMetadataRequest,
        UploadForm,
        ImageMetadata,
    )),
    tags(
        (name = "gallery", description = "Random photo selection and file access"),
        (name = "metadata", description = "Embedded title editing"),
        (name = "upload", description = "Adding photos to the library"),
    ),
    info(
        title = "Photo Gallery API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Random unseen photo viewer with EXIF title editing"
    )
)]
pub struct ApiDoc;

// ── Request/Response types ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RandomImageRequest {
    /// Absolute paths this viewer has already been shown
    #[serde(default)]
    #[schema(example = json!(["/srv/photos/2019/beach.jpg"]))]
    pub viewed_images: Vec<String>,
}

/// Either a photo or a request to clear the seen-set and ask again.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum RandomImageResponse {
    /// Every photo has been viewed. Always `{ "reset": true }`.
    Reset { reset: bool },
    Image(ImagePayload),
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// URL that streams the photo
    #[schema(example = "/image-file?path=%2Fsrv%2Fphotos%2F2019%2Fbeach.jpg")]
    pub image_url: String,
    /// Embedded title, or empty
    pub title: String,
    /// Capture date, file creation date, or "Unknown date"
    #[schema(example = "7/15/2019, 4:20:00 PM")]
    pub date: String,
    /// Absolute path; add this to the seen-set
    #[schema(example = "/srv/photos/2019/beach.jpg")]
    pub file_path: String,
}

impl ImagePayload {
    pub fn new(path: &Path, metadata: ImageMetadata) -> Self {
        let file_path = path.to_string_lossy().into_owned();
        Self {
            image_url: format!("/image-file?path={}", urlencoding::encode(&file_path)),
            title: metadata.title,
            date: metadata.date,
            file_path,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImageFileQuery {
    /// Absolute path of a photo inside the library
    path: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetadataRequest {
    /// Absolute path of the photo to edit
    #[schema(example = "/srv/photos/2019/beach.jpg")]
    file_path: String,
    /// New ImageDescription
    #[schema(example = "Beach day with the kids")]
    new_title: String,
}

/// Multipart form accepted by `/upload-image`.
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
pub struct UploadForm {
    /// JPEG, PNG or GIF file
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all endpoints and the static pages.
pub fn create_router(state: AppState) -> Router {
    let edit_page = ServeFile::new(state.public_dir.join("edit.html"));
    let static_files = ServeDir::new(&*state.public_dir);

    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/random-image", post(post_random_image))
        .route("/image-file", get(get_image_file))
        .route("/update-metadata", post(post_update_metadata))
        .route(
            "/upload-image",
            post(post_upload_image).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route_service("/edit", edit_page)
        .fallback_service(static_files)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /random-image: pick a photo the caller has not seen yet
#[utoipa::path(
    post,
    path = "/random-image",
    tag = "gallery",
    request_body = RandomImageRequest,
    responses(
        (status = 200, description = "An unseen photo, or `{ reset: true }` when all have been seen", body = RandomImageResponse),
        (status = 400, description = "Body is not a valid request"),
        (status = 500, description = "Image directory could not be read")
    )
)]
async fn post_random_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RandomImageResponse>, ApiError> {
    let req = parse_random_image_request(&body)?;
    let images_dir = state.images_dir.clone();
    let response =
        run_blocking(move || pick_random_image(&images_dir, &req.viewed_images)).await??;
    Ok(Json(response))
}

/// An empty body means nothing was viewed. The content type is not
/// checked, so a bare `fetch` or `curl -d` still works.
fn parse_random_image_request(body: &[u8]) -> Result<RandomImageRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RandomImageRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

/// Scan, filter out `viewed`, pick one and read its metadata.
pub fn pick_random_image(
    images_dir: &Path,
    viewed: &[String],
) -> Result<RandomImageResponse, CatalogError> {
    let catalog = catalog::scan_images(images_dir)?;

    match selection::select_unseen(&catalog, viewed, &mut rand::rng()) {
        Selection::Picked(path) => {
            tracing::debug!(
                path = %path.display(),
                catalog = catalog.len(),
                viewed = viewed.len(),
                "Picked image"
            );
            let metadata = metadata::read_metadata(path);
            Ok(RandomImageResponse::Image(ImagePayload::new(path, metadata)))
        }
        Selection::Exhausted => {
            tracing::info!(
                catalog = catalog.len(),
                viewed = viewed.len(),
                "All images viewed, asking client to reset"
            );
            Ok(RandomImageResponse::Reset { reset: true })
        }
    }
}

/// GET /image-file: stream a photo from the library
#[utoipa::path(
    get,
    path = "/image-file",
    tag = "gallery",
    params(ImageFileQuery),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 403, description = "Path is outside the image directory"),
        (status = 404, description = "Image not found")
    )
)]
async fn get_image_file(
    State(state): State<AppState>,
    Query(query): Query<ImageFileQuery>,
    request: Request,
) -> Result<Response, ApiError> {
    let full_path = resolve_within_root(&state.images_dir, &query.path)?;

    let response = ServeFile::new(full_path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    Ok(response.into_response())
}

/// POST /update-metadata: write a new title into a photo
#[utoipa::path(
    post,
    path = "/update-metadata",
    tag = "metadata",
    request_body = UpdateMetadataRequest,
    responses(
        (status = 200, description = "Title written"),
        (status = 403, description = "Path is outside the image directory"),
        (status = 404, description = "Image not found"),
        (status = 500, description = "Metadata could not be written")
    )
)]
async fn post_update_metadata(
    State(state): State<AppState>,
    Json(req): Json<UpdateMetadataRequest>,
) -> Result<&'static str, ApiError> {
    let full_path = resolve_within_root(&state.images_dir, &req.file_path)?;

    run_blocking(move || metadata::write_title(&full_path, &req.new_title)).await??;

    Ok("Metadata updated successfully!")
}

/// POST /upload-image: add a photo to the library
#[utoipa::path(
    post,
    path = "/upload-image",
    tag = "upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored"),
        (status = 400, description = "No image in the form, or not an image")
    )
)]
async fn post_upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<&'static str, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let images_dir = state.images_dir.clone();
        run_blocking(move || upload::store_upload(&images_dir, &file_name, &bytes)).await??;

        return Ok("Image uploaded successfully!");
    }

    Err(UploadError::Missing.into())
}

/// `spawn_blocking` that keeps the request span, so log lines from the
/// blocking pool still carry the method and URI.
async fn run_blocking<F, T>(f: F) -> Result<T, tokio::task::JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f)).await
}

// ── Path validation ──────────────────────────────────────────────────

/// Resolve a client-supplied path and make sure it lives inside `root`.
///
/// This prevents directory traversal (`../../etc/passwd`) and sibling
/// prefix tricks (`/photos2` is not inside `/photos`). `Path::starts_with`
/// compares whole components, unlike a string prefix check.
///
/// The check runs twice: once lexically, so traversal is rejected even
/// when the target doesn't exist, and once after canonicalizing, so a
/// symlink inside the library can't point outside it. `root` must already
/// be canonical.
pub fn resolve_within_root(root: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    // An absolute `requested` replaces `root` entirely.
    let normalized = normalize_lexically(&root.join(requested));
    if !normalized.starts_with(root) {
        tracing::warn!(requested, "Rejected path outside image directory");
        return Err(ApiError::AccessDenied);
    }

    let canonical = normalized
        .canonicalize()
        .map_err(|_| ApiError::NotFound(requested.to_string()))?;

    if !canonical.starts_with(root) {
        tracing::warn!(requested, resolved = %canonical.display(), "Symlink escapes image directory");
        return Err(ApiError::AccessDenied);
    }

    Ok(canonical)
}

/// Resolve `.` and `..` without touching the file system.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────
