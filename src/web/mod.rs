// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP surface for the classifier UI

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::images::{validate_name, ImageLibrary};
use crate::store::{DataStore, Progress, SubmissionRecord};
use crate::ClassifierError;

const SAVED_MESSAGE: &str = "JSON file has been saved.";

/// Shared application state
pub struct AppState {
    pub store: DataStore,
    pub images: ImageLibrary,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store: DataStore::new(config.data_dir()),
            images: ImageLibrary::new(config.images_dir()),
            static_dir: config.static_dir(),
        }
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let data_dir = state.store.dir().to_path_buf();

    Router::new()
        // Pages and assets
        .route("/", get(index_page))
        .route("/static/*path", get(serve_static))
        .nest_service("/data", ServeDir::new(data_dir))
        // Classification flow
        .route("/next-outfit", get(next_outfit))
        .route("/submit", post(submit))
        .route("/mark-done", post(mark_done))
        .route("/progress", get(progress))
        // Images
        .route("/images/:outfit", get(list_images))
        .route("/images/:outfit/", get(list_images))
        .route("/images/:outfit/:file", get(serve_image))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Errors ===

/// A failed request: status plus a plain-text body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(operation: &str, e: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("{}: {}", operation, e),
        }
    }

    fn from_error(operation: &str, e: ClassifierError) -> Self {
        let status = match e {
            ClassifierError::InvalidName(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: format!("{}: {}", operation, e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        } else {
            warn!("{}", self.message);
        }
        (self.status, self.message).into_response()
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

fn saved() -> Json<MessageResponse> {
    Json(MessageResponse { message: SAVED_MESSAGE })
}

/// Bodies are decoded as JSON whatever the declared content type
fn decode_body<T: for<'de> Deserialize<'de>>(operation: &str, body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(operation, format!("Error decoding request body: {}", e)))
}

// === Page and Asset Handlers ===

async fn index_page(State(state): State<Arc<AppState>>, request: Request) -> Response {
    serve_file(state.static_dir.join("index.html"), request).await
}

async fn serve_static(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let filename = path.rsplit('/').next().unwrap_or_default().to_string();
    validate_name(&filename).map_err(|e| ApiError::from_error("staticHandler", e))?;

    let content_type = asset_content_type(&filename);
    let mut response = serve_file(state.static_dir.join(&filename), request).await;
    if let (Some(value), true) = (content_type, response.status().is_success()) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
    }

    Ok(response)
}

/// Content type for an asset, keyed on the text after the first `.`
pub fn asset_content_type(filename: &str) -> Option<&'static str> {
    match filename.split('.').nth(1) {
        Some("css") => Some("text/css"),
        Some("js") => Some("application/javascript"),
        _ => None,
    }
}

async fn serve_file(path: PathBuf, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

// === API Handlers ===

/// Missing and `null` collections both come through as `None`
#[derive(Debug, Deserialize)]
struct SubmitRequest {
    directory: String,
    #[serde(default)]
    types: Option<HashMap<String, String>>,
    #[serde(default)]
    tags: Option<HashMap<String, Vec<String>>>,
    #[serde(default, rename = "weatherConfig")]
    weather_config: Option<Vec<String>>,
}

impl From<SubmitRequest> for SubmissionRecord {
    fn from(request: SubmitRequest) -> Self {
        Self {
            outfit: request.directory,
            types: request.types,
            tags: request.tags,
            weather_config: request.weather_config,
        }
    }
}

async fn submit(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    const OP: &str = "submitHandler";

    let request: SubmitRequest = decode_body(OP, &body)?;
    let record = SubmissionRecord::from(request);
    state
        .store
        .record_submission(&record)
        .map_err(|e| ApiError::from_error(OP, e))?;

    Ok(saved())
}

async fn next_outfit(State(state): State<Arc<AppState>>) -> Result<Json<String>, ApiError> {
    state
        .store
        .next_outfit()
        .map(Json)
        .map_err(|e| ApiError::from_error("nextOutfitHandler", e))
}

#[derive(Debug, Deserialize)]
struct MarkDoneRequest {
    #[serde(rename = "currentOutfit")]
    current_outfit: String,
}

async fn mark_done(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    const OP: &str = "markDoneHandler";

    let request: MarkDoneRequest = decode_body(OP, &body)?;
    state
        .store
        .mark_done(&request.current_outfit)
        .map_err(|e| ApiError::from_error(OP, e))?;

    Ok(saved())
}

async fn progress(State(state): State<Arc<AppState>>) -> Result<Json<Progress>, ApiError> {
    state
        .store
        .progress()
        .map(Json)
        .map_err(|e| ApiError::from_error("progressHandler", e))
}

async fn list_images(
    State(state): State<Arc<AppState>>,
    Path(outfit): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    state
        .images
        .list_images(&outfit)
        .map(Json)
        .map_err(|e| ApiError::from_error("imagesHandler", e))
}

async fn serve_image(
    State(state): State<Arc<AppState>>,
    Path((outfit, file)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state
        .images
        .image_path(&outfit, &file)
        .map_err(|e| ApiError::from_error("imagesHandler", e))?;

    Ok(serve_file(path, request).await)
}

/// Start the web server and run until Ctrl+C or SIGTERM
pub async fn start_server(config: AppConfig) -> crate::Result<()> {
    let state = Arc::new(AppState::from_config(&config));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Data directory: {:?}", state.store.dir());
    info!("Images directory: {:?}", state.images.root());
    info!("Server is running at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ClassifierError::Config(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
