//! Backend proxy for the upload page.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/process-image` | Multipart upload of one image, relayed to the model |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /api/process-image` answers `{"success": true, "result": ...}` or
//! HTTP 500 with `{"success": false, "error": "..."}`. Uploads stay in memory
//! for the duration of the request.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ServerConfig;
use crate::domain::model::{FileInput, InferenceParams, RawParams};
use crate::domain::ports::VisionModel;

#[derive(Clone)]
struct AppState {
    model: Arc<dyn VisionModel>,
}

/// Builds the router with CORS and the upload size limit from `config`.
pub fn build_router(model: Arc<dyn VisionModel>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/process-image", post(handle_process_image))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(cors_layer(&config.server.allowed_origins))
        .with_state(AppState { model })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim_end_matches('/').parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Skipping invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Binds `[server].bind` and serves until Ctrl-C.
pub async fn run_server(config: &ServerConfig, model: Arc<dyn VisionModel>) -> anyhow::Result<()> {
    let app = build_router(model, config);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

// ============ POST /api/process-image ============

#[derive(Serialize)]
struct ProcessResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

struct Upload {
    image: Option<FileInput>,
    prompt: String,
    params: InferenceParams,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, String> {
    let mut image = None;
    let mut prompt = String::new();
    let mut raw = RawParams::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&filename)
                            .first_or_octet_stream()
                            .to_string()
                    });
                let data = field.bytes().await.map_err(|e| e.body_text())?;
                image = Some(FileInput::new(filename, content_type, data.to_vec()));
            }
            other => {
                let text = field.text().await.map_err(|e| e.body_text())?;
                match other {
                    "prompt" => prompt = text,
                    "temperature" => raw.temperature = Some(text),
                    "model" => raw.model = Some(text),
                    "max_tokens" => raw.max_tokens = Some(text),
                    "top_p" => raw.top_p = Some(text),
                    _ => tracing::debug!("Ignoring unknown form field '{}'", other),
                }
            }
        }
    }

    Ok(Upload {
        image,
        prompt,
        params: InferenceParams::parse(&raw),
    })
}

fn failure(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ProcessResponse {
            success: false,
            result: None,
            error: Some(message),
        }),
    )
        .into_response()
}

async fn handle_process_image(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(message) => {
            tracing::error!("Rejected upload: {}", message);
            return failure(message);
        }
    };

    let filename = upload
        .image
        .as_ref()
        .map(|img| img.filename.clone())
        .unwrap_or_default();
    let started = Instant::now();
    let result = state
        .model
        .invoke(upload.image.as_ref(), &upload.prompt, &upload.params)
        .await;
    let latency = started.elapsed().as_secs_f64();

    match result {
        Ok(result) => {
            tracing::info!(
                file = %filename,
                model = %upload.params.model,
                "Processed image in {:.2}s",
                latency
            );
            Json(ProcessResponse {
                success: true,
                result: Some(result),
                error: None,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(file = %filename, model = %upload.params.model, "Error: {}", e);
            failure(e.to_string())
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
