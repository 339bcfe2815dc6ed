//! Serve command - extraction over HTTP.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use console::style;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use tabgrid_core::{ExtractionResult, FormatHint, Pipeline, SUPPORTED_EXTENSIONS};

use super::load_config;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Arc::new(Pipeline::new(config)?);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!(
        "{} Listening on http://{}",
        style("✓").green(),
        listener.local_addr()?
    );

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Build the API routes around a shared pipeline.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/extract", post(extract_tables))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(pipeline)
}

#[derive(Serialize)]
struct StatusResponse {
    message: &'static str,
    supported_formats: Vec<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ExtractResponse {
    success: bool,
    data: ExtractionResult,
    message: String,
}

/// Error body: `{"detail": ...}`.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            detail: String,
        }

        (self.status, Json(Body { detail: self.detail })).into_response()
    }
}

fn supported_formats() -> Vec<String> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect()
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Table extraction API is running",
        supported_formats: supported_formats(),
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn extract_tables(
    State(pipeline): State<Arc<Pipeline>>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file data: {}", e)))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(ApiError::bad_request("Missing multipart field 'file'"));
    };

    let extension = Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if FormatHint::from_extension(&extension).is_none() {
        return Err(ApiError::bad_request(format!(
            "Unsupported format. Accepted formats: {}",
            supported_formats().join(", ")
        )));
    }

    debug!("Received {} ({} bytes)", filename, data.len());

    // The temp file is removed when `tmp` drops, on every path.
    let tmp = tempfile::Builder::new()
        .prefix("tabgrid-upload-")
        .suffix(&format!(".{}", extension))
        .tempfile()
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;
    std::fs::write(tmp.path(), &data)
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;

    let result = tokio::task::spawn_blocking(move || {
        let result = pipeline.process(tmp.path());
        drop(tmp);
        result
    })
    .await
    .map_err(|e| ApiError::internal(format!("Processing task failed: {}", e)))?
    .map_err(|e| {
        error!("Failed to process {}: {}", filename, e);
        ApiError::internal(format!("Processing failed: {}", e))
    })?;

    let total = result.total_tables();
    info!("{}: {} tables", filename, total);

    let message = match total {
        0 => "No tables detected in the file".to_string(),
        1 => "1 table detected".to_string(),
        n => format!("{} tables detected", n),
    };

    Ok(Json(ExtractResponse {
        success: total > 0,
        data: result,
        message,
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
