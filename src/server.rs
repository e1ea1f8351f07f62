//! HTTP service: `POST /v2/parse/file` and `GET /health`.
//!
//! The handler buffers the multipart upload, applies any per-request
//! options on top of the parser's baseline [`ParseConfig`], and runs the
//! whole parse on a `spawn_blocking` thread. Every failure, including a
//! malformed body or a panic in the parse task, is logged and answered with
//! `500` and an [`ErrorResponse`].

use crate::config::{ParseConfig, ServerConfig};
use crate::convert::DocumentParser;
use crate::error::DocParseError;
use crate::output::{ErrorResponse, ParseResponse};
use crate::pipeline::dispatch::UploadedDocument;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Application state shared across handlers
pub struct AppState {
    parser: Arc<DocumentParser>,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

/// Build the service router.
pub fn router(parser: Arc<DocumentParser>, config: &ServerConfig) -> Router {
    let state = Arc::new(AppState { parser });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/v2/parse/file", post(parse_file_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn run_server(parser: Arc<DocumentParser>, config: ServerConfig) -> Result<(), DocParseError> {
    let app = router(parser, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| DocParseError::InvalidConfig(format!("Invalid address: {e}")))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health         - Health check");
    info!("  POST /v2/parse/file  - Parse an uploaded document");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DocParseError::io(format!("Failed to bind {addr}"), e))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DocParseError::io("Server error", e))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Document parse endpoint
async fn parse_file_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let start = Instant::now();

    match handle_parse(&state, multipart, &request_id).await {
        Ok(response) => {
            info!(
                request_id = %request_id,
                pages = response.pages,
                markdown_bytes = response.markdown.len(),
                total_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Parse completed"
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!(request_id = %request_id, error = ?e, "Parse failed");
            ErrorResponse::internal(&e).into_response()
        }
    }
}

async fn handle_parse(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    request_id: &str,
) -> Result<ParseResponse, DocParseError> {
    let mut multipart = multipart.map_err(|e| DocParseError::InvalidRequest(e.body_text()))?;
    let mut options = state.parser.config().clone();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DocParseError::InvalidRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| DocParseError::InvalidRequest(e.body_text()))?;
                upload = Some(UploadedDocument::new(filename, bytes.to_vec()));
            }
            "parse_method" | "is_json_md_dump" | "return_layout" | "return_info"
            | "return_content_list" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| DocParseError::InvalidRequest(e.body_text()))?;
                apply_option(&mut options, &name, &value)?;
            }
            other => debug!(request_id = %request_id, "Ignoring multipart field '{}'", other),
        }
    }

    let upload = upload.ok_or_else(|| DocParseError::InvalidRequest("missing multipart field 'file'".into()))?;
    info!(
        request_id = %request_id,
        filename = %upload.filename,
        bytes = upload.bytes.len(),
        parse_method = %options.parse_method,
        "Processing parse request"
    );

    let parser = Arc::clone(&state.parser);
    tokio::task::spawn_blocking(move || parser.parse_upload(upload, &options))
        .await
        .map_err(|e| DocParseError::Internal(format!("Parse task panicked: {e}")))?
}

/// Apply one optional form field to the request options.
pub fn apply_option(options: &mut ParseConfig, name: &str, value: &str) -> Result<(), DocParseError> {
    match name {
        "parse_method" => options.parse_method = value.parse()?,
        "is_json_md_dump" => options.dump = parse_flag(name, value)?,
        "return_layout" => options.return_layout = parse_flag(name, value)?,
        "return_info" => options.return_info = parse_flag(name, value)?,
        "return_content_list" => options.return_content_list = parse_flag(name, value)?,
        _ => {}
    }
    Ok(())
}

fn parse_flag(name: &str, value: &str) -> Result<bool, DocParseError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(DocParseError::InvalidRequest(format!(
            "{name} must be true/false/1/0, got '{other}'"
        ))),
    }
}

/// Graceful shutdown signal handler
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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseMethod;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("x", "true").unwrap());
        assert!(parse_flag("x", " 1 ").unwrap());
        assert!(!parse_flag("x", "FALSE").unwrap());
        assert!(!parse_flag("x", "0").unwrap());
        assert!(matches!(parse_flag("x", "yes"), Err(DocParseError::InvalidRequest(_))));
    }

    #[test]
    fn options_override_baseline() {
        let mut options = ParseConfig::default();
        apply_option(&mut options, "parse_method", "ocr").unwrap();
        apply_option(&mut options, "is_json_md_dump", "true").unwrap();
        apply_option(&mut options, "return_info", "1").unwrap();
        assert_eq!(options.parse_method, ParseMethod::Ocr);
        assert!(options.dump);
        assert!(options.return_info);
        assert!(!options.return_layout);
    }

    #[test]
    fn bad_parse_method_is_rejected() {
        let mut options = ParseConfig::default();
        assert!(apply_option(&mut options, "parse_method", "vlm").is_err());
    }
}
