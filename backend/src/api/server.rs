//! HTTP server for the tabmerge API.
//!
//! One shared [`Session`] serves every request; handlers take the lock only
//! after the request body has been read.
//!
//! # API Endpoints
//!
//! | Method | Path            | Description                                  |
//! |--------|-----------------|----------------------------------------------|
//! | GET    | `/health`       | Health check                                 |
//! | GET    | `/api/status`   | Session snapshot                             |
//! | POST   | `/api/upload`   | Upload input files (`files` fields), merge   |
//! | POST   | `/api/mapping`  | Upload the mapping file (`file` field)       |
//! | POST   | `/api/lookup`   | Run a lookup on the merged table             |
//! | GET    | `/api/export`   | Download as `?format=csv|xlsx&filename=`     |
//! | POST   | `/api/reset`    | Discard the session                          |
//! | GET    | `/api/logs`     | SSE stream for real-time logs                |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, ExportQuery, LookupResponse, MappingResponse, MergeResponse};
use crate::config::Config;
use crate::error::{ServerError, ServerResult, SessionError};
use crate::models::LookupRequest;
use crate::session::{Session, SessionStatus};

type SharedSession = Arc<Mutex<Session>>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Session(SessionError::NothingMerged | SessionError::NoMapping) => {
                StatusCode::CONFLICT
            }
            ServerError::Session(SessionError::Read(_) | SessionError::Lookup(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Session(SessionError::Export(_)) | ServerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the application router around a fresh session.
pub fn router(config: Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let session: SharedSession = Arc::new(Mutex::new(Session::initialize(config)));

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/upload", post(upload_inputs))
        .route("/api/mapping", post(upload_mapping))
        .route("/api/lookup", post(lookup))
        .route("/api/export", get(export))
        .route("/api/reset", post(reset))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .with_state(session)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> ServerResult<()> {
    let port = config.port;
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Tabmerge server running on http://localhost:{}", port);
    println!("   POST /api/upload  - Upload and merge input files");
    println!("   POST /api/mapping - Upload mapping file");
    println!("   POST /api/lookup  - Run lookup");
    println!("   GET  /api/export  - Download result");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tabmerge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(session): State<SharedSession>) -> Json<SessionStatus> {
    Json(session.lock().await.status())
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Read every file field named `field` in upload order.
async fn read_files(mut multipart: Multipart, field: &str) -> ServerResult<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let name = part
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload_{}", files.len() + 1));
        let bytes = part
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        files.push((name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ServerError::BadRequest(format!("No '{}' field provided", field)));
    }
    Ok(files)
}

/// Upload input files and merge them, replacing the previous merge.
async fn upload_inputs(
    State(session): State<SharedSession>,
    multipart: Multipart,
) -> ServerResult<Json<MergeResponse>> {
    let files = read_files(multipart, "files").await?;
    log_info(format!("📄 New upload: {} file(s)", files.len()));

    let mut session = session.lock().await;
    let session_id = session.id().to_string();
    let preview_rows = session.config().preview_rows;
    let outcome = session.load_inputs(&files);

    Ok(Json(MergeResponse::new(session_id, outcome, preview_rows)))
}

/// Upload the mapping file. Only the first `file` field is used.
async fn upload_mapping(
    State(session): State<SharedSession>,
    multipart: Multipart,
) -> ServerResult<Json<MappingResponse>> {
    let mut files = read_files(multipart, "file").await?;
    let (name, bytes) = files.swap_remove(0);

    let mut session = session.lock().await;
    let columns = session.load_mapping(&name, &bytes)?.to_vec();
    let row_count = session.mapping().map(|m| m.table.len()).unwrap_or_default();

    Ok(Json(MappingResponse {
        file: name,
        columns,
        row_count,
    }))
}

async fn lookup(
    State(session): State<SharedSession>,
    Json(request): Json<LookupRequest>,
) -> ServerResult<Json<LookupResponse>> {
    let mut session = session.lock().await;
    let outcome = session.lookup(&request)?.clone();
    let preview = session.preview(Some(&request.key_col_main));

    Ok(Json(LookupResponse::new(&outcome, preview)))
}

async fn export(
    State(session): State<SharedSession>,
    Query(query): Query<ExportQuery>,
) -> ServerResult<Response> {
    let exported = session
        .lock()
        .await
        .export(query.format, query.filename.as_deref())?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        exported.filename.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, exported.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

async fn reset(State(session): State<SharedSession>) -> Json<SessionStatus> {
    let mut session = session.lock().await;
    session.reset();
    Json(session.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LookupError, ReadError};

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::Session(SessionError::NoMapping), StatusCode::CONFLICT),
            (
                ServerError::Session(SessionError::Lookup(LookupError::EmptyValueColumns)),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServerError::Session(SessionError::Read(ReadError::unreadable("a.csv", "bad"))),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_status_handler_reports_empty_session() {
        let session: SharedSession = Arc::new(Mutex::new(Session::default()));
        let Json(snapshot) = status(State(session)).await;
        assert_eq!(snapshot.merged_rows, 0);
        assert!(!snapshot.lookup_done);
    }

    #[tokio::test]
    async fn test_export_handler_sets_attachment_headers() {
        let mut inner = Session::default();
        inner.load_inputs(&[("a.csv", "ID\n1\n")]);
        let session: SharedSession = Arc::new(Mutex::new(inner));

        let query = ExportQuery {
            format: crate::models::OutputFormat::Csv,
            filename: Some("out".into()),
        };
        let response = export(State(session), Query(query)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"out.csv\""
        );
    }

    #[tokio::test]
    async fn test_lookup_handler_without_upload_is_conflict() {
        let session: SharedSession = Arc::new(Mutex::new(Session::default()));
        let request = LookupRequest {
            key_col_main: "ID".into(),
            key_col_map: "ID".into(),
            value_cols: vec!["Name".into()],
            method: Default::default(),
        };
        let err = lookup(State(session), Json(request)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
