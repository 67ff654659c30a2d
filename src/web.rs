//! ==============================================================================
//! web.rs - http surface
//! ==============================================================================
//!
//! routes:
//!     POST /api/ppm     ingest one reading `{"ppm_lin": <number>}`
//!     GET  /data        series as `[{date, time, ppm}]`, optional `?limit=N`
//!     GET  /dashboard   chart page that polls /data
//!     GET  /health      liveness probe
//!     GET  /            banner
//!
//! shared state:
//!     the single SegmentWriter sits behind a std mutex. an append takes the
//!     lock on the blocking pool and holds it for the whole
//!     stamp -> rotate -> append -> commit sequence, so concurrent requests are
//!     serialised and never hand out the same line number twice.
//!
//! relationships:
//!     - used by: main.rs
//!     - uses: writer.rs, reader.rs, domain.rs
//!
//! ==============================================================================

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::{AppendReceipt, IngestPayload, IngestResponse};
use crate::error::{Result, StoreError};
use crate::reader::{self, Series};
use crate::segment::SegmentLayout;
use crate::writer::SegmentWriter;

const DASHBOARD_HTML: &str = include_str!("../static/dashboard.html");

#[derive(Clone)]
pub struct AppState {
    writer: Arc<Mutex<SegmentWriter>>,
    layout: SegmentLayout,
    show_readings: bool,
}

impl AppState {
    pub fn new(writer: SegmentWriter, show_readings: bool) -> Self {
        let layout = writer.layout().clone();
        Self {
            writer: Arc::new(Mutex::new(writer)),
            layout,
            show_readings,
        }
    }

    /// validated value -> appended record
    async fn append(&self, value: f64) -> Result<AppendReceipt> {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || {
            let mut writer = writer.lock().map_err(|_| StoreError::WriterPoisoned)?;
            writer.append(value)
        })
        .await?
    }

    async fn read(&self, limit: Option<usize>) -> Result<Series> {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || reader::read_series(&layout, limit)).await?
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/api/ppm", post(ingest_handler))
        .route("/data", get(data_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

async fn index_handler() -> &'static str {
    "PPM measurement server"
}

async fn health_handler() -> &'static str {
    "Server running correctly!"
}

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// POST /api/ppm
async fn ingest_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<IngestPayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(p)) => p,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let value = match payload.value() {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.append(value).await {
        Ok(receipt) => {
            if state.show_readings {
                tracing::info!(value, file = %receipt.file, line = receipt.line_number, "reading stored");
            } else {
                tracing::debug!(value, segment = receipt.segment_index, line = receipt.line_number, "reading stored");
            }
            Json(IngestResponse::from(receipt)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to store reading");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error while saving the measurement")
        }
    }
}

/// GET /data?limit=N
///
/// raw pairs so a repeated `limit` never rejects the request; the first one wins
async fn data_handler(State(state): State<AppState>, Query(params): Query<Vec<(String, String)>>) -> Response {
    let raw = params.iter().find(|(k, _)| k == "limit").map(|(_, v)| v.as_str());
    let limit = reader::parse_limit(raw);

    match state.read(limit).await {
        Ok(series) => {
            tracing::debug!(records = series.points.len(), segments = series.segments, ?limit, "series read");
            Json(series.points).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read series");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error while reading measurements")
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::Local;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(dir: &Path, lines_per_file: u64) -> Router {
        let layout = SegmentLayout::new(dir, "measurements", "txt");
        router(AppState::new(SegmentWriter::new(layout, lines_per_file), false))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ppm")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_post_then_read_back() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path(), 10_000);

        let before = Local::now();
        let (status, body) = send(&app, post_json(r#"{"ppm_lin": 412.5}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["ppm_lin"], 412.5);
        assert_eq!(body["lineNumber"], 1);
        assert!(body["file"].as_str().unwrap().ends_with("_0.txt"));
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

        let (status, body) = send(&app, get("/data?limit=1")).await;
        let after = Local::now();
        assert_eq!(status, StatusCode::OK);

        let points = body.as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["ppm"], 412.5);
        // the minute may tick over between the write and the read
        let dates = [before.format("%d-%m-%Y").to_string(), after.format("%d-%m-%Y").to_string()];
        let times = [before.format("%H:%M").to_string(), after.format("%H:%M").to_string()];
        assert!(dates.contains(&points[0]["date"].as_str().unwrap().to_string()));
        assert!(times.contains(&points[0]["time"].as_str().unwrap().to_string()));
    }

    #[tokio::test]
    async fn test_missing_field_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path(), 10_000);

        let (status, body) = send(&app, post_json(r#"{"temperature": 20}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing ppm_lin field in the body");

        let (status, body) = send(&app, post_json(r#"{"ppm_lin": "lots"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ppm_lin must be numeric");

        let (status, body) = send(&app, post_json("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
        let (_, body) = send(&app, get("/data")).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp.path().join("gone"), 10_000);

        let (status, body) = send(&app, post_json(r#"{"ppm_lin": 1}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal error while saving the measurement");

        let (status, _) = send(&app, get("/data")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_limit_query() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path(), 4);

        for i in 0..50 {
            let (status, _) = send(&app, post_json(&format!(r#"{{"ppm_lin": {i}}}"#))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let ppm = |body: &Value| -> Vec<f64> {
            body.as_array().unwrap().iter().map(|p| p["ppm"].as_f64().unwrap()).collect()
        };

        let (_, body) = send(&app, get("/data?limit=10")).await;
        assert_eq!(ppm(&body), (40..50).map(|i| i as f64).collect::<Vec<_>>());

        let (status, body) = send(&app, get("/data?limit=3&limit=20")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ppm(&body), vec![47.0, 48.0, 49.0]);

        for uri in ["/data", "/data?limit=0", "/data?limit=-5", "/data?limit=abc", "/data?limit=&limit=", "/data?foo=1"] {
            let (_, body) = send(&app, get(uri)).await;
            assert_eq!(ppm(&body).len(), 50, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_nan_value_serialises_as_null() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("measurements_0.txt"),
            "2024-01-01T00:00:00.000Z, broken\n2024-01-01T00:01:00.000Z, 5\n",
        )
        .unwrap();
        let app = app(tmp.path(), 10_000);

        let (_, body) = send(&app, get("/data")).await;
        let points = body.as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[0]["ppm"].is_null());
        assert_eq!(points[1]["ppm"], 5.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_posts_get_distinct_lines() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path(), 7);

        let mut tasks = Vec::new();
        for i in 0..21 {
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                send(&app, post_json(&format!(r#"{{"ppm_lin": {i}}}"#))).await
            }));
        }

        let mut positions = Vec::new();
        for task in tasks {
            let (status, body) = task.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            positions.push((body["file"].as_str().unwrap().to_string(), body["lineNumber"].as_u64().unwrap()));
        }
        positions.sort();
        positions.dedup();
        assert_eq!(positions.len(), 21);

        for i in 0..3 {
            let lines = std::fs::read_to_string(tmp.path().join(format!("measurements_{i}.txt"))).unwrap();
            assert_eq!(lines.lines().count(), 7);
        }
    }

    #[tokio::test]
    async fn test_plain_routes() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path(), 10);

        for (uri, needle) in [("/", "PPM"), ("/health", "running"), ("/dashboard", "<canvas")] {
            let resp = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            assert!(String::from_utf8_lossy(&bytes).contains(needle), "{uri}");
        }
    }
}
