//! ota-api - HTTP API for the OTA firmware server
//!
//! Exposes the device registry, firmware upload/download, the UDP relay and
//! calibration pairs over HTTP. Route paths and JSON field names are the ones
//! deployed devices and operator pages already use.
//!
//! # Usage
//!
//! ```ignore
//! use ota_api::{create_router, AppState};
//!
//! let state = AppState::new(registry, relay, calibration);
//! let router = create_router(state);
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::{ApiLimits, AppState};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the OTA REST API router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let limits = state.limits().clone();

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Registry management
        .route("/devices", get(handlers::devices::list_devices))
        .route("/device", post(handlers::devices::register_device))
        .route("/rename-device", post(handlers::devices::rename_device))
        .route("/update-version", post(handlers::devices::update_version))
        .route("/delete-device", post(handlers::devices::delete_device))
        // Firmware, polled by devices
        .route("/version", get(handlers::firmware::get_version))
        .route("/firmware", get(handlers::firmware::download_firmware))
        .route("/upload-firmware", post(handlers::firmware::upload_firmware))
        // Operator tooling
        .route("/api/udp", get(handlers::relay::relay_message))
        .route(
            "/api/calib-pairs",
            get(handlers::calibration::get_pairs).post(handlers::calibration::save_pairs),
        )
        .layer(DefaultBodyLimit::max(limits.max_upload_bytes))
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use ota_core::{
        ArtifactStore, CalibrationStore, Checkpoint, DeviceRegistry, SeedDevice, UdpRelay,
    };
    use tower::ServiceExt;

    async fn setup(dir: &tempfile::TempDir, limits: ApiLimits) -> Router {
        let artifacts = ArtifactStore::open(dir.path().join("firmware")).await.unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("devices.json"));
        let registry =
            DeviceRegistry::open(checkpoint, artifacts, &[SeedDevice::new("esp1", "1.0.3")])
                .await
                .unwrap();
        let calibration = CalibrationStore::new(dir.path().join("calib_pairs.json"));
        let state = AppState::new(
            Arc::new(registry),
            Arc::new(UdpRelay::new(4210)),
            Arc::new(calibration),
        )
        .with_limits(limits);
        create_router(state)
    }

    async fn send(
        router: &Router,
        req: Request<Body>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        (status, headers, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let router = setup(&dir, ApiLimits::default()).await;

        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, _, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let dir = tempfile::tempdir().unwrap();
        let router = setup(&dir, ApiLimits::default()).await;

        let req = Request::get("/devices")
            .header(header::ORIGIN, "http://192.168.1.10")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_version_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let router = setup(&dir, ApiLimits::default()).await;

        let req = Request::get("/version?deviceId=esp1").body(Body::empty()).unwrap();
        let (status, _, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"version": "1.0.3"}));

        let req = Request::get("/version?deviceId=ghost").body(Body::empty()).unwrap();
        let (status, _, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ApiLimits {
            max_upload_bytes: 64,
            request_timeout: Duration::from_secs(10),
        };
        let router = setup(&dir, limits).await;

        let req = Request::post("/upload-firmware?deviceId=esp1")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(vec![0u8; 65]))
            .unwrap();
        let (status, _, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "payload_too_large");
        assert!(!dir.path().join("firmware/firmware_esp1.bin").exists());
    }

    #[tokio::test]
    async fn test_download_headers() {
        let dir = tempfile::tempdir().unwrap();
        let router = setup(&dir, ApiLimits::default()).await;

        let req = Request::post("/upload-firmware?deviceId=esp1")
            .body(Body::from(vec![0x42u8; 300]))
            .unwrap();
        let (status, _, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::get("/firmware?deviceId=esp1").body(Body::empty()).unwrap();
        let (status, headers, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_LENGTH], "300");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"firmware_esp1.bin\""
        );
        assert_eq!(body, vec![0x42u8; 300]);
    }
}
