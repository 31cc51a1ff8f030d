//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

/// How the mock device answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Healthy,
    Status(u16),
    /// Sleep far longer than any client deadline.
    Hang,
    /// 200 with a body that is not JSON.
    Garbage,
}

/// A fake FPP device on an ephemeral local port.
#[derive(Clone)]
pub struct MockDevice {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    mode: Arc<Mutex<DeviceMode>>,
}

impl MockDevice {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn set_mode(&self, mode: DeviceMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

/// Start a mock device. `/api/fppd/status` returns a playing status while
/// healthy; every other path echoes itself back.
pub async fn start_mock_device() -> MockDevice {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let device = MockDevice {
        addr: listener.local_addr().unwrap(),
        hits: Arc::new(AtomicUsize::new(0)),
        mode: Arc::new(Mutex::new(DeviceMode::Healthy)),
    };

    let state = device.clone();
    let app = Router::new().fallback(move |uri: Uri| {
        let state = state.clone();
        async move { respond(&state, uri).await }
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    device
}

async fn respond(device: &MockDevice, uri: Uri) -> Response {
    device.hits.fetch_add(1, Ordering::SeqCst);
    let mode = *device.mode.lock().unwrap();

    match mode {
        DeviceMode::Healthy if uri.path() == "/api/fppd/status" => Json(json!({
            "status_name": "playing",
            "mode_name": "player",
            "current_playlist": { "playlist": "Christmas" },
            "current_sequence": "Jingle Bells.fseq",
            "seconds_played": "42",
            "seconds_remaining": "118",
            "volume": 70
        }))
        .into_response(),
        DeviceMode::Healthy => Json(json!({ "path": uri.path() })).into_response(),
        DeviceMode::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        DeviceMode::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK.into_response()
        }
        DeviceMode::Garbage => "<html>not json</html>".into_response(),
    }
}
