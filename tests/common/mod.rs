//! A stand-in backend: health and upload routes on a random local port,
//! recording what it was sent.

#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use smart_groups::ServiceLocator;
use smart_groups::config::DiscoveryConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(StatusCode, Value),
    Text(StatusCode, String),
}

/// One multipart request as the backend saw it.
#[derive(Debug, Clone, Default)]
pub struct Received {
    pub fields: Vec<(String, String)>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub accept: Option<String>,
}

impl Received {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }
}

#[derive(Clone)]
pub struct Backend {
    pub health_status: StatusCode,
    pub reply: Reply,
    pub health_hits: Arc<AtomicUsize>,
    pub received: Arc<Mutex<Vec<Received>>>,
}

impl Backend {
    pub fn replying(reply: Reply) -> Self {
        Self {
            health_status: StatusCode::OK,
            reply,
            health_hits: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            health_status: StatusCode::SERVICE_UNAVAILABLE,
            ..Self::replying(Reply::Json(StatusCode::OK, sample_groups()))
        }
    }

    pub fn hits(&self) -> usize {
        self.health_hits.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    /// Serves on 127.0.0.1 and returns the port.
    pub async fn spawn(&self) -> u16 {
        let app = Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/upload", post(upload_handler))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }
}

async fn health_handler(State(backend): State<Backend>) -> Response {
    backend.health_hits.fetch_add(1, Ordering::SeqCst);
    (
        backend.health_status,
        Json(json!({ "status": "smart groups is running" })),
    )
        .into_response()
}

async fn upload_handler(
    State(backend): State<Backend>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    let mut received = Received {
        accept: headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ..Received::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            received.file_name = field.file_name().map(str::to_string);
            received.file_type = field.content_type().map(str::to_string);
        }
        let value = field
            .text()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        received.fields.push((name, value));
    }
    backend.received.lock().unwrap().push(received);

    Ok(match backend.reply {
        Reply::Json(status, body) => (status, Json(body)).into_response(),
        Reply::Text(status, body) => (status, body).into_response(),
    })
}

/// A port nothing listens on.
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn local_config() -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default().with_host("127.0.0.1");
    config.retry_delay_ms = 10;
    config
}

pub fn pinned(port: u16) -> ServiceLocator {
    ServiceLocator::pinned_port(local_config(), port)
}

pub fn sample_groups() -> Value {
    json!({
        "groups": [
            {
                "students": [
                    { "name": "Ada Lovelace",
                      "attributes": { "women": "1", "finance": "0" },
                      "availabilities": { "mon 9am": "1", "tue 2pm": "0" } },
                    { "name": "Grace Hopper",
                      "attributes": { "women": "1" },
                      "availabilities": { "mon 9am": "1", "tue 2pm": "1" } }
                ],
                "time_slot": "mon 9am",
                "is_unassigned": false
            },
            {
                "students": [
                    { "name": "Alan Turing",
                      "attributes": { "women": "0", "finance": "1" },
                      "availabilities": { "mon 9am": "0", "tue 2pm": "0" } }
                ],
                "time_slot": null,
                "is_unassigned": true
            },
            {
                "students": [
                    { "name": "Edsger Dijkstra",
                      "attributes": { "women": "0", "finance": "1" },
                      "availabilities": { "mon 9am": "0", "tue 2pm": "1" } }
                ],
                "time_slot": "tue 2pm",
                "is_unassigned": false
            }
        ]
    })
}
