//! In-process mock of the REST + realtime backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;

pub const TOKEN: &str = "secret";

/// One request seen by the mock.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Rows of `docs_warehouse`, newest first
    pub docs: Vec<Value>,
    /// Size of the synthetic `nomenclature` resource
    pub nomenclature: u64,
    pub requests: Vec<Recorded>,
    /// Status to answer every PATCH with instead of applying it
    pub fail_patch: Option<u16>,
    next_id: i64,
}

#[derive(Clone)]
struct AppState {
    inner: Arc<Mutex<MockState>>,
    frames: broadcast::Sender<String>,
}

pub struct MockBackend {
    pub base_url: String,
    pub ws_url: String,
    pub state: Arc<Mutex<MockState>>,
    frames: broadcast::Sender<String>,
}

impl MockBackend {
    pub async fn spawn(docs: Vec<Value>) -> Self {
        let next_id = docs
            .iter()
            .filter_map(|d| d["id"].as_i64())
            .max()
            .unwrap_or(0);
        let inner = Arc::new(Mutex::new(MockState {
            docs,
            nomenclature: 1_200,
            next_id,
            ..MockState::default()
        }));
        let (frames, _) = broadcast::channel(64);

        let app = Router::new()
            .route(
                "/api/v1/docs_warehouse/",
                get(list_docs).delete(delete_docs),
            )
            .route(
                "/api/v1/alt_docs_warehouse/",
                axum::routing::post(create_docs).patch(patch_docs),
            )
            .route("/api/v1/docs_warehouse/{id}/", get(get_doc))
            .route("/api/v1/nomenclature/", get(list_nomenclature))
            .route("/api/v1/warehouses/", get(not_found))
            .route("/ws/{token}/", get(ws_handler))
            .with_state(AppState {
                inner: Arc::clone(&inner),
                frames: frames.clone(),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api/v1"),
            ws_url: format!("ws://{addr}/ws/{TOKEN}/"),
            state: inner,
            frames,
        }
    }

    /// Push a raw frame to every connected realtime client.
    pub fn push(&self, frame: Value) {
        let _ = self.frames.send(frame.to_string());
    }

    /// Wait until `n` realtime clients are connected.
    pub async fn wait_for_clients(&self, n: usize) {
        for _ in 0..200 {
            if self.frames.receiver_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("realtime clients did not connect");
    }

    pub fn requests(&self, method: &str) -> Vec<Recorded> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }
}

/// A warehouse document dated `day` days after 2024-02-01.
pub fn doc(id: i64, day: i64) -> Value {
    json!({
        "id": id,
        "number": id.to_string(),
        "dated": 1706745600 + day * 86400,
        "operation": "incoming",
        "status": false,
        "organization": 1,
        "warehouse": 2,
    })
}

fn record(
    state: &AppState,
    method: &'static str,
    path: &str,
    query: &HashMap<String, String>,
    body: Option<Value>,
) {
    state.inner.lock().unwrap().requests.push(Recorded {
        method,
        path: path.to_string(),
        query: query.clone(),
        body,
    });
}

fn authorized(query: &HashMap<String, String>) -> bool {
    query.get("token").map(String::as_str) == Some(TOKEN)
}

fn param(query: &HashMap<String, String>, key: &str) -> Option<i64> {
    query.get(key).and_then(|v| v.parse().ok())
}

async fn list_docs(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "GET", "docs_warehouse", &query, None);
    if !authorized(&query) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let from = param(&query, "datefrom");
    let to = param(&query, "dateto");
    let offset = param(&query, "offset").unwrap_or(0) as usize;
    let limit = param(&query, "limit").unwrap_or(35) as usize;
    let tags = query.get("tags").cloned();

    let inner = state.inner.lock().unwrap();
    let matching: Vec<Value> = inner
        .docs
        .iter()
        .filter(|d| {
            let dated = d["dated"].as_i64().unwrap_or(0);
            from.map_or(true, |f| dated >= f)
                && to.map_or(true, |t| dated <= t)
                && tags.as_deref().map_or(true, |t| d["tags"].as_str() == Some(t))
        })
        .cloned()
        .collect();
    let page: Vec<Value> = matching.iter().skip(offset).take(limit).cloned().collect();

    Json(json!({"result": page, "count": matching.len()})).into_response()
}

async fn get_doc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "GET", "docs_warehouse/{id}", &query, None);
    let inner = state.inner.lock().unwrap();
    match inner.docs.iter().find(|d| d["id"].as_i64() == Some(id)) {
        Some(doc) => Json(doc.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_docs(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST", "alt_docs_warehouse", &query, Some(body.clone()));

    let created: Vec<Value> = {
        let mut inner = state.inner.lock().unwrap();
        let mut created = Vec::new();
        for item in body.as_array().cloned().unwrap_or_default() {
            inner.next_id += 1;
            let mut row = item;
            row["id"] = json!(inner.next_id);
            row["status"] = json!(false);
            inner.docs.insert(0, row.clone());
            created.push(row);
        }
        created
    };

    let _ = state.frames.send(
        json!({"target": "docs_warehouse", "action": "create", "result": created}).to_string(),
    );
    Json(json!(created)).into_response()
}

async fn patch_docs(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "PATCH", "alt_docs_warehouse", &query, Some(body.clone()));

    let updated: Vec<Value> = {
        let mut inner = state.inner.lock().unwrap();
        if let Some(status) = inner.fail_patch {
            return StatusCode::from_u16(status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
        let mut updated = Vec::new();
        for patch in body.as_array().cloned().unwrap_or_default() {
            if let Some(doc) = inner.docs.iter_mut().find(|d| d["id"] == patch["id"]) {
                if let (Some(row), Some(fields)) = (doc.as_object_mut(), patch.as_object()) {
                    for (k, v) in fields {
                        row.insert(k.clone(), v.clone());
                    }
                }
                updated.push(doc.clone());
            }
        }
        updated
    };

    let _ = state.frames.send(
        json!({"target": "docs_warehouse", "action": "edit", "result": updated}).to_string(),
    );
    Json(json!(updated)).into_response()
}

async fn delete_docs(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "DELETE", "docs_warehouse", &query, Some(body.clone()));

    let removed: Vec<Value> = {
        let mut inner = state.inner.lock().unwrap();
        let ids = body.as_array().cloned().unwrap_or_default();
        let removed = inner
            .docs
            .iter()
            .filter(|d| ids.contains(&d["id"]))
            .cloned()
            .collect();
        inner.docs.retain(|d| !ids.contains(&d["id"]));
        removed
    };

    // The live backend echoes whole rows on delete.
    let _ = state.frames.send(
        json!({"target": "docs_warehouse", "action": "delete", "result": removed}).to_string(),
    );
    StatusCode::OK.into_response()
}

async fn list_nomenclature(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "GET", "nomenclature", &query, None);
    let total = state.inner.lock().unwrap().nomenclature;
    let offset = param(&query, "offset").unwrap_or(0) as u64;
    let limit = param(&query, "limit").unwrap_or(35) as u64;

    let result: Vec<Value> = (offset..(offset + limit).min(total))
        .map(|i| json!({"id": i + 1, "name": format!("item {}", i + 1)}))
        .collect();
    Json(json!({"result": result, "count": total})).into_response()
}

async fn not_found(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "GET", "warehouses", &query, None);
    StatusCode::NOT_FOUND.into_response()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if token != TOKEN {
        return StatusCode::FORBIDDEN.into_response();
    }
    let frames = state.frames.subscribe();
    ws.on_upgrade(move |socket| forward_frames(socket, frames))
}

async fn forward_frames(mut socket: WebSocket, mut frames: broadcast::Receiver<String>) {
    while let Ok(frame) = frames.recv().await {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }
}
