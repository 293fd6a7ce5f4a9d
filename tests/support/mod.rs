//! ---
//! pvz_section: "15-testing-qa-runbook"
//! pvz_subsection: "integration-tests"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "In-process mock of the PVZ HTTP service."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use pvz_load_scenario::{CreatePvzRequest, DummyLoginRequest};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    Healthy,
    LoginUnauthorized,
    CreateWithoutId,
    ListingObject,
}

/// One request as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub endpoint: &'static str,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
}

struct MockState {
    mode: MockMode,
    logins: AtomicU64,
    creates: AtomicU64,
    lists: AtomicU64,
    seen: Mutex<Vec<Seen>>,
    roles: Mutex<Vec<String>>,
    cities: Mutex<Vec<String>>,
    queries: Mutex<Vec<ListQuery>>,
}

pub struct MockPvzService {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl MockPvzService {
    pub async fn start(mode: MockMode) -> Self {
        let state = Arc::new(MockState {
            mode,
            logins: AtomicU64::new(0),
            creates: AtomicU64::new(0),
            lists: AtomicU64::new(0),
            seen: Mutex::new(Vec::new()),
            roles: Mutex::new(Vec::new()),
            cities: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        });
        let router = Router::new()
            .route("/dummyLogin", post(login))
            .route("/pvz", post(create).get(list))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });
        Self {
            addr,
            state,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn logins(&self) -> u64 {
        self.state.logins.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> u64 {
        self.state.creates.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> u64 {
        self.state.lists.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.state.seen.lock().clone()
    }

    pub fn roles(&self) -> Vec<String> {
        self.state.roles.lock().clone()
    }

    pub fn cities(&self) -> Vec<String> {
        self.state.cities.lock().clone()
    }

    pub fn queries(&self) -> Vec<ListQuery> {
        self.state.queries.lock().clone()
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn record(state: &MockState, endpoint: &'static str, headers: &HeaderMap) {
    state.seen.lock().push(Seen {
        endpoint,
        bearer: bearer(headers),
    });
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(request): Json<DummyLoginRequest>,
) -> Response {
    let n = state.logins.fetch_add(1, Ordering::SeqCst) + 1;
    record(&state, "login", &headers);
    state.roles.lock().push(request.role.to_string());
    if state.mode == MockMode::LoginUnauthorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "unauthorized"}))).into_response();
    }
    Json(json!({ "token": format!("token-{n}") })).into_response()
}

async fn create(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(request): Json<CreatePvzRequest>,
) -> Response {
    let n = state.creates.fetch_add(1, Ordering::SeqCst) + 1;
    record(&state, "create", &headers);
    state.cities.lock().push(request.city.clone());
    let body = if state.mode == MockMode::CreateWithoutId {
        json!({ "city": request.city })
    } else {
        json!({ "id": format!("pvz-{n}"), "city": request.city })
    };
    (StatusCode::CREATED, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: u32,
    limit: u32,
}

async fn list(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    state.lists.fetch_add(1, Ordering::SeqCst);
    record(&state, "list", &headers);
    state.queries.lock().push(ListQuery {
        page: params.page,
        limit: params.limit,
    });
    if state.mode == MockMode::ListingObject {
        return Json(json!({ "items": [] })).into_response();
    }
    Json(json!([])).into_response()
}
