//! In-process stub of the product-catalog API for end-to-end tests: the
//! listing (pagination + search/status filter), product detail, categories,
//! and reviews endpoints, all wrapped in the `{"data": ...}` envelope.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    list_requests: Arc<AtomicU64>,
    detail_requests: Arc<AtomicU64>,
    category_requests: Arc<AtomicU64>,
    review_requests: Arc<AtomicU64>,
}

impl TestServerStats {
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn list_requests(&self) -> u64 {
        self.list_requests.load(Ordering::Relaxed)
    }

    pub fn detail_requests(&self) -> u64 {
        self.detail_requests.load(Ordering::Relaxed)
    }

    pub fn category_requests(&self) -> u64 {
        self.category_requests.load(Ordering::Relaxed)
    }

    pub fn review_requests(&self) -> u64 {
        self.review_requests.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
struct Product {
    id: i64,
    name: String,
    status: String,
    price: f64,
}

#[derive(Clone)]
struct AppState {
    stats: TestServerStats,
    products: Arc<Vec<Product>>,
}

fn seed_products() -> Vec<Product> {
    let names = [
        "Laptop", "Phone", "Headphones", "Monitor", "Keyboard", "Mouse", "Tablet", "Camera",
        "Speaker", "Charger",
    ];
    let statuses = ["ACTIVE", "DRAFT", "DISCONTINUED"];

    (0..30)
        .map(|i| Product {
            id: i as i64 + 1,
            name: format!("{} {}", names[i % names.len()], i / names.len() + 1),
            status: statuses[i % statuses.len()].to_string(),
            price: 9.99 + i as f64,
        })
        .collect()
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    state.stats.list_requests.fetch_add(1, Ordering::Relaxed);

    let page: usize = params
        .get("page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
        .max(1);
    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20)
        .clamp(1, 100);
    let search = params.get("search").map(|s| s.to_lowercase());
    let status = params.get("status");

    let filtered: Vec<&Product> = state
        .products
        .iter()
        .filter(|p| {
            search
                .as_ref()
                .is_none_or(|term| p.name.to_lowercase().contains(term))
        })
        .filter(|p| status.is_none_or(|s| &p.status == s))
        .collect();

    let start = (page - 1).saturating_mul(limit).min(filtered.len());
    let page_items: Vec<&Product> = filtered[start..].iter().take(limit).copied().collect();

    Json(json!({
        "data": page_items,
        "meta": { "page": page, "limit": limit, "total": filtered.len() },
    }))
}

async fn product_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    state.stats.detail_requests.fetch_add(1, Ordering::Relaxed);

    match state.products.iter().find(|p| p.id == id) {
        Some(product) => (StatusCode::OK, Json(json!({ "data": product }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "data": null, "error": "product not found" })),
        ),
    }
}

async fn list_categories(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    state.stats.category_requests.fetch_add(1, Ordering::Relaxed);

    Json(json!({
        "data": [
            { "id": 1, "name": "Electronics", "slug": "electronics" },
            { "id": 2, "name": "Accessories", "slug": "accessories" },
            { "id": 3, "name": "Audio", "slug": "audio" },
        ],
    }))
}

async fn product_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Json<serde_json::Value> {
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    state.stats.review_requests.fetch_add(1, Ordering::Relaxed);

    Json(json!({
        "data": [
            { "id": 1, "productId": id, "rating": 5, "comment": "great" },
            { "id": 2, "productId": id, "rating": 3, "comment": "ok" },
        ],
    }))
}

pub struct TestServer {
    addr: SocketAddr,
    stats: TestServerStats,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> anyhow::Result<Self> {
        let stats = TestServerStats::default();
        let state = AppState {
            stats: stats.clone(),
            products: Arc::new(seed_products()),
        };

        let app = Router::new()
            .route("/api/v1/products", get(list_products))
            .route("/api/v1/products/{id}", get(product_detail))
            .route("/api/v1/products/{id}/reviews", get(product_reviews))
            .route("/api/v1/categories", get(list_categories))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
        });

        Ok(Self {
            addr,
            stats,
            shutdown: Some(tx),
            handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}
