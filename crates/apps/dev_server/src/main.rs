//! Development backend for the map-sync client.
//!
//! Serves the search, map job, poll, atlas, stored map and dataset endpoints
//! from memory, revealing map fields one simulated step at a time.

mod corpus;
mod jobs;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use protocol::dataset::DatasetRequest;
use protocol::map::{MapCreated, PollRequest};
use protocol::{Encoding, SearchSettings, StoreMapRequest, StoredMapRequest, codec, paths};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::corpus::Corpus;
use crate::jobs::JobRegistry;

#[derive(Clone)]
struct AppState {
    jobs: Arc<JobRegistry>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheQuery {
    #[serde(default)]
    ignore_cache: Option<bool>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = match env::var("DEV_SERVER_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
        .parse()
    {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid DEV_SERVER_ADDR: {err}");
            return;
        }
    };
    let step = Duration::from_millis(env_var_u64("DEV_SERVER_STEP_MS", 400));

    let state = AppState {
        jobs: Arc::new(JobRegistry::new(Corpus::default(), step)),
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("bind {addr} failed: {err}");
            return;
        }
    };
    info!("dev server listening on http://{addr} (step {step:?})");
    if let Err(err) = axum::serve(listener, router(state)).await {
        error!("server stopped: {err}");
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route(paths::SEARCH_LIST_RESULT, post(search_list_result))
        .route(paths::MAP, post(create_map))
        .route(paths::MAP_RESULT, post(map_result))
        .route(&format!("{}/:filename", paths::THUMBNAIL_ATLAS), get(thumbnail_atlas))
        .route(paths::STORE_MAP, post(store_map))
        .route(paths::STORED_MAP, post(stored_map))
        .route(paths::DATASET, post(dataset))
        .route(paths::ADD_SEARCH_HISTORY_ITEM, post(add_search_history_item))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": format!("{what} not found") }))).into_response()
}

async fn search_list_result(
    State(state): State<AppState>,
    Query(cache): Query<CacheQuery>,
    Json(settings): Json<SearchSettings>,
) -> Response {
    let response = state.jobs.corpus().search_list(&settings);
    info!(
        total = response.total_matches,
        ignore_cache = cache.ignore_cache.unwrap_or(false),
        "search list"
    );
    Json(response).into_response()
}

async fn create_map(
    State(state): State<AppState>,
    Query(cache): Query<CacheQuery>,
    Json(settings): Json<SearchSettings>,
) -> Response {
    if cache.ignore_cache == Some(true) {
        info!("map requested with ignore_cache");
    }
    let map_id = state.jobs.create(settings, Instant::now());
    Json(MapCreated { map_id }).into_response()
}

/// Poll endpoint: CBOR when the client accepts it, JSON otherwise; 404 once done.
async fn map_result(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<PollRequest>) -> Response {
    let Some(response) = state.jobs.poll(&request, Instant::now()) else {
        return not_found("map job");
    };
    let accept = headers.get(http::header::ACCEPT).and_then(|v| v.to_str().ok());
    let encoding = Encoding::negotiate(accept);
    match codec::encode(&response, encoding) {
        Ok(body) => {
            let mut headers = HeaderMap::new();
            headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(encoding.mime()));
            (StatusCode::OK, headers, Body::from(body)).into_response()
        }
        Err(err) => {
            error!("poll response encoding failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response()
        }
    }
}

async fn thumbnail_atlas(State(state): State<AppState>, AxumPath(filename): AxumPath<String>) -> Response {
    match state.jobs.atlas_png(&filename) {
        Some(Ok(png)) => {
            let mut headers = HeaderMap::new();
            headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
            (StatusCode::OK, headers, Body::from(png)).into_response()
        }
        Some(Err(err)) => {
            error!("atlas render failed for {filename}: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "atlas error").into_response()
        }
        None => not_found("atlas"),
    }
}

async fn store_map(State(state): State<AppState>, Json(request): Json<StoreMapRequest>) -> Response {
    match state.jobs.store_map(&request.name, &request.map_id) {
        Some(stored) => Json(stored).into_response(),
        None => not_found("map job"),
    }
}

async fn stored_map(State(state): State<AppState>, Json(request): Json<StoredMapRequest>) -> Response {
    match state.jobs.stored_map(&request.map_id) {
        Some(response) => Json(response).into_response(),
        None => not_found("stored map"),
    }
}

async fn dataset(State(state): State<AppState>, Json(request): Json<DatasetRequest>) -> Response {
    match state.jobs.corpus().dataset(&request.dataset_id) {
        Some(info) => Json(info).into_response(),
        None => {
            warn!("unknown dataset {}", request.dataset_id);
            not_found("dataset")
        }
    }
}

async fn add_search_history_item(body: bytes::Bytes) -> Response {
    info!(bytes = body.len(), "search history item received");
    Json(json!({})).into_response()
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
