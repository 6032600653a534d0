mod handlers;
mod routes;

use axum::Router;
use gavel_common::store::RedisStatusStore;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub queue: ConnectionManager,
    pub store: RedisStatusStore,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("gavel api booting");

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = redis::Client::open(redis_url.as_str()).expect("failed to create Redis client");
    let conn = ConnectionManager::new(client)
        .await
        .expect("failed to connect to Redis");

    info!(redis_url = %redis_url, "connected to Redis");

    let state = Arc::new(AppState {
        queue: conn.clone(),
        store: RedisStatusStore::new(conn),
    });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let addr = std::env::var("GAVEL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("failed to bind to address");

    info!(addr = %addr, "http server listening");

    axum::serve(listener, app).await.expect("server error");
}
