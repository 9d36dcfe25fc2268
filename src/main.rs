//! Binary entry point: configuration, logging, and a demo storefront router
//! wrapped in the edge pipeline.

use axum::{Extension, Json, Router, routing::get, routing::post};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use shop_edge::config::{self, Config};
use shop_edge::server;
use shop_edge::state::{AppState, RequestContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_from_env()?;
    init_tracing(&config);
    config.print_summary();

    server::run(config, storefront_router()).await
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Placeholder storefront routes; real page handlers plug in here.
fn storefront_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home_handler))
        .route("/cart/checkout", post(checkout_handler))
}

async fn home_handler(ctx: Option<Extension<RequestContext>>) -> Json<serde_json::Value> {
    let ctx = ctx.map(|Extension(c)| c);
    Json(json!({
        "page": "home",
        "session_id": ctx.as_ref().map(|c| c.session_id.as_str()),
        "request_id": ctx.as_ref().map(|c| c.request_id.as_str()),
    }))
}

async fn checkout_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "order placed" }))
}
