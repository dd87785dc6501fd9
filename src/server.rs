//! HTTP binding of the request handler
//!
//! `GET  /prices/:chain_id?tokens=0x..,0x..&includeHistory=true`
//! `GET  /prices`  refresh snapshot of every supported chain
//! `POST /prices`  `{ "<chainId>": ["0x..", ...] }`
//! `GET  /health`

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::chains::ChainId;
use crate::handler::{fetch_many, fetch_token_prices, RequestOptions};
use crate::resolver::Resolver;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesQuery {
    /// Comma separated addresses; absent selects refresh mode
    pub tokens: Option<String>,
    #[serde(default)]
    pub include_history: bool,
}

impl PricesQuery {
    fn addresses(&self) -> Option<Vec<String>> {
        self.tokens.as_ref().map(|tokens| {
            tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    fn options(&self) -> RequestOptions {
        RequestOptions {
            include_history: self.include_history,
        }
    }
}

pub fn create_router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/prices", get(refresh_all).post(batch_prices))
        .route("/prices/:chain_id", get(chain_prices))
        .layer(CorsLayer::permissive())
        .with_state(resolver)
}

/// Serve until Ctrl-C
pub async fn serve(resolver: Arc<Resolver>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {}", addr))?;

    info!("🌐 Listening on http://{}", addr);

    axum::serve(listener, create_router(resolver))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Server error")?;

    info!("✅ Server stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, stopping server...");
}

async fn health() -> &'static str {
    "ok"
}

async fn chain_prices(
    State(resolver): State<Arc<Resolver>>,
    Path(chain_id): Path<u64>,
    Query(query): Query<PricesQuery>,
) -> Response {
    let chain = match ChainId::try_from(chain_id) {
        Ok(chain) => chain,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let addresses = query.addresses();
    let body = fetch_token_prices(&resolver, chain, addresses.as_deref(), query.options()).await;
    json_body(body)
}

async fn refresh_all(State(resolver): State<Arc<Resolver>>) -> Response {
    let requests = ChainId::ALL.iter().map(|chain| (*chain, None)).collect();
    json_body(fetch_many(&resolver, requests, RequestOptions::default()).await)
}

async fn batch_prices(
    State(resolver): State<Arc<Resolver>>,
    Query(options): Query<RequestOptions>,
    Json(body): Json<HashMap<String, Vec<String>>>,
) -> Response {
    let mut requests = BTreeMap::new();
    for (raw_chain, addresses) in body {
        match raw_chain.parse::<ChainId>() {
            Ok(chain) => {
                requests.insert(chain, Some(addresses));
            }
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        }
    }

    json_body(fetch_many(&resolver, requests, options).await)
}

/// 200 with the JSON body, or 500 with `null` for the failure sentinel
fn json_body(body: Option<String>) -> Response {
    let (status, body) = match body {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "null".to_string()),
    };
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
