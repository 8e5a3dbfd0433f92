//! In-memory stand-in for the Increase API, used by the client's tests.
//!
//! Every request except `/_mock/*` passes through [`gate`], which serves
//! queued faults first, then checks the bearer token, then replays responses
//! for repeated `Idempotency-Key`s.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

pub mod error;
mod handlers;
pub mod store;
mod validate;

pub use error::ApiError;
pub use store::{Db, Store};

use handlers::*;
use store::Replay;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";
const REPLAYED_HEADER: &str = "idempotent-replayed";

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/{account_id}", get(get_account).patch(update_account))
        .route("/accounts/{account_id}/close", post(close_account))
        .route("/accounts/{account_id}/balance", get(account_balance))
        .route(
            "/account_transfers",
            get(list_account_transfers).post(create_account_transfer),
        )
        .route("/account_transfers/{id}", get(get_account_transfer))
        .route("/account_transfers/{id}/approve", post(approve_account_transfer))
        .route("/account_transfers/{id}/cancel", post(cancel_account_transfer))
        .route("/ach_transfers", get(list_ach_transfers).post(create_ach_transfer))
        .route("/ach_transfers/{id}", get(get_ach_transfer))
        .route("/ach_transfers/{id}/approve", post(approve_ach_transfer))
        .route("/ach_transfers/{id}/cancel", post(cancel_ach_transfer))
        .route("/cards", get(list_cards).post(create_card))
        .route("/cards/{card_id}", get(get_card).patch(update_card))
        .route("/cards/{card_id}/details", get(card_details))
        .route("/entities", get(list_entities).post(create_entity))
        .route("/entities/{entity_id}", get(get_entity))
        .route("/entities/{entity_id}/archive", post(archive_entity))
        .route("/transactions", get(list_transactions))
        .route("/transactions/{transaction_id}", get(get_transaction))
        .route(
            "/simulations/account_transfers/{id}/complete",
            post(simulate_account_transfer_complete),
        )
        .route("/simulations/ach_transfers/{id}/submit", post(simulate_ach_submit))
        .route("/simulations/ach_transfers/{id}/return", post(simulate_ach_return))
        .route("/_mock/faults", post(inject_faults))
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(db.clone(), gate))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn gate(State(db): State<Db>, request: Request, next: Next) -> Response {
    if request.uri().path().starts_with("/_mock/") {
        return next.run(request).await;
    }

    let fault = db.write().await.take_fault();
    if let Some(fault) = fault {
        warn!(path = %request.uri().path(), status = %fault.status, "serving injected fault");
        return ApiError::injected(fault.status, fault.retry_after).into_response();
    }

    if !authorized(request.headers().get(AUTHORIZATION)) {
        return ApiError::invalid_api_key().into_response();
    }

    let key = request
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    match key {
        Some(key) if request.method() != Method::GET => replay_or_run(db, key, request, next).await,
        _ => next.run(request).await,
    }
}

fn authorized(header: Option<&HeaderValue>) -> bool {
    header
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty())
}

/// Answer a repeated key from the stored response; a reused key on a
/// different request, or while the first one is still running, is a conflict.
async fn replay_or_run(db: Db, key: String, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let request_body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => return ApiError::malformed(err.to_string()).into_response(),
    };
    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();

    {
        // Check and reserve under one write lock so concurrent repeats run the handler once.
        let mut store = db.write().await;
        match store.replays.get(&key) {
            Some(replay) if !replay.same_request(&method, &path, &request_body) => {
                return ApiError::idempotency_conflict().into_response();
            }
            Some(Replay { response: None, .. }) => {
                return ApiError::idempotency_conflict()
                    .with_detail("A request with this idempotency key is still in progress.")
                    .into_response();
            }
            Some(Replay {
                response: Some((status, body)),
                ..
            }) => {
                debug!(%key, "replaying idempotent response");
                let mut response = (*status, Body::from(body.clone())).into_response();
                let headers = response.headers_mut();
                headers.insert("content-type", HeaderValue::from_static("application/json"));
                headers.insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
                return response;
            }
            None => {
                store.replays.insert(
                    key.clone(),
                    Replay {
                        method,
                        path,
                        request_body: request_body.clone(),
                        response: None,
                    },
                );
            }
        }
    }

    let response = next.run(Request::from_parts(parts, Body::from(request_body))).await;
    if response.status().is_server_error() {
        // Let a retry with the same key run again.
        db.write().await.replays.remove(&key);
        return response;
    }
    let (parts, body) = response.into_parts();
    let response_body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            db.write().await.replays.remove(&key);
            return ApiError::malformed(err.to_string()).into_response();
        }
    };
    if let Some(replay) = db.write().await.replays.get_mut(&key) {
        replay.response = Some((parts.status, response_body.clone()));
    }
    Response::from_parts(parts, Body::from(response_body))
}
