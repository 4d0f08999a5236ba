use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};

use std::{future::Future, sync::Arc};

use crate::{ledger, queue};
use engine::Engine;

/// Basic auth credentials guarding the API routes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub credentials: Option<Credentials>,
}

async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.credentials.as_ref() else {
        return Ok(next.run(request).await);
    };
    let Some(TypedHeader(auth_header)) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    if auth_header.username() != expected.username || auth_header.password() != expected.password
    {
        tracing::debug!("rejected api credentials for {}", auth_header.username());
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

async fn liveness() -> &'static str {
    "ok"
}

pub fn router(state: ServerState) -> Router {
    let api = Router::new()
        .route(
            "/communities/{community_id}/leaderboard",
            get(ledger::leaderboard),
        )
        .route(
            "/communities/{community_id}/members/{member_id}",
            get(ledger::member),
        )
        .route("/communities/{community_id}/queue", get(queue::status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    Router::new()
        .route("/", get(liveness))
        .merge(api)
        .with_state(state)
}

/// Bind `bind:port` and serve until `shutdown` resolves.
pub async fn run(
    state: ServerState,
    bind: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    run_with_listener(state, listener, shutdown).await
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    if state.credentials.is_none() {
        tracing::warn!("no api credentials configured, ledger routes are open");
    }
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
