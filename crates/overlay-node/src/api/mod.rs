//! The local control API.
//!
//! JSON over HTTP/1.1 on a Unix socket in the base directory, and
//! optionally on a TCP address from the local config. Every route requires
//! the install's bearer token and every response carries no-cache headers.
//! A panicking handler produces a 500 and leaves the listener running.
//!
//! Connections are served one task each so that a slow or stalled client
//! is bounded by [`HEADER_READ_TIMEOUT`] and, at shutdown, by
//! [`SHUTDOWN_GRACE`].

pub mod auth;
pub mod client;
mod handlers;
pub mod types;

use std::any::Any;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use axum::serve::Listener;
use axum::{BoxError, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::{Service, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::NodeError;
use crate::node::Node;
use crate::shutdown;
use types::ApiError;

pub const API_SOCKET_NAME: &str = "apisocket";

/// Upper bound on handling one request, generous enough for large peer
/// lists.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// How long a connection may take to deliver a request head, counted from
/// accept and again from the end of each response on a kept-alive
/// connection.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How long open connections get to finish after the stop signal before
/// they are aborted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const ALLOW_READ: &str = "GET, HEAD";
const ALLOW_READ_WRITE: &str = "GET, HEAD, PUT, POST";
const ALLOW_ALL: &str = "GET, HEAD, PUT, POST, DELETE";

#[derive(Clone)]
pub(crate) struct ApiState {
    node: Weak<Node>,
    token: Arc<str>,
}

impl ApiState {
    fn node(&self) -> Result<Arc<Node>, ApiError> {
        self.node
            .upgrade()
            .filter(|node| node.is_running())
            .ok_or_else(|| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "node is shutting down"))
    }
}

fn reject_others(route: MethodRouter<ApiState>, allow: &'static str) -> MethodRouter<ApiState> {
    route.fallback(move || async move { handlers::method_not_allowed(allow) })
}

/// The API as a router, independent of any listener.
pub fn router(node: Weak<Node>, token: &str) -> Router {
    let state = ApiState {
        node,
        token: Arc::from(token),
    };

    let peers = || reject_others(get(handlers::list_peers), ALLOW_READ);
    let networks = || {
        reject_others(
            get(handlers::list_networks)
                .post(handlers::network_id_required)
                .put(handlers::network_id_required)
                .delete(handlers::network_id_required),
            ALLOW_ALL,
        )
    };
    let roots = || {
        reject_others(
            get(handlers::list_roots)
                .post(handlers::root_name_required)
                .put(handlers::root_name_required)
                .delete(handlers::root_not_found),
            ALLOW_ALL,
        )
    };

    Router::new()
        .route("/status", reject_others(get(handlers::status), ALLOW_READ))
        .route(
            "/config",
            reject_others(
                get(handlers::get_config)
                    .post(handlers::set_config)
                    .put(handlers::set_config),
                ALLOW_READ_WRITE,
            ),
        )
        .route("/peer", peers())
        .route("/peer/", peers())
        .route(
            "/peer/{address}",
            reject_others(get(handlers::get_peer), ALLOW_READ),
        )
        .route("/network", networks())
        .route("/network/", networks())
        .route(
            "/network/{id}",
            reject_others(
                get(handlers::get_network)
                    .post(handlers::set_network)
                    .put(handlers::set_network)
                    .delete(handlers::leave_network),
                ALLOW_ALL,
            ),
        )
        .route("/root", roots())
        .route("/root/", roots())
        .route(
            "/root/{name}",
            reject_others(
                get(handlers::get_root)
                    .post(handlers::set_root)
                    .put(handlers::set_root)
                    .delete(handlers::delete_root),
                ALLOW_ALL,
            ),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .layer(middleware::from_fn(standard_headers))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|e: BoxError| async move {
                    ApiError::new(StatusCode::REQUEST_TIMEOUT, format!("request failed: {e}"))
                }))
                .timeout(REQUEST_TIMEOUT),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

async fn standard_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown");
    tracing::error!("API handler panicked: {detail}");
    ApiError::internal("caught unexpected error in request handler").into_response()
}

/// Bind the Unix socket and, if configured, the TCP address. A TCP bind
/// failure is logged and skipped; a Unix socket failure is fatal.
pub(crate) async fn start(node: &Arc<Node>) -> Result<(), NodeError> {
    let app = router(Arc::downgrade(node), node.api_token());
    let stop = node.api_stop_signal();

    let socket_path = node.base_path().join(API_SOCKET_NAME);
    match std::fs::remove_file(&socket_path) {
        Ok(()) => tracing::debug!(path = %socket_path.display(), "removed stale API socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let listener = tokio::net::UnixListener::bind(&socket_path)?;
    tracing::info!(path = %socket_path.display(), "API listening on unix socket");
    let task = tokio::spawn({
        let (app, stop) = (app.clone(), stop.clone());
        async move {
            serve(listener, app, stop).await;
            let _ = std::fs::remove_file(&socket_path);
        }
    });
    node.add_api_task(task).await;

    if let Some(bind) = node.local_config().settings.api_tcp_bind_address {
        match tokio::net::TcpListener::bind(bind.socket_addr()).await {
            Ok(listener) => {
                tracing::info!(address = %bind, "API listening on TCP");
                node.add_api_task(tokio::spawn(serve(listener, app, stop)))
                    .await;
            }
            Err(e) => {
                tracing::error!(address = %bind, "cannot bind TCP API address, continuing without it: {e}");
            }
        }
    }
    Ok(())
}

/// Accept until stopped, then give open connections [`SHUTDOWN_GRACE`] to
/// drain before aborting them.
async fn serve<L: Listener>(mut listener: L, app: Router, stop: watch::Receiver<bool>) {
    let mut connections = JoinSet::new();
    loop {
        let (io, _) = tokio::select! {
            _ = shutdown::stopped(stop.clone()) => break,
            accepted = listener.accept() => accepted,
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
        };
        connections.spawn(serve_connection(io, app.clone(), stop.clone()));
    }
    drop(listener);

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(open = connections.len(), "aborting API connections that outlived shutdown");
        connections.shutdown().await;
    }
}

async fn serve_connection<I>(io: I, app: Router, stop: watch::Receiver<bool>)
where
    I: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |request: axum::http::Request<Incoming>| {
        app.clone().call(request)
    });
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT);
    let connection = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(connection);

    let finished = tokio::select! {
        result = connection.as_mut() => Some(result),
        _ = shutdown::stopped(stop) => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };
    if let Err(e) = result {
        tracing::debug!("API connection closed: {e}");
    }
}
