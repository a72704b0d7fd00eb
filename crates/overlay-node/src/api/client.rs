//! Minimal client for the control API over its Unix socket.

use std::path::Path;

use axum::http::{Method, Request, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::API_SOCKET_NAME;
use super::types::ApiErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot connect to API socket: {0}")]
    Connect(std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
    #[error("invalid request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The `error` field of an error body, if there is one.
    pub fn error_message(&self) -> Option<String> {
        serde_json::from_slice::<ApiErrorBody>(&self.body)
            .ok()
            .map(|b| b.error)
    }
}

/// Send one request to the API socket in `base_path`.
pub async fn api_request(
    base_path: &Path,
    token: &str,
    method: Method,
    path: &str,
    body: Option<Vec<u8>>,
) -> Result<ApiResponse, ClientError> {
    let stream = tokio::net::UnixStream::connect(base_path.join(API_SOCKET_NAME))
        .await
        .map_err(ClientError::Connect)?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!("API client connection ended: {e}");
        }
    });

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, "localhost")
        .header(header::AUTHORIZATION, format!("bearer {token}"));
    if body.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }
    let request = request.body(Full::new(Bytes::from(body.unwrap_or_default())))?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok(ApiResponse { status, body })
}

pub async fn api_get(base_path: &Path, token: &str, path: &str) -> Result<ApiResponse, ClientError> {
    api_request(base_path, token, Method::GET, path, None).await
}

pub async fn api_post<T: Serialize>(
    base_path: &Path,
    token: &str,
    path: &str,
    body: &T,
) -> Result<ApiResponse, ClientError> {
    let body = serde_json::to_vec(body)?;
    api_request(base_path, token, Method::POST, path, Some(body)).await
}

pub async fn api_delete(
    base_path: &Path,
    token: &str,
    path: &str,
) -> Result<ApiResponse, ClientError> {
    api_request(base_path, token, Method::DELETE, path, None).await
}
