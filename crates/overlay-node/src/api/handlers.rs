//! Request handlers. Each one reads or mutates the node through its public
//! methods and maps failures to an [`ApiError`].

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use overlay_core::{Address, NetworkId, Peer, Root};

use super::ApiState;
use super::types::{ApiError, ApiNetwork, ApiStatus, NetworkRequest};
use crate::config::LocalConfig;

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON: {e}")))
}

/// Like [`parse_body`], but an empty body means the default value.
fn parse_body_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

pub(crate) fn method_not_allowed(allow: &'static str) -> Response {
    let mut response =
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "unsupported method").into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(allow));
    response
}

pub(crate) async fn not_found() -> ApiError {
    ApiError::not_found("not found")
}

// -- /status -------------------------------------------------------------

pub(crate) async fn status(State(state): State<ApiState>) -> ApiResult<ApiStatus> {
    let node = state.node()?;
    Ok(Json(ApiStatus::from_node(&node)))
}

// -- /config -------------------------------------------------------------

pub(crate) async fn get_config(State(state): State<ApiState>) -> ApiResult<LocalConfig> {
    Ok(Json(state.node()?.local_config()))
}

pub(crate) async fn set_config(State(state): State<ApiState>, body: Bytes) -> ApiResult<LocalConfig> {
    let node = state.node()?;
    let config: LocalConfig = parse_body(&body)?;
    let restart_required = node
        .set_local_config(config)
        .map_err(|e| ApiError::bad_request(format!("error applying local config: {e}")))?;
    tracing::info!(restart_required, "local config replaced through API");
    Ok(Json(node.local_config()))
}

// -- /peer ---------------------------------------------------------------

pub(crate) async fn list_peers(State(state): State<ApiState>) -> ApiResult<Vec<Peer>> {
    Ok(Json(state.node()?.peers()))
}

pub(crate) async fn get_peer(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<Peer> {
    let address: Address = address
        .parse()
        .map_err(|_| ApiError::not_found("peer not found"))?;
    state
        .node()?
        .peers()
        .into_iter()
        .find(|peer| peer.address == address)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("peer not found"))
}

// -- /network ------------------------------------------------------------

const NETWORK_ID_REQUIRED: &str = "only individual networks can be added, modified or left";

fn parse_network_id(text: &str) -> Result<NetworkId, ApiError> {
    text.parse()
        .map_err(|_| ApiError::not_found("network not found"))
}

/// Like [`parse_network_id`], but the all-zero id names the collection and
/// cannot be written.
fn parse_writable_network_id(text: &str) -> Result<NetworkId, ApiError> {
    match parse_network_id(text)? {
        id if id == NetworkId::default() => Err(ApiError::bad_request(NETWORK_ID_REQUIRED)),
        id => Ok(id),
    }
}

pub(crate) async fn list_networks(State(state): State<ApiState>) -> ApiResult<Vec<ApiNetwork>> {
    let node = state.node()?;
    let networks = node.networks();
    Ok(Json(networks.iter().map(|nw| ApiNetwork::from(&**nw)).collect()))
}

pub(crate) async fn network_id_required() -> ApiError {
    ApiError::bad_request(NETWORK_ID_REQUIRED)
}

pub(crate) async fn get_network(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<ApiNetwork> {
    let id = parse_network_id(&id)?;
    state
        .node()?
        .get_network(id)
        .map(|nw| Json(ApiNetwork::from(&*nw)))
        .ok_or_else(|| ApiError::not_found("network not found"))
}

/// Join the network, or update the settings of an already joined one.
pub(crate) async fn set_network(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ApiNetwork> {
    let id = parse_writable_network_id(&id)?;
    let request: NetworkRequest = parse_body_or_default(&body)?;
    if request.id.is_some_and(|body_id| body_id != id) {
        return Err(ApiError::bad_request("network id does not match id in path"));
    }
    let node = state.node()?;

    let network = match node.get_network(id) {
        Some(network) => {
            if let Some(settings) = request.settings {
                network.set_local_settings(settings);
            }
            network
        }
        None => node
            .join(id, request.settings, None)
            .map_err(|e| ApiError::bad_request(format!("join failed: {e}")))?,
    };
    Ok(Json(ApiNetwork::from(&*network)))
}

/// Leave the network, returning its last state.
pub(crate) async fn leave_network(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<ApiNetwork> {
    let id = parse_writable_network_id(&id)?;
    let node = state.node()?;
    let network = node
        .get_network(id)
        .ok_or_else(|| ApiError::not_found("network not found"))?;
    let snapshot = ApiNetwork::from(&*network);
    node.leave(id);
    Ok(Json(snapshot))
}

// -- /root ---------------------------------------------------------------

fn find_root(roots: Vec<Root>, name: &str) -> Option<Root> {
    roots.into_iter().find(|root| root.name == name)
}

pub(crate) async fn list_roots(State(state): State<ApiState>) -> ApiResult<Vec<Root>> {
    Ok(Json(state.node()?.roots()))
}

pub(crate) async fn root_name_required() -> ApiError {
    ApiError::bad_request("only individual roots can be added or modified with POST/PUT")
}

pub(crate) async fn root_not_found() -> ApiError {
    ApiError::not_found("root not found")
}

pub(crate) async fn get_root(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Root> {
    find_root(state.node()?.roots(), &name)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("root not found"))
}

pub(crate) async fn set_root(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Root> {
    let root: Root = parse_body(&body)?;
    if root.name != name {
        return Err(ApiError::bad_request("root name does not match name in path"));
    }
    let node = state.node()?;
    node.set_root(root)
        .map_err(|e| ApiError::bad_request(format!("set/update root failed: {e}")))?;
    find_root(node.roots(), &name)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("root set but not subsequently found"))
}

pub(crate) async fn delete_root(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Root> {
    let node = state.node()?;
    let root = find_root(node.roots(), &name).ok_or_else(|| ApiError::not_found("root not found"))?;
    node.remove_root(&name);
    Ok(Json(root))
}
