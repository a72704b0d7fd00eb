//! Bearer-token authentication for the control API.
//!
//! The token is generated once per install and kept in `authtoken.secret`
//! with owner-only permissions. Requests present it either as
//! `Authorization: bearer <token>` or in the `X-ZT1-Auth` header.

use std::path::Path;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;
use rand::rngs::OsRng;

use super::ApiState;
use super::types::ApiError;
use crate::storage::{Permission, atomic_write};

pub const AUTH_TOKEN_FILE: &str = "authtoken.secret";
pub const AUTH_HEADER: &str = "x-zt1-auth";

const TOKEN_LEN: usize = 20;
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const UNAUTHORIZED: &str =
    "authorization token not found or incorrect (checked X-ZT1-Auth and Authorization headers)";

/// Read the install's token, creating it on first use. A blank file is
/// replaced with a fresh token.
pub fn load_or_create_token(base_path: &Path) -> std::io::Result<String> {
    let path = base_path.join(AUTH_TOKEN_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
        Ok(_) => tracing::warn!(path = %path.display(), "API auth token file is empty"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let token = generate_token(&mut OsRng);
    atomic_write(&path, token.as_bytes(), Permission::Secret.mode())?;
    tracing::info!(path = %path.display(), "generated API auth token");
    Ok(token)
}

pub fn generate_token(rng: &mut impl Rng) -> String {
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Whether either accepted header carries `token`. Empty values never match.
pub fn authorized(headers: &HeaderMap, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .and_then(|v| {
            let (scheme, value) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| value.trim())
        });
    if bearer.is_some_and(|candidate| constant_time_eq(candidate, token)) {
        return true;
    }
    headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .is_some_and(|candidate| constant_time_eq(candidate, token))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() || a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rejects the request with 401 before any handler runs.
pub(crate) async fn require_token(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    if !authorized(request.headers(), &state.token) {
        tracing::debug!(path = %request.uri().path(), "rejected unauthenticated API request");
        return ApiError::new(StatusCode::UNAUTHORIZED, UNAUTHORIZED).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(name, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token(&mut StdRng::seed_from_u64(1));
        assert_eq!(token.len(), 20);
        assert!(token.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_token_created_once_and_trimmed() {
        let dir = TempDir::new().unwrap();
        let first = load_or_create_token(dir.path()).unwrap();
        let second = load_or_create_token(dir.path()).unwrap();
        assert_eq!(first, second);

        std::fs::write(dir.path().join(AUTH_TOKEN_FILE), "abc123\n").unwrap();
        assert_eq!(load_or_create_token(dir.path()).unwrap(), "abc123");
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        load_or_create_token(dir.path()).unwrap();
        let mode = std::fs::metadata(dir.path().join(AUTH_TOKEN_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_both_header_conventions() {
        assert!(authorized(&headers("authorization", "bearer tok"), "tok"));
        assert!(authorized(&headers("authorization", "Bearer tok "), "tok"));
        assert!(authorized(&headers("x-zt1-auth", "tok"), "tok"));
        assert!(!authorized(&headers("authorization", "bearer nope"), "tok"));
        assert!(!authorized(&headers("authorization", "basic tok"), "tok"));
        assert!(!authorized(&headers("x-zt1-auth", "tok2"), "tok"));
        assert!(!authorized(&HeaderMap::new(), "tok"));
    }

    #[test]
    fn test_blank_token_file_is_regenerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(AUTH_TOKEN_FILE);
        for blank in ["", " \n\t"] {
            std::fs::write(&path, blank).unwrap();
            let token = load_or_create_token(dir.path()).unwrap();
            assert_eq!(token.len(), TOKEN_LEN);
            assert_eq!(std::fs::read_to_string(&path).unwrap(), token);
        }
    }

    #[test]
    fn test_empty_credentials_never_match() {
        assert!(!authorized(&headers("x-zt1-auth", ""), ""));
        assert!(!authorized(&headers("x-zt1-auth", "  "), ""));
        assert!(!authorized(&headers("x-zt1-auth", ""), "tok"));
        assert!(!authorized(&headers("authorization", "bearer "), ""));
        assert!(!authorized(&headers("authorization", "bearer  "), "tok"));
        assert!(!authorized(&headers("authorization", "bearer tok"), ""));
    }
}
