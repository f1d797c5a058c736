//! HTTP Basic authentication for the operator endpoints.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Challenge sent with every rejected request.
pub const CHALLENGE: &str = r#"Basic realm="Please enter your username and password for this site""#;

/// The single operator account allowed to read orders.
#[derive(Clone)]
pub struct OperatorCredentials {
    username: String,
    password: String,
}

impl OperatorCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields are always compared, each in constant time.
    fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = password.as_bytes().ct_eq(self.password.as_bytes());
        bool::from(user_ok & pass_ok)
    }
}

/// Extracts `user:password` from an `Authorization: Basic ...` header.
/// The scheme name is case-insensitive.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))],
        "Unauthorized",
    )
        .into_response()
}

/// Middleware rejecting requests without the operator credentials.
pub async fn require_basic_auth(
    State(credentials): State<Arc<OperatorCredentials>>,
    req: Request,
    next: Next,
) -> Response {
    match basic_credentials(req.headers()) {
        Some((user, password)) if credentials.matches(&user, &password) => next.run(req).await,
        Some(_) => {
            warn!(path = %req.uri().path(), "Rejected operator credentials");
            unauthorized()
        }
        None => unauthorized(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials_are_decoded() {
        let encoded = STANDARD.encode("admin:pa:ss");
        let parsed = basic_credentials(&headers(&format!("Basic {encoded}")));
        assert_eq!(parsed, Some(("admin".to_string(), "pa:ss".to_string())));
    }

    #[test]
    fn test_scheme_name_ignores_case() {
        let encoded = STANDARD.encode("admin:secret");
        for scheme in ["basic", "BASIC", "bAsIc"] {
            let parsed = basic_credentials(&headers(&format!("{scheme} {encoded}")));
            assert_eq!(parsed, Some(("admin".to_string(), "secret".to_string())));
        }
    }

    #[test]
    fn test_other_schemes_are_ignored() {
        assert_eq!(basic_credentials(&headers("Bearer abc")), None);
        assert_eq!(basic_credentials(&headers("Basic !!!")), None);
        assert_eq!(basic_credentials(&headers("Basicabc")), None);
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
    }

    #[test]
    fn test_both_fields_must_match() {
        let creds = OperatorCredentials::new("admin", "secret");
        assert!(creds.matches("admin", "secret"));
        assert!(!creds.matches("admin", "wrong"));
        assert!(!creds.matches("root", "secret"));
        assert!(!creds.matches("", ""));
    }
}
