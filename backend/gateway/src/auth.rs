//! Gateway Authentication Module
//!
//! Bearer credentials come from the `Authorization` header, the
//! `x-access-token` header, or a session cookie, checked in that order.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use serde_json::Value;
use tracing::{debug, warn};

use cafepos_config::TokenEntry;
use cafepos_core::{Credential, Resource};
use cafepos_logging::token_hint;

use crate::error::ApiError;
use crate::server::AppState;

pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedStaff {
    pub staff_id: String,
    pub role: String,
}

impl AuthenticatedStaff {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Staff and settings writes are admin-only.
    pub fn ensure_can_write(&self, resource: Resource) -> Result<(), ApiError> {
        if resource.admin_only() && !self.is_admin() {
            warn!(staff_id = %self.staff_id, %resource, "Non-admin write rejected");
            return Err(ApiError::Forbidden(format!("{resource} changes require the admin role")));
        }
        Ok(())
    }
}

/// Static token table: token → staff identity.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    tokens: HashMap<String, AuthenticatedStaff>,
}

impl Authenticator {
    pub fn from_entries(entries: &[TokenEntry]) -> Self {
        let tokens = entries
            .iter()
            .filter(|e| !e.token.trim().is_empty())
            .map(|e| {
                (
                    e.token.trim().to_string(),
                    AuthenticatedStaff {
                        staff_id: e.staff_id.clone(),
                        role: e.role.clone(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    pub fn authenticate(&self, credential: &Credential) -> Option<AuthenticatedStaff> {
        self.tokens.get(credential.token()).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Find the caller's bearer credential. The first source that yields a
/// non-blank token wins; cookies are tried in `cookie_names` order.
pub fn extract_bearer_credential(headers: &HeaderMap, cookie_names: &[String]) -> Option<Credential> {
    let from_authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.to_string())
        })
        .and_then(Credential::new);
    if from_authorization.is_some() {
        return from_authorization;
    }

    let from_header = headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(Credential::new);
    if from_header.is_some() {
        return from_header;
    }

    let cookies = parse_cookies(headers);
    cookie_names
        .iter()
        .filter_map(|name| cookies.get(name.as_str()))
        .find_map(|raw| token_from_cookie(raw))
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<&str, &str> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, val)) = pair.trim().split_once('=') {
                cookies.entry(name.trim()).or_insert(val.trim());
            }
        }
    }
    cookies
}

/// Cookie values are a plain token, a JSON array whose first element is the
/// token, or a JSON object with `access_token`. Values may be URL-encoded.
fn token_from_cookie(raw: &str) -> Option<Credential> {
    let decoded = urlencoding::decode(raw).map(|s| s.into_owned()).unwrap_or_else(|_| raw.to_string());
    let decoded = decoded.trim().trim_matches('"');
    if decoded.starts_with('[') || decoded.starts_with('{') {
        return match serde_json::from_str::<Value>(decoded).ok()? {
            Value::Array(items) => items.first()?.as_str().and_then(Credential::new),
            Value::Object(map) => map.get("access_token")?.as_str().and_then(Credential::new),
            _ => None,
        };
    }
    Credential::new(decoded)
}

pub struct RequireAuth(pub AuthenticatedStaff);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let Some(credential) = extract_bearer_credential(&parts.headers, &state.cookie_names) else {
            warn!(path = %parts.uri.path(), "Missing credentials");
            return Err(ApiError::Unauthorized("Missing credentials"));
        };

        match state.authenticator.authenticate(&credential) {
            Some(staff) => {
                debug!(staff_id = %staff.staff_id, role = %staff.role, "Authenticated");
                Ok(RequireAuth(staff))
            }
            None => {
                warn!(token = %token_hint(credential.token()), "Invalid bearer token");
                Err(ApiError::Unauthorized("Invalid token"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::{HeaderValue, Request, StatusCode};

    use crate::store::MemoryBackend;

    fn cookie_names() -> Vec<String> {
        vec!["sb-access-token".into(), "access_token".into()]
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    fn token_of(headers: &HeaderMap) -> Option<String> {
        extract_bearer_credential(headers, &cookie_names()).map(|c| c.token().to_string())
    }

    #[test]
    fn authorization_header_wins() {
        let h = headers(&[
            ("authorization", "Bearer from-header"),
            ("x-access-token", "from-custom"),
            ("cookie", "sb-access-token=from-cookie"),
        ]);
        assert_eq!(token_of(&h).as_deref(), Some("from-header"));
    }

    #[test]
    fn non_bearer_authorization_falls_through() {
        let h = headers(&[("authorization", "Basic dXNlcjpwdw=="), ("x-access-token", "custom")]);
        assert_eq!(token_of(&h).as_deref(), Some("custom"));
        let h = headers(&[("authorization", "Bearer   "), ("cookie", "access_token=c")]);
        assert_eq!(token_of(&h).as_deref(), Some("c"));
    }

    #[test]
    fn cookies_follow_configured_order() {
        let h = headers(&[("cookie", "access_token=second; sb-access-token=first")]);
        assert_eq!(token_of(&h).as_deref(), Some("first"));
        let h = headers(&[("cookie", "theme=dark"), ("cookie", "access_token=only")]);
        assert_eq!(token_of(&h).as_deref(), Some("only"));
    }

    #[test]
    fn json_cookie_values_are_unwrapped() {
        let h = headers(&[("cookie", "sb-access-token=%5B%22jwt-a%22%2C%22refresh%22%5D")]);
        assert_eq!(token_of(&h).as_deref(), Some("jwt-a"));
        let h = headers(&[("cookie", r#"sb-access-token={"access_token":"jwt-b"}"#)]);
        assert_eq!(token_of(&h).as_deref(), Some("jwt-b"));
    }

    #[test]
    fn unusable_cookie_tries_next_name() {
        let h = headers(&[("cookie", "sb-access-token=[]; access_token=fallback")]);
        assert_eq!(token_of(&h).as_deref(), Some("fallback"));
    }

    #[test]
    fn nothing_present_is_none() {
        assert!(token_of(&HeaderMap::new()).is_none());
        assert!(token_of(&headers(&[("cookie", "other=x")])).is_none());
    }

    fn entry(token: &str, role: &str) -> TokenEntry {
        TokenEntry {
            token: token.into(),
            staff_id: format!("staff-{role}"),
            role: role.into(),
        }
    }

    #[test]
    fn authenticator_maps_tokens() {
        let auth = Authenticator::from_entries(&[entry("a", "admin"), entry(" ", "cashier")]);
        assert_eq!(auth.len(), 1);
        let staff = auth.authenticate(&Credential::new("a").unwrap()).unwrap();
        assert!(staff.is_admin());
        assert!(auth.authenticate(&Credential::new("b").unwrap()).is_none());
    }

    #[test]
    fn cashier_cannot_write_staff() {
        let cashier = AuthenticatedStaff {
            staff_id: "s1".into(),
            role: "cashier".into(),
        };
        assert!(cashier.ensure_can_write(Resource::Orders).is_ok());
        let err = cashier.ensure_can_write(Resource::Settings).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn extractor_validates_against_state() {
        let state = AppState::new(
            Arc::new(MemoryBackend::new()),
            Authenticator::from_entries(&[entry("good", "cashier")]),
            cookie_names(),
        );

        let (mut parts, _) = Request::builder()
            .uri("/api/orders")
            .header("cookie", "access_token=good")
            .body(())
            .unwrap()
            .into_parts();
        let RequireAuth(staff) = RequireAuth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(staff.staff_id, "staff-cashier");

        let (mut parts, _) = Request::builder()
            .header("authorization", "Bearer bad")
            .body(())
            .unwrap()
            .into_parts();
        let err = RequireAuth::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert!(RequireAuth::from_request_parts(&mut parts, &state).await.is_err());
    }
}
