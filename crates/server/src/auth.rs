//! API-key guard
//!
//! Routes fall into three tiers. Public paths (health, readiness, metrics)
//! never need a key. Admin paths (config reload, Sheets diagnostics, which
//! reveal the service account) always need one, so they are closed when no
//! key is configured. Everything else needs the key only while
//! `server.auth.enabled` is set.
//!
//! The key is sent as `Authorization: Bearer <key>` or `X-API-Key: <key>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use helpdesk_config::{AuthConfig, Settings};
use parking_lot::RwLock;

use crate::ServerError;

const API_KEY_HEADER: &str = "x-api-key";

static OPEN_API_WARNED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteTier {
    Public,
    Api,
    Admin,
}

/// What a request has to present before reaching its handler
#[derive(Debug, PartialEq, Eq)]
enum Requirement {
    Nothing,
    Key(String),
    /// A key is required but none is configured
    Unavailable,
}

/// Admin prefixes win over public ones
fn route_tier(auth: &AuthConfig, path: &str) -> RouteTier {
    let matches = |prefixes: &[String]| prefixes.iter().any(|p| path.starts_with(p.as_str()));
    if matches(&auth.admin_paths) {
        RouteTier::Admin
    } else if matches(&auth.public_paths) {
        RouteTier::Public
    } else {
        RouteTier::Api
    }
}

fn requirement(auth: &AuthConfig, path: &str) -> Requirement {
    let configured_key = auth.api_key.as_deref().filter(|k| !k.is_empty());

    match (route_tier(auth, path), configured_key) {
        (RouteTier::Public, _) => Requirement::Nothing,
        (RouteTier::Api, _) if !auth.enabled => {
            if !OPEN_API_WARNED.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    "API authentication is disabled; set HELPDESK__SERVER__AUTH__ENABLED=true outside development"
                );
            }
            Requirement::Nothing
        }
        (_, Some(key)) => Requirement::Key(key.to_string()),
        (_, None) => Requirement::Unavailable,
    }
}

/// Key sent with the request, if any
fn presented_key(headers: &HeaderMap) -> Result<Option<&str>, ServerError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| ServerError::Auth("Malformed Authorization header".to_string()))?;
        return value
            .strip_prefix("Bearer ")
            .map(|key| Some(key.trim()))
            .ok_or_else(|| {
                ServerError::Auth("Expected Authorization: Bearer <api key>".to_string())
            });
    }

    Ok(headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim))
}

/// Compare without short-circuiting on the first differing byte
fn keys_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

fn check_key(headers: &HeaderMap, expected: &str) -> Result<(), ServerError> {
    match presented_key(headers)? {
        Some(key) if keys_match(key, expected) => Ok(()),
        Some(_) => Err(ServerError::Auth("Invalid API key".to_string())),
        None => Err(ServerError::Auth("Missing API key".to_string())),
    }
}

/// Axum middleware enforcing the route tiers
///
/// Reads settings from the `Arc<RwLock<Settings>>` extension so a config
/// reload takes effect on the next request.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let requirement = match request.extensions().get::<Arc<RwLock<Settings>>>() {
        Some(config) => requirement(&config.read().server.auth, &path),
        None => {
            tracing::error!("Settings extension missing from request");
            return ServerError::Internal("Server configuration error".to_string()).into_response();
        }
    };

    match requirement {
        Requirement::Nothing => next.run(request).await,
        Requirement::Unavailable => {
            tracing::warn!(path = %path, "Protected route requested but no API key is configured");
            ServerError::Forbidden("This endpoint requires server.auth.api_key to be configured".to_string())
                .into_response()
        }
        Requirement::Key(expected) => match check_key(request.headers(), &expected) {
            Ok(()) => next.run(request).await,
            Err(e) => {
                tracing::warn!(
                    path = %path,
                    forwarded_for = ?request.headers().get("X-Forwarded-For"),
                    reason = %e,
                    "Rejected request"
                );
                e.into_response()
            }
        },
    }
}
