//! API route handlers for the account-linking service.
//!
//! All handlers receive `SharedState` via Axum state extraction. Every
//! endpoint except `/status` requires a session bearer token.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::auth::UserSession;
use crate::error::LinkError;
use crate::linking::{
    begin_authorization, link_account, AuthorizationGrant, AuthorizeRequest, ExchangeRequest,
    ExchangeResponse,
};
use crate::SharedState;

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── Linking ──────────────────────────────────────────────────────
        .route("/platforms", get(platforms))
        .route("/oauth/authorize", post(oauth_authorize))
        .route("/oauth/exchange", post(oauth_exchange))
        // ── Accounts ─────────────────────────────────────────────────────
        .route("/accounts", get(accounts_list))
        .route("/accounts/{id}/disconnect", post(account_disconnect))
        .with_state(state)
}

fn require_session(state: &SharedState, headers: &HeaderMap) -> Result<UserSession, LinkError> {
    state.sessions.verify_headers(headers)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "social-link",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Linking
// =============================================================================

/// GET /v1/platforms - Platforms with app credentials configured.
async fn platforms(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, LinkError> {
    require_session(&state, &headers)?;

    let data: Vec<_> = state
        .registry
        .list()
        .into_iter()
        .filter_map(|p| state.registry.get(p))
        .map(|p| {
            json!({
                "platform": p.platform(),
                "name": p.display_name(),
                "scopes": p.default_scopes(),
            })
        })
        .collect();

    Ok(Json(json!({ "data": data })))
}

/// POST /v1/oauth/authorize - Mint a provider authorization URL and state.
async fn oauth_authorize(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Result<Json<AuthorizationGrant>, LinkError> {
    let session = require_session(&state, &headers)?;
    let Json(body) = body?;
    let grant = begin_authorization(&state, &session, &body)?;
    Ok(Json(grant))
}

/// POST /v1/oauth/exchange - Finish a link: code for tokens, profile, upsert.
async fn oauth_exchange(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, LinkError> {
    let session = require_session(&state, &headers)?;
    let Json(body) = body?;
    let result = link_account(&state, &session, &body).await?;

    Ok(Json(ExchangeResponse {
        success: true,
        user: result.profile,
    }))
}

// =============================================================================
// Accounts
// =============================================================================

/// GET /v1/accounts - The caller's linked accounts, without credentials.
async fn accounts_list(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, LinkError> {
    let session = require_session(&state, &headers)?;
    let accounts = state.store.list_accounts(&session.user_id).await?;
    Ok(Json(json!({ "data": accounts })))
}

/// POST /v1/accounts/{id}/disconnect - Soft disconnect one of the caller's accounts.
async fn account_disconnect(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, LinkError> {
    let session = require_session(&state, &headers)?;
    state.store.disconnect_account(&session.user_id, &id).await?;

    tracing::info!(user_id = %session.user_id, account_id = %id, "Disconnected account");
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::store::{AccountStore, MemoryAccountStore};
    use crate::test_support::{self, session_token};

    fn app(base: &str, store: MemoryAccountStore) -> Router {
        crate::api::router(Arc::new(test_support::app_state(base, store)))
    }

    fn post_json(uri: &str, user_id: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(user_id) = user_id {
            builder = builder.header("authorization", format!("Bearer {}", session_token(user_id)));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_as(uri: &str, user_id: &str) -> Request<Body> {
        Request::get(uri)
            .header("authorization", format!("Bearer {}", session_token(user_id)))
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_is_public() {
        let resp = app("http://provider.test", MemoryAccountStore::new())
            .oneshot(Request::get("/v1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn authorize_requires_session() {
        let resp = app("http://provider.test", MemoryAccountStore::new())
            .oneshot(post_json(
                "/v1/oauth/authorize",
                None,
                json!({ "platform": "twitter", "user_id": "user-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["code"], "unauthorized");
    }

    #[tokio::test]
    async fn authorize_returns_grant() {
        let resp = app("http://provider.test", MemoryAccountStore::new())
            .oneshot(post_json(
                "/v1/oauth/authorize",
                Some("user-1"),
                json!({ "platform": "linkedin", "user_id": "user-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["platform"], "linkedin");
        assert!(body["state"].as_str().is_some_and(|s| !s.is_empty()));
        assert!(body["auth_url"]
            .as_str()
            .unwrap()
            .starts_with("http://provider.test/linkedin/authorize?"));
    }

    #[tokio::test]
    async fn authorize_for_another_user_is_forbidden() {
        let resp = app("http://provider.test", MemoryAccountStore::new())
            .oneshot(post_json(
                "/v1/oauth/authorize",
                Some("user-1"),
                json!({ "platform": "twitter", "user_id": "user-2" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn exchange_with_missing_fields_is_bad_request() {
        let resp = app("http://provider.test", MemoryAccountStore::new())
            .oneshot(post_json(
                "/v1/oauth/exchange",
                Some("user-1"),
                json!({ "platform": "twitter", "user_id": "user-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = json_body(resp).await;
        assert_eq!(body["code"], "bad_request");
        assert!(body["error"].as_str().unwrap().contains("code, state"));
    }

    #[tokio::test]
    async fn malformed_bodies_get_json_errors() {
        let app = app("http://provider.test", MemoryAccountStore::new());

        let resp = app
            .clone()
            .oneshot(post_json("/v1/oauth/exchange", Some("user-1"), json!({ "code": 5 })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["code"], "bad_request");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

        let resp = app
            .oneshot(
                Request::post("/v1/oauth/authorize")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {}", session_token("user-1")))
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["code"], "bad_request");
    }

    #[tokio::test]
    async fn exchange_provider_failure_is_bad_gateway_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/linkedin/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
            )
            .mount(&server)
            .await;

        let store = MemoryAccountStore::new();
        let app = app(&server.uri(), store.clone());

        let grant = json_body(
            app.clone()
                .oneshot(post_json(
                    "/v1/oauth/authorize",
                    Some("user-1"),
                    json!({ "platform": "linkedin", "user_id": "user-1" }),
                ))
                .await
                .unwrap(),
        )
        .await;

        let resp = app
            .oneshot(post_json(
                "/v1/oauth/exchange",
                Some("user-1"),
                json!({
                    "code": "C1",
                    "state": grant["state"],
                    "platform": "linkedin",
                    "user_id": "user-1",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(resp).await;
        assert_eq!(body["code"], "token_exchange_error");
        assert!(body["error"].as_str().unwrap().contains("invalid_grant"));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn accounts_are_listed_without_tokens_and_disconnect_is_owner_only() {
        let store = MemoryAccountStore::new();
        let outcome = store
            .upsert_account(
                &crate::auth::ServiceIdentity::backend(),
                &crate::store::AccountUpsert {
                    user_id: "user-1".into(),
                    platform: crate::platforms::Platform::Facebook,
                    provider_user_id: "fb-1".into(),
                    access_token: "ciphertext-access".into(),
                    refresh_token: None,
                    token_expires_at: None,
                    account_name: "Page".into(),
                    account_username: "Page".into(),
                    followers_count: None,
                    profile_image_url: None,
                },
            )
            .await
            .unwrap();
        let app = app("http://provider.test", store.clone());

        let resp = app.clone().oneshot(get_as("/v1/accounts", "user-1")).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert!(!body.to_string().contains("ciphertext-access"));

        let uri = format!("/v1/accounts/{}/disconnect", outcome.account_id);
        let resp = app
            .clone()
            .oneshot(post_json(&uri, Some("user-2"), json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .clone()
            .oneshot(post_json("/v1/accounts/not-a-uuid/disconnect", Some("user-1"), json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["code"], "not_found");

        let resp = app.clone().oneshot(post_json(&uri, Some("user-1"), json!({}))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!store.accounts_for("user-1").await[0].is_connected);
    }

    #[tokio::test]
    async fn platforms_lists_onboarded() {
        let resp = app("http://provider.test", MemoryAccountStore::new())
            .oneshot(get_as("/v1/platforms", "user-1"))
            .await
            .unwrap();
        let body = json_body(resp).await;
        let names: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["platform"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["twitter", "facebook", "instagram", "linkedin"]);
    }
}
