//! Auth Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use platform::clock::SystemClock;

use crate::application::config::AuthConfig;
use crate::infra::postgres::PgAuthRepository;
use crate::presentation::handlers::{self, AuthAppState, AuthStore};
use crate::presentation::middleware::{require_admin, require_csrf, require_session};

/// Create the Auth router with PostgreSQL repository
pub fn auth_router(repo: PgAuthRepository, config: AuthConfig) -> Router {
    auth_router_generic(AuthAppState::new(repo, config, Arc::new(SystemClock)))
}

/// Create a generic Auth router for any repository implementation
///
/// Every non-GET route is behind the CSRF check; `/me` and `/totp/*`
/// additionally need a session.
pub fn auth_router_generic<R>(state: AuthAppState<R>) -> Router
where
    R: AuthStore,
{
    let protected = Router::new()
        .route("/me", get(handlers::me::<R>))
        .route("/totp/start", post(handlers::totp_start::<R>))
        .route("/totp/confirm", post(handlers::totp_confirm::<R>))
        .route("/totp/disable", post(handlers::totp_disable::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session::<R>,
        ));

    Router::new()
        .route("/csrf", get(handlers::csrf_token::<R>))
        .route("/signin", post(handlers::sign_in::<R>))
        .route("/mfa", post(handlers::mfa::<R>))
        .route("/signout", post(handlers::sign_out::<R>))
        .merge(protected)
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_csrf,
        ))
        .with_state(state)
}

/// Create the user administration router with PostgreSQL repository
pub fn admin_router(repo: PgAuthRepository, config: AuthConfig) -> Router {
    admin_router_generic(AuthAppState::new(repo, config, Arc::new(SystemClock)))
}

/// Create a generic user administration router
///
/// Every route needs a session of an active admin, and the CSRF check.
pub fn admin_router_generic<R>(state: AuthAppState<R>) -> Router
where
    R: AuthStore,
{
    // route_layer order: the last one added runs first
    Router::new()
        .route("/users", post(handlers::create_user::<R>))
        .route("/users/{id}/password", post(handlers::set_user_password::<R>))
        .route("/users/{id}/admin", post(handlers::set_user_admin::<R>))
        .route("/users/{id}/active", post(handlers::set_user_active::<R>))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session::<R>,
        ))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_csrf,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::CreateUserInput;
    use crate::domain::entity::user::User;
    use crate::domain::repository::UserRepository;
    use crate::domain::value_object::email::Email;
    use crate::infra::memory::InMemoryAuthRepository;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use platform::clock::ManualClock;
    use tower::ServiceExt;

    const CSRF: &str = "test-csrf-token";

    async fn setup() -> (Router, InMemoryAuthRepository) {
        let repo = InMemoryAuthRepository::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let state = AuthAppState::new(repo.clone(), AuthConfig::development(), clock);

        create(&state, "parent@example.com", false).await;
        create(&state, "admin@example.com", true).await;

        let app = Router::new()
            .nest("/api/auth", auth_router_generic(state.clone()))
            .nest("/api/admin", admin_router_generic(state));
        (app, repo)
    }

    async fn create(state: &AuthAppState<InMemoryAuthRepository>, email: &str, is_admin: bool) -> User {
        state
            .user_admin()
            .create_user(
                CreateUserInput {
                    email: email.to_string(),
                    display_name: "Parent".to_string(),
                    password: "correct horse battery".to_string(),
                    is_admin,
                },
                None,
            )
            .await
            .unwrap()
    }

    async fn user_id(repo: &InMemoryAuthRepository, email: &str) -> String {
        repo.find_user_by_email(&Email::new(email).unwrap())
            .await
            .unwrap()
            .unwrap()
            .user_id
            .to_string()
    }

    fn post_json(uri: &str, body: serde_json::Value, cookies: &str, csrf: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookies);
        if let Some(csrf) = csrf {
            builder = builder.header("x-csrf-token", csrf);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn cookie_value(response: &axum::response::Response, name: &str) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, value)| *key == name && !value.is_empty())
            .map(|(_, value)| value.to_string())
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn sign_in(app: &Router) -> String {
        sign_in_as(app, "Parent@Example.com").await
    }

    async fn sign_in_as(app: &Router, email: &str) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/signin",
                serde_json::json!({ "email": email, "password": "correct horse battery" }),
                &format!("fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        cookie_value(&response, "fh_session").expect("session cookie")
    }

    #[tokio::test]
    async fn test_csrf_endpoint_sets_cookie() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(Request::get("/api/auth/csrf").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = cookie_value(&response, "fh_csrf").expect("csrf cookie");
        let body = json_body(response).await;
        assert_eq!(body["csrfToken"], cookie);
    }

    #[tokio::test]
    async fn test_csrf_endpoint_reuses_existing_cookie() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(
                Request::get("/api/auth/csrf")
                    .header(header::COOKIE, "fh_csrf=already-there")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(json_body(response).await["csrfToken"], "already-there");
    }

    #[tokio::test]
    async fn test_signin_without_csrf_is_rejected() {
        let (app, repo) = setup().await;

        let response = app
            .oneshot(post_json(
                "/api/auth/signin",
                serde_json::json!({ "email": "parent@example.com", "password": "correct horse battery" }),
                "",
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(repo.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_signin_with_mismatched_csrf_is_rejected() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(post_json(
                "/api/auth/signin",
                serde_json::json!({ "email": "parent@example.com", "password": "correct horse battery" }),
                "fh_csrf=one",
                Some("two"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signin_wrong_password_is_unauthorized() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(post_json(
                "/api/auth/signin",
                serde_json::json!({ "email": "parent@example.com", "password": "wrong password" }),
                &format!("fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(cookie_value(&response, "fh_session").is_none());
    }

    #[tokio::test]
    async fn test_signin_then_me() {
        let (app, repo) = setup().await;
        let token = sign_in(&app).await;

        assert_eq!(repo.sessions().len(), 1);

        let response = app
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::COOKIE, format!("fh_session={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["email"], "parent@example.com");
        assert_eq!(body["displayName"], "Parent");
        assert_eq!(body["totpEnabled"], false);
    }

    #[tokio::test]
    async fn test_me_without_session_is_unauthorized() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_with_unknown_token_is_unauthorized() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::COOKIE, "fh_session=never-issued")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signout_revokes_session() {
        let (app, repo) = setup().await;
        let token = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/signout",
                serde_json::json!({}),
                &format!("fh_session={token}; fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(repo.sessions().is_empty());

        let response = app
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::COOKIE, format!("fh_session={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signout_without_session_still_succeeds() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(post_json(
                "/api/auth/signout",
                serde_json::json!({}),
                &format!("fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_totp_start_requires_session() {
        let (app, repo) = setup().await;

        let response = app
            .oneshot(post_json(
                "/api/auth/totp/start",
                serde_json::json!({}),
                &format!("fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(repo.challenges().is_empty());
    }

    #[tokio::test]
    async fn test_totp_start_returns_enrollment() {
        let (app, repo) = setup().await;
        let token = sign_in(&app).await;

        let response = app
            .oneshot(post_json(
                "/api/auth/totp/start",
                serde_json::json!({}),
                &format!("fh_session={token}; fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["otpauthUrl"].as_str().unwrap().starts_with("otpauth://totp/"));
        assert!(body["qrCode"].as_str().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(repo.challenges().len(), 1);
    }

    #[tokio::test]
    async fn test_totp_confirm_with_wrong_code_is_unauthorized() {
        let (app, _) = setup().await;
        let token = sign_in(&app).await;
        let cookies = format!("fh_session={token}; fh_csrf={CSRF}");

        let response = app
            .clone()
            .oneshot(post_json("/api/auth/totp/start", serde_json::json!({}), &cookies, Some(CSRF)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                "/api/auth/totp/confirm",
                serde_json::json!({ "code": "not-a-code" }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mfa_without_pending_cookie_is_unauthorized() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(post_json(
                "/api/auth/mfa",
                serde_json::json!({ "code": "123456" }),
                &format!("fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    #[tokio::test]
    async fn test_admin_routes_require_session() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(post_json(
                "/api/admin/users",
                serde_json::json!({ "email": "kid@example.com", "displayName": "Kid", "password": "a long enough pass" }),
                &format!("fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_forbid_non_admin() {
        let (app, repo) = setup().await;
        let token = sign_in(&app).await;
        let cookies = format!("fh_session={token}; fh_csrf={CSRF}");
        let admin_id = user_id(&repo, "admin@example.com").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/admin/users",
                serde_json::json!({ "email": "kid@example.com", "displayName": "Kid", "password": "a long enough pass" }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(post_json(
                &format!("/api/admin/users/{admin_id}/admin"),
                serde_json::json!({ "isAdmin": false }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = repo
            .find_user_by_email(&Email::new("admin@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_admin);
        assert!(repo
            .find_user_by_email(&Email::new("kid@example.com").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_admin_creates_user_who_can_sign_in() {
        let (app, _) = setup().await;
        let token = sign_in_as(&app, "admin@example.com").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/admin/users",
                serde_json::json!({ "email": "Kid@Example.com", "displayName": "Kid", "password": "correct horse battery" }),
                &format!("fh_session={token}; fh_csrf={CSRF}"),
                Some(CSRF),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["email"], "kid@example.com");
        assert_eq!(body["isAdmin"], false);

        sign_in_as(&app, "kid@example.com").await;
    }

    #[tokio::test]
    async fn test_admin_changes_role_password_and_status() {
        let (app, repo) = setup().await;
        let token = sign_in_as(&app, "admin@example.com").await;
        let cookies = format!("fh_session={token}; fh_csrf={CSRF}");
        let parent_id = user_id(&repo, "parent@example.com").await;
        let parent_token = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/admin/users/{parent_id}/admin"),
                serde_json::json!({ "isAdmin": true }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["isAdmin"], true);

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/admin/users/{parent_id}/password"),
                serde_json::json!({ "password": "a brand new passphrase" }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/admin/users/{parent_id}/active"),
                serde_json::json!({ "isActive": false }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["isActive"], false);

        let response = app
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::COOKIE, format!("fh_session={parent_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_self_or_target_bad_id() {
        let (app, repo) = setup().await;
        let token = sign_in_as(&app, "admin@example.com").await;
        let cookies = format!("fh_session={token}; fh_csrf={CSRF}");
        let admin_id = user_id(&repo, "admin@example.com").await;

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/admin/users/{admin_id}/active"),
                serde_json::json!({ "isActive": false }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/api/admin/users/not-a-uuid/password",
                serde_json::json!({ "password": "a brand new passphrase" }),
                &cookies,
                Some(CSRF),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(repo.sessions().len(), 1);
    }
}
