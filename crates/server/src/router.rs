//! Route table and middleware stack
//!
//! Four functional areas expose the same generic resource surface; the
//! family segment is a path parameter resolved against the static catalog,
//! so one handler set serves all eighteen families. Platform routes sit
//! behind a super-admin gate, AI routes behind tenant binding.

use crate::handlers::{ai, auth, health, platform, resources, settings};
use crate::middleware::{authenticate, rate_limit, require_super_admin};
use crate::AppState;
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Extension, Router,
};
use tenon_common::rbac::Area;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // No token required
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register));

    // Everything else requires a valid session
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/change-password", post(auth::change_password))
        .nest("/api/regops", area_router(Area::Regops))
        .nest("/api/privacyops", area_router(Area::Privacyops))
        .nest("/api/riskops", area_router(Area::Riskops))
        .nest("/api/auditops", area_router(Area::Auditops))
        .nest("/api/ai", ai_router())
        .nest("/api/platform", platform_router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            authenticate,
        ));

    let mut app = Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum_middleware::from_fn(crate::middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id());

    if state.config.rate_limit.enabled {
        let limiter = rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        let limit = state.config.rate_limit.requests_per_second;
        app = app.layer(axum_middleware::from_fn(
            move |request: axum::extract::Request, next: axum_middleware::Next| {
                let limiter = limiter.clone();
                async move { rate_limit::rate_limit(request, next, limiter, limit).await }
            },
        ));
    }

    app.with_state(state)
}

/// Uniform resource surface for one functional area.
///
/// Static segments (`stats`, `deleted`, `restore`, `permanent`) take
/// precedence over the parameter routes that share their shape.
fn area_router(area: Area) -> Router<AppState> {
    Router::new()
        .route(
            "/{family}",
            get(resources::list_records).post(resources::create_record),
        )
        .route("/{family}/stats", get(resources::record_stats))
        .route("/{family}/deleted", get(resources::list_deleted_records))
        .route(
            "/{family}/{id}",
            get(resources::get_record)
                .put(resources::update_record)
                .delete(resources::delete_record),
        )
        .route("/{family}/{id}/restore", post(resources::restore_record))
        .route("/{family}/{id}/permanent", delete(resources::purge_record))
        .route("/{family}/{id}/{action}", post(resources::run_action))
        .layer(Extension(area))
}

fn ai_router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(ai::chat))
        .route("/search", post(ai::search))
        .route(
            "/documents",
            get(ai::list_documents).post(ai::generate_document),
        )
        .route("/documents/{id}", get(ai::get_document))
        .route("/documents/{id}/analyze", post(ai::analyze_document))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
}

fn platform_router() -> Router<AppState> {
    Router::new()
        .route("/tenants", get(platform::list_tenants))
        .route("/tenants/deleted", get(platform::list_deleted_tenants))
        .route(
            "/tenants/{id}",
            get(platform::get_tenant).delete(platform::soft_delete_tenant),
        )
        .route("/tenants/{id}/activate", post(platform::activate_tenant))
        .route("/tenants/{id}/suspend", post(platform::suspend_tenant))
        .route(
            "/tenants/{id}/reactivate",
            post(platform::reactivate_tenant),
        )
        .route("/tenants/{id}/restore", post(platform::restore_tenant))
        .route("/tenants/{id}/permanent", delete(platform::purge_tenant))
        .route("/users", get(platform::list_users))
        .route("/users/{id}/role", put(platform::set_user_role))
        .route("/users/{id}/status", put(platform::set_user_status))
        .route("/analytics", get(platform::analytics))
        .route("/billing", get(platform::list_billing))
        .route("/billing/{tenant_id}", put(platform::update_billing))
        .route("/logs", get(platform::list_logs))
        .route_layer(axum_middleware::from_fn(require_super_admin))
}

// Wire-level tests against the assembled router. The database is a SeaORM
// mock seeded with the exact result sets each flow consumes, so these run
// without PostgreSQL.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use sea_orm::{DatabaseConnection, DbBackend, MockDatabase, MockExecResult};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tenon_common::auth::{hash_password, SessionClaims, TokenService};
    use tenon_common::config::AppConfig;
    use tenon_common::db::models::{AuditEntry, Subscription, Tenant, User};
    use tenon_common::db::{provisioner, DbPool, Repository};
    use tenon_common::rbac::Role;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "wire-test-secret";

    fn test_config() -> AppConfig {
        serde_json::from_value(json!({
            "server": {},
            "database": {},
            "auth": { "jwt_secret": SECRET },
            "rate_limit": { "enabled": false },
        }))
        .unwrap()
    }

    fn test_state(conn: DatabaseConnection) -> AppState {
        let pool = DbPool::from_connection(conn);
        AppState {
            config: Arc::new(test_config()),
            db: pool.clone(),
            repo: Repository::new(pool),
            cache: None,
            tokens: Arc::new(TokenService::new(SECRET, "tenon", 3600)),
            secrets: None,
            ai: None,
        }
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DbBackend::Postgres).into_connection()
    }

    fn user_row(
        id: Uuid,
        tenant_id: Option<Uuid>,
        email: &str,
        password_hash: &str,
        role: &str,
        status: &str,
        is_super_admin: bool,
    ) -> User {
        User {
            id,
            tenant_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: role.to_string(),
            status: status.to_string(),
            is_super_admin,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            deleted_at: None,
        }
    }

    fn tenant_row(id: Uuid, status: &str) -> Tenant {
        Tenant {
            id,
            name: "Acme Corp".to_string(),
            domain: "acme-corp".to_string(),
            status: status.to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            deleted_at: None,
        }
    }

    fn subscription_row(tenant_id: Uuid, status: &str) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            tenant_id,
            plan: "standard".to_string(),
            status: status.to_string(),
            billing_cycle: "monthly".to_string(),
            price_cents: 0,
            currency: "USD".to_string(),
            start_date: Utc::now().into(),
            end_date: Some((Utc::now() + chrono::Duration::days(30)).into()),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn audit_row() -> AuditEntry {
        AuditEntry {
            id: 1,
            tenant_id: None,
            actor_id: None,
            action: "test".to_string(),
            target: "test".to_string(),
            detail: json!({}),
            created_at: Utc::now().into(),
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn login_succeeds_for_active_account() {
        let tenant_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let hash = hash_password("correct horse").await.unwrap();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![user_row(
                user_id,
                Some(tenant_id),
                "admin@acme.test",
                &hash,
                "tenant_admin",
                "active",
                false,
            )]])
            .append_query_results([vec![tenant_row(tenant_id, "active")]])
            .append_query_results([vec![subscription_row(tenant_id, "active")]])
            .append_query_results([vec![audit_row()]])
            .append_exec_results([exec_ok()])
            .into_connection();

        let app = create_router(test_state(db));
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "admin@acme.test", "password": "correct horse"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["email"], "admin@acme.test");
        assert_eq!(body["user"]["role"], "tenant_admin");
        assert_eq!(body["user"]["tenantId"], tenant_id.to_string());
    }

    #[tokio::test]
    async fn login_rejects_unknown_email() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<User>::new()])
            .into_connection();

        let app = create_router(test_state(db));
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "nobody@acme.test", "password": "whatever1"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let tenant_id = Uuid::new_v4();
        let hash = hash_password("correct horse").await.unwrap();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![user_row(
                Uuid::new_v4(),
                Some(tenant_id),
                "admin@acme.test",
                &hash,
                "tenant_admin",
                "active",
                false,
            )]])
            .append_query_results([vec![audit_row()]])
            .into_connection();

        let app = create_router(test_state(db));
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "admin@acme.test", "password": "totally wrong"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn login_reports_disabled_account() {
        let tenant_id = Uuid::new_v4();
        let hash = hash_password("correct horse").await.unwrap();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![user_row(
                Uuid::new_v4(),
                Some(tenant_id),
                "admin@acme.test",
                &hash,
                "tenant_admin",
                "suspended",
                false,
            )]])
            .append_query_results([vec![tenant_row(tenant_id, "active")]])
            .append_query_results([vec![subscription_row(tenant_id, "active")]])
            .append_query_results([vec![audit_row()]])
            .into_connection();

        let app = create_router(test_state(db));
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "admin@acme.test", "password": "correct horse"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Account is disabled");
    }

    #[tokio::test]
    async fn login_reports_pending_tenant() {
        let tenant_id = Uuid::new_v4();
        let hash = hash_password("correct horse").await.unwrap();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![user_row(
                Uuid::new_v4(),
                Some(tenant_id),
                "admin@acme.test",
                &hash,
                "tenant_admin",
                "active",
                false,
            )]])
            .append_query_results([vec![tenant_row(tenant_id, "pending")]])
            .append_query_results([vec![subscription_row(tenant_id, "pending")]])
            .append_query_results([vec![audit_row()]])
            .into_connection();

        let app = create_router(test_state(db));
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "admin@acme.test", "password": "correct horse"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Tenant account is pending activation");
    }

    #[tokio::test]
    async fn login_reports_expired_subscription() {
        let tenant_id = Uuid::new_v4();
        let hash = hash_password("correct horse").await.unwrap();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![user_row(
                Uuid::new_v4(),
                Some(tenant_id),
                "admin@acme.test",
                &hash,
                "tenant_admin",
                "active",
                false,
            )]])
            .append_query_results([vec![tenant_row(tenant_id, "active")]])
            .append_query_results([vec![subscription_row(tenant_id, "expired")]])
            .append_query_results([vec![audit_row()]])
            .into_connection();

        let app = create_router(test_state(db));
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "admin@acme.test", "password": "correct horse"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Subscription expired");
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = create_router(test_state(empty_db()));
        let response = app
            .oneshot(request("GET", "/api/auth/me", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Authentication required");
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            tenant_id: None,
            email: "root@tenon.test".to_string(),
            role: Role::SuperAdmin,
            is_super_admin: true,
            iss: "tenon".to_string(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let app = create_router(test_state(empty_db()));
        let response = app
            .oneshot(request("GET", "/api/auth/me", Some(&token), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Token expired");
    }

    #[tokio::test]
    async fn create_without_permission_names_the_gap() {
        let state = test_state(empty_db());
        let token = state
            .tokens
            .issue(
                Uuid::new_v4(),
                Some(Uuid::new_v4()),
                "auditor@acme.test",
                Role::Auditor,
                false,
            )
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(request(
                "POST",
                "/api/regops/policies",
                Some(&token),
                Some(json!({"title": "Password Policy"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Insufficient permissions");
        assert_eq!(body["required"], "regops.create");
        assert_eq!(body["role"], "auditor");
    }

    #[tokio::test]
    async fn platform_routes_are_super_admin_only() {
        let state = test_state(empty_db());
        let token = state
            .tokens
            .issue(
                Uuid::new_v4(),
                Some(Uuid::new_v4()),
                "admin@acme.test",
                Role::TenantAdmin,
                false,
            )
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(request("GET", "/api/platform/tenants", Some(&token), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Super admin access required");
    }

    #[tokio::test]
    async fn super_admin_lists_tenants() {
        let tenant_id = Uuid::new_v4();
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![tenant_row(tenant_id, "active")]])
            .into_connection();

        let state = test_state(db);
        let token = state
            .tokens
            .issue(Uuid::new_v4(), None, "root@tenon.test", Role::SuperAdmin, true)
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(request("GET", "/api/platform/tenants", Some(&token), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], tenant_id.to_string());
        assert_eq!(body[0]["name"], "Acme Corp");
    }

    #[tokio::test]
    async fn tenant_header_mismatch_is_forbidden() {
        let state = test_state(empty_db());
        let token = state
            .tokens
            .issue(
                Uuid::new_v4(),
                Some(Uuid::new_v4()),
                "admin@acme.test",
                Role::TenantAdmin,
                false,
            )
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header("X-Tenant-ID", Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Tenant mismatch");
    }

    #[tokio::test]
    async fn register_creates_pending_tenant() {
        let tenant_id = Uuid::new_v4();
        // One exec per provisioning DDL statement; the count does not
        // depend on the tenant id.
        let ddl_execs: Vec<MockExecResult> = provisioner::provisioning_statements(Uuid::nil())
            .iter()
            .map(|_| exec_ok())
            .collect();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<User>::new()])
            .append_query_results([Vec::<Tenant>::new(), Vec::<Tenant>::new()])
            .append_query_results([vec![tenant_row(tenant_id, "pending")]])
            .append_query_results([vec![subscription_row(tenant_id, "pending")]])
            .append_query_results([vec![user_row(
                Uuid::new_v4(),
                Some(tenant_id),
                "admin@acme.test",
                "$2b$12$placeholder",
                "tenant_admin",
                "active",
                false,
            )]])
            .append_query_results([vec![audit_row()]])
            .append_exec_results(ddl_execs)
            .into_connection();

        let app = create_router(test_state(db));
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "companyName": "Acme Corp",
                    "adminEmail": "admin@acme.test",
                    "password": "a strong password",
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["pending"], true);
        assert_eq!(body["tenantId"], tenant_id.to_string());
    }

    #[tokio::test]
    async fn unknown_family_is_not_found() {
        let state = test_state(empty_db());
        let token = state
            .tokens
            .issue(
                Uuid::new_v4(),
                Some(Uuid::new_v4()),
                "admin@acme.test",
                Role::TenantAdmin,
                false,
            )
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(request("GET", "/api/regops/unicorns", Some(&token), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
