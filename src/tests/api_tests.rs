#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt; // for .collect()
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AuditPolicy;
    use crate::routes;
    use crate::state::AppState;
    use crate::tests::{setup_test_db, test_config, TestDb};

    const ADMIN_TOKEN: &str = "admin-secret";

    async fn setup_test_app(policy: AuditPolicy, admin_token: Option<&str>) -> (Router, TestDb) {
        let db = setup_test_db().await;
        let mut config = test_config(&db.url, policy);
        config.security.admin_token = admin_token.map(str::to_string);
        let state = AppState::new(db.pool.clone(), config);
        (routes::router(state), db)
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", "7")
            .header("x-session-id", "42");
        match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_allocate_folio() {
        let (app, _db) = setup_test_app(AuditPolicy::Strict, None).await;

        let response = app
            .clone()
            .oneshot(request("POST", "/folios/inv", Some(json!({"year": 2025}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["folio"], "INV-2025-00000001");

        // body is optional
        let response = app.oneshot(request("POST", "/folios/inv", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(json_body(response).await["folio"].as_str().unwrap().starts_with("INV-"));
    }

    #[tokio::test]
    async fn test_allocate_requires_actor() {
        let (app, db) = setup_test_app(AuditPolicy::Strict, None).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/folios/INV")
                    .header("x-user-id", "7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/folios/INV")
                    .header("x-user-id", "abc")
                    .header("x-session-id", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folio_counters")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_batch_and_read_endpoints() {
        let (app, _db) = setup_test_app(AuditPolicy::Strict, None).await;

        let response = app
            .clone()
            .oneshot(request("GET", "/folios/INV/last?year=2025", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["folio"], Value::Null);
        assert_eq!(body["subsystem"], "INV");

        let response = app
            .clone()
            .oneshot(request("POST", "/folios/INV/batch", Some(json!({"count": 3, "year": 2025}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["count"], 3);
        assert_eq!(body["folios"][2], "INV-2025-00000003");

        let response = app
            .clone()
            .oneshot(request("GET", "/folios/INV/next?year=2025", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["folio"], "INV-2025-00000004");

        let response = app
            .clone()
            .oneshot(request("GET", "/folios/inv/last?year=2025", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["folio"], "INV-2025-00000003");

        let response = app
            .oneshot(request("GET", "/folios/INV/exists?year=2024", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["exists"], false);
    }

    #[tokio::test]
    async fn test_invalid_batch_count() {
        let (app, _db) = setup_test_app(AuditPolicy::Strict, None).await;

        for count in [0, -1, 1001] {
            let response = app
                .clone()
                .oneshot(request("POST", "/folios/INV/batch", Some(json!({"count": count}))))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json_body(response).await;
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
            assert_eq!(body["error"]["details"]["field"], "count");
        }
    }

    #[tokio::test]
    async fn test_admin_reset_is_gated() {
        let (app, _db) = setup_test_app(AuditPolicy::Strict, Some(ADMIN_TOKEN)).await;
        app.clone()
            .oneshot(request("POST", "/folios/INV/batch", Some(json!({"count": 5, "year": 2024}))))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request("POST", "/admin/folios/INV/2024/reset", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let mut req = request("POST", "/admin/folios/INV/2024/reset", None);
        req.headers_mut().insert("x-admin-token", ADMIN_TOKEN.parse().unwrap());
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["reset"], true);

        let response = app
            .oneshot(request("POST", "/folios/INV", Some(json!({"year": 2024}))))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["folio"], "INV-2024-00000001");
    }

    #[tokio::test]
    async fn test_admin_routes_disabled_without_token() {
        let (app, _db) = setup_test_app(AuditPolicy::Strict, None).await;

        let mut req = request("POST", "/admin/folios/INV/2024/reset", None);
        req.headers_mut().insert("x-admin-token", "anything".parse().unwrap());
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_record_lifecycle_and_ledger() {
        let (app, _db) = setup_test_app(AuditPolicy::Strict, None).await;

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/records/ct_centros_trabajo",
                Some(json!({"nombre": "Centro", "ambito": "Urbano"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        let id = body["record"]["id"].as_i64().unwrap();
        assert_eq!(body["audit"]["status"], "recorded");

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &format!("/records/ct_centros_trabajo/{}", id),
                Some(json!({"nombre": "Centro Histórico"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("DELETE", &format!("/records/ct_centros_trabajo/{}", id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["record"]["estado"], false);

        let response = app
            .clone()
            .oneshot(request("GET", "/bitacora?table=centros_trabajo&action=update", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let entries = json_body(response).await;
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["prior_values"], json!({"nombre": "Centro"}));
        assert_eq!(entries[0]["new_values"], json!({"nombre": "Centro Histórico"}));
        assert_eq!(entries[0]["user_id"], 7);
        assert_eq!(entries[0]["session_id"], 42);

        let response = app
            .oneshot(request("GET", "/records/no_registrada/1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_best_effort_warning_header() {
        let (app, db) = setup_test_app(AuditPolicy::BestEffort, None).await;
        sqlx::query("DROP TABLE bitacora").execute(&db.pool).await.unwrap();

        let response = app
            .oneshot(request("POST", "/records/inv_bienes", Some(json!({"clave": "B-1"}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key("x-audit-warning"));
        assert_eq!(json_body(response).await["audit"]["status"], "failed");
    }

    #[tokio::test]
    async fn test_strict_audit_failure_status() {
        let (app, db) = setup_test_app(AuditPolicy::Strict, None).await;
        sqlx::query("DROP TABLE bitacora").execute(&db.pool).await.unwrap();

        let response = app
            .oneshot(request("POST", "/records/inv_bienes", Some(json!({"clave": "B-1"}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"]["code"], "AUDIT_WRITE_FAILED");
    }

    #[tokio::test]
    async fn test_bearer_token_enforced_when_configured() {
        let db = setup_test_db().await;
        let mut config = test_config(&db.url, AuditPolicy::Strict);
        config.security.api_token = Some("api-secret".into());
        let app = routes::router(AppState::new(db.pool.clone(), config));

        let response = app
            .clone()
            .oneshot(request("GET", "/folios/INV/next", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut req = request("GET", "/folios/INV/next", None);
        req.headers_mut().insert("authorization", "Bearer api-secret".parse().unwrap());
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // health stays open
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
