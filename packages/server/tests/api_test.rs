//! HTTP API Tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot` over a
//! small in-memory dataset and a temporary application database:
//!
//! - Record lookup, scans and distinct values
//! - Effective hierarchy reads
//! - Account registration, approval and token gating
//! - Override saves (rejections answer 422 and persist nothing)
//! - Comment threads

#[cfg(test)]
mod api_tests {
    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use guildscope_core::db::{DatabaseService, InMemoryRecordStore};
    use guildscope_core::models::{rank, Record};
    use guildscope_server::{create_router, AppState};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const ADMIN_TOKEN: &str = "admin-secret";

    fn dataset() -> Arc<InMemoryRecordStore> {
        Arc::new(InMemoryRecordStore::new(vec![
            Record::new("F1", "ectomycorrhizal", rank::KEYWORD, Some("F2".into()))
                .with_field("guild", "Ectomycorrhizal"),
            Record::new("F2", "Amanita", rank::GENUS, None).with_field("guild", "Ectomycorrhizal"),
            Record::new("F3", "Amanita muscaria", rank::SPECIES, Some("F2".into()))
                .with_field("guild", "Ectomycorrhizal"),
            Record::new("F4", "Boletus", rank::GENUS, None).with_field("guild", "Saprotroph"),
        ]))
    }

    /// Router over the test dataset plus the temp dir keeping its database alive
    async fn create_test_app() -> Result<(Router, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db = DatabaseService::new(temp_dir.path().join("guildscope.db")).await?;
        let state = AppState::load(dataset(), db, Some(ADMIN_TOKEN.to_string())).await?;
        Ok((create_router(state), temp_dir))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn get(app: &Router, uri: &str) -> Result<(StatusCode, Value)> {
        send(app, Method::GET, uri, None, None).await
    }

    /// Register `username` and approve it with the given edit right; returns its token
    async fn approved_token(app: &Router, username: &str, can_edit: bool) -> Result<String> {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/accounts/register",
            None,
            Some(json!({"username": username})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["token"].as_str().unwrap_or_default().to_string();

        let (status, _) = send(
            app,
            Method::POST,
            &format!("/api/accounts/{}/approve", username),
            Some(ADMIN_TOKEN),
            Some(json!({"canEdit": can_edit})),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        Ok(token)
    }

    // ========================================================================
    // Records
    // ========================================================================

    #[tokio::test]
    async fn test_health_reports_record_count() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;
        let (status, body) = get(&app, "/api/health").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["recordCount"], 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_lookup_and_not_found() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;

        let (status, body) = get(&app, "/api/records/F2").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Amanita");

        let (status, body) = get(&app, "/api/records/ghost").await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "RECORD_NOT_FOUND");
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_and_distinct() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;

        let (status, body) = get(&app, "/api/records?guild=Ectomycorrhizal&orderBy=name&limit=2").await?;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["records"]
            .as_array()
            .map(|records| records.iter().filter_map(|r| r["id"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec!["F2", "F3"]);
        assert_eq!(body["limit"], 2);

        let (status, body) = get(&app, "/api/records/distinct/guild").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["Ectomycorrhizal", "Saprotroph"]));

        let (status, _) = get(&app, "/api/records?limit=abc").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    #[tokio::test]
    async fn test_hierarchy_reads() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;

        let (_, body) = get(&app, "/api/hierarchy/children").await?;
        let top: Vec<&str> = body
            .as_array()
            .map(|records| records.iter().filter_map(|r| r["id"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(top, vec!["F2", "F4"]);

        let (_, body) = get(&app, "/api/hierarchy/children?parent=F2").await?;
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (status, _) = get(&app, "/api/hierarchy/children?parent=ghost").await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = get(&app, "/api/hierarchy/F1/parent").await?;
        assert_eq!(body, json!({"id": "F1", "parentId": "F2", "overridden": false}));

        let (_, body) = get(&app, "/api/hierarchy/F3/ancestors").await?;
        assert_eq!(body[0]["id"], "F2");
        Ok(())
    }

    #[tokio::test]
    async fn test_candidates_carry_verdicts() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;

        let (status, body) = get(&app, "/api/hierarchy/F2/candidates?q=amanita").await?;
        assert_eq!(status, StatusCode::OK);
        let candidates = body.as_array().cloned().unwrap_or_default();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0]["record"]["id"], "F2");
        assert_eq!(candidates[0]["rejection"]["reason"], "selfParent");
        assert_eq!(candidates[1]["record"]["id"], "F3");
        assert_eq!(candidates[1]["rejection"]["reason"], "rankViolation");
        Ok(())
    }

    // ========================================================================
    // Accounts and overrides
    // ========================================================================

    #[tokio::test]
    async fn test_account_lifecycle() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/accounts/register",
            None,
            Some(json!({"username": "curator"})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["approved"], false);
        let token = body["token"].as_str().unwrap_or_default().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/accounts/register",
            None,
            Some(json!({"username": "curator"})),
        )
        .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ACCOUNT_EXISTS");

        let (status, _) = send(&app, Method::GET, "/api/accounts/pending", Some(token.as_str()), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        for near_miss in ["admin-secre", "admin-secret2", "Admin-secret"] {
            let (status, _) =
                send(&app, Method::GET, "/api/accounts/pending", Some(near_miss), None).await?;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }

        let (status, body) =
            send(&app, Method::GET, "/api/accounts/pending", Some(ADMIN_TOKEN), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["username"], "curator");
        assert!(body[0].get("token").is_none());

        let (_, body) = send(&app, Method::GET, "/api/accounts/me", Some(token.as_str()), None).await?;
        assert_eq!(body["capability"]["canEdit"], false);
        assert!(body["capability"]["user"].is_null());
        Ok(())
    }

    #[tokio::test]
    async fn test_override_save_requires_edit_rights() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;
        let edge = json!({"childId": "F3", "parentId": "F4"});

        let (status, _) =
            send(&app, Method::POST, "/api/overrides", None, Some(edge.clone())).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let reader = approved_token(&app, "reader", false).await?;
        let (status, _) =
            send(&app, Method::POST, "/api/overrides", Some(reader.as_str()), Some(edge.clone())).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = get(&app, "/api/overrides").await?;
        assert_eq!(body, json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn test_override_save_and_rejection() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;
        let editor = approved_token(&app, "curator", true).await?;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/overrides",
            Some(editor.as_str()),
            Some(json!({"childId": "F1", "parentId": null})),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updatedBy"], "curator");

        let (_, body) = get(&app, "/api/hierarchy/F1/parent").await?;
        assert_eq!(body, json!({"id": "F1", "parentId": null, "overridden": true}));

        // A genus under a species is rejected and nothing is stored
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/overrides",
            Some(editor.as_str()),
            Some(json!({"childId": "F2", "parentId": "F3"})),
        )
        .await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"], "rank violation");

        let (_, body) = get(&app, "/api/overrides").await?;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["childId"], "F1");
        Ok(())
    }

    // ========================================================================
    // Comments
    // ========================================================================

    #[tokio::test]
    async fn test_comment_thread() -> Result<()> {
        let (app, _temp_dir) = create_test_app().await?;
        let reader = approved_token(&app, "visitor", false).await?;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/comments/F3",
            None,
            Some(json!({"text": "anonymous"})),
        )
        .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        for text in ["first", "second"] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/comments/F3",
                Some(reader.as_str()),
                Some(json!({"text": text})),
            )
            .await?;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/comments/F3",
            Some(reader.as_str()),
            Some(json!({"text": "   "})),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = get(&app, "/api/comments/F3").await?;
        let texts: Vec<&str> = body
            .as_array()
            .map(|comments| comments.iter().filter_map(|c| c["text"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(body[0]["author"], "visitor");

        let (status, _) = get(&app, "/api/comments/ghost").await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
