mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, expect_json, TestApp, PASSWORD};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct Me {
    username: String,
    role: String,
    department_id: Option<uuid::Uuid>,
    org_roles: Vec<String>,
    permissions: Vec<String>,
}

#[tokio::test]
async fn login_and_me_roundtrip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let department = app.insert_department("Legal").await?;
    app.insert_member("alice", PASSWORD, "admin", Some(department), &["lawyer", "manager"])
        .await?;

    let token = app.login_token("alice", PASSWORD).await?;

    let response = app.get("/api/auth/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let me: Me = serde_json::from_slice(&body)?;

    assert_eq!(me.username, "alice");
    assert_eq!(me.role, "admin");
    assert_eq!(me.department_id, Some(department));
    assert_eq!(me.org_roles, vec!["lawyer".to_string(), "manager".to_string()]);
    assert!(me.permissions.iter().any(|p| p == "routes_override"));

    // documents filed without a department land in the token's department
    let response = app
        .post_json(
            "/api/documents",
            &json!({ "title": "Power of attorney", "doc_type": "internal" }),
            Some(&token),
        )
        .await?;
    let document = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(document["department_id"], json!(department));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn inactive_users_cannot_log_in() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("root", PASSWORD, "admin").await?;
    let bob = app.insert_user("bob", PASSWORD, "user").await?;
    let admin = app.login_token("root", PASSWORD).await?;

    let response = app
        .patch_json(
            &format!("/api/users/{bob}"),
            &json!({ "is_active": false }),
            Some(&admin),
        )
        .await?;
    let updated = expect_json(response, StatusCode::OK).await?;
    assert_eq!(updated["is_active"], json!(false));

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "username": "bob", "password": PASSWORD }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_token() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app.get("/api/documents", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/api/health", None).await?;
    let health = expect_json(response, StatusCode::OK).await?;
    assert_eq!(health["database"], json!("ok"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn directory_management_requires_permission() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("root", PASSWORD, "admin").await?;
    app.insert_user("carol", PASSWORD, "user").await?;
    let admin = app.login_token("root", PASSWORD).await?;
    let carol = app.login_token("carol", PASSWORD).await?;

    let response = app
        .post_json("/api/departments", &json!({ "name": "Finance" }), Some(&carol))
        .await?;
    let error = expect_json(response, StatusCode::FORBIDDEN).await?;
    assert_eq!(error["code"], json!("forbidden"));

    let response = app
        .post_json("/api/departments", &json!({ "name": "Finance" }), Some(&admin))
        .await?;
    let department = expect_json(response, StatusCode::CREATED).await?;
    let department_id = department["id"].as_str().unwrap_or_default().to_string();

    let response = app
        .post_json(
            "/api/users",
            &json!({
                "username": "dave",
                "password": "long-enough-password",
                "full_name": "Dave Clerk",
                "role": "clerk",
                "department_id": department_id,
                "org_roles": ["manager"],
            }),
            Some(&admin),
        )
        .await?;
    let dave = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(dave["org_roles"], json!(["manager"]));

    let response = app
        .put_json(
            &format!("/api/users/{}/roles", dave["id"].as_str().unwrap_or_default()),
            &json!({ "org_roles": ["lawyer", "lawyer"] }),
            Some(&admin),
        )
        .await?;
    let dave = expect_json(response, StatusCode::OK).await?;
    assert_eq!(dave["org_roles"], json!(["lawyer"]));

    let response = app
        .get(
            &format!("/api/users?department_id={department_id}"),
            Some(&carol),
        )
        .await?;
    let members = expect_json(response, StatusCode::OK).await?;
    assert_eq!(members.as_array().map(Vec::len), Some(1));

    app.cleanup().await?;
    Ok(())
}
