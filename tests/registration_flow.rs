mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use common::{acquire_db_lock, expect_json, uuid_at, TestApp, PASSWORD};
use edm_backend::auth::permissions::permissions_for_role;
use edm_backend::workflow::registration::{register, RegistrationPrefixes};
use edm_backend::workflow::{Actor, WorkflowError};
use serde_json::json;
use uuid::Uuid;

async fn create_document(app: &TestApp, token: &str, doc_type: &str) -> Result<Uuid> {
    let response = app
        .post_json(
            "/api/documents",
            &json!({ "title": "Letter from the ministry", "doc_type": doc_type }),
            Some(token),
        )
        .await?;
    let document = expect_json(response, StatusCode::CREATED).await?;
    uuid_at(&document, "/id")
}

async fn register_via_api(
    app: &TestApp,
    token: &str,
    document_id: Uuid,
) -> Result<hyper::Response<axum::body::Body>> {
    app.post_json(
        &format!("/api/documents/{document_id}/registration"),
        &json!({}),
        Some(token),
    )
    .await
}

#[tokio::test]
async fn numbers_are_sequential_and_registration_is_exclusive() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("clara", PASSWORD, "clerk").await?;
    app.insert_user("paul", PASSWORD, "user").await?;
    let clerk = app.login_token("clara", PASSWORD).await?;
    let plain = app.login_token("paul", PASSWORD).await?;
    let year = Utc::now().year();

    let first = create_document(&app, &clerk, "incoming").await?;
    let second = create_document(&app, &clerk, "incoming").await?;
    let memo = create_document(&app, &clerk, "internal").await?;

    let response = register_via_api(&app, &plain, first).await?;
    expect_json(response, StatusCode::FORBIDDEN).await?;

    let response = register_via_api(&app, &clerk, first).await?;
    let entry = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(entry["registration_number"], json!(format!("IN-{year}-000001")));
    let first_entry = uuid_at(&entry, "/id")?;

    let response = register_via_api(&app, &clerk, second).await?;
    let entry = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(entry["registration_number"], json!(format!("IN-{year}-000002")));

    let response = register_via_api(&app, &clerk, first).await?;
    let error = expect_json(response, StatusCode::CONFLICT).await?;
    assert_eq!(error["code"], json!("already_registered"));

    let response = register_via_api(&app, &clerk, memo).await?;
    let error = expect_json(response, StatusCode::BAD_REQUEST).await?;
    assert_eq!(error["code"], json!("validation"));

    let response = app
        .get(&format!("/api/registrations?document_id={first}"), Some(&clerk))
        .await?;
    let entries = expect_json(response, StatusCode::OK).await?;
    assert_eq!(entries.as_array().map(Vec::len), Some(1));

    let cancel_path = format!("/api/registrations/{first_entry}/cancel");
    let response = app
        .post_json(&cancel_path, &json!({ "reason": "duplicate intake" }), Some(&clerk))
        .await?;
    let cancelled = expect_json(response, StatusCode::OK).await?;
    assert_eq!(cancelled["status"], json!("cancelled"));
    assert_eq!(cancelled["cancel_reason"], json!("duplicate intake"));
    assert!(cancelled["cancelled_at"].is_string());

    let response = app
        .post_json(&cancel_path, &json!({}), Some(&clerk))
        .await?;
    expect_json(response, StatusCode::CONFLICT).await?;

    let response = register_via_api(&app, &clerk, first).await?;
    let entry = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(entry["registration_number"], json!(format!("IN-{year}-000003")));

    let response = app
        .get(&format!("/api/registrations?document_id={first}"), Some(&clerk))
        .await?;
    let entries = expect_json(response, StatusCode::OK).await?;
    let statuses: Vec<&str> = entries
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry["status"].as_str())
        .collect();
    assert_eq!(statuses.len(), 2);
    assert!(statuses.contains(&"cancelled"));
    assert!(statuses.contains(&"registered"));

    let response = app
        .get("/api/registrations?journal_type=incoming&status=registered", Some(&clerk))
        .await?;
    let active = expect_json(response, StatusCode::OK).await?;
    assert_eq!(active.as_array().map(Vec::len), Some(2));

    let response = app
        .get(&format!("/api/documents/{first}/timeline"), Some(&clerk))
        .await?;
    let timeline = expect_json(response, StatusCode::OK).await?;
    let kinds: Vec<&str> = timeline
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|event| event["event_type"].as_str())
        .collect();
    assert_eq!(
        kinds,
        vec!["created", "registered", "registration_cancelled", "registered"]
    );

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn journals_number_independently() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("clara", PASSWORD, "clerk").await?;
    let clerk = app.login_token("clara", PASSWORD).await?;
    let year = Utc::now().year();

    let incoming = create_document(&app, &clerk, "incoming").await?;
    let outgoing = create_document(&app, &clerk, "outgoing").await?;

    let response = register_via_api(&app, &clerk, outgoing).await?;
    let entry = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(entry["registration_number"], json!(format!("OUT-{year}-000001")));
    assert_eq!(entry["journal_type"], json!("outgoing"));

    let response = register_via_api(&app, &clerk, incoming).await?;
    let entry = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(entry["registration_number"], json!(format!("IN-{year}-000001")));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn number_collision_is_not_reported_as_already_registered() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let clerk_id = app.insert_user("clara", PASSWORD, "clerk").await?;
    let clerk = app.login_token("clara", PASSWORD).await?;
    let year = Utc::now().year();
    let incoming = create_document(&app, &clerk, "incoming").await?;
    let outgoing = create_document(&app, &clerk, "outgoing").await?;

    let actor = Actor {
        user_id: clerk_id,
        department_id: None,
        permissions: permissions_for_role("clerk"),
    };
    let shared = RegistrationPrefixes {
        incoming: "REG".to_string(),
        outgoing: "REG".to_string(),
    };
    let collision = app
        .with_conn(move |conn| {
            let now = Utc::now().naive_utc();
            let first = register(conn, &actor, incoming, &shared, now)?;
            assert_eq!(first.registration_number, format!("REG-{year}-000001"));
            Ok(register(conn, &actor, outgoing, &shared, now).err())
        })
        .await?;
    assert!(
        matches!(collision, Some(WorkflowError::Database(_))),
        "unexpected result: {collision:?}"
    );

    // the failed attempt rolled back, so the document is still unregistered
    let response = register_via_api(&app, &clerk, outgoing).await?;
    let entry = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(entry["registration_number"], json!(format!("OUT-{year}-000001")));

    app.cleanup().await?;
    Ok(())
}
