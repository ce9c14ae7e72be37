mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, expect_json, uuid_at, TestApp, PASSWORD};
use diesel::prelude::*;
use edm_backend::jobs::JOB_DELIVER_NOTIFICATION;
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_memo(app: &TestApp, token: &str) -> Result<Uuid> {
    let response = app
        .post_json(
            "/api/documents",
            &json!({ "title": "Office move plan", "doc_type": "internal" }),
            Some(token),
        )
        .await?;
    let document = expect_json(response, StatusCode::CREATED).await?;
    uuid_at(&document, "/id")
}

async fn timeline(app: &TestApp, token: &str, document_id: Uuid) -> Result<Vec<Value>> {
    let response = app
        .get(&format!("/api/documents/{document_id}/timeline"), Some(token))
        .await?;
    let events = expect_json(response, StatusCode::OK).await?;
    Ok(events.as_array().cloned().unwrap_or_default())
}

#[tokio::test]
async fn replies_thread_under_their_root() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("rita", PASSWORD, "user").await?;
    app.insert_user("omar", PASSWORD, "user").await?;
    let rita = app.login_token("rita", PASSWORD).await?;
    let omar = app.login_token("omar", PASSWORD).await?;
    let document_id = create_memo(&app, &rita).await?;
    let replies_path = format!("/api/documents/{document_id}/replies");

    let response = app
        .post_json(&replies_path, &json!({ "body": "Which floor?" }), Some(&rita))
        .await?;
    let root = expect_json(response, StatusCode::CREATED).await?;
    let root_id = uuid_at(&root, "/id")?;
    assert_eq!(uuid_at(&root, "/thread_id")?, root_id);

    let response = app
        .post_json(
            &replies_path,
            &json!({ "body": "Third, east wing", "parent_reply_id": root_id }),
            Some(&omar),
        )
        .await?;
    let child = expect_json(response, StatusCode::CREATED).await?;
    let child_id = uuid_at(&child, "/id")?;
    assert_eq!(uuid_at(&child, "/thread_id")?, root_id);

    let response = app
        .post_json(
            &replies_path,
            &json!({ "body": "Thanks", "parent_reply_id": child_id }),
            Some(&rita),
        )
        .await?;
    let grandchild = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(uuid_at(&grandchild, "/thread_id")?, root_id);
    assert_eq!(uuid_at(&grandchild, "/parent_reply_id")?, child_id);

    let response = app
        .post_json(&replies_path, &json!({ "body": "   " }), Some(&rita))
        .await?;
    expect_json(response, StatusCode::BAD_REQUEST).await?;

    let response = app
        .post_json(
            &replies_path,
            &json!({ "body": "orphan", "parent_reply_id": Uuid::new_v4() }),
            Some(&rita),
        )
        .await?;
    expect_json(response, StatusCode::NOT_FOUND).await?;

    let response = app.get(&replies_path, Some(&omar)).await?;
    let replies = expect_json(response, StatusCode::OK).await?;
    assert_eq!(replies.as_array().map(Vec::len), Some(3));

    let events = timeline(&app, &rita, document_id).await?;
    let reply_events: Vec<&Value> = events
        .iter()
        .filter(|event| event["event_type"] == json!("reply"))
        .collect();
    assert_eq!(reply_events.len(), 3);
    assert_eq!(reply_events[0]["parent_event_id"], Value::Null);
    assert_eq!(
        uuid_at(reply_events[1], "/parent_event_id")?,
        uuid_at(&root, "/timeline_event_id")?
    );
    assert_eq!(
        uuid_at(reply_events[2], "/parent_event_id")?,
        uuid_at(&child, "/timeline_event_id")?
    );

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn recorded_events_cannot_be_rewritten() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("rita", PASSWORD, "user").await?;
    let rita = app.login_token("rita", PASSWORD).await?;
    let document_id = create_memo(&app, &rita).await?;

    let rewrite = app
        .with_conn(|conn| {
            Ok(
                diesel::sql_query("UPDATE timeline_events SET payload = '{}'::jsonb")
                    .execute(conn)
                    .is_err(),
            )
        })
        .await?;
    assert!(rewrite, "timeline update should be rejected");

    let events = timeline(&app, &rita, document_id).await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], json!("created"));
    assert_ne!(events[0]["payload"], json!({}));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn forward_and_assignment_are_recorded() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("rita", PASSWORD, "user").await?;
    let omar_id = app.insert_user("omar", PASSWORD, "user").await?;
    let lena_id = app.insert_user("lena", PASSWORD, "user").await?;
    let rita = app.login_token("rita", PASSWORD).await?;
    let document_id = create_memo(&app, &rita).await?;
    app.clear_jobs().await?;

    let response = app
        .post_json(
            &format!("/api/documents/{document_id}/forward"),
            &json!({ "to_user_id": omar_id, "note": "please take a look" }),
            Some(&rita),
        )
        .await?;
    let event = expect_json(response, StatusCode::CREATED).await?;
    assert_eq!(event["event_type"], json!("forward"));
    assert_eq!(uuid_at(&event, "/payload/to_user_id")?, omar_id);

    let deliveries = app.jobs_by_type(JOB_DELIVER_NOTIFICATION).await?;
    assert_eq!(deliveries.len(), 1);

    let response = app
        .post_json(
            &format!("/api/documents/{document_id}/forward"),
            &json!({ "to_user_id": Uuid::new_v4() }),
            Some(&rita),
        )
        .await?;
    expect_json(response, StatusCode::NOT_FOUND).await?;

    let assign_path = format!("/api/documents/{document_id}/assign");
    let response = app
        .post_json(&assign_path, &json!({ "user_id": omar_id }), Some(&rita))
        .await?;
    let document = expect_json(response, StatusCode::OK).await?;
    assert_eq!(uuid_at(&document, "/responsible_user_id")?, omar_id);

    let response = app
        .post_json(&assign_path, &json!({ "user_id": omar_id }), Some(&rita))
        .await?;
    let error = expect_json(response, StatusCode::CONFLICT).await?;
    assert_eq!(error["code"], json!("invalid_state"));

    let response = app
        .post_json(&assign_path, &json!({ "user_id": lena_id }), Some(&rita))
        .await?;
    let document = expect_json(response, StatusCode::OK).await?;
    assert_eq!(uuid_at(&document, "/responsible_user_id")?, lena_id);

    let kinds: Vec<String> = timeline(&app, &rita, document_id)
        .await?
        .iter()
        .filter_map(|event| event["event_type"].as_str().map(str::to_string))
        .collect();
    assert_eq!(kinds, vec!["created", "forward", "assign", "reassign"]);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn only_finished_documents_are_archived() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let clerk_id = app.insert_user("clara", PASSWORD, "clerk").await?;
    app.insert_user("paul", PASSWORD, "user").await?;
    let clerk = app.login_token("clara", PASSWORD).await?;
    let plain = app.login_token("paul", PASSWORD).await?;
    let document_id = create_memo(&app, &clerk).await?;
    let archive_path = format!("/api/documents/{document_id}/archive");
    let stages = json!({
        "stages": [{
            "order_no": 1,
            "stage_type": "approve",
            "assignee": { "type": "user", "user_id": clerk_id },
        }],
    });

    let response = app.post_json(&archive_path, &json!({}), Some(&clerk)).await?;
    expect_json(response, StatusCode::CONFLICT).await?;

    let response = app
        .post_json(&format!("/api/documents/{document_id}/routes"), &stages, Some(&clerk))
        .await?;
    let route = expect_json(response, StatusCode::CREATED).await?;
    let stage_id = uuid_at(&route, "/stages/0/id")?;

    let response = app
        .post_json(
            &format!("/api/documents/{document_id}/stages/{stage_id}/actions"),
            &json!({ "action": "approve" }),
            Some(&clerk),
        )
        .await?;
    let outcome = expect_json(response, StatusCode::OK).await?;
    assert_eq!(outcome["document"]["status"], json!("completed"));

    let response = app.post_json(&archive_path, &json!({}), Some(&plain)).await?;
    expect_json(response, StatusCode::FORBIDDEN).await?;

    let response = app.post_json(&archive_path, &json!({}), Some(&clerk)).await?;
    let archived = expect_json(response, StatusCode::OK).await?;
    assert_eq!(archived["status"], json!("archived"));

    let response = app
        .post_json(&format!("/api/documents/{document_id}/routes"), &stages, Some(&clerk))
        .await?;
    expect_json(response, StatusCode::CONFLICT).await?;

    let response = app
        .post_json(
            &format!("/api/documents/{document_id}/replies"),
            &json!({ "body": "late note" }),
            Some(&clerk),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let events = timeline(&app, &clerk, document_id).await?;
    let archive_event = events
        .iter()
        .find(|event| event["event_type"] == json!("archive"))
        .cloned()
        .unwrap_or(Value::Null);
    assert_eq!(archive_event["payload"]["previous_status"], json!("completed"));

    app.cleanup().await?;
    Ok(())
}
