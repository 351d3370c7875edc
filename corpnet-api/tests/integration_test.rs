//! End-to-end API tests against PostgreSQL
//!
//! Run with: cargo test -p corpnet-api -- --ignored

mod common;

use axum::http::StatusCode;
use common::TestContext;
use corpnet_shared::models::account::AccountType;
use corpnet_shared::models::contact::Contact;
use corpnet_shared::models::event::{Event, EventKind};
use corpnet_shared::models::job::{Job, JobState};
use serde_json::json;

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_contact_request_lifecycle() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.user(AccountType::BuySide, "alice").await.unwrap();
    let bob = ctx.user(AccountType::SellSide, "bob").await.unwrap();

    let (status, body) = ctx
        .call("POST", "/v1/contact-requests", &alice, Some(json!({ "sent_to": bob.user.id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["outcome"], "pending");
    let request_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = ctx.call("GET", "/v1/contact-requests", &bob, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["other_user_id"], json!(alice.user.id));

    // Only the recipient may accept
    let accept = format!("/v1/contact-requests/{}/accept", request_id);
    let (status, _) = ctx.call("POST", &accept, &alice, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.call("POST", &accept, &bob, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "accepted");

    // Terminal states never change
    let (status, body) = ctx.call("POST", &accept, &bob, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "status");

    let (status, body) = ctx.call("GET", "/v1/contacts", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["user_id"], json!(bob.user.id));

    assert_eq!(Contact::count_between(&ctx.db, alice.user.id, bob.user.id).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_crossing_requests_auto_accept() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.user(AccountType::BuySide, "alice").await.unwrap();
    let bob = ctx.user(AccountType::Corporate, "bob").await.unwrap();

    let (status, _) = ctx
        .call("POST", "/v1/contact-requests", &alice, Some(json!({ "sent_to": bob.user.id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx
        .call("POST", "/v1/contact-requests", &bob, Some(json!({ "sent_to": alice.user.id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["outcome"], "auto_accepted");

    assert_eq!(Contact::count_between(&ctx.db, alice.user.id, bob.user.id).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_guest_cannot_send_requests() {
    let ctx = TestContext::new().await.unwrap();
    let guest = ctx.user(AccountType::Guest, "guest").await.unwrap();
    let bob = ctx.user(AccountType::BuySide, "bob").await.unwrap();

    let (status, _) = ctx
        .call("POST", "/v1/contact-requests", &guest, Some(json!({ "sent_to": bob.user.id })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .call("POST", "/v1/contact-requests", &bob, Some(json!({ "sent_to": bob.user.id })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_delete_pending_request() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.user(AccountType::BuySide, "alice").await.unwrap();
    let bob = ctx.user(AccountType::BuySide, "bob").await.unwrap();

    let (_, body) = ctx
        .call("POST", "/v1/contact-requests", &alice, Some(json!({ "sent_to": bob.user.id })))
        .await;
    let uri = format!("/v1/contact-requests/{}", body["id"].as_str().unwrap());

    let (status, body) = ctx.call("DELETE", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = ctx.call("DELETE", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_party_replace_and_event_listing() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user(AccountType::Corporate, "owner").await.unwrap();
    let investor = ctx.user(AccountType::BuySide, "investor").await.unwrap();
    let outsider = ctx.user(AccountType::BuySide, "outsider").await.unwrap();

    let event = ctx.event(EventKind::Webinar, &owner, false).await.unwrap();
    let parties = format!("/v1/events/webinars/{}/parties/invitees", event.id);

    let (status, body) = ctx
        .call(
            "PUT",
            &parties,
            &owner,
            Some(json!({ "parties": [
                { "user_id": investor.user.id },
                { "email": "External.Guest@example.com", "first_name": "Sam" }
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 2);
    assert_eq!(body["parties"].as_array().unwrap().len(), 2);

    // Same list again changes nothing
    let (_, body) = ctx
        .call(
            "PUT",
            &parties,
            &owner,
            Some(json!({ "parties": [
                { "user_id": investor.user.id },
                { "email": "external.guest@example.com" }
            ]})),
        )
        .await;
    assert_eq!(body["inserted"], 0);
    assert_eq!(body["deleted"], 0);
    assert_eq!(body["kept"], 2);

    // The investor now sees the webinar as an invitee
    let (status, body) = ctx.call("GET", "/v1/events/webinars", &investor, None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["id"] == json!(event.id))
        .cloned()
        .unwrap();
    assert_eq!(listed["relations"], json!(["invitee"]));

    // Non-editors cannot change the list; unrelated users cannot see it
    let (status, _) = ctx
        .call("PUT", &parties, &investor, Some(json!({ "parties": [] })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.call("GET", &parties, &outsider, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let pending = Job::count_by_state(&ctx.db, JobState::Pending).await.unwrap();
    assert!(pending >= 2);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_invalid_party_entry_names_index() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user(AccountType::Corporate, "owner").await.unwrap();
    let event = ctx.event(EventKind::Webcast, &owner, false).await.unwrap();

    let (status, body) = ctx
        .call(
            "PUT",
            &format!("/v1/events/webcasts/{}/parties/hosts", event.id),
            &owner,
            Some(json!({ "parties": [{ "email": "ok@example.com" }, {}] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "parties[1]");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_party_replace_on_cancelled_or_deleted_event() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user(AccountType::SellSide, "owner").await.unwrap();
    let body = json!({ "parties": [{ "email": "guest@fund.example" }] });

    let cancelled = ctx.event(EventKind::Webinar, &owner, false).await.unwrap();
    Event::cancel(&ctx.db, EventKind::Webinar, cancelled.id, owner.user.id).await.unwrap();
    let (status, response) = ctx
        .call(
            "PUT",
            &format!("/v1/events/webinars/{}/parties/invitees", cancelled.id),
            &owner,
            Some(body.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["details"][0]["field"], "event");

    let deleted = ctx.event(EventKind::Webinar, &owner, false).await.unwrap();
    Event::soft_delete(&ctx.db, EventKind::Webinar, deleted.id, owner.user.id).await.unwrap();
    let (status, _) = ctx
        .call(
            "PUT",
            &format!("/v1/events/webinars/{}/parties/invitees", deleted.id),
            &owner,
            Some(body),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_stats_and_dashboard() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user(AccountType::Corporate, "owner").await.unwrap();
    let event = ctx.event(EventKind::CorporateAccessEvent, &owner, false).await.unwrap();
    ctx.event(EventKind::CorporateAccessEvent, &owner, true).await.unwrap();

    let stats = format!("/v1/events/corporate-access-events/{}/stats", event.id);
    let (status, body) = ctx.call("GET", &stats, &owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invitees"], 0);

    let (status, body) = ctx
        .call("POST", &format!("{}/refresh", stats), &owner, None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["job_id"].is_string());

    let (status, body) = ctx
        .call("GET", "/v1/events/corporate-access-events/dashboard", &owner, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["drafts"], 1);
    assert_eq!(body["upcoming"], 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_notifications_are_private() {
    use corpnet_shared::models::notification::{CreateNotification, Notification};

    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.user(AccountType::BuySide, "alice").await.unwrap();
    let bob = ctx.user(AccountType::BuySide, "bob").await.unwrap();

    let notification = Notification::create(
        &ctx.db,
        CreateNotification {
            user_id: alice.user.id,
            notification_type: "contact_request".to_string(),
            title: "New contact request".to_string(),
            body: "bob wants to connect".to_string(),
            payload: json!({}),
        },
    )
    .await
    .unwrap();

    let uri = format!("/v1/notifications/{}/read", notification.id);
    let (status, _) = ctx.call("POST", &uri, &bob, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = ctx.call("POST", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], true);

    let (_, body) = ctx
        .call("GET", "/v1/notifications?unread_only=true", &alice, None)
        .await;
    assert_eq!(body["unread"], 0);
    assert!(body["notifications"].as_array().unwrap().is_empty());
}
