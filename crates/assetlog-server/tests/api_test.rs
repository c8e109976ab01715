//! HTTP tests driving the router in-process.

use std::sync::Arc;

use assetlog_core::models::device::{CreateDevice, DeviceType, UpdateDevice};
use assetlog_core::models::event::Actor;
use assetlog_db::MemoryStore;
use assetlog_engine::{AuditService, EngineConfig, Recorder};
use assetlog_server::build_router;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

struct App {
    router: Router,
    recorder: Recorder<MemoryStore>,
}

fn app() -> App {
    let store = MemoryStore::new();
    let audit = Arc::new(AuditService::new(store.clone(), EngineConfig::default()));
    App {
        router: build_router(audit),
        recorder: Recorder::new(store),
    }
}

fn monitor(serial: &str) -> CreateDevice {
    CreateDevice {
        serial_number: serial.into(),
        device_type: DeviceType::Monitor,
        brand: "LG".into(),
        model: "27UL500".into(),
        hostname: None,
        inventory_code: Some("INV-MON-001".into()),
        location: None,
        purchase_date: None,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn revert(id: i64, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/audit-logs/{id}/revert"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn listing_returns_annotated_events() {
    let app = app();
    let created = app
        .recorder
        .create_device(Actor::user("admin"), monitor("MON-1"))
        .await
        .unwrap();
    app.recorder
        .update_device(
            Actor::System,
            created.value.id,
            UpdateDevice {
                location: Some(Some("Arequipa".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    for uri in ["/audit-logs", "/audit-logs/"] {
        let (status, body) = send(&app.router, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["action"], "UPDATE");
        assert_eq!(entries[0]["actor_display"], "system");
        assert_eq!(entries[0]["is_revertible"], true);
        assert_eq!(entries[1]["actor"], "admin");
    }

    let (status, body) = send(&app.router, get("/audit-logs?action=create&entity_type=device")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app.router, get("/audit-logs?actor=system")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app.router, get("/audit-logs?skip=1&limit=1")).await;
    assert_eq!(body[0]["action"], "CREATE");
}

#[tokio::test]
async fn bad_filters_are_unprocessable() {
    let app = app();
    let (status, body) = send(&app.router, get("/audit-logs?action=rename")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Validation");

    let (status, _) = send(&app.router, get("/audit-logs?from=last%20week")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn event_detail_and_not_found() {
    let app = app();
    let created = app
        .recorder
        .create_device(Actor::user("admin"), monitor("MON-2"))
        .await
        .unwrap();

    let (status, body) = send(&app.router, get(&format!("/audit-logs/{}", created.event_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshot_after"]["serial_number"], "MON-2");
    assert_eq!(body["reverted_at"], Value::Null);

    let (status, body) = send(&app.router, get("/audit-logs/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn revert_then_refuse_a_second_time() {
    let app = app();
    let created = app
        .recorder
        .create_device(Actor::user("admin"), monitor("MON-3"))
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        revert(created.event_id, json!({ "actor": "auditor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reverted_event_id"], created.event_id);
    assert_eq!(body["outcome"], "applied");
    let revert_event_id = body["revert_event_id"].as_i64().unwrap();

    let (_, detail) = send(&app.router, get(&format!("/audit-logs/{}", created.event_id))).await;
    assert_eq!(detail["reverted_by"], "auditor");
    assert_eq!(detail["eligibility"], "already_reverted");

    let (status, body) = send(&app.router, revert(created.event_id, json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyReverted");

    let (status, body) = send(&app.router, revert(revert_event_id, json!({ "actor": null }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "NotRevertible");
}

#[tokio::test]
async fn revert_accepts_a_bodyless_post() {
    let app = app();
    let created = app
        .recorder
        .create_device(Actor::user("admin"), monitor("MON-5"))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/audit-logs/{}/revert", created.event_id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reverted_event_id"], created.event_id);

    let (_, detail) = send(&app.router, get(&format!("/audit-logs/{}", created.event_id))).await;
    assert_eq!(detail["reverted_by"], Value::Null);
    assert_eq!(detail["eligibility"], "already_reverted");
    let (_, revert_entry) = send(
        &app.router,
        get(&format!("/audit-logs/{}", body["revert_event_id"])),
    )
    .await;
    assert_eq!(revert_entry["actor_display"], "system");
}

#[tokio::test]
async fn malformed_revert_body_is_unprocessable() {
    let app = app();
    let created = app
        .recorder
        .create_device(Actor::user("admin"), monitor("MON-6"))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/audit-logs/{}/revert", created.event_id))
        .header("content-type", "application/json")
        .body(Body::from("{\"actor\": "))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Validation");
}

#[tokio::test]
async fn stale_revert_is_a_conflict() {
    let app = app();
    let created = app
        .recorder
        .create_device(Actor::user("admin"), monitor("MON-4"))
        .await
        .unwrap();
    let first = app
        .recorder
        .update_device(
            Actor::user("admin"),
            created.value.id,
            UpdateDevice {
                brand: Some("Samsung".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    app.recorder
        .update_device(
            Actor::user("admin"),
            created.value.id,
            UpdateDevice {
                model: Some("S24".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = send(&app.router, revert(first.event_id, json!({ "actor": "bob" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Stale");
    assert!(body["message"].as_str().unwrap().contains("device"));
}
