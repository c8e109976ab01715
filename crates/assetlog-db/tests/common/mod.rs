//! Fixtures and store-agnostic checks shared by the store test suites.

#![allow(dead_code)]

use assetlog_core::error::AuditError;
use assetlog_core::models::assignment::Assignment;
use assetlog_core::models::device::{Device, DeviceStatus, DeviceType};
use assetlog_core::models::employee::Employee;
use assetlog_core::models::event::{Action, Actor, CreateEvent, EntityType};
use assetlog_core::repository::{EventFilter, InventoryStore, InventoryTx, Pagination};
use assetlog_core::snapshot::{AssignmentSnapshot, Snapshot, Tracked};
use chrono::{Duration, TimeZone, Utc};

pub fn laptop(id: i64, serial: &str) -> Device {
    Device {
        id,
        serial_number: serial.into(),
        device_type: DeviceType::Laptop,
        brand: "Lenovo".into(),
        model: "ThinkPad T14".into(),
        hostname: Some(format!("lt-{id:03}")),
        inventory_code: None,
        location: Some("Lima".into()),
        status: DeviceStatus::Available,
        purchase_date: None,
        registered_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
    }
}

pub fn employee(id: i64, email: &str) -> Employee {
    Employee {
        id,
        full_name: "Ana Ruiz".into(),
        email: email.into(),
        department: Some("Finance".into()),
        position: None,
        company: None,
        location: None,
        is_active: true,
    }
}

pub fn create_event_for(device: &Device, actor: Actor) -> CreateEvent {
    CreateEvent {
        timestamp: Utc::now(),
        actor,
        action: Action::Create,
        entity_type: EntityType::Device,
        entity_id: device.id,
        snapshot_before: None,
        snapshot_after: Some(device.capture()),
        details: Some(format!("Created device {}", device.serial_number)),
        reverts_event_id: None,
    }
}

/// Writes, reads back and commits one of everything.
pub async fn entities_round_trip<S: InventoryStore>(store: &S) {
    let mut tx = store.begin().await.unwrap();
    let device_id = tx.allocate_id(EntityType::Device).await.unwrap();
    let employee_id = tx.allocate_id(EntityType::Employee).await.unwrap();
    let assignment_id = tx.allocate_id(EntityType::Assignment).await.unwrap();

    let device = laptop(device_id, "SN-ROUND-1");
    let worker = employee(employee_id, "ana@example.com");
    let link = Assignment {
        id: assignment_id,
        device_id,
        employee_id,
        assigned_at: Utc.timestamp_millis_opt(1_700_000_100_000).unwrap(),
        returned_at: None,
        notes: Some("onboarding".into()),
        return_observations: None,
    };
    tx.put_device(device.clone()).await.unwrap();
    tx.put_employee(worker.clone()).await.unwrap();
    tx.put_assignment(link.clone()).await.unwrap();

    // Read-your-writes inside the transaction.
    assert_eq!(tx.device(device_id).await.unwrap(), Some(device.clone()));
    assert_eq!(
        tx.device_by_serial("SN-ROUND-1").await.unwrap(),
        Some(device.clone())
    );
    assert_eq!(tx.assignments_for_device(device_id).await.unwrap(), vec![link.clone()]);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.device(device_id).await.unwrap(), Some(device));
    assert_eq!(
        tx.employee_by_email("ana@example.com").await.unwrap(),
        Some(worker)
    );
    assert_eq!(tx.assignment(assignment_id).await.unwrap(), Some(link.clone()));
    assert_eq!(
        tx.assignments_for_employee(employee_id).await.unwrap(),
        vec![link]
    );
}

/// A dropped transaction leaves no trace, but its identifiers stay burnt.
pub async fn dropped_transaction_rolls_back<S: InventoryStore>(store: &S) {
    let first_id;
    {
        let mut tx = store.begin().await.unwrap();
        first_id = tx.allocate_id(EntityType::Device).await.unwrap();
        let device = laptop(first_id, "SN-DROPPED");
        tx.put_device(device.clone()).await.unwrap();
        tx.append_event(create_event_for(&device, Actor::user("ops")))
            .await
            .unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.device(first_id).await.unwrap(), None);
    let next_id = tx.allocate_id(EntityType::Device).await.unwrap();
    assert!(next_id > first_id, "identifiers must never be reused");
    drop(tx);

    let events = store
        .list_events(EventFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert!(events.is_empty());
}

/// Events come back newest first, filtered, and the revert marker is a
/// compare-and-set.
pub async fn event_log_behaves<S: InventoryStore>(store: &S) {
    let mut tx = store.begin().await.unwrap();
    let device = laptop(tx.allocate_id(EntityType::Device).await.unwrap(), "SN-LOG");
    tx.put_device(device.clone()).await.unwrap();
    let created = tx
        .append_event(create_event_for(&device, Actor::user("alice")))
        .await
        .unwrap();

    let mut updated = device.clone();
    updated.location = Some("Cusco".into());
    let mut update = create_event_for(&updated, Actor::System);
    update.action = Action::Update;
    update.snapshot_before = Some(device.capture());
    update.timestamp = Utc::now() + Duration::seconds(1);
    tx.put_device(updated).await.unwrap();
    let second = tx.append_event(update).await.unwrap();
    tx.commit().await.unwrap();

    assert!(second.id > created.id);

    let all = store
        .list_events(EventFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![second.id, created.id]
    );

    let by_alice = store
        .list_events(
            EventFilter {
                actor: Some(Actor::user("alice")),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_alice.len(), 1);
    assert_eq!(by_alice[0].action, Action::Create);

    let by_system = store
        .list_events(
            EventFilter {
                actor: Some(Actor::System),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_system.len(), 1);
    assert_eq!(by_system[0].id, second.id);

    let page = store
        .list_events(
            EventFilter::default(),
            Pagination {
                offset: 1,
                limit: 10,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, created.id);

    let fetched = store.get_event(created.id).await.unwrap();
    assert_eq!(fetched, created);

    let mut tx = store.begin().await.unwrap();
    tx.mark_reverted(created.id, Actor::user("bob"), Utc::now())
        .await
        .unwrap();
    let err = tx
        .mark_reverted(created.id, Actor::user("carol"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::AlreadyReverted { .. }));
    tx.commit().await.unwrap();

    let marked = store.get_event(created.id).await.unwrap();
    assert!(marked.reverted_at.is_some());
    assert_eq!(marked.reverted_by, Some(Actor::user("bob")));

    assert!(matches!(
        store.get_event(9_999).await,
        Err(AuditError::NotFound { .. })
    ));
}

/// Structurally invalid events never reach the log.
pub async fn invalid_event_is_rejected<S: InventoryStore>(store: &S) {
    let device = laptop(1, "SN-BAD");
    let mut input = create_event_for(&device, Actor::System);
    input.action = Action::Assign;
    input.snapshot_after = Some(Snapshot::Assignment(AssignmentSnapshot::capture(
        None, &device,
    )));

    let mut tx = store.begin().await.unwrap();
    let err = tx.append_event(input).await.unwrap_err();
    assert!(matches!(err, AuditError::SnapshotMismatch { .. }));
}
