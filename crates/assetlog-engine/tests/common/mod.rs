//! Shared fixtures: an in-memory store, a manual clock, and the engine
//! services wired to both.

#![allow(dead_code)]

use std::sync::Arc;

use assetlog_core::models::assignment::Assignment;
use assetlog_core::models::device::{CreateDevice, Device, DeviceType};
use assetlog_core::models::employee::{CreateEmployee, Employee};
use assetlog_core::models::event::{Actor, EntityId};
use assetlog_core::repository::{InventoryStore, InventoryTx};
use assetlog_db::MemoryStore;
use assetlog_engine::{AuditService, EngineConfig, ManualClock, Recorder};
use chrono::{DateTime, TimeZone, Utc};

pub struct Harness {
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub recorder: Recorder<MemoryStore>,
    pub audit: AuditService<MemoryStore>,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap()
}

pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let clock = ManualClock::new(t0());
    let recorder = Recorder::new(store.clone()).with_clock(Arc::new(clock.clone()));
    let audit = AuditService::new(store.clone(), EngineConfig::default())
        .with_clock(Arc::new(clock.clone()));
    Harness {
        store,
        clock,
        recorder,
        audit,
    }
}

pub fn admin() -> Actor {
    Actor::user("admin")
}

pub fn new_laptop(serial: &str) -> CreateDevice {
    CreateDevice {
        serial_number: serial.into(),
        device_type: DeviceType::Laptop,
        brand: "Dell".into(),
        model: "Latitude 5440".into(),
        hostname: Some("lt-finance-01".into()),
        inventory_code: Some("INV-0001".into()),
        location: Some("Lima".into()),
        purchase_date: None,
    }
}

pub fn new_employee(email: &str) -> CreateEmployee {
    CreateEmployee {
        full_name: "Rosa Quispe".into(),
        email: email.into(),
        department: Some("Finance".into()),
        position: Some("Analyst".into()),
        company: None,
        location: Some("Lima".into()),
    }
}

pub async fn device(store: &MemoryStore, id: EntityId) -> Option<Device> {
    let mut tx = store.begin().await.unwrap();
    tx.device(id).await.unwrap()
}

pub async fn employee(store: &MemoryStore, id: EntityId) -> Option<Employee> {
    let mut tx = store.begin().await.unwrap();
    tx.employee(id).await.unwrap()
}

pub async fn assignment(store: &MemoryStore, id: EntityId) -> Option<Assignment> {
    let mut tx = store.begin().await.unwrap();
    tx.assignment(id).await.unwrap()
}
