//! SurrealDB implementation of [`InventoryStore`].
//!
//! A [`SurrealTx`] buffers its writes and records the version of every
//! entity row it reads. `commit` sends one `BEGIN TRANSACTION` block that
//! first re-checks those versions (and every revert marker it is about to
//! set), then applies the writes. A row touched by another writer in the
//! meantime aborts the whole block with `Stale`; a marker set by a
//! concurrent revert aborts it with `AlreadyReverted`.
//!
//! Writers inside one process are additionally serialized through a shared
//! lock, so optimistic aborts only happen between processes sharing a
//! database.

use std::collections::HashMap;
use std::sync::Arc;

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::assignment::Assignment;
use assetlog_core::models::canonical_timestamp;
use assetlog_core::models::device::Device;
use assetlog_core::models::employee::Employee;
use assetlog_core::models::event::{Actor, CreateEvent, EntityId, EntityType, Event, EventId};
use assetlog_core::repository::{EventFilter, InventoryStore, InventoryTx, Pagination};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use surrealdb::{Connection, Surreal};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::rows::{
    AssignmentRow, CounterRow, DeviceRow, EmployeeRow, EventRow, Versioned, to_millis,
};
use crate::error::DbError;

const STALE_MARKER: &str = "assetlog-stale:";
const REVERTED_MARKER: &str = "assetlog-reverted:";

const SELECT_DEVICE_BY_SERIAL: &str =
    "SELECT meta::id(id) AS record_id, * FROM device WHERE serial_number = $value";
const SELECT_EMPLOYEE_BY_EMAIL: &str =
    "SELECT meta::id(id) AS record_id, * FROM employee WHERE email = $value";
const SELECT_ASSIGNMENTS_BY_DEVICE: &str =
    "SELECT meta::id(id) AS record_id, * FROM assignment WHERE device_id = $value";
const SELECT_ASSIGNMENTS_BY_EMPLOYEE: &str =
    "SELECT meta::id(id) AS record_id, * FROM assignment WHERE employee_id = $value";

pub struct SurrealStore<C: Connection> {
    db: Surreal<C>,
    writer: Arc<Mutex<()>>,
}

impl<C: Connection> Clone for SurrealStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<C: Connection> SurrealStore<C> {
    /// Wrap a connected client. The schema must already be migrated.
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            writer: Arc::new(Mutex::new(())),
        }
    }
}

async fn fetch_event<C: Connection>(db: &Surreal<C>, id: EventId) -> AuditResult<Option<Event>> {
    let mut result = db
        .query("SELECT * FROM type::thing('audit_event', $id)")
        .bind(("id", id))
        .await
        .map_err(DbError::from)?;
    let rows: Vec<EventRow> = result.take(0).map_err(DbError::from)?;
    Ok(rows
        .into_iter()
        .next()
        .map(EventRow::into_event)
        .transpose()?)
}

impl<C: Connection> InventoryStore for SurrealStore<C> {
    type Tx = SurrealTx<C>;

    async fn begin(&self) -> AuditResult<SurrealTx<C>> {
        let writer = self.writer.clone().lock_owned().await;
        Ok(SurrealTx {
            db: self.db.clone(),
            _writer: writer,
            observed: HashMap::new(),
            staged: HashMap::new(),
            appended: Vec::new(),
            marks: Vec::new(),
        })
    }

    async fn get_event(&self, id: EventId) -> AuditResult<Event> {
        fetch_event(&self.db, id)
            .await?
            .ok_or_else(|| AuditError::not_found("event", id))
    }

    async fn list_events(
        &self,
        filter: EventFilter,
        pagination: Pagination,
    ) -> AuditResult<Vec<Event>> {
        let mut conditions = Vec::new();
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.entity_type.is_some() {
            conditions.push("entity_type = $entity_type");
        }
        match &filter.actor {
            Some(Actor::System) => conditions.push("actor = NONE"),
            Some(Actor::User(_)) => conditions.push("actor = $actor"),
            None => {}
        }
        if filter.from.is_some() {
            conditions.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conditions.push("timestamp <= $to");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM audit_event{where_clause} ORDER BY seq DESC LIMIT $limit START $offset"
        );

        let mut query = self
            .db
            .query(sql)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(action) = filter.action {
            query = query.bind(("action", action.as_str()));
        }
        if let Some(entity_type) = filter.entity_type {
            query = query.bind(("entity_type", entity_type.as_str()));
        }
        if let Some(Actor::User(name)) = filter.actor {
            query = query.bind(("actor", name));
        }
        if let Some(from) = filter.from {
            query = query.bind(("from", to_millis(from)));
        }
        if let Some(to) = filter.to {
            query = query.bind(("to", to_millis(to)));
        }

        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<EventRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|r| r.into_event().map_err(AuditError::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RecordKey {
    entity_type: EntityType,
    id: EntityId,
}

impl RecordKey {
    fn new(entity_type: EntityType, id: EntityId) -> Self {
        Self { entity_type, id }
    }

    fn table(&self) -> &'static str {
        self.entity_type.as_str()
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Device(Device),
    Employee(Employee),
    Assignment(Assignment),
}

#[derive(Debug)]
struct Mark {
    event_id: EventId,
    by: Actor,
    at: DateTime<Utc>,
}

pub struct SurrealTx<C: Connection> {
    db: Surreal<C>,
    _writer: OwnedMutexGuard<()>,
    /// Version of each entity row as first read; `None` means absent.
    observed: HashMap<RecordKey, Option<i64>>,
    /// Pending entity writes; `None` is a delete.
    staged: HashMap<RecordKey, Option<Staged>>,
    appended: Vec<Event>,
    marks: Vec<Mark>,
}

impl<C: Connection> SurrealTx<C> {
    fn observe(&mut self, key: RecordKey, version: Option<i64>) {
        self.observed.entry(key).or_insert(version);
    }

    async fn next_counter(&self, name: &'static str) -> AuditResult<i64> {
        let mut result = self
            .db
            .query("UPDATE type::thing('counter', $name) SET last_id += 1")
            .bind(("name", name))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CounterRow> = result.take(0).map_err(DbError::from)?;
        rows.first().map(|r| r.last_id).ok_or_else(|| {
            DbError::NotFound {
                entity: "counter".into(),
                id: name.into(),
            }
            .into()
        })
    }

    async fn select<R, V>(&self, sql: &'static str, value: V) -> AuditResult<Vec<R>>
    where
        R: DeserializeOwned,
        V: Serialize + 'static,
    {
        let mut result = self
            .db
            .query(sql)
            .bind(("value", value))
            .await
            .map_err(DbError::from)?;
        Ok(result.take(0).map_err(DbError::from)?)
    }

    /// Read one entity row straight from the database, recording its version.
    async fn fetch<R>(&mut self, key: RecordKey) -> AuditResult<Option<R>>
    where
        R: DeserializeOwned + Versioned,
    {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::thing($table, $id)")
            .bind(("table", key.table()))
            .bind(("id", key.id))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<R> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next();
        self.observe(key, row.as_ref().map(Versioned::version));
        Ok(row)
    }

    /// Make sure a row about to be written has a recorded base version.
    async fn ensure_observed(&mut self, key: RecordKey) -> AuditResult<()> {
        if self.observed.contains_key(&key) {
            return Ok(());
        }
        let mut result = self
            .db
            .query("SELECT VALUE version FROM type::thing($table, $id)")
            .bind(("table", key.table()))
            .bind(("id", key.id))
            .await
            .map_err(DbError::from)?;
        let versions: Vec<i64> = result.take(0).map_err(DbError::from)?;
        self.observe(key, versions.first().copied());
        Ok(())
    }

    fn staged_assignments(&self, predicate: impl Fn(&Assignment) -> bool) -> Vec<Assignment> {
        self.staged
            .values()
            .filter_map(|s| match s {
                Some(Staged::Assignment(a)) if predicate(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    fn merge_assignments(
        &mut self,
        rows: Vec<AssignmentRow>,
        predicate: impl Fn(&Assignment) -> bool,
    ) -> AuditResult<Vec<Assignment>> {
        let mut merged = Vec::with_capacity(rows.len());
        for row in rows {
            let key = RecordKey::new(EntityType::Assignment, row.record_id);
            self.observe(key, Some(row.version));
            if !self.staged.contains_key(&key) {
                merged.push(row.into_assignment()?);
            }
        }
        merged.extend(self.staged_assignments(predicate));
        merged.sort_by_key(|a| a.id);
        Ok(merged)
    }

    async fn stage(&mut self, key: RecordKey, value: Option<Staged>) -> AuditResult<()> {
        self.ensure_observed(key).await?;
        self.staged.insert(key, value);
        Ok(())
    }

    fn staged_entry(&self, key: &RecordKey) -> Option<&Option<Staged>> {
        self.staged.get(key)
    }
}

impl<C: Connection> InventoryTx for SurrealTx<C> {
    async fn allocate_id(&mut self, entity_type: EntityType) -> AuditResult<EntityId> {
        self.next_counter(entity_type.as_str()).await
    }

    async fn device(&mut self, id: EntityId) -> AuditResult<Option<Device>> {
        let key = RecordKey::new(EntityType::Device, id);
        if let Some(staged) = self.staged_entry(&key) {
            return Ok(match staged {
                Some(Staged::Device(d)) => Some(d.clone()),
                _ => None,
            });
        }
        let row: Option<DeviceRow> = self.fetch(key).await?;
        Ok(row.map(DeviceRow::into_device).transpose()?)
    }

    async fn device_by_serial(&mut self, serial_number: &str) -> AuditResult<Option<Device>> {
        let staged = self.staged.values().find_map(|s| match s {
            Some(Staged::Device(d)) if d.serial_number == serial_number => Some(d.clone()),
            _ => None,
        });
        if staged.is_some() {
            return Ok(staged);
        }
        let rows: Vec<DeviceRow> = self
            .select(SELECT_DEVICE_BY_SERIAL, serial_number.to_string())
            .await?;
        for row in rows {
            let key = RecordKey::new(EntityType::Device, row.record_id);
            self.observe(key, Some(row.version));
            if !self.staged.contains_key(&key) {
                return Ok(Some(row.into_device()?));
            }
        }
        Ok(None)
    }

    async fn put_device(&mut self, device: Device) -> AuditResult<()> {
        let key = RecordKey::new(EntityType::Device, device.id);
        self.stage(key, Some(Staged::Device(device))).await
    }

    async fn delete_device(&mut self, id: EntityId) -> AuditResult<()> {
        self.stage(RecordKey::new(EntityType::Device, id), None).await
    }

    async fn employee(&mut self, id: EntityId) -> AuditResult<Option<Employee>> {
        let key = RecordKey::new(EntityType::Employee, id);
        if let Some(staged) = self.staged_entry(&key) {
            return Ok(match staged {
                Some(Staged::Employee(e)) => Some(e.clone()),
                _ => None,
            });
        }
        let row: Option<EmployeeRow> = self.fetch(key).await?;
        Ok(row.map(EmployeeRow::into_employee))
    }

    async fn employee_by_email(&mut self, email: &str) -> AuditResult<Option<Employee>> {
        let staged = self.staged.values().find_map(|s| match s {
            Some(Staged::Employee(e)) if e.email == email => Some(e.clone()),
            _ => None,
        });
        if staged.is_some() {
            return Ok(staged);
        }
        let rows: Vec<EmployeeRow> = self
            .select(SELECT_EMPLOYEE_BY_EMAIL, email.to_string())
            .await?;
        for row in rows {
            let key = RecordKey::new(EntityType::Employee, row.record_id);
            self.observe(key, Some(row.version));
            if !self.staged.contains_key(&key) {
                return Ok(Some(row.into_employee()));
            }
        }
        Ok(None)
    }

    async fn put_employee(&mut self, employee: Employee) -> AuditResult<()> {
        let key = RecordKey::new(EntityType::Employee, employee.id);
        self.stage(key, Some(Staged::Employee(employee))).await
    }

    async fn delete_employee(&mut self, id: EntityId) -> AuditResult<()> {
        self.stage(RecordKey::new(EntityType::Employee, id), None).await
    }

    async fn assignment(&mut self, id: EntityId) -> AuditResult<Option<Assignment>> {
        let key = RecordKey::new(EntityType::Assignment, id);
        if let Some(staged) = self.staged_entry(&key) {
            return Ok(match staged {
                Some(Staged::Assignment(a)) => Some(a.clone()),
                _ => None,
            });
        }
        let row: Option<AssignmentRow> = self.fetch(key).await?;
        Ok(row.map(AssignmentRow::into_assignment).transpose()?)
    }

    async fn assignments_for_device(&mut self, device_id: EntityId) -> AuditResult<Vec<Assignment>> {
        let rows: Vec<AssignmentRow> = self.select(SELECT_ASSIGNMENTS_BY_DEVICE, device_id).await?;
        self.merge_assignments(rows, |a| a.device_id == device_id)
    }

    async fn assignments_for_employee(
        &mut self,
        employee_id: EntityId,
    ) -> AuditResult<Vec<Assignment>> {
        let rows: Vec<AssignmentRow> = self
            .select(SELECT_ASSIGNMENTS_BY_EMPLOYEE, employee_id)
            .await?;
        self.merge_assignments(rows, |a| a.employee_id == employee_id)
    }

    async fn put_assignment(&mut self, assignment: Assignment) -> AuditResult<()> {
        let key = RecordKey::new(EntityType::Assignment, assignment.id);
        self.stage(key, Some(Staged::Assignment(assignment))).await
    }

    async fn delete_assignment(&mut self, id: EntityId) -> AuditResult<()> {
        self.stage(RecordKey::new(EntityType::Assignment, id), None)
            .await
    }

    async fn event(&mut self, id: EventId) -> AuditResult<Option<Event>> {
        if let Some(event) = self.appended.iter().find(|e| e.id == id) {
            return Ok(Some(event.clone()));
        }
        let mut event = fetch_event(&self.db, id).await?;
        if let (Some(event), Some(mark)) = (
            event.as_mut(),
            self.marks.iter().find(|m| m.event_id == id),
        ) {
            event.reverted_at = Some(mark.at);
            event.reverted_by = Some(mark.by.clone());
        }
        Ok(event)
    }

    async fn append_event(&mut self, mut input: CreateEvent) -> AuditResult<Event> {
        input.validate()?;
        input.timestamp = canonical_timestamp(input.timestamp);
        let id = self.next_counter("audit_event").await?;
        let event = input.into_event(id);
        self.appended.push(event.clone());
        Ok(event)
    }

    async fn mark_reverted(&mut self, id: EventId, by: Actor, at: DateTime<Utc>) -> AuditResult<()> {
        let at = canonical_timestamp(at);
        if let Some(event) = self.appended.iter_mut().find(|e| e.id == id) {
            if event.reverted_at.is_some() {
                return Err(AuditError::AlreadyReverted { event_id: id });
            }
            event.reverted_at = Some(at);
            event.reverted_by = Some(by);
            return Ok(());
        }
        let event = self
            .event(id)
            .await?
            .ok_or_else(|| AuditError::not_found("event", id))?;
        if event.reverted_at.is_some() {
            return Err(AuditError::AlreadyReverted { event_id: id });
        }
        self.marks.push(Mark {
            event_id: id,
            by,
            at,
        });
        Ok(())
    }

    async fn commit(self) -> AuditResult<()> {
        if self.staged.is_empty() && self.appended.is_empty() && self.marks.is_empty() {
            return Ok(());
        }
        let script = CommitScript::build(&self)?;
        let statements = script.sql.lines().count();

        let mut query = self.db.query(script.sql);
        for (name, value) in script.params {
            query = query.bind((name, value));
        }
        let mut response = query.await.map_err(DbError::from)?;
        let errors = response.take_errors();
        if errors.is_empty() {
            debug!(
                statements,
                events = self.appended.len(),
                marks = self.marks.len(),
                "Committed transaction"
            );
            return Ok(());
        }

        let mut messages: Vec<(usize, String)> = errors
            .into_iter()
            .map(|(index, err)| (index, err.to_string()))
            .collect();
        messages.sort_by_key(|(index, _)| *index);
        let err = classify_failure(&messages);
        warn!(error = %err, "Transaction aborted");
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Commit script
// ---------------------------------------------------------------------------

/// Owned bind values; untagged so each serializes as its inner value.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Param {
    Id(i64),
    Version(Option<i64>),
    Text(Option<String>),
    Device(DeviceRow),
    Employee(EmployeeRow),
    Assignment(AssignmentRow),
    Event(EventRow),
}

#[derive(Default)]
struct CommitScript {
    sql: String,
    params: Vec<(String, Param)>,
}

impl CommitScript {
    fn bind(&mut self, name: String, value: Param) -> String {
        let placeholder = format!("${name}");
        self.params.push((name, value));
        placeholder
    }

    fn line(&mut self, statement: &str) {
        self.sql.push_str(statement);
        self.sql.push('\n');
    }

    fn build<C: Connection>(tx: &SurrealTx<C>) -> AuditResult<Self> {
        let mut script = Self::default();
        script.line("BEGIN TRANSACTION;");

        let mut guards: Vec<(&RecordKey, &Option<i64>)> = tx.observed.iter().collect();
        guards.sort_by_key(|(key, _)| (key.table(), key.id));
        for (i, (key, version)) in guards.into_iter().enumerate() {
            let id = script.bind(format!("g{i}_id"), Param::Id(key.id));
            let expected = script.bind(format!("g{i}_v"), Param::Version(*version));
            let table = key.table();
            script.line(&format!(
                "IF (SELECT VALUE version FROM type::thing('{table}', {id}))[0] != {expected} \
                 {{ THROW \"{STALE_MARKER}{table}:{}\"; }};",
                key.id
            ));
        }

        let mut writes: Vec<(&RecordKey, &Option<Staged>)> = tx.staged.iter().collect();
        writes.sort_by_key(|(key, _)| (key.table(), key.id));
        for (i, (key, staged)) in writes.into_iter().enumerate() {
            let id = script.bind(format!("w{i}_id"), Param::Id(key.id));
            let table = key.table();
            let version = tx.observed.get(key).copied().flatten().unwrap_or(0) + 1;
            let row = match staged {
                None => {
                    script.line(&format!("DELETE type::thing('{table}', {id});"));
                    continue;
                }
                Some(Staged::Device(d)) => Param::Device(DeviceRow::from_device(d, version)),
                Some(Staged::Employee(e)) => {
                    Param::Employee(EmployeeRow::from_employee(e, version))
                }
                Some(Staged::Assignment(a)) => {
                    Param::Assignment(AssignmentRow::from_assignment(a, version))
                }
            };
            let content = script.bind(format!("w{i}"), row);
            script.line(&format!(
                "UPSERT type::thing('{table}', {id}) CONTENT {content};"
            ));
        }

        for (i, event) in tx.appended.iter().enumerate() {
            let id = script.bind(format!("e{i}_id"), Param::Id(event.id));
            let content = script.bind(format!("e{i}"), Param::Event(EventRow::from_event(event)?));
            script.line(&format!(
                "CREATE type::thing('audit_event', {id}) CONTENT {content};"
            ));
        }

        for (i, mark) in tx.marks.iter().enumerate() {
            let id = script.bind(format!("m{i}_id"), Param::Id(mark.event_id));
            let at = script.bind(format!("m{i}_at"), Param::Id(to_millis(mark.at)));
            let by = script.bind(format!("m{i}_by"), Param::Text(mark.by.clone().into()));
            script.line(&format!(
                "IF (SELECT VALUE reverted_at FROM type::thing('audit_event', {id}))[0] != NONE \
                 {{ THROW \"{REVERTED_MARKER}{}\"; }};",
                mark.event_id
            ));
            script.line(&format!(
                "UPDATE type::thing('audit_event', {id}) SET reverted_at = {at}, reverted_by = {by};"
            ));
        }

        script.line("COMMIT TRANSACTION;");
        Ok(script)
    }
}

fn marker_payload<'a>(message: &'a str, marker: &str) -> Option<&'a str> {
    let start = message.find(marker)? + marker.len();
    let rest = &message[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '-'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_stale(payload: &str) -> Option<AuditError> {
    let (table, id) = payload.split_once(':')?;
    Some(AuditError::Stale {
        entity_type: table.parse().ok()?,
        entity_id: id.parse().ok()?,
    })
}

/// Turn the per-statement errors of an aborted commit into the most
/// specific domain error.
fn classify_failure(messages: &[(usize, String)]) -> AuditError {
    for (_, message) in messages {
        if let Some(err) = marker_payload(message, STALE_MARKER).and_then(parse_stale) {
            return err;
        }
        if let Some(event_id) =
            marker_payload(message, REVERTED_MARKER).and_then(|p| p.parse().ok())
        {
            return AuditError::AlreadyReverted { event_id };
        }
        if message.contains("already contains") {
            return AuditError::conflict(message.clone());
        }
    }
    let primary = messages
        .iter()
        .find(|(_, m)| !m.contains("failed transaction"))
        .or_else(|| messages.first())
        .map(|(_, m)| m.clone())
        .unwrap_or_else(|| "transaction failed".into());
    AuditError::Store(primary)
}
