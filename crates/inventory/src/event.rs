//! Change events emitted after committed mutations.
//!
//! One primary event per commit, plus a threshold event when the commit
//! degrades the record's classification. Publication is best-effort and
//! happens strictly after the store commit; the mutation is the source of
//! truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, RecordId, ValueObject};
use stockledger_events::Event;

use crate::record::{InventoryRecord, NaturalKey};
use crate::status::StockStatus;

/// Snapshot of a record's counters at a point in time.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub total: i64,
    pub reserved: i64,
}

impl StockLevels {
    pub fn available(&self) -> i64 {
        self.total - self.reserved
    }
}

impl From<&InventoryRecord> for StockLevels {
    fn from(record: &InventoryRecord) -> Self {
        Self {
            total: record.total_quantity,
            reserved: record.reserved_quantity,
        }
    }
}

impl ValueObject for StockLevels {}

/// What happened to the record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    StockUpdated,
    Reserved,
    Released,
    Fulfilled,
    Restocked,
    LowStock,
    OutOfStock,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Created => "inventory.record.created",
            ChangeKind::StockUpdated => "inventory.record.stock_updated",
            ChangeKind::Reserved => "inventory.record.reserved",
            ChangeKind::Released => "inventory.record.released",
            ChangeKind::Fulfilled => "inventory.record.fulfilled",
            ChangeKind::Restocked => "inventory.record.restocked",
            ChangeKind::LowStock => "inventory.record.low_stock",
            ChangeKind::OutOfStock => "inventory.record.out_of_stock",
            ChangeKind::Deleted => "inventory.record.deleted",
        }
    }
}

/// Event payload: one accepted mutation of one inventory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record_id: RecordId,
    pub key: NaturalKey,
    pub previous: StockLevels,
    pub current: StockLevels,
    pub actor: Option<ActorId>,
    /// Record revision the mutation committed at.
    pub revision: u64,
    pub occurred_at: DateTime<Utc>,
}

impl Event for ChangeEvent {
    fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl ChangeEvent {
    fn build(
        kind: ChangeKind,
        previous: StockLevels,
        committed: &InventoryRecord,
        current: StockLevels,
    ) -> Self {
        Self {
            kind,
            record_id: committed.id,
            key: committed.key,
            previous,
            current,
            actor: committed.updated_by,
            revision: committed.revision,
            occurred_at: committed.last_updated_at,
        }
    }

    /// Events for a committed transition: the primary event, plus a
    /// `LowStock`/`OutOfStock` event when the classification changed and the
    /// new classification warrants an alert.
    pub fn for_transition(
        kind: ChangeKind,
        previous: &InventoryRecord,
        committed: &InventoryRecord,
    ) -> Vec<Self> {
        let prev_levels = StockLevels::from(previous);
        let cur_levels = StockLevels::from(committed);

        let mut events = vec![Self::build(kind, prev_levels, committed, cur_levels)];

        let prev_status = StockStatus::classify(previous);
        if let Some(alert) = threshold_alert(prev_status, committed) {
            events.push(Self::build(alert, prev_levels, committed, cur_levels));
        }
        events
    }

    /// Events for a freshly inserted record.
    pub fn for_created(committed: &InventoryRecord) -> Vec<Self> {
        let cur_levels = StockLevels::from(committed);
        let mut events = vec![Self::build(
            ChangeKind::Created,
            StockLevels::default(),
            committed,
            cur_levels,
        )];

        // A record born at or below its threshold is announced immediately.
        if let Some(alert) = threshold_alert(StockStatus::Ok, committed) {
            events.push(Self::build(alert, StockLevels::default(), committed, cur_levels));
        }
        events
    }

    /// Event for a removed record.
    pub fn for_deleted(removed: &InventoryRecord, actor: Option<ActorId>, now: DateTime<Utc>) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            record_id: removed.id,
            key: removed.key,
            previous: StockLevels::from(removed),
            current: StockLevels::default(),
            actor,
            revision: removed.revision,
            occurred_at: now,
        }
    }
}

fn threshold_alert(previous: StockStatus, committed: &InventoryRecord) -> Option<ChangeKind> {
    let current = StockStatus::classify(committed);
    if current == previous {
        return None;
    }
    match current {
        StockStatus::OutOfStock => Some(ChangeKind::OutOfStock),
        StockStatus::LowStock => Some(ChangeKind::LowStock),
        StockStatus::Ok => None,
    }
}
