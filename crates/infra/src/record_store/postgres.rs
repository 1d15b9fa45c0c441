//! Postgres-backed record store implementation.
//!
//! Persists inventory records in a single `inventory_records` table, with
//! natural-key uniqueness and the quantity invariants enforced at the
//! database level. The revision guard on `save` becomes a conditional
//! `UPDATE ... WHERE id = $1 AND revision = $n`, so the compare-and-swap is a
//! single statement with no transaction bookkeeping.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `RecordStoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | RecordStoreError | Scenario |
//! |------------|----------------------|------------------|----------|
//! | Database (unique violation) | `23505` | `DuplicateRecord` | Natural key already tracked |
//! | Database (check constraint violation) | `23514` | `Storage` | Quantity invariant violated at the database |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! A conditional UPDATE that matches zero rows is disambiguated by a
//! follow-up existence check: the record is either gone (`NotFound`) or its
//! revision moved (`Concurrency`).
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE inventory_records (
//!     id                UUID PRIMARY KEY,
//!     product_id        UUID NOT NULL,
//!     variant_id        UUID,
//!     location_id       UUID,
//!     total_quantity    BIGINT NOT NULL CHECK (total_quantity >= 0),
//!     reserved_quantity BIGINT NOT NULL
//!         CHECK (reserved_quantity >= 0 AND reserved_quantity <= total_quantity),
//!     reorder_level     BIGINT NOT NULL CHECK (reorder_level >= 0),
//!     max_level         BIGINT,
//!     last_restocked_at TIMESTAMPTZ,
//!     last_updated_at   TIMESTAMPTZ NOT NULL,
//!     updated_by        UUID,
//!     revision          BIGINT NOT NULL CHECK (revision > 0)
//! );
//!
//! CREATE UNIQUE INDEX inventory_records_natural_key ON inventory_records (
//!     product_id,
//!     COALESCE(variant_id, '00000000-0000-0000-0000-000000000000'),
//!     COALESCE(location_id, '00000000-0000-0000-0000-000000000000')
//! );
//! ```
//!
//! ## Thread Safety
//!
//! `PostgresRecordStore` is `Send + Sync` and can be shared across threads.
//! All operations use the SQLx connection pool which handles thread-safe
//! connection management.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use std::sync::Arc;
use tracing::{Span, instrument};

use stockledger_core::{ActorId, ExpectedRevision, LocationId, ProductId, RecordId, VariantId};
use stockledger_inventory::{InventoryRecord, NaturalKey};

use super::r#trait::{RecordStore, RecordStoreError};

const SELECT_COLUMNS: &str = r#"
    id,
    product_id,
    variant_id,
    location_id,
    total_quantity,
    reserved_quantity,
    reorder_level,
    max_level,
    last_restocked_at,
    last_updated_at,
    updated_by,
    revision
"#;

/// Postgres-backed inventory record store.
///
/// ## Optimistic Concurrency
///
/// `save` issues a single conditional UPDATE: the revision check and the
/// write happen in one statement, so two concurrent committers holding the
/// same revision token cannot both succeed. The store bumps `revision` in
/// the same statement (`revision = revision + 1`), keeping revision
/// assignment out of application code.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: Arc<PgPool>,
}

impl PostgresRecordStore {
    /// Create a new PostgresRecordStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, record), fields(record_id = %record.id.as_uuid()), err)]
    pub async fn insert_record(
        &self,
        record: InventoryRecord,
    ) -> Result<InventoryRecord, RecordStoreError> {
        check_invariants(&record)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO inventory_records (
                id,
                product_id,
                variant_id,
                location_id,
                total_quantity,
                reserved_quantity,
                reorder_level,
                max_level,
                last_restocked_at,
                last_updated_at,
                updated_by,
                revision
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(record.id.as_uuid())
        .bind(record.key.product_id.as_uuid())
        .bind(record.key.variant_id.map(|v| *v.as_uuid()))
        .bind(record.key.location_id.map(|l| *l.as_uuid()))
        .bind(record.total_quantity)
        .bind(record.reserved_quantity)
        .bind(record.reorder_level)
        .bind(record.max_level)
        .bind(record.last_restocked_at)
        .bind(record.last_updated_at)
        .bind(record.updated_by.map(|a| *a.as_uuid()))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RecordStoreError::DuplicateRecord(record.key)
            } else {
                map_sqlx_error("insert_record", e)
            }
        })?;

        row_to_record(&row)
    }

    #[instrument(skip(self), fields(record_id = %id.as_uuid()), err)]
    pub async fn get_record(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM inventory_records WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_record", e))?
        .ok_or(RecordStoreError::NotFound)?;

        row_to_record(&row)
    }

    #[instrument(skip(self, key), fields(key = %key), err)]
    pub async fn get_record_by_key(
        &self,
        key: &NaturalKey,
    ) -> Result<InventoryRecord, RecordStoreError> {
        // IS NOT DISTINCT FROM treats NULL variant/location as equal values,
        // matching the unique index on the natural key.
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM inventory_records
            WHERE product_id = $1
              AND variant_id IS NOT DISTINCT FROM $2
              AND location_id IS NOT DISTINCT FROM $3
            "#
        ))
        .bind(key.product_id.as_uuid())
        .bind(key.variant_id.map(|v| *v.as_uuid()))
        .bind(key.location_id.map(|l| *l.as_uuid()))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_record_by_key", e))?
        .ok_or(RecordStoreError::NotFound)?;

        row_to_record(&row)
    }

    #[instrument(skip(self), err)]
    pub async fn list_records(&self) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM inventory_records ORDER BY last_updated_at DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_records", e))?;

        rows.iter().map(row_to_record).collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id.as_uuid()), err)]
    pub async fn list_records_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM inventory_records WHERE product_id = $1"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_records_by_product", e))?;

        rows.iter().map(row_to_record).collect()
    }

    #[instrument(skip(self), fields(location_id = %location_id.as_uuid()), err)]
    pub async fn list_records_by_location(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM inventory_records WHERE location_id = $1"
        ))
        .bind(location_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_records_by_location", e))?;

        rows.iter().map(row_to_record).collect()
    }

    #[instrument(
        skip(self, record),
        fields(record_id = %record.id.as_uuid(), expected = ?expected),
        err
    )]
    pub async fn save_record(
        &self,
        record: InventoryRecord,
        expected: ExpectedRevision,
    ) -> Result<InventoryRecord, RecordStoreError> {
        check_invariants(&record)?;

        let span = Span::current();

        let guard = match expected {
            ExpectedRevision::Any => None,
            ExpectedRevision::Exact(r) => Some(r as i64),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE inventory_records
            SET total_quantity = $2,
                reserved_quantity = $3,
                reorder_level = $4,
                max_level = $5,
                last_restocked_at = $6,
                last_updated_at = $7,
                updated_by = $8,
                revision = revision + 1
            WHERE id = $1
              AND ($9::bigint IS NULL OR revision = $9)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(record.id.as_uuid())
        .bind(record.total_quantity)
        .bind(record.reserved_quantity)
        .bind(record.reorder_level)
        .bind(record.max_level)
        .bind(record.last_restocked_at)
        .bind(record.last_updated_at)
        .bind(record.updated_by.map(|a| *a.as_uuid()))
        .bind(guard)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_record", e))?;

        match row {
            Some(row) => {
                let committed = row_to_record(&row)?;
                span.record("revision", committed.revision);
                Ok(committed)
            }
            None => {
                // The update matched nothing: either the record is gone or
                // another committer moved the revision.
                let current = sqlx::query(
                    "SELECT revision FROM inventory_records WHERE id = $1",
                )
                .bind(record.id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("save_record", e))?;

                match current {
                    Some(row) => {
                        let found: i64 = row
                            .try_get("revision")
                            .map_err(|e| RecordStoreError::Storage(e.to_string()))?;
                        Err(RecordStoreError::Concurrency(format!(
                            "expected {expected:?}, found {found}"
                        )))
                    }
                    None => Err(RecordStoreError::NotFound),
                }
            }
        }
    }

    #[instrument(skip(self), fields(record_id = %id.as_uuid()), err)]
    pub async fn remove_record(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        let row = sqlx::query(&format!(
            r#"
            DELETE FROM inventory_records
            WHERE id = $1 AND reserved_quantity = 0
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_record", e))?;

        match row {
            Some(row) => row_to_record(&row),
            None => {
                let current = sqlx::query(
                    "SELECT reserved_quantity FROM inventory_records WHERE id = $1",
                )
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("remove_record", e))?;

                match current {
                    Some(row) => {
                        let reserved: i64 = row
                            .try_get("reserved_quantity")
                            .map_err(|e| RecordStoreError::Storage(e.to_string()))?;
                        Err(RecordStoreError::ReservedStock { reserved })
                    }
                    None => Err(RecordStoreError::NotFound),
                }
            }
        }
    }
}

fn check_invariants(record: &InventoryRecord) -> Result<(), RecordStoreError> {
    record
        .check_invariants()
        .map_err(|e| RecordStoreError::Storage(format!("refusing to commit invalid record: {e}")))
}

/// Map SQLx errors to RecordStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RecordStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation surfaces as a concurrent insert of the
                // same natural key.
                Some("23505") => RecordStoreError::Concurrency(msg),
                _ => RecordStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RecordStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => RecordStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row type

#[derive(Debug)]
struct RecordRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    variant_id: Option<uuid::Uuid>,
    location_id: Option<uuid::Uuid>,
    total_quantity: i64,
    reserved_quantity: i64,
    reorder_level: i64,
    max_level: Option<i64>,
    last_restocked_at: Option<DateTime<Utc>>,
    last_updated_at: DateTime<Utc>,
    updated_by: Option<uuid::Uuid>,
    revision: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for RecordRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(RecordRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            variant_id: row.try_get("variant_id")?,
            location_id: row.try_get("location_id")?,
            total_quantity: row.try_get("total_quantity")?,
            reserved_quantity: row.try_get("reserved_quantity")?,
            reorder_level: row.try_get("reorder_level")?,
            max_level: row.try_get("max_level")?,
            last_restocked_at: row.try_get("last_restocked_at")?,
            last_updated_at: row.try_get("last_updated_at")?,
            updated_by: row.try_get("updated_by")?,
            revision: row.try_get("revision")?,
        })
    }
}

impl From<RecordRow> for InventoryRecord {
    fn from(row: RecordRow) -> Self {
        let mut key = NaturalKey::product(ProductId::from_uuid(row.product_id));
        if let Some(v) = row.variant_id {
            key = key.with_variant(VariantId::from_uuid(v));
        }
        if let Some(l) = row.location_id {
            key = key.with_location(LocationId::from_uuid(l));
        }

        InventoryRecord {
            id: RecordId::from_uuid(row.id),
            key,
            total_quantity: row.total_quantity,
            reserved_quantity: row.reserved_quantity,
            reorder_level: row.reorder_level,
            max_level: row.max_level,
            last_restocked_at: row.last_restocked_at,
            last_updated_at: row.last_updated_at,
            updated_by: row.updated_by.map(ActorId::from_uuid),
            revision: row.revision as u64,
        }
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<InventoryRecord, RecordStoreError> {
    let parsed = RecordRow::from_row(row)
        .map_err(|e| RecordStoreError::Storage(format!("failed to deserialize record row: {e}")))?;
    Ok(parsed.into())
}

// Implement RecordStore trait.
//
// The RecordStore trait is synchronous, but Postgres operations require
// async. tokio::runtime::Handle runs the async code in a sync context, which
// works when called from within a tokio runtime.

fn runtime_handle() -> Result<tokio::runtime::Handle, RecordStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        RecordStoreError::Storage(
            "PostgresRecordStore requires async runtime (tokio). Ensure you're calling from within a tokio runtime context.".to_string(),
        )
    })
}

impl RecordStore for PostgresRecordStore {
    fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, RecordStoreError> {
        runtime_handle()?.block_on(self.insert_record(record))
    }

    fn get(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        runtime_handle()?.block_on(self.get_record(id))
    }

    fn get_by_key(&self, key: &NaturalKey) -> Result<InventoryRecord, RecordStoreError> {
        runtime_handle()?.block_on(self.get_record_by_key(key))
    }

    fn list_all(&self) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        runtime_handle()?.block_on(self.list_records())
    }

    fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        runtime_handle()?.block_on(self.list_records_by_product(product_id))
    }

    fn list_by_location(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<InventoryRecord>, RecordStoreError> {
        runtime_handle()?.block_on(self.list_records_by_location(location_id))
    }

    fn save(
        &self,
        record: InventoryRecord,
        expected: ExpectedRevision,
    ) -> Result<InventoryRecord, RecordStoreError> {
        runtime_handle()?.block_on(self.save_record(record, expected))
    }

    fn remove(&self, id: RecordId) -> Result<InventoryRecord, RecordStoreError> {
        runtime_handle()?.block_on(self.remove_record(id))
    }
}
