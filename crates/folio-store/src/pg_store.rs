//! `PostgreSQL` implementation of the `TransactionalStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::MigrateError;
use sqlx::{PgPool, Postgres};
use tracing::debug;
use uuid::Uuid;

use folio_core::error::DomainError;
use folio_core::ledger::{ConsumptionLedger, ConsumptionRecord};
use folio_core::outbox::{DeadLetter, OutboxEnvelope, OutboxRepository};
use folio_core::repository::{AggregateRecord, AggregateRepository};
use folio_core::store::{Transaction, TransactionalStore};

type EnvelopeRow = (
    Uuid,
    String,
    serde_json::Value,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
);

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// PostgreSQL-backed transactional store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns the migrator's error if a migration fails or the database has
    /// diverged from the bundled history.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        let tx = self.pool.begin().await.map_err(infrastructure)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// An open `PostgreSQL` transaction.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    async fn current_version(
        &mut self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<i64, DomainError> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM aggregates WHERE aggregate_type = $1 AND aggregate_id = $2",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?;
        Ok(version.unwrap_or(0))
    }
}

#[async_trait]
impl AggregateRepository for PgTransaction {
    async fn load_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<AggregateRecord>, DomainError> {
        let row: Option<(i64, serde_json::Value)> = sqlx::query_as(
            "SELECT version, state FROM aggregates WHERE aggregate_type = $1 AND aggregate_id = $2",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?;

        Ok(row.map(|(version, state)| AggregateRecord {
            aggregate_id,
            aggregate_type: aggregate_type.to_owned(),
            version,
            state,
        }))
    }

    async fn save_aggregate(
        &mut self,
        record: AggregateRecord,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let result = if expected_version == 0 {
            sqlx::query(
                "INSERT INTO aggregates (aggregate_type, aggregate_id, version, state) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (aggregate_type, aggregate_id) DO NOTHING",
            )
            .bind(&record.aggregate_type)
            .bind(record.aggregate_id)
            .bind(record.version)
            .bind(&record.state)
            .execute(&mut *self.tx)
            .await
        } else {
            sqlx::query(
                "UPDATE aggregates SET version = $3, state = $4, updated_at = NOW() \
                 WHERE aggregate_type = $1 AND aggregate_id = $2 AND version = $5",
            )
            .bind(&record.aggregate_type)
            .bind(record.aggregate_id)
            .bind(record.version)
            .bind(&record.state)
            .bind(expected_version)
            .execute(&mut *self.tx)
            .await
        };
        let result = result.map_err(infrastructure)?;

        if result.rows_affected() == 0 {
            let actual = self
                .current_version(&record.aggregate_type, record.aggregate_id)
                .await?;
            debug!(
                aggregate_id = %record.aggregate_id,
                expected = expected_version,
                actual,
                "aggregate version conflict"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: record.aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for PgTransaction {
    async fn insert_envelopes(&mut self, envelopes: &[OutboxEnvelope]) -> Result<(), DomainError> {
        for envelope in envelopes {
            sqlx::query(
                "INSERT INTO outbox_messages (id, event_type, content, occurred_at, processed_at, error) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(envelope.id)
            .bind(&envelope.event_type)
            .bind(&envelope.content)
            .bind(envelope.occurred_at)
            .bind(envelope.processed_at)
            .bind(&envelope.error)
            .execute(&mut *self.tx)
            .await
            .map_err(infrastructure)?;
        }
        Ok(())
    }

    async fn fetch_unprocessed(&mut self, limit: usize) -> Result<Vec<OutboxEnvelope>, DomainError> {
        let rows: Vec<EnvelopeRow> = sqlx::query_as(
            "SELECT id, event_type, content, occurred_at, processed_at, error \
             FROM outbox_messages \
             WHERE processed_at IS NULL \
             ORDER BY occurred_at, id \
             LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(infrastructure)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, event_type, content, occurred_at, processed_at, error)| OutboxEnvelope {
                    id,
                    event_type,
                    content,
                    occurred_at,
                    processed_at,
                    error,
                },
            )
            .collect())
    }

    async fn mark_processed(&mut self, envelopes: &[OutboxEnvelope]) -> Result<(), DomainError> {
        for envelope in envelopes {
            sqlx::query(
                "UPDATE outbox_messages SET processed_at = $2, error = $3 \
                 WHERE id = $1 AND processed_at IS NULL",
            )
            .bind(envelope.id)
            .bind(envelope.processed_at)
            .bind(&envelope.error)
            .execute(&mut *self.tx)
            .await
            .map_err(infrastructure)?;
        }
        Ok(())
    }

    async fn insert_dead_letter(&mut self, dead_letter: &DeadLetter) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO outbox_dead_letters (envelope_id, event_type, error, failed_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (envelope_id) DO NOTHING",
        )
        .bind(dead_letter.envelope_id)
        .bind(&dead_letter.event_type)
        .bind(&dead_letter.error)
        .bind(dead_letter.failed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }
}

#[async_trait]
impl ConsumptionLedger for PgTransaction {
    async fn consumption_exists(
        &mut self,
        event_id: Uuid,
        handler_name: &str,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM outbox_message_consumers WHERE id = $1 AND name = $2)",
        )
        .bind(event_id)
        .bind(handler_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(infrastructure)
    }

    async fn insert_consumption(&mut self, record: &ConsumptionRecord) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO outbox_message_consumers (id, name) VALUES ($1, $2)")
            .bind(record.event_id)
            .bind(&record.handler_name)
            .execute(&mut *self.tx)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(infrastructure)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(infrastructure)
    }
}
