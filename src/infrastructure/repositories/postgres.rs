use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use crate::domain::{
    errors::LedgerError,
    models::{
        Channel, DeliveryRecord, DeliveryStats, DeliveryStatus, EnvelopeType, ErrorClass,
    },
    repositories::{CreditLedger, DeliveryRecordRepository},
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresCreditLedger {
    pool: PgPool,
}

impl PostgresCreditLedger {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    async fn reserve(&self, sender_id: &str, units: u64) -> Result<u64, LedgerError> {
        let requested = i64::try_from(units)
            .map_err(|_| anyhow::anyhow!("requested units {units} out of range"))?;

        // Single conditional update so concurrent reservations cannot overdraw.
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE sender_credits
            SET balance = balance - $2,
                updated_at = NOW()
            WHERE sender_id = $1
              AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(sender_id)
        .bind(requested)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        match balance {
            Some(balance) => Ok(balance.max(0) as u64),
            None => Err(LedgerError::InsufficientCredits {
                balance: self.balance(sender_id).await?,
                requested: units,
            }),
        }
    }

    async fn balance(&self, sender_id: &str) -> anyhow::Result<u64> {
        let balance: Option<i64> =
            sqlx::query_scalar(r#"SELECT balance FROM sender_credits WHERE sender_id = $1"#)
                .bind(sender_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(balance.unwrap_or(0).max(0) as u64)
    }

    async fn top_up(&self, sender_id: &str, units: u64) -> anyhow::Result<u64> {
        let units = i64::try_from(units)?;
        let balance: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sender_credits (sender_id, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (sender_id) DO UPDATE
            SET balance = sender_credits.balance + EXCLUDED.balance,
                updated_at = EXCLUDED.updated_at
            RETURNING balance
            "#,
        )
        .bind(sender_id)
        .bind(units)
        .fetch_one(&self.pool)
        .await?;
        Ok(balance.max(0) as u64)
    }
}

#[derive(Clone)]
pub struct PostgresDeliveryRecordRepository {
    pool: PgPool,
}

impl PostgresDeliveryRecordRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl DeliveryRecordRepository for PostgresDeliveryRecordRepository {
    async fn insert(&self, record: DeliveryRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO delivery_records (
                id,
                sender_id,
                channel,
                envelope_type,
                recipient,
                status,
                provider_message_id,
                error_class,
                error_message,
                retry_count,
                correlation_id,
                lead_ref,
                attempted_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            "#,
        )
        .bind(record.id)
        .bind(&record.sender_id)
        .bind(record.channel.as_str())
        .bind(record.envelope_type.as_str())
        .bind(&record.recipient)
        .bind(record.status.as_str())
        .bind(&record.provider_message_id)
        .bind(record.error_class.map(|c| c.as_str()))
        .bind(&record.error_message)
        .bind(record.retry_count as i32)
        .bind(&record.correlation_id)
        .bind(&record.lead_ref)
        .bind(record.attempted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_sender(
        &self,
        sender_id: &str,
        limit: u32,
        offset: u32,
    ) -> anyhow::Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query_as::<_, DeliveryRecordRow>(
            r#"
            SELECT id, sender_id, channel, envelope_type, recipient, status,
                   provider_message_id, error_class, error_message, retry_count,
                   correlation_id, lead_ref, attempted_at
            FROM delivery_records
            WHERE sender_id = $1
            ORDER BY attempted_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(sender_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeliveryRecord::try_from).collect()
    }

    async fn stats_by_sender(&self, sender_id: &str) -> anyhow::Result<DeliveryStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'delivered') AS delivered,
                COUNT(*) FILTER (WHERE status = 'retrying') AS retrying,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM delivery_records
            WHERE sender_id = $1
            "#,
        )
        .bind(sender_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(DeliveryStats {
            total: row.total.max(0) as u64,
            delivered: row.delivered.max(0) as u64,
            retrying: row.retrying.max(0) as u64,
            failed: row.failed.max(0) as u64,
        })
    }
}

#[derive(FromRow)]
struct StatsRow {
    total: i64,
    delivered: i64,
    retrying: i64,
    failed: i64,
}

#[derive(FromRow)]
struct DeliveryRecordRow {
    id: Uuid,
    sender_id: String,
    channel: String,
    envelope_type: String,
    recipient: String,
    status: String,
    provider_message_id: Option<String>,
    error_class: Option<String>,
    error_message: Option<String>,
    retry_count: i32,
    correlation_id: Option<String>,
    lead_ref: Option<String>,
    attempted_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRecordRow> for DeliveryRecord {
    type Error = anyhow::Error;

    fn try_from(row: DeliveryRecordRow) -> Result<Self, Self::Error> {
        let channel = Channel::parse(&row.channel)
            .ok_or_else(|| anyhow::anyhow!("unknown channel {}", row.channel))?;
        let envelope_type = EnvelopeType::parse(&row.envelope_type)
            .ok_or_else(|| anyhow::anyhow!("unknown envelope type {}", row.envelope_type))?;
        let status = DeliveryStatus::parse(&row.status)
            .ok_or_else(|| anyhow::anyhow!("unknown delivery status {}", row.status))?;
        let error_class = row
            .error_class
            .as_deref()
            .map(|value| {
                ErrorClass::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("unknown error class {value}"))
            })
            .transpose()?;

        Ok(DeliveryRecord {
            id: row.id,
            sender_id: row.sender_id,
            channel,
            envelope_type,
            recipient: row.recipient,
            status,
            provider_message_id: row.provider_message_id,
            error_class,
            error_message: row.error_message,
            retry_count: row.retry_count.max(0) as u32,
            correlation_id: row.correlation_id,
            lead_ref: row.lead_ref,
            attempted_at: row.attempted_at,
        })
    }
}
