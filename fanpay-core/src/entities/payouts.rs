use super::{PayoutStatus, unix};
use crate::framework::{DatabaseProcessor, TransactionProcessor};
use fanpay_sdk::objects::PayoutResponse;
use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub creator_id: Uuid,
    /// Absent until the gateway has accepted the transfer.
    pub gateway_transfer_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PayoutStatus,
    pub arrival_date: Option<OffsetDateTime>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Payout {
    pub fn new_pending(id: Uuid, creator_id: Uuid, amount: i64, currency: &str) -> Self {
        Self {
            id,
            creator_id,
            gateway_transfer_id: None,
            amount,
            currency: currency.to_string(),
            status: PayoutStatus::Pending,
            arrival_date: None,
            failure_code: None,
            failure_message: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl From<Payout> for PayoutResponse {
    fn from(p: Payout) -> Self {
        Self {
            id: p.id,
            creator_id: p.creator_id,
            gateway_transfer_id: p.gateway_transfer_id,
            amount: p.amount,
            currency: p.currency,
            status: p.status.into(),
            arrival_date: p.arrival_date.map(unix),
            failure_code: p.failure_code,
            failure_message: p.failure_message,
            created_at: unix(p.created_at),
        }
    }
}

const PAYOUT_COLUMNS: &str = "id, creator_id, gateway_transfer_id, amount, currency, status, \
     arrival_date, failure_code, failure_message, created_at";

#[derive(Debug, Clone)]
/// Insert a payout inside the transaction that checked its balance.
pub struct InsertPayout {
    pub payout: Payout,
}

impl Processor<InsertPayout> for TransactionProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertPayout")]
    async fn process(&self, insert: InsertPayout) -> Result<(), sqlx::Error> {
        let p = insert.payout;
        let mut conn = self.acquire().await;
        sqlx::query(
            r#"
            INSERT INTO payouts
                (id, creator_id, gateway_transfer_id, amount, currency, status,
                 arrival_date, failure_code, failure_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(p.id)
        .bind(p.creator_id)
        .bind(&p.gateway_transfer_id)
        .bind(p.amount)
        .bind(&p.currency)
        .bind(p.status)
        .bind(p.arrival_date)
        .bind(&p.failure_code)
        .bind(&p.failure_message)
        .bind(p.created_at)
        .execute(&mut **conn)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Overwrite the mutable gateway-facing fields of a payout.
pub struct UpdatePayout {
    pub payout: Payout,
}

impl Processor<UpdatePayout> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdatePayout")]
    async fn process(&self, update: UpdatePayout) -> Result<u64, sqlx::Error> {
        let p = update.payout;
        let result = sqlx::query(
            r#"
            UPDATE payouts
            SET gateway_transfer_id = $2,
                status = $3,
                arrival_date = $4,
                failure_code = $5,
                failure_message = $6
            WHERE id = $1
            "#,
        )
        .bind(p.id)
        .bind(&p.gateway_transfer_id)
        .bind(p.status)
        .bind(p.arrival_date)
        .bind(&p.failure_code)
        .bind(&p.failure_message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct GetPayoutById {
    pub id: Uuid,
}

impl Processor<GetPayoutById> for DatabaseProcessor {
    type Output = Option<Payout>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPayoutById")]
    async fn process(&self, query: GetPayoutById) -> Result<Option<Payout>, sqlx::Error> {
        sqlx::query_as::<_, Payout>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1"
        ))
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await
    }
}

impl Processor<GetPayoutById> for TransactionProcessor {
    type Output = Option<Payout>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPayoutById")]
    async fn process(&self, query: GetPayoutById) -> Result<Option<Payout>, sqlx::Error> {
        let mut conn = self.acquire().await;
        sqlx::query_as::<_, Payout>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1"
        ))
        .bind(query.id)
        .fetch_optional(&mut **conn)
        .await
    }
}

#[derive(Debug, Clone)]
/// A creator's payouts, newest first. `None` lists every payout.
pub struct ListPayouts {
    pub creator_id: Option<Uuid>,
}

impl Processor<ListPayouts> for DatabaseProcessor {
    type Output = Vec<Payout>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPayouts")]
    async fn process(&self, query: ListPayouts) -> Result<Vec<Payout>, sqlx::Error> {
        sqlx::query_as::<_, Payout>(&format!(
            r#"
            SELECT {PAYOUT_COLUMNS}
            FROM payouts
            WHERE ($1::UUID IS NULL OR creator_id = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(query.creator_id)
        .fetch_all(&self.pool)
        .await
    }
}

const SUM_COMMITTED_PAYOUTS: &str = r#"
    SELECT COALESCE(SUM(amount), 0)::BIGINT
    FROM payouts
    WHERE creator_id = $1
      AND status IN ('pending', 'in_transit', 'paid')
"#;

#[derive(Debug, Clone)]
/// Sum of a creator's pending, in-transit and paid payouts.
pub struct SumCommittedPayouts {
    pub creator_id: Uuid,
}

impl Processor<SumCommittedPayouts> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SumCommittedPayouts")]
    async fn process(&self, query: SumCommittedPayouts) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(SUM_COMMITTED_PAYOUTS)
            .bind(query.creator_id)
            .fetch_one(&self.pool)
            .await
    }
}

impl Processor<SumCommittedPayouts> for TransactionProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SumCommittedPayouts")]
    async fn process(&self, query: SumCommittedPayouts) -> Result<i64, sqlx::Error> {
        let mut conn = self.acquire().await;
        sqlx::query_scalar::<_, i64>(SUM_COMMITTED_PAYOUTS)
            .bind(query.creator_id)
            .fetch_one(&mut **conn)
            .await
    }
}
