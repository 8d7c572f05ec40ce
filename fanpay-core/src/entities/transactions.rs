use super::{Category, TransactionStatus, unix};
use crate::framework::{DatabaseProcessor, TransactionProcessor};
use fanpay_sdk::objects::TransactionResponse;
use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One money event. `platform_fee + creator_earnings == amount` always holds
/// for a well-formed row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub beneficiary_id: Option<Uuid>,
    pub category: Category,
    pub amount: i64,
    pub platform_fee: i64,
    pub status: TransactionStatus,
    pub description: String,
    pub gateway_intent_id: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Transaction {
    pub fn creator_earnings(&self) -> i64 {
        self.amount - self.platform_fee
    }

    /// Reason this row violates the fee invariant, if it does.
    pub fn integrity_fault(&self) -> Option<String> {
        if self.amount < 0 {
            return Some(format!("negative amount {}", self.amount));
        }
        if self.platform_fee < 0 {
            return Some(format!("negative platform fee {}", self.platform_fee));
        }
        if self.platform_fee > self.amount {
            return Some(format!(
                "platform fee {} exceeds amount {}",
                self.platform_fee, self.amount
            ));
        }
        None
    }
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        let creator_earnings = t.creator_earnings();
        Self {
            id: t.id,
            payer_id: t.payer_id,
            beneficiary_id: t.beneficiary_id,
            category: t.category.into(),
            amount: t.amount,
            platform_fee: t.platform_fee,
            creator_earnings,
            status: t.status.into(),
            description: t.description,
            gateway_intent_id: t.gateway_intent_id,
            created_at: unix(t.created_at),
        }
    }
}

const TRANSACTION_COLUMNS: &str = "id, payer_id, beneficiary_id, category, amount, platform_fee, \
     status, description, gateway_intent_id, created_at";

#[derive(Debug, Clone)]
/// Insert unless a row for the same gateway intent exists. Outputs whether
/// the row was inserted.
pub struct InsertTransactionIfAbsent {
    pub transaction: Transaction,
}

impl Processor<InsertTransactionIfAbsent> for TransactionProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertTransactionIfAbsent")]
    async fn process(&self, insert: InsertTransactionIfAbsent) -> Result<bool, sqlx::Error> {
        let t = insert.transaction;
        let mut conn = self.acquire().await;
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (id, payer_id, beneficiary_id, category, amount, platform_fee,
                 status, description, gateway_intent_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (gateway_intent_id) DO NOTHING
            "#,
        )
        .bind(t.id)
        .bind(t.payer_id)
        .bind(t.beneficiary_id)
        .bind(t.category)
        .bind(t.amount)
        .bind(t.platform_fee)
        .bind(t.status)
        .bind(&t.description)
        .bind(&t.gateway_intent_id)
        .bind(t.created_at)
        .execute(&mut **conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// Row lock held until the surrounding transaction ends.
pub struct LockTransaction {
    pub id: Uuid,
}

impl Processor<LockTransaction> for TransactionProcessor {
    type Output = Option<Transaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:LockTransaction")]
    async fn process(&self, query: LockTransaction) -> Result<Option<Transaction>, sqlx::Error> {
        let mut conn = self.acquire().await;
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(query.id)
        .fetch_optional(&mut **conn)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct SetTransactionStatus {
    pub id: Uuid,
    pub status: TransactionStatus,
}

impl Processor<SetTransactionStatus> for TransactionProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetTransactionStatus")]
    async fn process(&self, update: SetTransactionStatus) -> Result<u64, sqlx::Error> {
        let mut conn = self.acquire().await;
        let result = sqlx::query("UPDATE transactions SET status = $2 WHERE id = $1")
            .bind(update.id)
            .bind(update.status)
            .execute(&mut **conn)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct GetTransactionById {
    pub id: Uuid,
}

impl Processor<GetTransactionById> for DatabaseProcessor {
    type Output = Option<Transaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTransactionById")]
    async fn process(&self, query: GetTransactionById) -> Result<Option<Transaction>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetTransactionByIntent {
    pub gateway_intent_id: String,
}

impl Processor<GetTransactionByIntent> for DatabaseProcessor {
    type Output = Option<Transaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTransactionByIntent")]
    async fn process(
        &self,
        query: GetTransactionByIntent,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE gateway_intent_id = $1"
        ))
        .bind(query.gateway_intent_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Every transaction regardless of status, oldest first.
pub struct ListTransactions;

impl Processor<ListTransactions> for DatabaseProcessor {
    type Output = Vec<Transaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListTransactions")]
    async fn process(&self, _: ListTransactions) -> Result<Vec<Transaction>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
    }
}

const SUM_CREATOR_EARNINGS: &str = r#"
    SELECT COALESCE(SUM(amount - platform_fee), 0)::BIGINT
    FROM transactions
    WHERE beneficiary_id = $1
      AND status = 'completed'
      AND category <> 'payout'
"#;

#[derive(Debug, Clone)]
/// Sum of `amount - platform_fee` over a creator's completed, non-payout transactions.
pub struct SumCreatorEarnings {
    pub creator_id: Uuid,
}

impl Processor<SumCreatorEarnings> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SumCreatorEarnings")]
    async fn process(&self, query: SumCreatorEarnings) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(SUM_CREATOR_EARNINGS)
            .bind(query.creator_id)
            .fetch_one(&self.pool)
            .await
    }
}

impl Processor<SumCreatorEarnings> for TransactionProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SumCreatorEarnings")]
    async fn process(&self, query: SumCreatorEarnings) -> Result<i64, sqlx::Error> {
        let mut conn = self.acquire().await;
        sqlx::query_scalar::<_, i64>(SUM_CREATOR_EARNINGS)
            .bind(query.creator_id)
            .fetch_one(&mut **conn)
            .await
    }
}

#[derive(Debug, Clone)]
/// Gross completed amount credited to a creator since `since`.
pub struct SumCreatorGrossSince {
    pub creator_id: Uuid,
    pub since: OffsetDateTime,
}

impl Processor<SumCreatorGrossSince> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SumCreatorGrossSince")]
    async fn process(&self, query: SumCreatorGrossSince) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM transactions
            WHERE beneficiary_id = $1
              AND status = 'completed'
              AND category <> 'payout'
              AND created_at >= $2
            "#,
        )
        .bind(query.creator_id)
        .bind(query.since)
        .fetch_one(&self.pool)
        .await
    }
}
