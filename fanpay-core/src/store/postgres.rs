use super::{ApplyOutcome, LedgerStore, ReserveOutcome, StoreError};
use crate::entities::creators::{
    AddCreatorEarnings, GetCreatorAccount, ListCreatorAccounts, LockCreatorAccount,
    SetAssignedTier, SetEliteFounding, UpsertConnectedAccount,
};
use crate::entities::payouts::{
    GetPayoutById, InsertPayout, ListPayouts, SumCommittedPayouts, UpdatePayout,
};
use crate::entities::transactions::{
    GetTransactionById, GetTransactionByIntent, InsertTransactionIfAbsent, ListTransactions,
    LockTransaction, SetTransactionStatus, SumCreatorEarnings, SumCreatorGrossSince,
};
use crate::entities::{AccountStatus, CreatorAccount, Payout, Transaction, TransactionStatus};
use crate::fees::FeeTier;
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// Postgres-backed [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseProcessor,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor { pool },
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

/// Lift constraint violations into domain conflicts.
fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("23505") => return StoreError::Conflict(db.message().to_string()),
            Some("23514") => return StoreError::Invalid(db.message().to_string()),
            _ => {}
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.db.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn apply_payment(&self, transaction: &Transaction) -> Result<ApplyOutcome, StoreError> {
        let tx = self.db.begin().await.map_err(classify)?;
        let inserted = tx
            .process(InsertTransactionIfAbsent {
                transaction: transaction.clone(),
            })
            .await
            .map_err(classify)?;
        if !inserted {
            tx.rollback().await.map_err(classify)?;
            let intent = transaction.gateway_intent_id.clone().unwrap_or_default();
            let existing = self
                .db
                .process(GetTransactionByIntent {
                    gateway_intent_id: intent.clone(),
                })
                .await
                .map_err(classify)?
                .ok_or_else(|| StoreError::Conflict(format!("gateway intent {intent}")))?;
            return Ok(ApplyOutcome::AlreadyApplied(existing));
        }
        if let Some(creator_id) = transaction.beneficiary_id {
            tx.process(AddCreatorEarnings {
                creator_id,
                delta: transaction.creator_earnings(),
            })
            .await
            .map_err(classify)?;
        }
        tx.commit().await.map_err(classify)?;
        Ok(ApplyOutcome::Applied(transaction.clone()))
    }

    async fn refund_transaction(&self, id: Uuid) -> Result<Transaction, StoreError> {
        let tx = self.db.begin().await.map_err(classify)?;
        let mut transaction = tx
            .process(LockTransaction { id })
            .await
            .map_err(classify)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "transaction",
                id: id.to_string(),
            })?;
        if transaction.status != TransactionStatus::Completed {
            return Err(StoreError::Conflict(format!(
                "transaction {id} is not completed"
            )));
        }
        // Payout reservations for this creator wait until the refund commits.
        if let Some(creator_id) = transaction.beneficiary_id {
            tx.process(LockCreatorAccount { creator_id })
                .await
                .map_err(classify)?;
        }
        tx.process(SetTransactionStatus {
            id,
            status: TransactionStatus::Refunded,
        })
        .await
        .map_err(classify)?;
        if let Some(creator_id) = transaction.beneficiary_id {
            tx.process(AddCreatorEarnings {
                creator_id,
                delta: -transaction.creator_earnings(),
            })
            .await
            .map_err(classify)?;
        }
        tx.commit().await.map_err(classify)?;
        transaction.status = TransactionStatus::Refunded;
        Ok(transaction)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        self.db
            .process(GetTransactionById { id })
            .await
            .map_err(classify)
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        self.db.process(ListTransactions).await.map_err(classify)
    }

    async fn sum_creator_earnings(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        self.db
            .process(SumCreatorEarnings { creator_id })
            .await
            .map_err(classify)
    }

    async fn sum_creator_gross_since(
        &self,
        creator_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        self.db
            .process(SumCreatorGrossSince { creator_id, since })
            .await
            .map_err(classify)
    }

    async fn get_creator(&self, creator_id: Uuid) -> Result<Option<CreatorAccount>, StoreError> {
        self.db
            .process(GetCreatorAccount { creator_id })
            .await
            .map_err(classify)
    }

    async fn list_creators(&self) -> Result<Vec<CreatorAccount>, StoreError> {
        self.db.process(ListCreatorAccounts).await.map_err(classify)
    }

    async fn upsert_connected_account(
        &self,
        creator_id: Uuid,
        connected_account_id: &str,
        status: AccountStatus,
    ) -> Result<CreatorAccount, StoreError> {
        self.db
            .process(UpsertConnectedAccount {
                creator_id,
                connected_account_id: connected_account_id.to_string(),
                status,
            })
            .await
            .map_err(classify)
    }

    async fn set_elite_founding(&self, creator_id: Uuid) -> Result<CreatorAccount, StoreError> {
        self.db
            .process(SetEliteFounding { creator_id })
            .await
            .map_err(classify)
    }

    async fn set_assigned_tier(
        &self,
        creator_id: Uuid,
        tier: FeeTier,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let updated = self
            .db
            .process(SetAssignedTier {
                creator_id,
                tier,
                at,
            })
            .await
            .map_err(classify)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "creator account",
                id: creator_id.to_string(),
            });
        }
        Ok(())
    }

    async fn reserve_payout(&self, payout: &Payout) -> Result<ReserveOutcome, StoreError> {
        let creator_id = payout.creator_id;
        let tx = self.db.begin().await.map_err(classify)?;
        let locked = tx
            .process(LockCreatorAccount { creator_id })
            .await
            .map_err(classify)?;
        if !locked {
            return Err(StoreError::NotFound {
                entity: "creator account",
                id: creator_id.to_string(),
            });
        }
        if let Some(existing) = tx
            .process(GetPayoutById { id: payout.id })
            .await
            .map_err(classify)?
        {
            tx.rollback().await.map_err(classify)?;
            return Ok(ReserveOutcome::AlreadyReserved(existing));
        }
        let earnings = tx
            .process(SumCreatorEarnings { creator_id })
            .await
            .map_err(classify)?;
        let committed = tx
            .process(SumCommittedPayouts { creator_id })
            .await
            .map_err(classify)?;
        let available = earnings - committed;
        if available < payout.amount {
            tx.rollback().await.map_err(classify)?;
            return Ok(ReserveOutcome::Insufficient { available });
        }
        tx.process(InsertPayout {
            payout: payout.clone(),
        })
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)?;
        Ok(ReserveOutcome::Reserved(payout.clone()))
    }

    async fn update_payout(&self, payout: &Payout) -> Result<(), StoreError> {
        let updated = self
            .db
            .process(UpdatePayout {
                payout: payout.clone(),
            })
            .await
            .map_err(classify)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "payout",
                id: payout.id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_payout(&self, id: Uuid) -> Result<Option<Payout>, StoreError> {
        self.db
            .process(GetPayoutById { id })
            .await
            .map_err(classify)
    }

    async fn list_payouts(&self, creator_id: Option<Uuid>) -> Result<Vec<Payout>, StoreError> {
        self.db
            .process(ListPayouts { creator_id })
            .await
            .map_err(classify)
    }

    async fn sum_committed_payouts(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        self.db
            .process(SumCommittedPayouts { creator_id })
            .await
            .map_err(classify)
    }
}
