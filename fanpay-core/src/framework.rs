use sqlx::PgPool;
use tokio::sync::Mutex;

/// Executes the `Processor<Query>` implementations in [`crate::entities`]
/// against a Postgres pool.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub async fn begin(&self) -> Result<TransactionProcessor, sqlx::Error> {
        Ok(TransactionProcessor {
            tx: Mutex::new(self.pool.begin().await?),
        })
    }
}

/// Executes `Processor<Query>` implementations inside one open database
/// transaction. Nothing is visible to other connections until [`commit`].
///
/// [`commit`]: TransactionProcessor::commit
pub struct TransactionProcessor {
    tx: Mutex<sqlx::Transaction<'static, sqlx::Postgres>>,
}

impl TransactionProcessor {
    /// Connection the statements of this transaction run on.
    pub(crate) async fn acquire(
        &self,
    ) -> tokio::sync::MutexGuard<'_, sqlx::Transaction<'static, sqlx::Postgres>> {
        self.tx.lock().await
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.into_inner().commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.into_inner().rollback().await
    }
}
