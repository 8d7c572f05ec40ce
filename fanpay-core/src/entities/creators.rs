use super::AccountStatus;
use crate::fees::FeeTier;
use crate::framework::{DatabaseProcessor, TransactionProcessor};
use fanpay_sdk::objects::ConnectedAccountResponse;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

/// A creator's payout account, fee standing and running earnings counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorAccount {
    pub creator_id: Uuid,
    pub connected_account_id: Option<String>,
    pub account_status: AccountStatus,
    pub elite_founding: bool,
    /// Tier persisted by the last monthly recalculation.
    pub assigned_tier: Option<FeeTier>,
    pub tier_updated_at: Option<OffsetDateTime>,
    /// Aggregate creator earnings credited so far.
    pub total_earnings: i64,
    pub created_at: OffsetDateTime,
}

impl CreatorAccount {
    pub fn new(creator_id: Uuid) -> Self {
        Self {
            creator_id,
            connected_account_id: None,
            account_status: AccountStatus::Pending,
            elite_founding: false,
            assigned_tier: None,
            tier_updated_at: None,
            total_earnings: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl From<CreatorAccount> for ConnectedAccountResponse {
    fn from(account: CreatorAccount) -> Self {
        Self {
            creator_id: account.creator_id,
            account_id: account.connected_account_id,
            status: account.account_status.into(),
            elite_founding: account.elite_founding,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CreatorAccountRow {
    creator_id: Uuid,
    connected_account_id: Option<String>,
    account_status: AccountStatus,
    elite_founding: bool,
    tier_threshold: Option<i64>,
    tier_platform_percent: Option<i16>,
    tier_creator_percent: Option<i16>,
    tier_updated_at: Option<OffsetDateTime>,
    total_earnings: i64,
    created_at: OffsetDateTime,
}

impl TryFrom<CreatorAccountRow> for CreatorAccount {
    type Error = sqlx::Error;

    fn try_from(row: CreatorAccountRow) -> Result<Self, Self::Error> {
        let assigned_tier = match (
            row.tier_threshold,
            row.tier_platform_percent,
            row.tier_creator_percent,
        ) {
            (Some(threshold), Some(platform), Some(creator)) => Some(FeeTier::new(
                threshold,
                percent(platform)?,
                percent(creator)?,
            )),
            _ => None,
        };
        Ok(Self {
            creator_id: row.creator_id,
            connected_account_id: row.connected_account_id,
            account_status: row.account_status,
            elite_founding: row.elite_founding,
            assigned_tier,
            tier_updated_at: row.tier_updated_at,
            total_earnings: row.total_earnings,
            created_at: row.created_at,
        })
    }
}

fn percent(value: i16) -> Result<u8, sqlx::Error> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| sqlx::Error::Decode(format!("percentage out of range: {value}").into()))
}

const CREATOR_COLUMNS: &str = "creator_id, connected_account_id, account_status, elite_founding, \
     tier_threshold, tier_platform_percent, tier_creator_percent, tier_updated_at, \
     total_earnings, created_at";

#[derive(Debug, Clone)]
/// Move the running earnings counter by `delta`, creating the row when needed.
pub struct AddCreatorEarnings {
    pub creator_id: Uuid,
    pub delta: i64,
}

impl Processor<AddCreatorEarnings> for TransactionProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AddCreatorEarnings")]
    async fn process(&self, cmd: AddCreatorEarnings) -> Result<(), sqlx::Error> {
        let mut conn = self.acquire().await;
        sqlx::query(
            r#"
            INSERT INTO creator_accounts (creator_id, total_earnings)
            VALUES ($1, $2)
            ON CONFLICT (creator_id)
            DO UPDATE SET total_earnings = creator_accounts.total_earnings + EXCLUDED.total_earnings
            "#,
        )
        .bind(cmd.creator_id)
        .bind(cmd.delta)
        .execute(&mut **conn)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Lock a creator's account row until the surrounding transaction ends.
/// Balance checks and refunds for one creator serialize on this lock.
pub struct LockCreatorAccount {
    pub creator_id: Uuid,
}

impl Processor<LockCreatorAccount> for TransactionProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:LockCreatorAccount")]
    async fn process(&self, query: LockCreatorAccount) -> Result<bool, sqlx::Error> {
        let mut conn = self.acquire().await;
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT creator_id FROM creator_accounts WHERE creator_id = $1 FOR UPDATE",
        )
        .bind(query.creator_id)
        .fetch_optional(&mut **conn)
        .await?;
        Ok(locked.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct GetCreatorAccount {
    pub creator_id: Uuid,
}

impl Processor<GetCreatorAccount> for DatabaseProcessor {
    type Output = Option<CreatorAccount>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCreatorAccount")]
    async fn process(
        &self,
        query: GetCreatorAccount,
    ) -> Result<Option<CreatorAccount>, sqlx::Error> {
        let row = sqlx::query_as::<_, CreatorAccountRow>(&format!(
            "SELECT {CREATOR_COLUMNS} FROM creator_accounts WHERE creator_id = $1"
        ))
        .bind(query.creator_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CreatorAccount::try_from).transpose()
    }
}

#[derive(Debug, Clone)]
pub struct ListCreatorAccounts;

impl Processor<ListCreatorAccounts> for DatabaseProcessor {
    type Output = Vec<CreatorAccount>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCreatorAccounts")]
    async fn process(&self, _: ListCreatorAccounts) -> Result<Vec<CreatorAccount>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CreatorAccountRow>(&format!(
            "SELECT {CREATOR_COLUMNS} FROM creator_accounts ORDER BY creator_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CreatorAccount::try_from).collect()
    }
}

#[derive(Debug, Clone)]
/// Register or update a creator's connected payout account.
pub struct UpsertConnectedAccount {
    pub creator_id: Uuid,
    pub connected_account_id: String,
    pub status: AccountStatus,
}

impl Processor<UpsertConnectedAccount> for DatabaseProcessor {
    type Output = CreatorAccount;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertConnectedAccount")]
    async fn process(&self, cmd: UpsertConnectedAccount) -> Result<CreatorAccount, sqlx::Error> {
        let row = sqlx::query_as::<_, CreatorAccountRow>(&format!(
            r#"
            INSERT INTO creator_accounts (creator_id, connected_account_id, account_status)
            VALUES ($1, $2, $3)
            ON CONFLICT (creator_id)
            DO UPDATE SET connected_account_id = EXCLUDED.connected_account_id,
                          account_status = EXCLUDED.account_status
            RETURNING {CREATOR_COLUMNS}
            "#
        ))
        .bind(cmd.creator_id)
        .bind(cmd.connected_account_id)
        .bind(cmd.status)
        .fetch_one(&self.pool)
        .await?;
        CreatorAccount::try_from(row)
    }
}

#[derive(Debug, Clone)]
/// Grant the permanent Elite Founding flag, creating the row when needed.
pub struct SetEliteFounding {
    pub creator_id: Uuid,
}

impl Processor<SetEliteFounding> for DatabaseProcessor {
    type Output = CreatorAccount;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetEliteFounding")]
    async fn process(&self, cmd: SetEliteFounding) -> Result<CreatorAccount, sqlx::Error> {
        let row = sqlx::query_as::<_, CreatorAccountRow>(&format!(
            r#"
            INSERT INTO creator_accounts (creator_id, elite_founding)
            VALUES ($1, TRUE)
            ON CONFLICT (creator_id) DO UPDATE SET elite_founding = TRUE
            RETURNING {CREATOR_COLUMNS}
            "#
        ))
        .bind(cmd.creator_id)
        .fetch_one(&self.pool)
        .await?;
        CreatorAccount::try_from(row)
    }
}

#[derive(Debug, Clone)]
pub struct SetAssignedTier {
    pub creator_id: Uuid,
    pub tier: FeeTier,
    pub at: OffsetDateTime,
}

impl Processor<SetAssignedTier> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetAssignedTier")]
    async fn process(&self, cmd: SetAssignedTier) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE creator_accounts
            SET tier_threshold = $2,
                tier_platform_percent = $3,
                tier_creator_percent = $4,
                tier_updated_at = $5
            WHERE creator_id = $1
            "#,
        )
        .bind(cmd.creator_id)
        .bind(cmd.tier.threshold)
        .bind(cmd.tier.platform_percent as i16)
        .bind(cmd.tier.creator_percent as i16)
        .bind(cmd.at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> CreatorAccountRow {
        CreatorAccountRow {
            creator_id: Uuid::new_v4(),
            connected_account_id: Some("acct_1".to_string()),
            account_status: AccountStatus::Active,
            elite_founding: false,
            tier_threshold: Some(500_000),
            tier_platform_percent: Some(17),
            tier_creator_percent: Some(83),
            tier_updated_at: None,
            total_earnings: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn row_with_tier_columns_decodes_tier() {
        let account = CreatorAccount::try_from(row()).unwrap();
        assert_eq!(account.assigned_tier, Some(FeeTier::new(500_000, 17, 83)));
    }

    #[test]
    fn partial_tier_columns_mean_no_tier() {
        let mut r = row();
        r.tier_creator_percent = None;
        assert_eq!(CreatorAccount::try_from(r).unwrap().assigned_tier, None);
    }

    #[test]
    fn out_of_range_percent_fails_decode() {
        let mut r = row();
        r.tier_platform_percent = Some(300);
        assert!(CreatorAccount::try_from(r).is_err());
    }
}
