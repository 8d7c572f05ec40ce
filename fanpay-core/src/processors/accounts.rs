//! Connected-account lifecycle for creators.

use crate::entities::CreatorAccount;
use crate::error::EngineError;
use crate::gateway::{ConnectedAccountRequest, OnboardingLink, PaymentGateway};
use crate::oplog::{LogEvent, OperationLog};
use crate::store::LedgerStore;
use std::sync::Arc;
use uuid::Uuid;

pub struct AccountRegistry {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    log: Arc<OperationLog>,
}

impl AccountRegistry {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            store,
            gateway,
            log,
        }
    }

    /// Create the creator's connected account at the gateway and store its id.
    ///
    /// A creator that already has an account gets it back unchanged.
    #[tracing::instrument(skip(self, email))]
    pub async fn onboard_creator(
        &self,
        creator_id: Uuid,
        email: &str,
        country: &str,
    ) -> Result<CreatorAccount, EngineError> {
        if email.trim().is_empty() {
            return Err(EngineError::InvalidRequest("email must not be empty".to_string()));
        }
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::InvalidRequest(format!(
                "country must be an ISO 3166-1 alpha-2 code, got {country:?}"
            )));
        }
        if let Some(existing) = self.store.get_creator(creator_id).await?
            && existing.connected_account_id.is_some()
        {
            return Ok(existing);
        }

        let account = self
            .gateway
            .create_connected_account(&ConnectedAccountRequest {
                creator_id,
                email: email.to_string(),
                country: country.to_ascii_uppercase(),
            })
            .await?;
        let stored = self
            .store
            .upsert_connected_account(creator_id, &account.id, account.status())
            .await?;
        self.log.record(
            LogEvent::info("account.onboard", "connected account created")
                .creator(creator_id)
                .meta("connected_account_id", account.id)
                .meta("status", format!("{:?}", stored.account_status)),
        );
        Ok(stored)
    }

    pub async fn create_onboarding_link(
        &self,
        creator_id: Uuid,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<OnboardingLink, EngineError> {
        let account_id = self.connected_account_id(creator_id).await?;
        Ok(self
            .gateway
            .create_onboarding_link(&account_id, refresh_url, return_url)
            .await?)
    }

    /// Pull the account's capabilities from the gateway and store the
    /// derived status.
    pub async fn refresh_account_status(
        &self,
        creator_id: Uuid,
    ) -> Result<CreatorAccount, EngineError> {
        let account_id = self.connected_account_id(creator_id).await?;
        let remote = self.gateway.retrieve_connected_account(&account_id).await?;
        let stored = self
            .store
            .upsert_connected_account(creator_id, &remote.id, remote.status())
            .await?;
        self.log.record(
            LogEvent::debug("account.refresh", "connected account status refreshed")
                .creator(creator_id)
                .meta("status", format!("{:?}", stored.account_status))
                .meta("details_submitted", remote.details_submitted),
        );
        Ok(stored)
    }

    /// Elite Founding is permanent once granted.
    pub async fn grant_elite_founding(
        &self,
        creator_id: Uuid,
    ) -> Result<CreatorAccount, EngineError> {
        let account = self.store.set_elite_founding(creator_id).await?;
        self.log.record(
            LogEvent::info("account.elite_founding", "elite founding status granted")
                .creator(creator_id),
        );
        Ok(account)
    }

    pub async fn get_account(&self, creator_id: Uuid) -> Result<CreatorAccount, EngineError> {
        self.store
            .get_creator(creator_id)
            .await?
            .ok_or(EngineError::AccountNotFound { creator_id })
    }

    async fn connected_account_id(&self, creator_id: Uuid) -> Result<String, EngineError> {
        self.get_account(creator_id)
            .await?
            .connected_account_id
            .ok_or(EngineError::AccountNotFound { creator_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::AccountStatus;
    use crate::test_support::Harness;

    #[tokio::test]
    async fn onboarding_stores_pending_account_and_is_idempotent() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        let first = h
            .engine
            .accounts()
            .onboard_creator(creator, "maker@example.com", "us")
            .await
            .unwrap();
        assert_eq!(first.account_status, AccountStatus::Pending);
        assert!(first.connected_account_id.is_some());

        let second = h
            .engine
            .accounts()
            .onboard_creator(creator, "maker@example.com", "US")
            .await
            .unwrap();
        assert_eq!(first.connected_account_id, second.connected_account_id);
        assert_eq!(h.gateway.account_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_picks_up_enabled_payouts() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        let account = h
            .engine
            .accounts()
            .onboard_creator(creator, "maker@example.com", "DE")
            .await
            .unwrap();
        h.gateway
            .enable_payouts(account.connected_account_id.as_deref().unwrap());

        let refreshed = h.engine.accounts().refresh_account_status(creator).await.unwrap();
        assert_eq!(refreshed.account_status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn onboarding_link_requires_an_account() {
        let h = Harness::new();
        let err = h
            .engine
            .accounts()
            .create_onboarding_link(Uuid::new_v4(), "https://r", "https://d")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AccountNotFound { .. }));
    }

    #[tokio::test]
    async fn bad_country_is_rejected_before_gateway() {
        let h = Harness::new();
        let err = h
            .engine
            .accounts()
            .onboard_creator(Uuid::new_v4(), "a@b.c", "USA")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
        assert_eq!(h.gateway.account_calls(), 0);
    }
}
