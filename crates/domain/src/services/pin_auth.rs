//! Staff PIN authentication with attempt counting and lockout.
//!
//! The entry terminal shares one PIN pad between all staff, so the caller
//! does not know who is authenticating; the PIN itself is the only lookup
//! key and the authenticator probes candidate accounts linearly.

use std::sync::Arc;

use crate::error::DomainError;
use crate::models::{Account, Person, Staff};
use crate::repositories::Repositories;

/// Result of a successful PIN authentication: the staff record with its
/// person preloaded.
#[derive(Debug, Clone)]
pub struct AuthenticatedStaff {
    pub staff: Staff,
    pub person: Person,
}

/// Validates staff PINs against one or all accounts.
pub struct PinAuthenticator {
    repos: Arc<dyn Repositories>,
}

impl PinAuthenticator {
    pub fn new(repos: Arc<dyn Repositories>) -> Self {
        Self { repos }
    }

    /// Validates a PIN against every account that has a PIN configured and
    /// is not locked, returning on the first match.
    ///
    /// Each failed verification increments that account's attempt counter
    /// and persists it before the scan continues. Accounts without a linked
    /// person or staff record are skipped, not treated as errors.
    pub async fn validate_any_account(&self, pin: &str) -> Result<AuthenticatedStaff, DomainError> {
        self.validate_any_account_inner(pin)
            .await
            .map_err(|e| DomainError::context("validate_any_account", e))
    }

    async fn validate_any_account_inner(
        &self,
        pin: &str,
    ) -> Result<AuthenticatedStaff, DomainError> {
        if pin.is_empty() {
            return Err(DomainError::Validation("PIN must not be empty".into()));
        }

        let candidates = self.repos.accounts().list_with_pin().await?;
        for mut account in candidates {
            if account.is_locked() {
                continue;
            }

            if !account.verify_pin(pin)? {
                self.record_failure(&mut account).await?;
                continue;
            }

            let Some(person) = self.repos.persons().find_by_account_id(account.id).await? else {
                tracing::warn!(account_id = account.id, "PIN matched account without a person");
                continue;
            };
            let Some(staff) = self.repos.staff().find_by_person_id(person.id).await? else {
                tracing::warn!(
                    account_id = account.id,
                    person_id = person.id,
                    "PIN matched account without a staff record"
                );
                continue;
            };

            account.reset_failed_pin_attempts();
            self.repos.accounts().update(&account).await?;
            tracing::info!(staff_id = staff.id, "Staff authenticated via PIN scan");
            return Ok(AuthenticatedStaff { staff, person });
        }

        Err(DomainError::InvalidCredential)
    }

    /// Validates a PIN for a specific staff member (no scan).
    ///
    /// Resolves Staff → Person → Account and fails with a distinct signal at
    /// each step; a wrong PIN increments that account's attempt counter.
    pub async fn validate_for_account(
        &self,
        staff_id: i64,
        pin: &str,
    ) -> Result<AuthenticatedStaff, DomainError> {
        self.validate_for_account_inner(staff_id, pin)
            .await
            .map_err(|e| DomainError::context("validate_for_account", e))
    }

    async fn validate_for_account_inner(
        &self,
        staff_id: i64,
        pin: &str,
    ) -> Result<AuthenticatedStaff, DomainError> {
        if pin.is_empty() {
            return Err(DomainError::Validation("PIN must not be empty".into()));
        }

        let staff = self
            .repos
            .staff()
            .find_by_id(staff_id)
            .await?
            .ok_or_else(|| DomainError::not_found("staff"))?;
        let person = self
            .repos
            .persons()
            .find_by_id(staff.person_id)
            .await?
            .ok_or_else(|| DomainError::not_found("person"))?;
        let account_id = person
            .account_id
            .ok_or_else(|| DomainError::not_found("linked account"))?;
        let mut account = self
            .repos
            .accounts()
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("account"))?;

        if !account.has_pin() {
            return Err(DomainError::Validation(
                "no PIN configured for this account".into(),
            ));
        }
        if account.is_locked() {
            return Err(DomainError::Locked);
        }

        if !account.verify_pin(pin)? {
            self.record_failure(&mut account).await?;
            return Err(DomainError::InvalidCredential);
        }

        account.reset_failed_pin_attempts();
        self.repos.accounts().update(&account).await?;
        Ok(AuthenticatedStaff { staff, person })
    }

    async fn record_failure(&self, account: &mut Account) -> Result<(), DomainError> {
        account.record_failed_pin_attempt();
        self.repos.accounts().update(account).await?;
        tracing::warn!(
            account_id = account.id,
            attempts = account.failed_pin_attempts,
            locked = account.is_locked(),
            "Failed PIN attempt"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{AccountKind, MAX_FAILED_PIN_ATTEMPTS};
    use crate::repositories::memory::{InMemoryRepositories, InMemoryStore};
    use shared::password::hash_password;

    struct Fixture {
        repos: Arc<InMemoryRepositories>,
        auth: PinAuthenticator,
    }

    impl Fixture {
        fn new() -> Self {
            let store = InMemoryStore::new();
            let repos = store.repositories();
            let auth = PinAuthenticator::new(repos.clone());
            Self { repos, auth }
        }

        /// Creates a staff member with a linked account carrying `pin`.
        async fn staff_with_pin(&self, email: &str, pin: &str) -> (Staff, Account) {
            let pin_hash = hash_password(pin).unwrap();
            let account = self
                .repos
                .accounts()
                .create(email, AccountKind::Staff, None, Some(&pin_hash))
                .await
                .unwrap();
            let mut person = self.repos.persons().create("Staff", email).await.unwrap();
            person.account_id = Some(account.id);
            self.repos.persons().update(&person).await.unwrap();
            let staff = self.repos.staff().create(person.id, "educator").await.unwrap();
            (staff, account)
        }

        async fn account(&self, id: i64) -> Account {
            self.repos.accounts().find_by_id(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_validate_any_account_matches_first() {
        let fx = Fixture::new();
        let (staff, _) = fx.staff_with_pin("a@example.com", "1111").await;
        fx.staff_with_pin("b@example.com", "2222").await;

        let result = fx.auth.validate_any_account("1111").await.unwrap();
        assert_eq!(result.staff.id, staff.id);
        assert_eq!(result.person.id, staff.person_id);
    }

    #[tokio::test]
    async fn test_validate_any_account_empty_pin() {
        let fx = Fixture::new();
        let err = fx.auth.validate_any_account("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_validate_any_account_no_match_increments_all() {
        let fx = Fixture::new();
        let (_, a) = fx.staff_with_pin("a@example.com", "1111").await;
        let (_, b) = fx.staff_with_pin("b@example.com", "2222").await;

        let err = fx.auth.validate_any_account("9999").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);

        // Every scanned account recorded the failure.
        assert_eq!(fx.account(a.id).await.failed_pin_attempts, 1);
        assert_eq!(fx.account(b.id).await.failed_pin_attempts, 1);
    }

    #[tokio::test]
    async fn test_validate_any_account_match_resets_counter() {
        let fx = Fixture::new();
        let (_, account) = fx.staff_with_pin("a@example.com", "1111").await;

        fx.auth.validate_any_account("9999").await.unwrap_err();
        assert_eq!(fx.account(account.id).await.failed_pin_attempts, 1);

        fx.auth.validate_any_account("1111").await.unwrap();
        assert_eq!(fx.account(account.id).await.failed_pin_attempts, 0);
    }

    #[tokio::test]
    async fn test_validate_any_account_skips_locked() {
        let fx = Fixture::new();
        let (_, account) = fx.staff_with_pin("a@example.com", "1111").await;

        for _ in 0..MAX_FAILED_PIN_ATTEMPTS {
            fx.auth.validate_any_account("9999").await.unwrap_err();
        }
        assert!(fx.account(account.id).await.is_locked());

        // Correct PIN no longer matches; the locked account is not scanned.
        let err = fx.auth.validate_any_account("1111").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
        // And the counter stays where the lock left it.
        assert_eq!(
            fx.account(account.id).await.failed_pin_attempts,
            MAX_FAILED_PIN_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn test_validate_any_account_skips_account_without_staff() {
        let fx = Fixture::new();
        // Account with a PIN but no person linked at all.
        let pin_hash = hash_password("1111").unwrap();
        fx.repos
            .accounts()
            .create("orphan@example.com", AccountKind::Staff, None, Some(&pin_hash))
            .await
            .unwrap();

        let err = fx.auth.validate_any_account("1111").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[tokio::test]
    async fn test_validate_for_account_success() {
        let fx = Fixture::new();
        let (staff, account) = fx.staff_with_pin("a@example.com", "1111").await;

        let result = fx.auth.validate_for_account(staff.id, "1111").await.unwrap();
        assert_eq!(result.staff.id, staff.id);
        assert_eq!(fx.account(account.id).await.failed_pin_attempts, 0);
    }

    #[tokio::test]
    async fn test_validate_for_account_wrong_pin_increments() {
        let fx = Fixture::new();
        let (staff, account) = fx.staff_with_pin("a@example.com", "1111").await;

        let err = fx.auth.validate_for_account(staff.id, "2222").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
        assert_eq!(fx.account(account.id).await.failed_pin_attempts, 1);
    }

    #[tokio::test]
    async fn test_validate_for_account_locked_short_circuits() {
        let fx = Fixture::new();
        let (staff, account) = fx.staff_with_pin("a@example.com", "1111").await;

        for _ in 0..MAX_FAILED_PIN_ATTEMPTS {
            fx.auth.validate_for_account(staff.id, "2222").await.unwrap_err();
        }
        assert!(fx.account(account.id).await.is_locked());

        // Even the correct PIN reports Locked once the threshold is reached.
        let err = fx.auth.validate_for_account(staff.id, "1111").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
    }

    #[tokio::test]
    async fn test_validate_for_account_unknown_staff() {
        let fx = Fixture::new();
        let err = fx.auth.validate_for_account(999, "1111").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_validate_for_account_no_pin_configured() {
        let fx = Fixture::new();
        let account = fx
            .repos
            .accounts()
            .create("nopin@example.com", AccountKind::Staff, None, None)
            .await
            .unwrap();
        let mut person = fx.repos.persons().create("No", "Pin").await.unwrap();
        person.account_id = Some(account.id);
        fx.repos.persons().update(&person).await.unwrap();
        let staff = fx.repos.staff().create(person.id, "educator").await.unwrap();

        let err = fx.auth.validate_for_account(staff.id, "1111").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_validate_for_account_person_without_account() {
        let fx = Fixture::new();
        let person = fx.repos.persons().create("No", "Account").await.unwrap();
        let staff = fx.repos.staff().create(person.id, "educator").await.unwrap();

        let err = fx.auth.validate_for_account(staff.id, "1111").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
