//! Credential linking between persons, accounts and RFID cards.
//!
//! The linker is stateless; every operation takes the repository handle
//! explicitly so the same code runs against ambient repositories or ones
//! rebound to a transaction.

use crate::error::{DomainError, RepositoryError};
use crate::models::{Account, AccountKind, GuardianProfile};
use crate::repositories::Repositories;

/// Binds and unbinds credentials (accounts, RFID cards) to persons.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialLinker;

impl CredentialLinker {
    pub fn new() -> Self {
        Self
    }

    /// Links an account to a person.
    ///
    /// Fails with NotFound if either row is absent and with AlreadyLinked if
    /// the account is bound to a different person. Re-linking the same pair
    /// is a no-op success.
    pub async fn link_account(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
        account_id: i64,
    ) -> Result<(), DomainError> {
        self.link_account_inner(repos, person_id, account_id)
            .await
            .map_err(|e| DomainError::context("link_account", e))
    }

    async fn link_account_inner(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
        account_id: i64,
    ) -> Result<(), DomainError> {
        repos
            .accounts()
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("account"))?;
        let mut person = repos
            .persons()
            .find_by_id(person_id)
            .await?
            .ok_or_else(|| DomainError::not_found("person"))?;

        if person.account_id == Some(account_id) {
            return Ok(());
        }

        if let Some(holder) = repos.persons().find_by_account_id(account_id).await? {
            if holder.id != person_id {
                return Err(DomainError::AlreadyLinked(format!(
                    "account {} is linked to another person",
                    account_id
                )));
            }
        }

        person.account_id = Some(account_id);
        repos.persons().update(&person).await?;
        tracing::info!(person_id, account_id, "Linked account to person");
        Ok(())
    }

    /// Links an RFID card to a person, addressed by its printed code.
    ///
    /// An unknown code is auto-created as an active card (a blank card is
    /// presented at the terminal before it exists in the system). A card
    /// held by a different person is transferred: the previous holder is
    /// unlinked first. Re-linking the same pair is a no-op success.
    pub async fn link_rfid_tag(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
        tag_code: &str,
    ) -> Result<(), DomainError> {
        self.link_rfid_tag_inner(repos, person_id, tag_code)
            .await
            .map_err(|e| DomainError::context("link_rfid_tag", e))
    }

    async fn link_rfid_tag_inner(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
        tag_code: &str,
    ) -> Result<(), DomainError> {
        if tag_code.is_empty() {
            return Err(DomainError::Validation("tag code must not be empty".into()));
        }

        let mut person = repos
            .persons()
            .find_by_id(person_id)
            .await?
            .ok_or_else(|| DomainError::not_found("person"))?;

        let card = match repos.rfid_cards().find_by_code(tag_code).await? {
            Some(card) => card,
            None => {
                let card = repos.rfid_cards().create(tag_code, true).await?;
                tracing::info!(card_id = card.id, code = %tag_code, "Auto-created RFID card");
                card
            }
        };

        if person.rfid_card_id == Some(card.id) {
            return Ok(());
        }

        if let Some(mut holder) = repos.persons().find_by_rfid_card_id(card.id).await? {
            if holder.id != person_id {
                holder.rfid_card_id = None;
                repos.persons().update(&holder).await?;
                tracing::info!(
                    card_id = card.id,
                    from_person = holder.id,
                    to_person = person_id,
                    "Transferred RFID card"
                );
            }
        }

        person.rfid_card_id = Some(card.id);
        repos.persons().update(&person).await?;
        Ok(())
    }

    /// Unlinks the person's account, if any. Idempotent.
    pub async fn unlink_account(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
    ) -> Result<(), DomainError> {
        self.unlink_account_inner(repos, person_id)
            .await
            .map_err(|e| DomainError::context("unlink_account", e))
    }

    async fn unlink_account_inner(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
    ) -> Result<(), DomainError> {
        let mut person = repos
            .persons()
            .find_by_id(person_id)
            .await?
            .ok_or_else(|| DomainError::not_found("person"))?;
        if person.account_id.is_none() {
            return Ok(());
        }
        person.account_id = None;
        repos.persons().update(&person).await?;
        Ok(())
    }

    /// Unlinks the person's RFID card, if any. Idempotent. The card row
    /// itself is not deleted.
    pub async fn unlink_rfid_tag(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
    ) -> Result<(), DomainError> {
        self.unlink_rfid_tag_inner(repos, person_id)
            .await
            .map_err(|e| DomainError::context("unlink_rfid_tag", e))
    }

    async fn unlink_rfid_tag_inner(
        &self,
        repos: &dyn Repositories,
        person_id: i64,
    ) -> Result<(), DomainError> {
        let mut person = repos
            .persons()
            .find_by_id(person_id)
            .await?
            .ok_or_else(|| DomainError::not_found("person"))?;
        if person.rfid_card_id.is_none() {
            return Ok(());
        }
        person.rfid_card_id = None;
        repos.persons().update(&person).await?;
        Ok(())
    }

    /// Creates a parent portal account for a guardian during invitation
    /// acceptance.
    pub async fn create_guardian_account(
        &self,
        repos: &dyn Repositories,
        guardian: &GuardianProfile,
        password_hash: &str,
    ) -> Result<Account, DomainError> {
        self.create_guardian_account_inner(repos, guardian, password_hash)
            .await
            .map_err(|e| DomainError::context("create_guardian_account", e))
    }

    async fn create_guardian_account_inner(
        &self,
        repos: &dyn Repositories,
        guardian: &GuardianProfile,
        password_hash: &str,
    ) -> Result<Account, DomainError> {
        let email = guardian
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| DomainError::Validation("guardian has no email address".into()))?;

        let account = repos
            .accounts()
            .create(email, AccountKind::Parent, Some(password_hash), None)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => DomainError::AlreadyExists(msg),
                other => other.into(),
            })?;
        tracing::info!(guardian_id = guardian.id, account_id = account.id, "Created guardian account");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::ContactMethod;
    use crate::repositories::memory::{InMemoryRepositories, InMemoryStore};
    use std::sync::Arc;

    async fn setup() -> (Arc<InMemoryRepositories>, CredentialLinker) {
        let store = InMemoryStore::new();
        (store.repositories(), CredentialLinker::new())
    }

    #[tokio::test]
    async fn test_link_account_success_and_idempotent() {
        let (repos, linker) = setup().await;
        let person = repos.persons().create("Anna", "Schmidt").await.unwrap();
        let account = repos
            .accounts()
            .create("a@example.com", AccountKind::Staff, None, None)
            .await
            .unwrap();

        linker
            .link_account(&*repos, person.id, account.id)
            .await
            .unwrap();
        let linked = repos.persons().find_by_id(person.id).await.unwrap().unwrap();
        assert_eq!(linked.account_id, Some(account.id));

        // Re-linking the same pair is a no-op success.
        linker
            .link_account(&*repos, person.id, account.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_link_account_missing_account() {
        let (repos, linker) = setup().await;
        let person = repos.persons().create("Anna", "Schmidt").await.unwrap();

        let err = linker.link_account(&*repos, person.id, 999).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_link_account_held_by_other_person() {
        let (repos, linker) = setup().await;
        let alice = repos.persons().create("Alice", "A").await.unwrap();
        let bob = repos.persons().create("Bob", "B").await.unwrap();
        let account = repos
            .accounts()
            .create("a@example.com", AccountKind::Staff, None, None)
            .await
            .unwrap();

        linker.link_account(&*repos, alice.id, account.id).await.unwrap();
        let err = linker
            .link_account(&*repos, bob.id, account.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyLinked);
    }

    #[tokio::test]
    async fn test_link_rfid_tag_auto_creates_card() {
        let (repos, linker) = setup().await;
        let person = repos.persons().create("Anna", "Schmidt").await.unwrap();

        linker
            .link_rfid_tag(&*repos, person.id, "ABCDEF1234567890")
            .await
            .unwrap();

        let card = repos
            .rfid_cards()
            .find_by_code("ABCDEF1234567890")
            .await
            .unwrap()
            .expect("card should be auto-created");
        assert!(card.active);
        let linked = repos.persons().find_by_id(person.id).await.unwrap().unwrap();
        assert_eq!(linked.rfid_card_id, Some(card.id));
    }

    #[tokio::test]
    async fn test_link_rfid_tag_transfers_ownership() {
        let (repos, linker) = setup().await;
        let alice = repos.persons().create("Alice", "A").await.unwrap();
        let bob = repos.persons().create("Bob", "B").await.unwrap();

        linker
            .link_rfid_tag(&*repos, alice.id, "ABCDEF1234567890")
            .await
            .unwrap();
        linker
            .link_rfid_tag(&*repos, bob.id, "ABCDEF1234567890")
            .await
            .unwrap();

        let card = repos
            .rfid_cards()
            .find_by_code("ABCDEF1234567890")
            .await
            .unwrap()
            .unwrap();
        let holder = repos
            .persons()
            .find_by_rfid_card_id(card.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(holder.id, bob.id);

        // The previous holder no longer resolves to the card.
        let alice = repos.persons().find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(alice.rfid_card_id, None);
    }

    #[tokio::test]
    async fn test_link_rfid_tag_idempotent() {
        let (repos, linker) = setup().await;
        let person = repos.persons().create("Anna", "Schmidt").await.unwrap();

        linker.link_rfid_tag(&*repos, person.id, "CARD1").await.unwrap();
        linker.link_rfid_tag(&*repos, person.id, "CARD1").await.unwrap();

        let linked = repos.persons().find_by_id(person.id).await.unwrap().unwrap();
        assert!(linked.rfid_card_id.is_some());
    }

    #[tokio::test]
    async fn test_unlink_account_idempotent() {
        let (repos, linker) = setup().await;
        let person = repos.persons().create("Anna", "Schmidt").await.unwrap();
        let account = repos
            .accounts()
            .create("a@example.com", AccountKind::Staff, None, None)
            .await
            .unwrap();

        // Unlinking with no link in place succeeds.
        linker.unlink_account(&*repos, person.id).await.unwrap();

        linker.link_account(&*repos, person.id, account.id).await.unwrap();
        linker.unlink_account(&*repos, person.id).await.unwrap();
        let unlinked = repos.persons().find_by_id(person.id).await.unwrap().unwrap();
        assert_eq!(unlinked.account_id, None);

        // Account row itself survives.
        assert!(repos.accounts().find_by_id(account.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unlink_rfid_tag_idempotent_and_keeps_card() {
        let (repos, linker) = setup().await;
        let person = repos.persons().create("Anna", "Schmidt").await.unwrap();

        linker.unlink_rfid_tag(&*repos, person.id).await.unwrap();

        linker.link_rfid_tag(&*repos, person.id, "CARD1").await.unwrap();
        linker.unlink_rfid_tag(&*repos, person.id).await.unwrap();

        let unlinked = repos.persons().find_by_id(person.id).await.unwrap().unwrap();
        assert_eq!(unlinked.rfid_card_id, None);
        assert!(repos.rfid_cards().find_by_code("CARD1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_guardian_account_requires_email() {
        let (repos, linker) = setup().await;
        let guardian = GuardianProfile {
            id: 1,
            first_name: "Maria".to_string(),
            last_name: "Weber".to_string(),
            email: None,
            phone: None,
            preferred_contact: ContactMethod::Phone,
            language: "de".to_string(),
            account_id: None,
            has_account: false,
            created_at: chrono::Utc::now(),
        };

        let err = linker
            .create_guardian_account(&*repos, &guardian, "$argon2id$hash")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_create_guardian_account_duplicate_email() {
        let (repos, linker) = setup().await;
        repos
            .accounts()
            .create("g@example.com", AccountKind::Parent, None, None)
            .await
            .unwrap();
        let guardian = GuardianProfile {
            id: 1,
            first_name: "Maria".to_string(),
            last_name: "Weber".to_string(),
            email: Some("g@example.com".to_string()),
            phone: None,
            preferred_contact: ContactMethod::Phone,
            language: "de".to_string(),
            account_id: None,
            has_account: false,
            created_at: chrono::Utc::now(),
        };

        let err = linker
            .create_guardian_account(&*repos, &guardian, "$argon2id$hash")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }
}
