//! Repository and transaction contracts consumed by the credential engine.
//!
//! Persistence is out of scope for this crate; these traits define the
//! surface a storage backend must provide. The [`memory`] module ships a
//! complete in-memory implementation used by tests and development setups.

pub mod memory;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DomainError, RepositoryError};
use crate::models::{
    Account, AccountKind, ContactMethod, GuardianInvitation, GuardianProfile, Person, RfidCard,
    Staff, Student, StudentGuardian,
};

/// Persistence operations for [`Person`].
#[async_trait]
pub trait PersonRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, RepositoryError>;

    /// Finds the person currently linked to an account, if any.
    async fn find_by_account_id(&self, account_id: i64)
        -> Result<Option<Person>, RepositoryError>;

    /// Finds the person currently holding an RFID card, if any.
    async fn find_by_rfid_card_id(&self, card_id: i64)
        -> Result<Option<Person>, RepositoryError>;

    async fn create(&self, first_name: &str, last_name: &str) -> Result<Person, RepositoryError>;

    async fn update(&self, person: &Person) -> Result<(), RepositoryError>;
}

/// Persistence operations for [`Account`].
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;

    /// Lists accounts that have a PIN configured, in repository order.
    ///
    /// The PIN scan in the authenticator probes candidates in exactly this
    /// order.
    async fn list_with_pin(&self) -> Result<Vec<Account>, RepositoryError>;

    async fn create(
        &self,
        email: &str,
        kind: AccountKind,
        password_hash: Option<&str>,
        pin_hash: Option<&str>,
    ) -> Result<Account, RepositoryError>;

    async fn update(&self, account: &Account) -> Result<(), RepositoryError>;
}

/// Persistence operations for [`Staff`].
#[async_trait]
pub trait StaffRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Staff>, RepositoryError>;

    async fn find_by_person_id(&self, person_id: i64) -> Result<Option<Staff>, RepositoryError>;

    async fn create(&self, person_id: i64, role: &str) -> Result<Staff, RepositoryError>;
}

/// Persistence operations for [`RfidCard`].
#[async_trait]
pub trait RfidCardRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<RfidCard>, RepositoryError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<RfidCard>, RepositoryError>;

    async fn create(&self, code: &str, active: bool) -> Result<RfidCard, RepositoryError>;

    async fn update(&self, card: &RfidCard) -> Result<(), RepositoryError>;
}

/// Persistence operations for [`GuardianProfile`].
#[async_trait]
pub trait GuardianRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<GuardianProfile>, RepositoryError>;

    async fn find_by_email(&self, email: &str)
        -> Result<Option<GuardianProfile>, RepositoryError>;

    /// Lists guardians without a portal account (candidates for invitation).
    async fn find_without_account(&self) -> Result<Vec<GuardianProfile>, RepositoryError>;

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        preferred_contact: ContactMethod,
        language: &str,
    ) -> Result<GuardianProfile, RepositoryError>;

    async fn update(&self, guardian: &GuardianProfile) -> Result<(), RepositoryError>;
}

/// Persistence operations for [`GuardianInvitation`].
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn find_by_token(&self, token: &str)
        -> Result<Option<GuardianInvitation>, RepositoryError>;

    /// Finds a still-valid (not accepted, not expired) invitation for a
    /// guardian.
    async fn find_pending_for_guardian(
        &self,
        guardian_id: i64,
    ) -> Result<Option<GuardianInvitation>, RepositoryError>;

    /// Persists a new invitation.
    ///
    /// The storage layer enforces "at most one pending invitation per
    /// guardian" and returns [`RepositoryError::Conflict`] on violation, so
    /// two racing callers cannot both commit a valid invitation.
    async fn create(
        &self,
        guardian_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        created_by: i64,
    ) -> Result<GuardianInvitation, RepositoryError>;

    async fn update(&self, invitation: &GuardianInvitation) -> Result<(), RepositoryError>;

    /// Deletes expired, unaccepted invitations. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Persistence operations for [`Student`].
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Student>, RepositoryError>;

    async fn create(&self, person_id: i64) -> Result<Student, RepositoryError>;
}

/// Persistence operations for [`StudentGuardian`].
#[async_trait]
pub trait StudentGuardianRepository: Send + Sync {
    /// Lists relationship rows for a guardian.
    async fn list_for_guardian(
        &self,
        guardian_id: i64,
    ) -> Result<Vec<StudentGuardian>, RepositoryError>;

    async fn create(
        &self,
        student_id: i64,
        guardian_id: i64,
        is_primary: bool,
    ) -> Result<StudentGuardian, RepositoryError>;
}

/// Bundle of all repositories, bound to one storage handle.
///
/// Services receive this either ambiently (reads, single writes) or rebound
/// to a transaction via [`TransactionCoordinator::run_in_transaction`].
pub trait Repositories: Send + Sync {
    fn persons(&self) -> &dyn PersonRepository;
    fn accounts(&self) -> &dyn AccountRepository;
    fn staff(&self) -> &dyn StaffRepository;
    fn rfid_cards(&self) -> &dyn RfidCardRepository;
    fn guardians(&self) -> &dyn GuardianRepository;
    fn invitations(&self) -> &dyn InvitationRepository;
    fn students(&self) -> &dyn StudentRepository;
    fn student_guardians(&self) -> &dyn StudentGuardianRepository;
}

/// Unit-of-work primitive.
///
/// Runs `work` against repositories rebound to one atomic unit; the unit
/// commits when the closure returns `Ok` and rolls back entirely on `Err`.
/// The unit of work is passed into the closure, never reconstructed by the
/// components using it.
#[allow(async_fn_in_trait)]
pub trait TransactionCoordinator: Send + Sync {
    async fn run_in_transaction<T, F, Fut>(&self, work: F) -> Result<T, DomainError>
    where
        T: Send,
        F: FnOnce(Arc<dyn Repositories>) -> Fut + Send,
        Fut: Future<Output = Result<T, DomainError>> + Send;
}
