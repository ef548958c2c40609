//! In-memory repository implementation for development and testing.
//!
//! Backs every repository contract with a single mutex-guarded state map.
//! The coordinator snapshots the whole state before a unit of work and
//! restores it on error, so transactional all-or-nothing behavior is
//! observable without a database.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DomainError, RepositoryError};
use crate::models::{
    Account, AccountKind, ContactMethod, GuardianInvitation, GuardianProfile, Person, RfidCard,
    Staff, Student, StudentGuardian,
};
use crate::repositories::{
    AccountRepository, GuardianRepository, InvitationRepository, PersonRepository, Repositories,
    RfidCardRepository, StaffRepository, StudentGuardianRepository, StudentRepository,
    TransactionCoordinator,
};

/// Whole-store state. `BTreeMap` keeps listing order deterministic
/// (ascending id, which equals insertion order).
#[derive(Debug, Clone, Default)]
struct StoreState {
    next_id: i64,
    persons: BTreeMap<i64, Person>,
    accounts: BTreeMap<i64, Account>,
    staff: BTreeMap<i64, Staff>,
    rfid_cards: BTreeMap<i64, RfidCard>,
    guardians: BTreeMap<i64, GuardianProfile>,
    invitations: BTreeMap<i64, GuardianInvitation>,
    students: BTreeMap<i64, Student>,
    student_guardians: BTreeMap<i64, StudentGuardian>,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store; hands out repository and coordinator handles that share
/// one state.
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    repos: Arc<InMemoryRepositories>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(StoreState::default()));
        let repos = Arc::new(InMemoryRepositories {
            state: state.clone(),
        });
        Self { state, repos }
    }

    /// Repository bundle backed by this store.
    pub fn repositories(&self) -> Arc<InMemoryRepositories> {
        self.repos.clone()
    }

    /// Snapshot/rollback transaction coordinator for this store.
    pub fn coordinator(&self) -> InMemoryCoordinator {
        InMemoryCoordinator {
            state: self.state.clone(),
            repos: self.repos.clone(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Implements every repository contract over the shared state.
pub struct InMemoryRepositories {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRepositories {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Storage("store mutex poisoned".into()))
    }
}

#[async_trait]
impl PersonRepository for InMemoryRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, RepositoryError> {
        Ok(self.state()?.persons.get(&id).cloned())
    }

    async fn find_by_account_id(
        &self,
        account_id: i64,
    ) -> Result<Option<Person>, RepositoryError> {
        Ok(self
            .state()?
            .persons
            .values()
            .find(|p| p.account_id == Some(account_id))
            .cloned())
    }

    async fn find_by_rfid_card_id(&self, card_id: i64) -> Result<Option<Person>, RepositoryError> {
        Ok(self
            .state()?
            .persons
            .values()
            .find(|p| p.rfid_card_id == Some(card_id))
            .cloned())
    }

    async fn create(&self, first_name: &str, last_name: &str) -> Result<Person, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_id();
        let person = Person {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            account_id: None,
            rfid_card_id: None,
        };
        state.persons.insert(id, person.clone());
        Ok(person)
    }

    async fn update(&self, person: &Person) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.persons.get_mut(&person.id) {
            Some(row) => {
                *row = person.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound { entity: "person" }),
        }
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, RepositoryError> {
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .state()?
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn list_with_pin(&self) -> Result<Vec<Account>, RepositoryError> {
        Ok(self
            .state()?
            .accounts
            .values()
            .filter(|a| a.pin_hash.is_some())
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        email: &str,
        kind: AccountKind,
        password_hash: Option<&str>,
        pin_hash: Option<&str>,
    ) -> Result<Account, RepositoryError> {
        let mut state = self.state()?;
        if state.accounts.values().any(|a| a.email == email) {
            return Err(RepositoryError::Conflict(format!(
                "account with email {} already exists",
                email
            )));
        }
        let id = state.next_id();
        let account = Account {
            id,
            email: email.to_string(),
            kind,
            password_hash: password_hash.map(str::to_string),
            pin_hash: pin_hash.map(str::to_string),
            failed_pin_attempts: 0,
            locked_at: None,
            created_at: Utc::now(),
        };
        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn update(&self, account: &Account) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.accounts.get_mut(&account.id) {
            Some(row) => {
                *row = account.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound { entity: "account" }),
        }
    }
}

#[async_trait]
impl StaffRepository for InMemoryRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<Staff>, RepositoryError> {
        Ok(self.state()?.staff.get(&id).cloned())
    }

    async fn find_by_person_id(&self, person_id: i64) -> Result<Option<Staff>, RepositoryError> {
        Ok(self
            .state()?
            .staff
            .values()
            .find(|s| s.person_id == person_id)
            .cloned())
    }

    async fn create(&self, person_id: i64, role: &str) -> Result<Staff, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_id();
        let staff = Staff {
            id,
            person_id,
            role: role.to_string(),
            active: true,
        };
        state.staff.insert(id, staff.clone());
        Ok(staff)
    }
}

#[async_trait]
impl RfidCardRepository for InMemoryRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<RfidCard>, RepositoryError> {
        Ok(self.state()?.rfid_cards.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<RfidCard>, RepositoryError> {
        Ok(self
            .state()?
            .rfid_cards
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn create(&self, code: &str, active: bool) -> Result<RfidCard, RepositoryError> {
        let mut state = self.state()?;
        if state.rfid_cards.values().any(|c| c.code == code) {
            return Err(RepositoryError::Conflict(format!(
                "card with code {} already exists",
                code
            )));
        }
        let id = state.next_id();
        let card = RfidCard {
            id,
            code: code.to_string(),
            active,
            created_at: Utc::now(),
        };
        state.rfid_cards.insert(id, card.clone());
        Ok(card)
    }

    async fn update(&self, card: &RfidCard) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.rfid_cards.get_mut(&card.id) {
            Some(row) => {
                *row = card.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound { entity: "rfid card" }),
        }
    }
}

#[async_trait]
impl GuardianRepository for InMemoryRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<GuardianProfile>, RepositoryError> {
        Ok(self.state()?.guardians.get(&id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<GuardianProfile>, RepositoryError> {
        Ok(self
            .state()?
            .guardians
            .values()
            .find(|g| g.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_without_account(&self) -> Result<Vec<GuardianProfile>, RepositoryError> {
        Ok(self
            .state()?
            .guardians
            .values()
            .filter(|g| !g.has_account)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        preferred_contact: ContactMethod,
        language: &str,
    ) -> Result<GuardianProfile, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_id();
        let guardian = GuardianProfile {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            preferred_contact,
            language: language.to_string(),
            account_id: None,
            has_account: false,
            created_at: Utc::now(),
        };
        state.guardians.insert(id, guardian.clone());
        Ok(guardian)
    }

    async fn update(&self, guardian: &GuardianProfile) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.guardians.get_mut(&guardian.id) {
            Some(row) => {
                *row = guardian.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity: "guardian profile",
            }),
        }
    }
}

#[async_trait]
impl InvitationRepository for InMemoryRepositories {
    async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<GuardianInvitation>, RepositoryError> {
        Ok(self
            .state()?
            .invitations
            .values()
            .find(|i| i.token == token)
            .cloned())
    }

    async fn find_pending_for_guardian(
        &self,
        guardian_id: i64,
    ) -> Result<Option<GuardianInvitation>, RepositoryError> {
        let now = Utc::now();
        Ok(self
            .state()?
            .invitations
            .values()
            .find(|i| i.guardian_id == guardian_id && i.is_pending(now))
            .cloned())
    }

    async fn create(
        &self,
        guardian_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        created_by: i64,
    ) -> Result<GuardianInvitation, RepositoryError> {
        let mut state = self.state()?;
        let now = Utc::now();
        // Partial-uniqueness guard: at most one pending invitation per
        // guardian, enforced here at the storage layer.
        if state
            .invitations
            .values()
            .any(|i| i.guardian_id == guardian_id && i.is_pending(now))
        {
            return Err(RepositoryError::Conflict(format!(
                "pending invitation already exists for guardian {}",
                guardian_id
            )));
        }
        let id = state.next_id();
        let invitation = GuardianInvitation {
            id,
            guardian_id,
            token: token.to_string(),
            expires_at,
            created_by,
            accepted_at: None,
            sent_at: None,
            created_at: now,
        };
        state.invitations.insert(id, invitation.clone());
        Ok(invitation)
    }

    async fn update(&self, invitation: &GuardianInvitation) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.invitations.get_mut(&invitation.id) {
            Some(row) => {
                *row = invitation.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity: "invitation",
            }),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut state = self.state()?;
        let before = state.invitations.len();
        state
            .invitations
            .retain(|_, i| i.accepted_at.is_some() || i.expires_at > now);
        Ok((before - state.invitations.len()) as u64)
    }
}

#[async_trait]
impl StudentRepository for InMemoryRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<Student>, RepositoryError> {
        Ok(self.state()?.students.get(&id).cloned())
    }

    async fn create(&self, person_id: i64) -> Result<Student, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_id();
        let student = Student {
            id,
            person_id,
            active: true,
        };
        state.students.insert(id, student.clone());
        Ok(student)
    }
}

#[async_trait]
impl StudentGuardianRepository for InMemoryRepositories {
    async fn list_for_guardian(
        &self,
        guardian_id: i64,
    ) -> Result<Vec<StudentGuardian>, RepositoryError> {
        Ok(self
            .state()?
            .student_guardians
            .values()
            .filter(|sg| sg.guardian_id == guardian_id)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        student_id: i64,
        guardian_id: i64,
        is_primary: bool,
    ) -> Result<StudentGuardian, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_id();
        let relation = StudentGuardian {
            id,
            student_id,
            guardian_id,
            is_primary,
            emergency_contact: false,
            pickup_authorized: true,
        };
        state.student_guardians.insert(id, relation.clone());
        Ok(relation)
    }
}

impl Repositories for InMemoryRepositories {
    fn persons(&self) -> &dyn PersonRepository {
        self
    }
    fn accounts(&self) -> &dyn AccountRepository {
        self
    }
    fn staff(&self) -> &dyn StaffRepository {
        self
    }
    fn rfid_cards(&self) -> &dyn RfidCardRepository {
        self
    }
    fn guardians(&self) -> &dyn GuardianRepository {
        self
    }
    fn invitations(&self) -> &dyn InvitationRepository {
        self
    }
    fn students(&self) -> &dyn StudentRepository {
        self
    }
    fn student_guardians(&self) -> &dyn StudentGuardianRepository {
        self
    }
}

/// Snapshot/rollback coordinator over the in-memory store.
#[derive(Clone)]
pub struct InMemoryCoordinator {
    state: Arc<Mutex<StoreState>>,
    repos: Arc<InMemoryRepositories>,
}

impl TransactionCoordinator for InMemoryCoordinator {
    async fn run_in_transaction<T, F, Fut>(&self, work: F) -> Result<T, DomainError>
    where
        T: Send,
        F: FnOnce(Arc<dyn Repositories>) -> Fut + Send,
        Fut: Future<Output = Result<T, DomainError>> + Send,
    {
        let snapshot = self
            .state
            .lock()
            .map_err(|_| {
                DomainError::Repository(RepositoryError::Storage("store mutex poisoned".into()))
            })?
            .clone();

        let repos: Arc<dyn Repositories> = self.repos.clone();
        match work(repos).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if let Ok(mut state) = self.state.lock() {
                    *state = snapshot;
                }
                Err(err)
            }
        }
    }
}
