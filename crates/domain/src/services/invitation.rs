//! Guardian invitation lifecycle: issue, validate, accept.
//!
//! Invitations onboard guardians onto the parent portal. Profile creation,
//! invitation issue and account creation run inside units of work supplied
//! by the transaction coordinator; the invitation email is dispatched on a
//! detached task strictly after commit and never blocks or fails the
//! originating call.

use std::sync::Arc;

use chrono::{Duration, Utc};
use validator::Validate;

use shared::password::hash_password;
use shared::token::generate_invitation_token;
use shared::validation::validate_password_strength;

use crate::error::{DomainError, RepositoryError};
use crate::models::invitation::DEFAULT_TTL_DAYS;
use crate::models::{
    Account, ContactMethod, CreateGuardianRequest, GuardianInvitation, GuardianProfile,
    InvitationStatus,
};
use crate::repositories::{Repositories, TransactionCoordinator};
use crate::services::credential_link::CredentialLinker;
use crate::services::notification::{
    DispatchMetadata, DispatchResult, InvitationMessage, NotificationDispatcher, NotificationKind,
};

/// Configuration for invitation issuing.
#[derive(Debug, Clone)]
pub struct InvitationConfig {
    /// Validity window for new invitations.
    pub ttl: Duration,
    /// Base URL of the parent portal, used to render the invitation link.
    pub portal_base_url: String,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::days(DEFAULT_TTL_DAYS),
            portal_base_url: "https://portal.kita.example".to_string(),
        }
    }
}

/// Guardian-facing view of a valid invitation.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationDetails {
    pub guardian_first_name: String,
    pub guardian_last_name: String,
    pub email: String,
    pub student_names: Vec<String>,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Manages the guardian invitation lifecycle.
pub struct InvitationService<C: TransactionCoordinator> {
    repos: Arc<dyn Repositories>,
    coordinator: C,
    linker: CredentialLinker,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: InvitationConfig,
}

impl<C: TransactionCoordinator> InvitationService<C> {
    pub fn new(
        repos: Arc<dyn Repositories>,
        coordinator: C,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: InvitationConfig,
    ) -> Self {
        Self {
            repos,
            coordinator,
            linker: CredentialLinker::new(),
            dispatcher,
            config,
        }
    }

    /// Creates a guardian profile without an invitation.
    ///
    /// Applies defaults for absent fields: contact method "phone", language
    /// "de".
    pub async fn create_guardian(
        &self,
        request: CreateGuardianRequest,
    ) -> Result<GuardianProfile, DomainError> {
        self.create_guardian_inner(request)
            .await
            .map_err(|e| DomainError::context("create_guardian", e))
    }

    async fn create_guardian_inner(
        &self,
        request: CreateGuardianRequest,
    ) -> Result<GuardianProfile, DomainError> {
        request.validate()?;
        create_guardian_row(&*self.repos, &request).await
    }

    /// Creates a guardian profile and issues an invitation in one unit of
    /// work; either both rows are committed or neither is.
    ///
    /// The invitation email is dispatched on a detached task after commit.
    pub async fn create_guardian_with_invitation(
        &self,
        request: CreateGuardianRequest,
        created_by: i64,
    ) -> Result<(GuardianProfile, GuardianInvitation), DomainError> {
        self.create_guardian_with_invitation_inner(request, created_by)
            .await
            .map_err(|e| DomainError::context("create_guardian_with_invitation", e))
    }

    async fn create_guardian_with_invitation_inner(
        &self,
        request: CreateGuardianRequest,
        created_by: i64,
    ) -> Result<(GuardianProfile, GuardianInvitation), DomainError> {
        request.validate()?;
        let email = request
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                DomainError::Validation("email is required for an invitation".into())
            })?;

        if let Some(existing) = self.repos.guardians().find_by_email(&email).await? {
            if existing.has_account {
                return Err(DomainError::AlreadyExists(
                    "a guardian with this email already has a portal account".into(),
                ));
            }
        }

        let ttl = self.config.ttl;
        let (guardian, invitation) = self
            .coordinator
            .run_in_transaction(move |repos| async move {
                let guardian = create_guardian_row(&*repos, &request).await?;
                let invitation = issue_invitation(&*repos, &guardian, created_by, ttl).await?;
                Ok((guardian, invitation))
            })
            .await?;

        self.spawn_email(guardian.clone(), invitation.clone());
        Ok((guardian, invitation))
    }

    /// Issues an invitation for an existing guardian profile.
    ///
    /// Fails when the guardian cannot be invited (no email, already has an
    /// account) or when a still-valid invitation exists. The email is
    /// dispatched on a detached task after the invitation row is committed.
    pub async fn send_invitation(
        &self,
        guardian_id: i64,
        created_by: i64,
    ) -> Result<GuardianInvitation, DomainError> {
        self.send_invitation_inner(guardian_id, created_by)
            .await
            .map_err(|e| DomainError::context("send_invitation", e))
    }

    async fn send_invitation_inner(
        &self,
        guardian_id: i64,
        created_by: i64,
    ) -> Result<GuardianInvitation, DomainError> {
        let guardian = self
            .repos
            .guardians()
            .find_by_id(guardian_id)
            .await?
            .ok_or_else(|| DomainError::not_found("guardian profile"))?;

        let invitation =
            issue_invitation(&*self.repos, &guardian, created_by, self.config.ttl).await?;

        self.spawn_email(guardian, invitation.clone());
        Ok(invitation)
    }

    /// Resolves an invitation token for display to the invitee.
    ///
    /// Unlike the email path, student-name resolution failures propagate
    /// here: the call is synchronous and user-facing.
    pub async fn validate_invitation(&self, token: &str) -> Result<InvitationDetails, DomainError> {
        self.validate_invitation_inner(token)
            .await
            .map_err(|e| DomainError::context("validate_invitation", e))
    }

    async fn validate_invitation_inner(
        &self,
        token: &str,
    ) -> Result<InvitationDetails, DomainError> {
        let (invitation, guardian) = self.load_valid_invitation(token).await?;
        let student_names = resolve_student_names(&*self.repos, guardian.id).await?;

        Ok(InvitationDetails {
            guardian_first_name: guardian.first_name,
            guardian_last_name: guardian.last_name,
            email: guardian.email.unwrap_or_default(),
            student_names,
            expires_at: invitation.expires_at,
        })
    }

    /// Accepts an invitation: creates the portal account, links it to the
    /// guardian profile and marks the invitation accepted, atomically.
    ///
    /// Password confirmation and strength are checked before any storage
    /// access. Re-accepting an already-accepted token fails with
    /// AlreadyAccepted.
    pub async fn accept_invitation(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Account, DomainError> {
        self.accept_invitation_inner(token, password, confirm_password)
            .await
            .map_err(|e| DomainError::context("accept_invitation", e))
    }

    async fn accept_invitation_inner(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Account, DomainError> {
        if password != confirm_password {
            return Err(DomainError::Validation("passwords do not match".into()));
        }
        validate_password_strength(password)?;

        let (invitation, guardian) = self.load_valid_invitation(token).await?;
        if guardian.has_account {
            return Err(DomainError::AlreadyExists(
                "guardian already has a portal account".into(),
            ));
        }

        let password_hash = hash_password(password)?;
        let linker = self.linker;

        self.coordinator
            .run_in_transaction(move |repos| async move {
                let account = linker
                    .create_guardian_account(&*repos, &guardian, &password_hash)
                    .await?;

                let mut guardian = guardian;
                guardian.account_id = Some(account.id);
                guardian.has_account = true;
                repos.guardians().update(&guardian).await?;

                let mut invitation = invitation;
                invitation.accepted_at = Some(Utc::now());
                repos.invitations().update(&invitation).await?;

                tracing::info!(
                    guardian_id = guardian.id,
                    account_id = account.id,
                    "Guardian invitation accepted"
                );
                Ok(account)
            })
            .await
    }

    /// Deletes expired, unaccepted invitations. Returns the number removed.
    ///
    /// Expiry stays evaluated lazily on read regardless of when this sweep
    /// runs.
    pub async fn purge_expired(&self) -> Result<u64, DomainError> {
        let removed = self
            .repos
            .invitations()
            .delete_expired(Utc::now())
            .await
            .map_err(|e| DomainError::context("purge_expired", e.into()))?;
        if removed > 0 {
            tracing::info!(removed, "Purged expired invitations");
        }
        Ok(removed)
    }

    /// Lists guardians that can currently receive an invitation.
    pub async fn list_invitable_guardians(&self) -> Result<Vec<GuardianProfile>, DomainError> {
        let guardians = self
            .repos
            .guardians()
            .find_without_account()
            .await
            .map_err(|e| DomainError::context("list_invitable_guardians", e.into()))?;
        Ok(guardians
            .into_iter()
            .filter(|g| g.can_be_invited())
            .collect())
    }

    /// Loads an invitation by token and rejects terminal states.
    async fn load_valid_invitation(
        &self,
        token: &str,
    ) -> Result<(GuardianInvitation, GuardianProfile), DomainError> {
        let invitation = self
            .repos
            .invitations()
            .find_by_token(token)
            .await?
            .ok_or_else(|| DomainError::not_found("invitation"))?;

        match invitation.status(Utc::now()) {
            InvitationStatus::Accepted => return Err(DomainError::AlreadyAccepted),
            InvitationStatus::Expired => return Err(DomainError::Expired),
            InvitationStatus::Pending => {}
        }

        let guardian = self
            .repos
            .guardians()
            .find_by_id(invitation.guardian_id)
            .await?
            .ok_or_else(|| DomainError::not_found("guardian profile"))?;

        Ok((invitation, guardian))
    }

    /// Hands the invitation email to a detached task. The caller returns
    /// immediately; delivery status is written back by the task itself.
    fn spawn_email(&self, guardian: GuardianProfile, invitation: GuardianInvitation) {
        let repos = self.repos.clone();
        let dispatcher = self.dispatcher.clone();
        let portal_base_url = self.config.portal_base_url.clone();
        tokio::spawn(dispatch_invitation_email(
            repos,
            dispatcher,
            portal_base_url,
            guardian,
            invitation,
        ));
    }
}

/// Inserts a guardian profile row, applying field defaults.
async fn create_guardian_row(
    repos: &dyn Repositories,
    request: &CreateGuardianRequest,
) -> Result<GuardianProfile, DomainError> {
    let guardian = repos
        .guardians()
        .create(
            &request.first_name,
            &request.last_name,
            request.email.as_deref().filter(|e| !e.is_empty()),
            request.phone.as_deref(),
            request.preferred_contact.unwrap_or(ContactMethod::Phone),
            request
                .language
                .as_deref()
                .filter(|l| !l.is_empty())
                .unwrap_or(crate::models::guardian::DEFAULT_LANGUAGE),
        )
        .await?;
    tracing::info!(guardian_id = guardian.id, "Created guardian profile");
    Ok(guardian)
}

/// Persists a new invitation for a guardian after checking invitability and
/// the one-pending-invitation rule. A storage-level conflict (two racing
/// issuers) surfaces as AlreadyExists.
async fn issue_invitation(
    repos: &dyn Repositories,
    guardian: &GuardianProfile,
    created_by: i64,
    ttl: Duration,
) -> Result<GuardianInvitation, DomainError> {
    if guardian.has_account {
        return Err(DomainError::AlreadyExists(
            "guardian already has a portal account".into(),
        ));
    }
    if !guardian
        .email
        .as_deref()
        .is_some_and(|e| !e.is_empty())
    {
        return Err(DomainError::Validation(
            "guardian has no email address".into(),
        ));
    }
    if repos
        .invitations()
        .find_pending_for_guardian(guardian.id)
        .await?
        .is_some()
    {
        return Err(DomainError::AlreadyExists(
            "a pending invitation already exists for this guardian".into(),
        ));
    }

    let token = generate_invitation_token();
    let expires_at = Utc::now() + ttl;
    let invitation = repos
        .invitations()
        .create(guardian.id, &token, expires_at, created_by)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(msg) => DomainError::AlreadyExists(msg),
            other => other.into(),
        })?;

    tracing::info!(
        guardian_id = guardian.id,
        invitation_id = invitation.id,
        "Issued guardian invitation"
    );
    Ok(invitation)
}

/// Resolves the full names of students linked to a guardian
/// (StudentGuardian → Student → Person).
async fn resolve_student_names(
    repos: &dyn Repositories,
    guardian_id: i64,
) -> Result<Vec<String>, DomainError> {
    let relations = repos
        .student_guardians()
        .list_for_guardian(guardian_id)
        .await?;
    let mut names = Vec::with_capacity(relations.len());
    for relation in relations {
        let student = repos
            .students()
            .find_by_id(relation.student_id)
            .await?
            .ok_or_else(|| DomainError::not_found("student"))?;
        let person = repos
            .persons()
            .find_by_id(student.person_id)
            .await?
            .ok_or_else(|| DomainError::not_found("person"))?;
        names.push(person.full_name());
    }
    Ok(names)
}

/// Detached email task: renders and dispatches the invitation message, then
/// records delivery status on the invitation row.
///
/// Student-name resolution failure degrades to an empty list; dispatch
/// failure is logged and swallowed. By the time this runs the invitation is
/// already committed, so nothing here can roll it back.
async fn dispatch_invitation_email(
    repos: Arc<dyn Repositories>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    portal_base_url: String,
    guardian: GuardianProfile,
    invitation: GuardianInvitation,
) {
    let student_names = match resolve_student_names(&*repos, guardian.id).await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(
                guardian_id = guardian.id,
                error = %err,
                "Student name resolution failed; sending invitation without student context"
            );
            Vec::new()
        }
    };

    let recipient = guardian.email.clone().unwrap_or_default();
    let message = InvitationMessage {
        recipient: recipient.clone(),
        guardian_name: guardian.full_name(),
        student_names,
        portal_url: format!("{}/invitations/{}", portal_base_url, invitation.token),
        expires_at: invitation.expires_at,
        language: guardian.language.clone(),
    };
    let metadata = DispatchMetadata {
        kind: NotificationKind::GuardianInvitation,
        reference_id: invitation.id,
        token: invitation.token.clone(),
        recipient,
    };

    match dispatcher.dispatch(message, metadata).await {
        DispatchResult::Sent => {
            let mut updated = invitation;
            updated.sent_at = Some(Utc::now());
            if let Err(err) = repos.invitations().update(&updated).await {
                tracing::warn!(
                    invitation_id = updated.id,
                    error = %err,
                    "Failed to record invitation delivery status"
                );
            }
        }
        DispatchResult::Failed(reason) => {
            tracing::warn!(
                invitation_id = invitation.id,
                %reason,
                "Invitation email dispatch failed"
            );
        }
        DispatchResult::Skipped => {
            tracing::info!(invitation_id = invitation.id, "Invitation email dispatch skipped");
        }
    }
}
