//! Domain error types for the credential engine.
//!
//! Every public service operation wraps failures with the operation name via
//! [`DomainError::context`]; the underlying kind stays observable through
//! [`DomainError::kind`] so the API layer can map it to a distinct status.

use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Domain error taxonomy.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("already linked: {0}")]
    AlreadyLinked(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid PIN")]
    InvalidCredential,

    #[error("account is locked")]
    Locked,

    #[error("invitation has expired")]
    Expired,

    #[error("invitation has already been accepted")]
    AlreadyAccepted,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{operation}: {source}")]
    Context {
        operation: &'static str,
        #[source]
        source: Box<DomainError>,
    },
}

/// Classification of a [`DomainError`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyLinked,
    AlreadyExists,
    InvalidCredential,
    Locked,
    Expired,
    AlreadyAccepted,
    Validation,
    Repository,
}

impl DomainError {
    /// Wraps an error with the name of the failing operation.
    pub fn context(operation: &'static str, source: DomainError) -> Self {
        DomainError::Context {
            operation,
            source: Box::new(source),
        }
    }

    /// Shorthand for a missing-entity error.
    pub fn not_found(entity: &'static str) -> Self {
        DomainError::NotFound { entity }
    }

    /// Classifies this error, looking through any context wrapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::AlreadyLinked(_) => ErrorKind::AlreadyLinked,
            DomainError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            DomainError::InvalidCredential => ErrorKind::InvalidCredential,
            DomainError::Locked => ErrorKind::Locked,
            DomainError::Expired => ErrorKind::Expired,
            DomainError::AlreadyAccepted => ErrorKind::AlreadyAccepted,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::Repository(RepositoryError::NotFound { .. }) => ErrorKind::NotFound,
            DomainError::Repository(RepositoryError::Conflict(_)) => ErrorKind::AlreadyExists,
            DomainError::Repository(_) => ErrorKind::Repository,
            DomainError::Context { source, .. } => source.kind(),
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let reason = e.message.clone().map(|m| m.to_string()).unwrap_or_default();
                    format!("{}: {}", field, reason)
                })
            })
            .collect();

        DomainError::Validation(messages.join("; "))
    }
}

impl From<validator::ValidationError> for DomainError {
    fn from(error: validator::ValidationError) -> Self {
        let reason = error
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| error.code.to_string());
        DomainError::Validation(reason)
    }
}

impl From<shared::password::PasswordError> for DomainError {
    fn from(error: shared::password::PasswordError) -> Self {
        DomainError::Repository(RepositoryError::Storage(error.to_string()))
    }
}
