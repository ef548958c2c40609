//! Domain layer for Kita Manager backend.
//!
//! This crate contains the identity-linking and credential-lifecycle engine:
//! - Domain models (Person, Account, RfidCard, GuardianProfile, ...)
//! - Repository and transaction contracts (plus an in-memory implementation)
//! - Business logic services (credential linking, PIN authentication,
//!   guardian invitations)
//! - Domain error types

pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

pub use error::{DomainError, ErrorKind};
