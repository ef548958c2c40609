//! Guardian profile domain models.
//!
//! A guardian profile exists independently of portal access; `has_account`
//! flips to true exactly once, when an invitation is accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default language for guardian communication.
pub const DEFAULT_LANGUAGE: &str = "de";

/// Preferred contact method for a guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    #[default]
    Phone,
    Email,
    Sms,
}

impl std::fmt::Display for ContactMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactMethod::Phone => write!(f, "phone"),
            ContactMethod::Email => write!(f, "email"),
            ContactMethod::Sms => write!(f, "sms"),
        }
    }
}

/// Guardian profile domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuardianProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferred_contact: ContactMethod,
    /// ISO 639-1 language code for communication.
    pub language: String,
    /// Linked portal account, set when an invitation is accepted.
    pub account_id: Option<i64>,
    pub has_account: bool,
    pub created_at: DateTime<Utc>,
}

impl GuardianProfile {
    /// Full display name ("First Last").
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether this guardian can receive a portal invitation.
    ///
    /// Invitations are email-only and a guardian who already holds an
    /// account cannot be invited again.
    pub fn can_be_invited(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty()) && !self.has_account
    }
}

/// Request to create a guardian profile.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateGuardianRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email address"))]
    #[validate(length(max = 255, message = "Email must be at most 255 characters"))]
    pub email: Option<String>,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    /// Preferred contact method (default: phone).
    pub preferred_contact: Option<ContactMethod>,

    /// Language code (default: "de").
    #[validate(length(min = 2, max = 8, message = "Invalid language code"))]
    pub language: Option<String>,
}
