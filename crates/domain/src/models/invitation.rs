//! Guardian invitation domain models.
//!
//! An invitation is a single-use, time-boxed token scoped to one guardian
//! profile. Status is evaluated lazily on read; Accepted and Expired are
//! terminal, and Accepted wins over Expired for tokens that are both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default invitation validity (7 days).
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Invitation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Expired,
    Accepted,
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationStatus::Pending => write!(f, "pending"),
            InvitationStatus::Expired => write!(f, "expired"),
            InvitationStatus::Accepted => write!(f, "accepted"),
        }
    }
}

/// Single-use portal invitation for a guardian.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuardianInvitation {
    pub id: i64,
    pub guardian_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Account id of the staff member who issued the invitation.
    pub created_by: i64,
    pub accepted_at: Option<DateTime<Utc>>,
    /// Set by the notification task once the email went out.
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GuardianInvitation {
    /// Evaluates the status at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.accepted_at.is_some() {
            InvitationStatus::Accepted
        } else if self.expires_at <= now {
            InvitationStatus::Expired
        } else {
            InvitationStatus::Pending
        }
    }

    /// Whether the invitation can still be accepted at `now`.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == InvitationStatus::Pending
    }
}
