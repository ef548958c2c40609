//! Account domain model.
//!
//! An account holds login credentials for a staff member or a parent. Staff
//! accounts may additionally carry a PIN for the shared entry terminal; the
//! failed-attempt counter and lockout state live on the account itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared::password::{verify_password, PasswordError};

/// Failed PIN attempts after which an account locks.
pub const MAX_FAILED_PIN_ATTEMPTS: i32 = 5;

/// Account variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Staff,
    Parent,
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountKind::Staff => write!(f, "staff"),
            AccountKind::Parent => write!(f, "parent"),
        }
    }
}

/// Login credential holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub kind: AccountKind,
    /// Argon2id PHC hash of the portal password, absent for PIN-only accounts.
    pub password_hash: Option<String>,
    /// Argon2id PHC hash of the terminal PIN, absent when no PIN is set.
    pub pin_hash: Option<String>,
    pub failed_pin_attempts: i32,
    /// Set when the lock threshold was reached; cleared only by an external
    /// administrative reset.
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether this account has a PIN configured.
    pub fn has_pin(&self) -> bool {
        self.pin_hash.is_some()
    }

    /// Whether the lock threshold has been reached.
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// Verifies a PIN against the stored hash.
    ///
    /// Returns `Ok(false)` when no PIN is configured.
    pub fn verify_pin(&self, pin: &str) -> Result<bool, PasswordError> {
        match &self.pin_hash {
            Some(hash) => verify_password(pin, hash),
            None => Ok(false),
        }
    }

    /// Records a failed PIN attempt, locking the account when the threshold
    /// is reached.
    pub fn record_failed_pin_attempt(&mut self) {
        self.failed_pin_attempts += 1;
        if self.failed_pin_attempts >= MAX_FAILED_PIN_ATTEMPTS && self.locked_at.is_none() {
            self.locked_at = Some(Utc::now());
        }
    }

    /// Resets the failed-attempt counter after a successful verification.
    pub fn reset_failed_pin_attempts(&mut self) {
        self.failed_pin_attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::password::hash_password;

    fn account_with_pin(pin: &str) -> Account {
        Account {
            id: 1,
            email: "staff@example.com".to_string(),
            kind: AccountKind::Staff,
            password_hash: None,
            pin_hash: Some(hash_password(pin).unwrap()),
            failed_pin_attempts: 0,
            locked_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_verify_pin_match_and_mismatch() {
        let account = account_with_pin("4711");
        assert!(account.verify_pin("4711").unwrap());
        assert!(!account.verify_pin("0000").unwrap());
    }

    #[test]
    fn test_verify_pin_without_pin_configured() {
        let mut account = account_with_pin("4711");
        account.pin_hash = None;
        assert!(!account.has_pin());
        assert!(!account.verify_pin("4711").unwrap());
    }

    #[test]
    fn test_failed_attempts_lock_at_threshold() {
        let mut account = account_with_pin("4711");
        for _ in 0..MAX_FAILED_PIN_ATTEMPTS - 1 {
            account.record_failed_pin_attempt();
            assert!(!account.is_locked());
        }
        account.record_failed_pin_attempt();
        assert!(account.is_locked());
        assert_eq!(account.failed_pin_attempts, MAX_FAILED_PIN_ATTEMPTS);
    }

    #[test]
    fn test_lock_timestamp_latches() {
        let mut account = account_with_pin("4711");
        for _ in 0..MAX_FAILED_PIN_ATTEMPTS {
            account.record_failed_pin_attempt();
        }
        let locked_at = account.locked_at;
        account.record_failed_pin_attempt();
        assert_eq!(account.locked_at, locked_at);
    }

    #[test]
    fn test_reset_failed_attempts() {
        let mut account = account_with_pin("4711");
        account.record_failed_pin_attempt();
        account.record_failed_pin_attempt();
        account.reset_failed_pin_attempts();
        assert_eq!(account.failed_pin_attempts, 0);
    }

    #[test]
    fn test_reset_does_not_unlock() {
        let mut account = account_with_pin("4711");
        for _ in 0..MAX_FAILED_PIN_ATTEMPTS {
            account.record_failed_pin_attempt();
        }
        account.reset_failed_pin_attempts();
        // Lock state is cleared only by an external administrative reset.
        assert!(account.is_locked());
    }

    #[test]
    fn test_account_kind_display() {
        assert_eq!(AccountKind::Staff.to_string(), "staff");
        assert_eq!(AccountKind::Parent.to_string(), "parent");
    }
}
