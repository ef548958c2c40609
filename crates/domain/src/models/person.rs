//! Person domain model.
//!
//! A person is the core identity row, distinct from login credentials. The
//! owning edges to an account and an RFID card live here: a person holds at
//! most one of each at any time.

use serde::{Deserialize, Serialize};

/// Core identity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Linked login account, if any.
    pub account_id: Option<i64>,
    /// Linked RFID card, if any.
    pub rfid_card_id: Option<i64>,
}

impl Person {
    /// Full display name ("First Last").
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
