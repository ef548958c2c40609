//! RFID card domain model.
//!
//! A physical proximity card identified by its printed code. Ownership is
//! recorded on the person side (`Person::rfid_card_id`), not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical RFID card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RfidCard {
    pub id: i64,
    /// Code printed on the card, used at the entry terminal.
    pub code: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
