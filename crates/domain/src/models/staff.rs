//! Staff domain model.

use serde::{Deserialize, Serialize};

/// Staff member record, tied to a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Staff {
    pub id: i64,
    pub person_id: i64,
    pub role: String,
    pub active: bool,
}
