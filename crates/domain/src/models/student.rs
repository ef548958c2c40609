//! Student domain models.
//!
//! Students and the student-guardian relationship are not part of the
//! credential engine proper; they are consumed when rendering invitation
//! context (student names shown to the invitee).

use serde::{Deserialize, Serialize};

/// Enrolled student, tied to a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Student {
    pub id: i64,
    pub person_id: i64,
    pub active: bool,
}

/// Relationship between a student and a guardian.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StudentGuardian {
    pub id: i64,
    pub student_id: i64,
    pub guardian_id: i64,
    pub is_primary: bool,
    pub emergency_contact: bool,
    pub pickup_authorized: bool,
}
