//! Domain models for Kita Manager.

pub mod account;
pub mod guardian;
pub mod invitation;
pub mod person;
pub mod rfid_card;
pub mod staff;
pub mod student;

pub use account::{Account, AccountKind, MAX_FAILED_PIN_ATTEMPTS};
pub use guardian::{ContactMethod, CreateGuardianRequest, GuardianProfile};
pub use invitation::{GuardianInvitation, InvitationStatus};
pub use person::Person;
pub use rfid_card::RfidCard;
pub use staff::Staff;
pub use student::{Student, StudentGuardian};
