//! Domain services for Kita Manager.
//!
//! Services contain business logic that operates on domain models through
//! the repository contracts.

pub mod credential_link;
pub mod invitation;
pub mod notification;
pub mod pin_auth;

pub use credential_link::CredentialLinker;
pub use invitation::{InvitationConfig, InvitationDetails, InvitationService};
pub use notification::{
    DispatchMetadata, DispatchResult, InvitationMessage, MockNotificationDispatcher,
    NotificationDispatcher, NotificationKind,
};
pub use pin_auth::{AuthenticatedStaff, PinAuthenticator};
