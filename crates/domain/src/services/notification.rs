//! Notification dispatch contract for invitation emails.
//!
//! The credential engine only guarantees a message is enqueued after the
//! invitation row is committed; delivery (including retry policy) is owned
//! by the dispatcher implementation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    GuardianInvitation,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::GuardianInvitation => write!(f, "guardian_invitation"),
        }
    }
}

/// Rendered invitation email content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationMessage {
    pub recipient: String,
    pub guardian_name: String,
    /// Full names of the students linked to the invited guardian; empty when
    /// resolution failed (degraded send).
    pub student_names: Vec<String>,
    pub portal_url: String,
    pub expires_at: DateTime<Utc>,
    /// ISO 639-1 language code for the email template.
    pub language: String,
}

/// Delivery metadata carried alongside a message for correlation/auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchMetadata {
    pub kind: NotificationKind,
    /// Id of the invitation row this message belongs to.
    pub reference_id: i64,
    pub token: String,
    pub recipient: String,
}

/// Result of a dispatch attempt.
#[derive(Debug, Clone)]
pub enum DispatchResult {
    /// Message was handed to the transport.
    Sent,
    /// Dispatch failed (non-blocking for the caller).
    Failed(String),
    /// Dispatch was skipped (e.g., delivery disabled in this environment).
    Skipped,
}

/// Fire-and-forget message delivery.
#[async_trait::async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Dispatches a message; the outcome is never inspected synchronously by
    /// the credential engine beyond logging.
    async fn dispatch(&self, message: InvitationMessage, metadata: DispatchMetadata)
        -> DispatchResult;
}

/// Mock dispatcher for development and testing.
///
/// Records dispatched messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationDispatcher {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    dispatched: Arc<Mutex<Vec<(InvitationMessage, DispatchMetadata)>>>,
}

impl MockNotificationDispatcher {
    /// Create a new mock dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock dispatcher that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            dispatched: Arc::default(),
        }
    }

    /// Messages recorded so far.
    pub fn dispatched(&self) -> Vec<(InvitationMessage, DispatchMetadata)> {
        self.dispatched.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for MockNotificationDispatcher {
    async fn dispatch(
        &self,
        message: InvitationMessage,
        metadata: DispatchMetadata,
    ) -> DispatchResult {
        if self.simulate_failure {
            tracing::warn!(
                recipient = %metadata.recipient,
                reference_id = %metadata.reference_id,
                "Mock dispatcher simulating failure"
            );
            return DispatchResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            recipient = %metadata.recipient,
            reference_id = %metadata.reference_id,
            kind = %metadata.kind,
            "Mock: Would send invitation email"
        );

        if let Ok(mut dispatched) = self.dispatched.lock() {
            dispatched.push((message, metadata));
        }

        DispatchResult::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> InvitationMessage {
        InvitationMessage {
            recipient: "g@example.com".to_string(),
            guardian_name: "Maria Weber".to_string(),
            student_names: vec!["Lena Weber".to_string()],
            portal_url: "https://portal.example.com/invitations/tok".to_string(),
            expires_at: Utc::now(),
            language: "de".to_string(),
        }
    }

    fn metadata() -> DispatchMetadata {
        DispatchMetadata {
            kind: NotificationKind::GuardianInvitation,
            reference_id: 7,
            token: "tok".to_string(),
            recipient: "g@example.com".to_string(),
        }
    }

    #[test]
    fn test_notification_kind_display() {
        assert_eq!(
            NotificationKind::GuardianInvitation.to_string(),
            "guardian_invitation"
        );
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&message()).unwrap();
        assert!(json.contains("g@example.com"));
        assert!(json.contains("Lena Weber"));
    }

    #[tokio::test]
    async fn test_mock_dispatcher_records_messages() {
        let dispatcher = MockNotificationDispatcher::new();

        let result = dispatcher.dispatch(message(), metadata()).await;
        assert!(matches!(result, DispatchResult::Sent));

        let dispatched = dispatcher.dispatched();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].1.reference_id, 7);
        assert_eq!(dispatched[0].1.token, "tok");
    }

    #[tokio::test]
    async fn test_mock_dispatcher_failure() {
        let dispatcher = MockNotificationDispatcher::failing();

        let result = dispatcher.dispatch(message(), metadata()).await;
        assert!(matches!(result, DispatchResult::Failed(_)));
        assert!(dispatcher.dispatched().is_empty());
    }
}
