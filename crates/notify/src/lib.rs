//! `merchstore-notify` — transactional email for order lifecycle events.
//!
//! Notification is fire-and-forget from the order lifecycle's point of view:
//! a failed send is logged by the caller and never rolls back a transition.

pub mod resend;
pub mod sender;
pub mod template;

pub use resend::ResendEmailSender;
pub use sender::{DeliveryId, EmailError, EmailSender, RecordingEmailSender, SentEmail};
pub use template::{EmailBranding, OrderEmailKind, OrderEmailLine, OrderEmailView, render, subject};
