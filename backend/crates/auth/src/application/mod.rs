//! Application Layer
//!
//! Use cases orchestrating the authentication flow:
//! `Start -> PasswordVerified -> {TotpEnrollmentRequired |
//! TotpChallengeRequired} -> Authenticated`, plus the independent
//! refresh and logout operations.

pub mod config;
pub mod refresh;
pub mod sign_in;
pub mod sign_out;
pub mod verify_totp;

use std::sync::Arc;

pub use refresh::RefreshUseCase;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use verify_totp::{VerifyTotpInput, VerifyTotpOutput, VerifyTotpUseCase};

use crate::domain::entity::audit_event::AuditEvent;
use crate::domain::repository::AuditSink;

/// Record an audit event without blocking or failing the caller.
/// Sink failures are logged and swallowed.
pub(crate) fn emit_audit<A>(sink: &Arc<A>, event: AuditEvent)
where
    A: AuditSink + Send + Sync + 'static,
{
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        if let Err(e) = sink.record(&event).await {
            tracing::warn!(
                error = %e,
                action = %event.action,
                success = event.success,
                "Failed to record audit event"
            );
        }
    });
}
