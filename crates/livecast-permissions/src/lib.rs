//! Runtime permission gate.
//!
//! Resolves a set of required platform permissions to a single outcome,
//! walking the user through at most one rationale explanation per
//! permission before giving up.

mod error;
mod gate;
mod permission;

pub use error::PermissionError;
pub use gate::{PermissionGate, PermissionOutcome, RationaleRetry};
pub use permission::{Permission, PermissionSet};

use std::collections::HashMap;

use async_trait::async_trait;

/// Result type for permission operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

/// The host platform's permission subsystem.
#[async_trait]
pub trait PermissionPlatform: Send + Sync {
    /// Whether the permission is currently granted.
    fn check_granted(&self, permission: &Permission) -> bool;

    /// Whether the platform owes the user an explanation before asking again.
    ///
    /// Platforms report false after a "don't ask again" denial.
    fn should_show_rationale(&self, permission: &Permission) -> bool;

    /// Prompt the user for the given permissions.
    ///
    /// Permissions missing from the returned map count as denied.
    async fn request(&self, permissions: &PermissionSet) -> HashMap<Permission, bool>;
}
