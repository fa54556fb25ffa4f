//! Error types for the permission gate.

use thiserror::Error;

/// Errors that can occur while requesting permissions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// A request cycle is already waiting on the user.
    #[error("A permission request is already in flight")]
    RequestInFlight,
}
