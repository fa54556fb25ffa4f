//! Live session lifecycle controller.
//!
//! Sequences configuration, capture sources, preview and the connection
//! on a [`StreamingEngine`], and publishes the resulting
//! [`ConnectionState`](livecast_ipc::ConnectionState) transitions and
//! classified errors to any number of observers.

mod controller;
mod engine;
mod error;

pub use controller::{validate_endpoint, SessionController, SUPPORTED_SCHEMES};
pub use engine::{AudioSourceFactory, EngineResult, PreviewSink, StreamingEngine};
pub use error::SessionError;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
