//! Structured tracing for authentication attempts.
//!
//! The crate only emits `tracing` events and spans. Binaries that want them
//! printed either install their own subscriber or enable the `subscriber`
//! feature and call [`init_tracing_subscriber`].

mod spans;

pub use spans::{TracingConfig, TracingLevel, auth_attempt_span, login_span};

#[cfg(feature = "subscriber")]
pub use spans::init_tracing_subscriber;
