//! Progress notifications for the expensive phases of opening a container.
//!
//! Key derivation is memory-hard and the keystream prefix build touches
//! megabytes of cipher output, so front-ends (shell, GUI) subscribe here to
//! show feedback while the engine comes up.

use std::sync::Arc;

/// Lifecycle events emitted while a cipher layer is being constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    KeyGenBegin,
    KeyGenEnd,
    BigCipherBuildBegin,
    CipherBuildUpdate,
    BigCipherBuildEnd,
}

/// Subscriber callback. Supplied by the embedder at construction time;
/// the engine never installs process-wide state.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// A sink that discards every event.
pub fn null_sink() -> ProgressSink {
    Arc::new(|_| {})
}
