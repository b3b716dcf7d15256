//! Adapter error taxonomy

/// Errors surfaced by the adapter.
///
/// All of these are terminal for the operation that produced them but
/// non-fatal for the process: the adapter reverts to a safe state and
/// leaves any retry decision to the caller.
#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    /// Service or characteristic enumeration failed.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// The connection attempt failed to complete.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A characteristic value callback carried an error.
    #[error("characteristic read failed: {0}")]
    Read(String),

    /// The link was torn down with a reported cause.
    #[error("disconnected: {0}")]
    Disconnect(String),
}
