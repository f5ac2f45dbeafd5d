//! Errors returned by the account store.

use crate::store::StoreError;

/// Error type for account store operations.
///
/// Every variant is terminal for the call that produced it; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum AccountStoreError {
    /// An account with this email is already registered.
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    /// The user already holds a session with the same token.
    #[error("User {user_id} already has a session with the same token")]
    DuplicateSession { user_id: String },

    /// No account is registered under this email.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store refused a write.
    #[error("{operation} rejected by the store: {source}")]
    OperationRejected {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The store failed while reading.
    #[error("Read failed: {0}")]
    ReadFailed(#[source] StoreError),
}

impl AccountStoreError {
    /// The underlying store error, for rejected writes and failed reads.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::OperationRejected { source, .. } | Self::ReadFailed(source) => Some(source),
            Self::DuplicateAccount(_)
            | Self::DuplicateSession { .. }
            | Self::AccountNotFound(_)
            | Self::InvalidArgument(_) => None,
        }
    }
}
