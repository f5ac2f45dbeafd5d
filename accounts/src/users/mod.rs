//! User account management.
//!
//! This module provides:
//! - Account and session models as stored in the document store
//! - `AccountStore`, the data-access facade over the `users` and `sessions` collections
//! - The typed errors callers receive from it

pub mod error;
pub mod models;
pub mod storage;

pub use error::AccountStoreError;
pub use models::{Preferences, SESSIONS_COLLECTION, Session, USERS_COLLECTION, User};
pub use storage::AccountStore;
