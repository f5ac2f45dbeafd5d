//! Shared test utilities for integration tests.
//!
//! This module provides common test infrastructure including:
//! - An `AccountStore` over an indexed `MockDocumentStore`
//! - Fixture users and preference builders

use account_store::{AccountStore, MockDocumentStore, Preferences, User};
use serde_json::Value;

/// Email of the fixture account.
pub const TEST_EMAIL: &str = "real@x.com";

/// Creates an account store over a fresh in-memory store with indexes in place.
pub async fn create_test_accounts() -> AccountStore<MockDocumentStore> {
    let accounts = AccountStore::new(MockDocumentStore::new());
    accounts
        .ensure_indexes()
        .await
        .expect("indexes should be created");
    accounts
}

/// A second handle on the documents of `accounts`, with failure switches set
/// by `configure`.
pub fn with_store(
    accounts: &AccountStore<MockDocumentStore>,
    configure: impl FnOnce(MockDocumentStore) -> MockDocumentStore,
) -> AccountStore<MockDocumentStore> {
    AccountStore::new(configure(accounts.store().clone()))
}

/// A fully populated user record.
pub fn test_user(email: &str) -> User {
    User::new(email)
        .with_attribute("name", "Test User")
        .with_attribute("hashedpw", "$2a$10$abcdefghijklmnopqrstuv")
        .with_attribute("isAdmin", false)
}

/// Builds preferences from a JSON object literal.
pub fn prefs(value: Value) -> Preferences {
    match value {
        Value::Object(map) => map,
        other => panic!("preferences must be a JSON object, got {other}"),
    }
}
