//! Account storage over a document store.
//!
//! `AccountStore` keeps two loosely coupled collections:
//! - `users`: one document per account, unique by `email`
//! - `sessions`: at most one document per user, keyed by `userId`
//!
//! The two are related by convention only. Deleting an account removes its
//! sessions in a second, separate write; a failure or a concurrent login
//! between the two can leave a session behind for a deleted account.
//!
//! # Write safety
//!
//! Every mutating call goes through [`write_safely`], which turns store
//! failures into [`AccountStoreError::OperationRejected`]. Account creation
//! first routes its insert failure through [`translate_insert_error`] so a
//! unique-index violation surfaces as [`AccountStoreError::DuplicateAccount`].
//!
//! ```rust,ignore
//! use account_store::store::MockDocumentStore;
//! use account_store::users::{AccountStore, User};
//!
//! let accounts = AccountStore::new(MockDocumentStore::new());
//! accounts.ensure_indexes().await?;
//! accounts.add_user(&User::new("ada@example.com")).await?;
//! accounts.create_user_session("ada@example.com", "jwt-token").await?;
//! ```

use super::error::AccountStoreError;
use super::models::{Preferences, SESSIONS_COLLECTION, Session, USERS_COLLECTION, User, fields};
use crate::store::{
    Document, DocumentStore, Filter, StoreError, Update, UpdateOptions, WriteConcern,
    WriteErrorCategory,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, info, warn};

/// Users and sessions, backed by an injected [`DocumentStore`].
///
/// Cloning is cheap when the store is; clones share the same backend.
#[derive(Clone)]
pub struct AccountStore<S> {
    store: S,
}

impl<S: DocumentStore> AccountStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the unique email index on users and the `userId` index on sessions.
    pub async fn ensure_indexes(&self) -> Result<(), AccountStoreError> {
        info!("Ensuring account indexes");

        write_safely(
            "ensure_indexes",
            self.store.create_index(USERS_COLLECTION, fields::EMAIL, true),
        )
        .await?;
        write_safely(
            "ensure_indexes",
            self.store
                .create_index(SESSIONS_COLLECTION, fields::USER_ID, false),
        )
        .await?;

        Ok(())
    }

    /// Registers `user`, waiting for a majority acknowledgment.
    ///
    /// Fails with [`AccountStoreError::DuplicateAccount`] when the email is
    /// already taken.
    pub async fn add_user(&self, user: &User) -> Result<bool, AccountStoreError> {
        info!(email = %user.email, "Creating a user");
        require_non_empty(fields::EMAIL, &user.email)?;

        let document = encode(user)?;
        let result = self
            .store
            .insert_one(USERS_COLLECTION, document, WriteConcern::Majority)
            .await
            .map_err(|err| translate_insert_error(err, &user.email))?;

        Ok(result.acknowledged)
    }

    /// Makes `jwt` the current session token of `user_id`.
    ///
    /// Any previous token of the user is replaced. Asking again for the token
    /// the user already holds fails with [`AccountStoreError::DuplicateSession`].
    pub async fn create_user_session(
        &self,
        user_id: &str,
        jwt: &str,
    ) -> Result<bool, AccountStoreError> {
        info!(user_id, "Creating a session");
        require_non_empty(fields::USER_ID, user_id)?;
        require_non_empty(fields::JWT, jwt)?;

        let same_token = Filter::eq(fields::USER_ID, user_id).and(fields::JWT, jwt);
        let existing = self
            .store
            .count_documents(SESSIONS_COLLECTION, &same_token)
            .await
            .map_err(AccountStoreError::ReadFailed)?;
        if existing != 0 {
            warn!(user_id, "Session with the same token already exists");
            return Err(AccountStoreError::DuplicateSession {
                user_id: user_id.to_owned(),
            });
        }

        let result = write_safely(
            "create_user_session",
            self.store.update_one(
                SESSIONS_COLLECTION,
                &Filter::eq(fields::USER_ID, user_id),
                &Update::set(fields::JWT, jwt),
                UpdateOptions::upsert(),
            ),
        )
        .await?;

        Ok(result.acknowledged)
    }

    pub async fn get_user(&self, email: &str) -> Result<Option<User>, AccountStoreError> {
        debug!(email, "Looking up user");

        self.store
            .find_one(USERS_COLLECTION, &Filter::eq(fields::EMAIL, email))
            .await
            .map_err(AccountStoreError::ReadFailed)?
            .map(decode)
            .transpose()
    }

    pub async fn get_user_session(
        &self,
        user_id: &str,
    ) -> Result<Option<Session>, AccountStoreError> {
        debug!(user_id, "Looking up session");

        self.store
            .find_one(SESSIONS_COLLECTION, &Filter::eq(fields::USER_ID, user_id))
            .await
            .map_err(AccountStoreError::ReadFailed)?
            .map(decode)
            .transpose()
    }

    /// Removes every session of `user_id`. Removing nothing is not an error.
    pub async fn delete_user_sessions(&self, user_id: &str) -> Result<bool, AccountStoreError> {
        info!(user_id, "Deleting sessions");

        let result = write_safely(
            "delete_user_sessions",
            self.store
                .delete_many(SESSIONS_COLLECTION, &Filter::eq(fields::USER_ID, user_id)),
        )
        .await?;

        Ok(result.acknowledged)
    }

    /// Removes the account and then its sessions.
    ///
    /// Fails with [`AccountStoreError::AccountNotFound`] when no account
    /// matches. The two deletions are not atomic.
    pub async fn delete_user(&self, email: &str) -> Result<bool, AccountStoreError> {
        info!(email, "Deleting a user");

        let user_deleted = write_safely(
            "delete_user",
            self.store
                .delete_one(USERS_COLLECTION, &Filter::eq(fields::EMAIL, email)),
        )
        .await?;
        if user_deleted.deleted_count == 0 {
            return Err(AccountStoreError::AccountNotFound(email.to_owned()));
        }

        let sessions_deleted = write_safely(
            "delete_user",
            self.store
                .delete_many(SESSIONS_COLLECTION, &Filter::eq(fields::USER_ID, email)),
        )
        .await?;
        debug!(
            email,
            sessions = sessions_deleted.deleted_count,
            "Removed sessions of deleted user"
        );

        Ok(user_deleted.acknowledged && sessions_deleted.acknowledged)
    }

    /// Replaces the stored preferences of the account.
    ///
    /// Returns `true` only when the stored document changed: an unknown email
    /// and an identical value both yield `false`, and telling those apart is
    /// left to the caller.
    pub async fn update_user_preferences(
        &self,
        email: &str,
        preferences: Option<Preferences>,
    ) -> Result<bool, AccountStoreError> {
        info!(email, "Updating user preferences");

        let Some(preferences) = preferences else {
            return Err(AccountStoreError::InvalidArgument(
                "preferences cannot be absent".to_owned(),
            ));
        };

        let result = write_safely(
            "update_user_preferences",
            self.store.update_one(
                USERS_COLLECTION,
                &Filter::eq(fields::EMAIL, email),
                &Update::set(fields::PREFERENCES, Value::Object(preferences)),
                UpdateOptions::default(),
            ),
        )
        .await?;

        Ok(result.modified_count > 0)
    }
}

/// Runs a store write, re-signalling any failure as `OperationRejected`.
pub async fn write_safely<T>(
    operation: &'static str,
    write: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, AccountStoreError> {
    write.await.map_err(|source| reject(operation, source))
}

/// Maps a failed account insert: duplicate keys become `DuplicateAccount`.
pub fn translate_insert_error(err: StoreError, email: &str) -> AccountStoreError {
    if err.category() == Some(WriteErrorCategory::DuplicateKey) {
        warn!(email, "Account already exists");
        return AccountStoreError::DuplicateAccount(email.to_owned());
    }
    reject("add_user", err)
}

fn reject(operation: &'static str, source: StoreError) -> AccountStoreError {
    warn!(operation, error = %source, "Write rejected");
    AccountStoreError::OperationRejected { operation, source }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AccountStoreError> {
    if value.is_empty() {
        return Err(AccountStoreError::InvalidArgument(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(())
}

fn encode(user: &User) -> Result<Document, AccountStoreError> {
    if let Some(key) = user.reserved_attribute() {
        return Err(AccountStoreError::InvalidArgument(format!(
            "{key} cannot be passed as an attribute"
        )));
    }

    match serde_json::to_value(user) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(AccountStoreError::InvalidArgument(format!(
            "user encoded as {other} instead of a document"
        ))),
        Err(err) => Err(AccountStoreError::InvalidArgument(format!(
            "user could not be encoded: {err}"
        ))),
    }
}

fn decode<T: DeserializeOwned>(document: Document) -> Result<T, AccountStoreError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|err| AccountStoreError::ReadFailed(StoreError::Decode(err.to_string())))
}
