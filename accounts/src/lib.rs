//! Account store: user accounts and their authentication sessions on top of
//! a document-oriented store.
//!
//! - [`users::AccountStore`] is the data-access facade callers use
//! - [`store`] abstracts the backing store (PostgreSQL JSONB or in-memory)
//! - [`config`], [`database`] and [`telemetry`] wire the production setup

pub mod config;
pub mod database;
pub mod store;
pub mod telemetry;
pub mod users;

pub use store::{DocumentStore, MockDocumentStore, PgDocumentStore};
pub use users::{AccountStore, AccountStoreError, Preferences, Session, User};
