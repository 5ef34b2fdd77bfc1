//! # lunara-store
//!
//! Local encrypted persistence for a user's own records, cycles and
//! predictions.
//!
//! [`EncryptedStore`] seals every value under the session's self key before
//! handing it to a [`KeyValueStore`](lunara_core::traits::KeyValueStore)
//! backend. Two backends ship here: [`MemoryKeyValueStore`] for tests and
//! ephemeral use, and [`FileKeyValueStore`] for on-disk persistence.

pub mod file;
pub mod memory;
pub mod store;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use store::{EncryptedRow, EncryptedStore, KeyCheck};
