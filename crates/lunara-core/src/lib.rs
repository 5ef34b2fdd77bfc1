//! # lunara-core
//!
//! Core types, traits, and abstractions for the lunara encrypted cycle log.
//!
//! This crate provides the data model, the error taxonomy, the collaborator
//! interfaces (wallet, blob store, share registry, key-value storage) and the
//! retry and configuration plumbing that the other lunara crates depend on.

pub mod batch;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod retry;
pub mod share_type;
pub mod traits;

// Re-export commonly used types at crate root
pub use batch::{BatchResult, FailureInfo};
pub use config::{LunaraConfig, RecipientSaltMode};
pub use error::{Error, Result};
pub use models::*;
pub use retry::{retry_async, retry_async_if, Backoff, RetryPolicy};
pub use share_type::ShareType;
pub use traits::*;
