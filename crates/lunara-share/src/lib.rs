//! # lunara-share
//!
//! Selective sharing of encrypted records.
//!
//! A sender decrypts their own records, re-encrypts each for a recipient's
//! wallet address and publishes the bundle to content-addressed storage. The
//! `(sender, recipient, content id, share type)` tuple is then appended to an
//! on-chain registry so the recipient can discover it. The recipient fetches
//! the package and decrypts it with nothing but their own address.
//!
//! | Step      | Type               | Failure policy                            |
//! |-----------|--------------------|-------------------------------------------|
//! | package   | [`Packager`]       | drop entries that fail the self decrypt   |
//! | publish   | [`Publisher`]      | retry transient uploads                   |
//! | register  | [`RegistryClient`] | retry transient writes, never unfunded ones |
//! | open      | [`Resolver`]       | keep undecryptable entries, flagged       |
//!
//! [`ShareFlow`] runs the first three in order and reports a registry failure
//! after publishing as `Error::PublishedNotRegistered`.

pub mod flow;
pub mod gateway;
pub mod link;
pub mod memory;
pub mod package;
pub mod packager;
pub mod publisher;
pub mod registry;
pub mod resolver;

pub use flow::{ShareFlow, ShareOutcome};
pub use gateway::PinataBlobStore;
pub use link::{build_shareable_link, parse_shareable_link, ShareLink};
pub use memory::{MemoryBlobStore, MemoryShareRegistry, StaticWallet};
pub use package::{ShareEntry, SharePackage, SharePackageMetadata};
pub use packager::{Packager, ShareInput};
pub use publisher::{PublishReceipt, Publisher};
pub use registry::RegistryClient;
pub use resolver::{resolve_latest_per_sender, EntryState, OpenedEntry, OpenedShare, Resolver};
