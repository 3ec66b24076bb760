//! # HeartGuard Storage
//!
//! Key-value store backends for HeartGuard offline data.
//!
//! This crate is the lowest layer of the offline subsystem. Stores behave
//! like browser-local storage: string keys map to string values, and the
//! store does not interpret what it holds. Higher layers serialize their
//! records to JSON before writing them.
//!
//! ## Design Principles
//!
//! - Stores are simple string maps (get, set, remove, clear)
//! - No knowledge of mutations, assets, or sync state
//! - Must be `Send + Sync` so the sync engine and facade can share them
//! - A failed write leaves the previous value in place
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral sessions, with optional
//!   quota to simulate a full browser store
//! - [`FileStore`] - Persistent store in a locked directory
//!
//! ## Example
//!
//! ```rust
//! use heartguard_storage::{KvStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.set_item("pendingMutations", "[]").unwrap();
//! assert_eq!(store.get_item("pendingMutations").unwrap().as_deref(), Some("[]"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KvStore;
