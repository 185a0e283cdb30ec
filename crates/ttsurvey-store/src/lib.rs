//! ttsurvey-store — Document store backends.
//!
//! Implements the `SubmissionStore` trait for an in-process store, a local
//! JSON-lines directory and the Firestore REST API, plus the TOML
//! configuration that selects between them.

pub mod config;
pub mod file;
pub mod firestore;
pub mod memory;

pub use config::{create_store, load_config, StoreConfig, SurveyConfig};
pub use file::FileStore;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
