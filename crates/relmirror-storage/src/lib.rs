#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Object storage collaborator: existence checks and uploads.
//!
//! Layout: `store.rs` (`ObjectStore` trait), `qingstor.rs` (signed QingStor
//! client with zone detection), `error.rs` (error types).

pub mod error;
pub mod qingstor;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use qingstor::{DEFAULT_HOST, QingStorClient, QingStorEndpoint, QingStorOptions};
pub use store::{ObjectStat, ObjectStore, StorageMetadata};
