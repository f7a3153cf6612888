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

//! Registry of release assets that already live in object storage.
//!
//! The document shape is `project -> version -> filename -> public URL`.
//!
//! Layout: `error.rs` (error types), `registry.rs` (`Index` and its records).

pub mod error;
pub mod registry;

pub use error::{IndexError, IndexResult};
pub use registry::{Index, IndexTree, MirrorRecord, RecordChange};
