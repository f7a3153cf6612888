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

//! relmirror application wiring.
//!
//! Layout: `cli.rs` (flags and environment), `bootstrap.rs` (collaborator
//! construction and the run), `error.rs` (errors and exit codes).

/// Collaborator construction and run sequencing.
pub mod bootstrap;
/// Command-line surface.
pub mod cli;
/// Application errors and exit codes.
pub mod error;

pub use bootstrap::{run, run_with};
pub use cli::Cli;
pub use error::{AppError, AppResult};
