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

//! Hosting-platform collaborator: release listing and asset downloads.
//!
//! Layout: `model.rs` (payloads), `source.rs` (`ReleaseSource` trait),
//! `client.rs` (GitHub REST implementation), `error.rs` (error types).

pub mod client;
pub mod error;
pub mod model;
pub mod source;

pub use client::{
    DEFAULT_API_URL, DEFAULT_RELEASES_PER_PAGE, GitHubClient, GitHubOptions, next_page,
};
pub use error::{GitHubError, GitHubResult};
pub use model::{Asset, Release, ReleasePage};
pub use source::ReleaseSource;
