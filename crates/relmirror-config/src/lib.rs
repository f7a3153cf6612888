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

//! Run configuration: raw inputs, defaults, and validation into a typed model.
//!
//! Layout: `defaults.rs` (default values), `model.rs` (typed config and enums),
//! `validate.rs` (`MirrorConfig::from_inputs`), `error.rs` (error types).

pub mod defaults;
pub mod error;
pub mod model;
pub mod validate;

pub use defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_ENDPOINT, DEFAULT_GITHUB_API_URL, DEFAULT_INDEX_PATH,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_OWNER, DEFAULT_PROJECTS, DEFAULT_PUBLIC_DOMAIN,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::{ConfigError, ConfigResult};
pub use model::{
    ConfigInputs, FailurePolicy, GitHubSettings, MirrorConfig, ReleaseMode, Secret,
    StorageSettings,
};
