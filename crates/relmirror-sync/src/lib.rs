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

//! Idempotent mirroring pipeline from release assets to object storage.
//!
//! Layout: `enumerator.rs` (release sequence), `resolver.rs` (asset listing,
//! paths, URLs), `worker.rs` (per-asset state machine), `orchestrator.rs`
//! (run driver and report), `retry.rs` (backoff), `error.rs` (error types).

pub mod enumerator;
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod retry;
pub mod worker;

pub use enumerator::ReleaseEnumerator;
pub use error::{ErrorKind, SyncError, SyncResult, error_chain};
pub use orchestrator::{ProjectFailure, ProjectStats, SyncOrchestrator, SyncReport, SyncSettings};
pub use relmirror_config::{FailurePolicy, ReleaseMode};
pub use resolver::{ASSET_PAGE_SIZE, AssetResolver, StorageLocation, public_url, target_path};
pub use retry::{DEFAULT_BASE_DELAY, RetryPolicy, Transient, retry_delay};
pub use worker::{MirrorJob, MirrorOutcome, MirrorState, MirrorWorker, SCRATCH_PREFIX};
