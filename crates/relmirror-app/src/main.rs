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
#![allow(clippy::multiple_crate_versions)]

//! Binary entrypoint: runs one mirroring pass and exits with its status code.

/// Runs the mirroring pass and exits with its status code.
#[tokio::main]
async fn main() {
    std::process::exit(relmirror_app::run().await);
}
