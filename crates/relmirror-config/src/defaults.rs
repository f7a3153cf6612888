//! Default values applied when an input is not provided.

/// Repository owner whose projects are mirrored.
pub const DEFAULT_OWNER: &str = "qingstor";
/// GitHub REST API root.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
/// Public QingStor service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://qingstor.com";
/// Domain used in the public URLs recorded in the index.
pub const DEFAULT_PUBLIC_DOMAIN: &str = "qingstor.com";
/// Projects mirrored when none are configured.
pub const DEFAULT_PROJECTS: &[&str] = &["qsctl"];
/// Location of the persisted index document.
pub const DEFAULT_INDEX_PATH: &str = "site/data.json";
/// Asset transfers in flight per release.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Timeout applied to every HTTP request, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Attempts per operation, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
