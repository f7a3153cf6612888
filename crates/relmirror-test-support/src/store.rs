//! In-memory [`ObjectStore`] that records every call.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use relmirror_storage::{ObjectStat, ObjectStore, StorageError, StorageMetadata, StorageResult};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    stat_calls: Vec<String>,
    write_calls: Vec<String>,
    stat_failures: Vec<(String, u16)>,
    write_failures: VecDeque<u16>,
    write_delay: Option<Duration>,
    writes_in_flight: usize,
    max_writes_in_flight: usize,
}

/// Object store fake keeping objects in a map.
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    location: Option<String>,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Store for `bucket` reporting `location` as its zone.
    #[must_use]
    pub fn new(bucket: &str, location: Option<&str>) -> Self {
        Self {
            bucket: bucket.to_string(),
            location: location.map(str::to_string),
            state: Mutex::new(State::default()),
        }
    }

    /// Store for bucket `releases` in zone `pek3b`.
    #[must_use]
    pub fn pek3b() -> Self {
        Self::new("releases", Some("pek3b"))
    }

    /// Seed an object.
    pub fn insert(&self, path: &str, bytes: &[u8]) {
        self.lock().objects.insert(path.to_string(), bytes.to_vec());
    }

    /// Make every `stat` under `prefix` fail with `status`.
    pub fn fail_stat_under(&self, prefix: &str, status: u16) {
        self.lock().stat_failures.push((prefix.to_string(), status));
    }

    /// Make the next `count` writes fail with `status`.
    pub fn fail_next_writes(&self, count: usize, status: u16) {
        self.lock()
            .write_failures
            .extend(std::iter::repeat_n(status, count));
    }

    /// Hold every write open for `delay` before reading its body.
    pub fn delay_writes(&self, delay: Duration) {
        self.lock().write_delay = Some(delay);
    }

    /// Highest number of writes that were open at the same time.
    #[must_use]
    pub fn max_writes_in_flight(&self) -> usize {
        self.lock().max_writes_in_flight
    }

    /// Stored object bytes.
    #[must_use]
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(path).cloned()
    }

    /// Keys of all stored objects, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Paths passed to `stat`, in call order.
    #[must_use]
    pub fn stat_calls(&self) -> Vec<String> {
        self.lock().stat_calls.clone()
    }

    /// Paths passed to `write`, in call order, including failed attempts.
    #[must_use]
    pub fn write_calls(&self) -> Vec<String> {
        self.lock().write_calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn receive(&self, path: &str, mut body: File, size: u64) -> StorageResult<()> {
        let failure = self.lock().write_failures.pop_front();
        if let Some(status) = failure {
            return Err(StorageError::Status {
                operation: "write",
                path: path.to_string(),
                status,
            });
        }

        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)
            .await
            .map_err(|source| StorageError::Io {
                operation: "write",
                path: path.to_string(),
                source,
            })?;
        if bytes.len() as u64 != size {
            return Err(StorageError::Io {
                operation: "write",
                path: path.to_string(),
                source: std::io::Error::other("declared size does not match body"),
            });
        }
        self.lock().objects.insert(path.to_string(), bytes);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn metadata(&self) -> StorageResult<StorageMetadata> {
        Ok(StorageMetadata {
            name: self.bucket.clone(),
            location: self.location.clone(),
        })
    }

    async fn stat(&self, path: &str) -> StorageResult<ObjectStat> {
        let mut state = self.lock();
        state.stat_calls.push(path.to_string());
        if let Some((_, status)) = state
            .stat_failures
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
        {
            return Err(StorageError::Status {
                operation: "stat",
                path: path.to_string(),
                status: *status,
            });
        }
        state.objects.get(path).map_or_else(
            || {
                Err(StorageError::NotFound {
                    path: path.to_string(),
                })
            },
            |bytes| {
                Ok(ObjectStat {
                    size: Some(bytes.len() as u64),
                })
            },
        )
    }

    async fn write(&self, path: &str, body: File, size: u64) -> StorageResult<()> {
        let delay = {
            let mut state = self.lock();
            state.write_calls.push(path.to_string());
            state.writes_in_flight += 1;
            state.max_writes_in_flight = state.max_writes_in_flight.max(state.writes_in_flight);
            state.write_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.receive(path, body, size).await;
        self.lock().writes_in_flight -= 1;
        result
    }
}
