//! Capability traits over the durable quota table.
//!
//! The controller never talks to a concrete database; it is generic over a
//! [`Database`] that can open a [`Transaction`] able to scan the quota key
//! range and read or write individual quota rows. Retry policy lives behind
//! [`Transaction::on_error`]: the caller hands back the failure and the
//! transaction either absorbs it -- typically by backing off -- and signals
//! that the work should be retried, or returns it to end the loop.
//!
//! A [`MemoryStore`] implementation is provided for tests and embedding
//! without a durable table.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::quota::{self, Tag, TagQuota};

/// Errors produced by quota table access.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A transient failure: the transaction conflicted, timed out or lost
    /// its connection. Absorbed by [`Transaction::on_error`].
    #[error("transient quota store failure: {context}")]
    Transient {
        /// Short description of the failing operation.
        context: &'static str,
    },
    /// A quota row failed to decode.
    #[error("quota row for tag {tag} failed to decode: {source}")]
    Corrupt {
        /// The tag whose row is malformed.
        tag: Tag,
        /// The decoding failure.
        #[source]
        source: quota::DecodeError,
    },
    /// The transaction's retry budget is exhausted.
    #[error("quota store retry budget exhausted")]
    TooManyRetries,
}

/// A transaction over the quota key range.
#[async_trait]
pub trait Transaction: Send {
    /// Scan the quota key range, decoding every row, returning at most
    /// `limit` entries. Implementations are expected to perform this read
    /// at system priority so user work cannot starve the watcher.
    async fn read_quota_range(&mut self, limit: usize) -> Result<Vec<(Tag, TagQuota)>, Error>;

    /// Read one tag's quota row.
    async fn quota(&mut self, tag: &Tag) -> Result<Option<TagQuota>, Error>;

    /// Buffer a write of one tag's quota row.
    fn set_quota(&mut self, tag: &Tag, quota: TagQuota);

    /// Buffer a deletion of one tag's quota row.
    fn clear_quota(&mut self, tag: &Tag);

    /// Commit buffered writes.
    async fn commit(&mut self) -> Result<(), Error>;

    /// Drive the retry protocol: given the error that failed the attempt,
    /// either absorb it (backing off as appropriate) and return `Ok` to
    /// signal that the caller should retry, or return an error to end the
    /// retry loop. Buffered writes are discarded either way.
    async fn on_error(&mut self, error: Error) -> Result<(), Error>;
}

/// A handle that can open transactions over the quota table.
pub trait Database: Send + Sync {
    /// The transaction type this database produces.
    type Tx: Transaction;

    /// Open a fresh transaction.
    fn transaction(&self) -> Self::Tx;
}

type SharedRows = Arc<Mutex<MemoryInner>>;

#[derive(Debug, Default)]
struct MemoryInner {
    rows: BTreeMap<Vec<u8>, Bytes>,
    failures_remaining: u32,
}

/// An in-process quota table. Rows live in a `BTreeMap` behind a mutex;
/// transactions snapshot nothing and commit by replaying buffered writes, so
/// the semantics are last-writer-wins. Useful for tests and for embedding
/// the controller without a durable table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: SharedRows,
    retry_limit: Option<u32>,
}

impl MemoryStore {
    /// Create an empty store whose transactions retry forever.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose transactions give up with
    /// [`Error::TooManyRetries`] after absorbing `limit` failures.
    #[must_use]
    pub fn with_retry_limit(limit: u32) -> Self {
        Self {
            retry_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Insert a raw row, bypassing the quota codec. Lets tests plant
    /// malformed rows.
    pub fn put_raw(&self, key: Vec<u8>, value: impl Into<Bytes>) {
        self.lock().rows.insert(key, value.into());
    }

    /// Make the next `count` range reads fail with a transient error.
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failures_remaining = count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Database for MemoryStore {
    type Tx = MemoryTransaction;

    fn transaction(&self) -> Self::Tx {
        MemoryTransaction {
            inner: Arc::clone(&self.inner),
            writes: Vec::new(),
            attempt: 0,
            retry_limit: self.retry_limit,
        }
    }
}

/// Write buffered by a [`MemoryTransaction`]: `None` clears the row.
type BufferedWrite = (Vec<u8>, Option<Bytes>);

/// Transaction over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    inner: SharedRows,
    writes: Vec<BufferedWrite>,
    attempt: u32,
    retry_limit: Option<u32>,
}

impl MemoryTransaction {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn backoff(&self) -> Duration {
        // Exponential from 10ms, capped at one second.
        let exp = self.attempt.min(7);
        Duration::from_millis(10 * (1_u64 << exp))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn read_quota_range(&mut self, limit: usize) -> Result<Vec<(Tag, TagQuota)>, Error> {
        let mut guard = self.lock();
        if guard.failures_remaining > 0 {
            guard.failures_remaining -= 1;
            return Err(Error::Transient {
                context: "quota range read",
            });
        }
        let mut out = Vec::new();
        for (key, value) in guard.rows.range(quota::TAG_QUOTA_PREFIX.to_vec()..) {
            if !key.starts_with(quota::TAG_QUOTA_PREFIX) || out.len() >= limit {
                break;
            }
            let Some(tag) = quota::tag_from_quota_key(key) else {
                continue;
            };
            let quota = TagQuota::decode(value).map_err(|source| Error::Corrupt {
                tag: tag.clone(),
                source,
            })?;
            out.push((tag, quota));
        }
        Ok(out)
    }

    async fn quota(&mut self, tag: &Tag) -> Result<Option<TagQuota>, Error> {
        let key = quota::quota_key(tag);
        let guard = self.lock();
        match guard.rows.get(&key) {
            None => Ok(None),
            Some(value) => TagQuota::decode(value)
                .map(Some)
                .map_err(|source| Error::Corrupt {
                    tag: tag.clone(),
                    source,
                }),
        }
    }

    fn set_quota(&mut self, tag: &Tag, quota: TagQuota) {
        self.writes.push((
            quota::quota_key(tag),
            Some(Bytes::copy_from_slice(&quota.encode())),
        ));
    }

    fn clear_quota(&mut self, tag: &Tag) {
        self.writes.push((quota::quota_key(tag), None));
    }

    async fn commit(&mut self) -> Result<(), Error> {
        let writes = std::mem::take(&mut self.writes);
        let mut guard = self.lock();
        for (key, value) in writes {
            match value {
                Some(value) => {
                    guard.rows.insert(key, value);
                }
                None => {
                    guard.rows.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn on_error(&mut self, error: Error) -> Result<(), Error> {
        match error {
            // Transient and corrupt rows are both retryable: a corrupt row
            // is expected to be repaired out from under us, and until then
            // the scan keeps its last successful result.
            Error::Transient { .. } | Error::Corrupt { .. } => {
                if self
                    .retry_limit
                    .is_some_and(|limit| self.attempt >= limit)
                {
                    return Err(Error::TooManyRetries);
                }
                self.writes.clear();
                let backoff = self.backoff();
                self.attempt += 1;
                tokio::time::sleep(backoff).await;
                Ok(())
            }
            Error::TooManyRetries => Err(error),
        }
    }
}
