//! Deferred, conditional cache commits
//!
//! A [`CacheTransaction`] is opened for one logical fetch. It starts with
//! whatever live value the store holds for the key, lets the caller record a
//! freshly fetched body and its lifetime, and commits them when closed:
//!
//! - a transaction that started from a cache hit never writes;
//! - a body is written only when both the value and the duration are set;
//! - an application failure still commits, with the duration taken from the
//!   failure's own server metadata;
//! - any other failure discards the slot.
//!
//! Dropping a transaction without closing it counts as [`CommitOutcome::OtherFailure`].

use super::CacheStore;
use crate::envelope::derive_duration;
use tracing::{debug, warn};

/// How the work done inside a transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Success,
    /// The server reported an application error along with its time metadata
    ApplicationFailure {
        timestamp: Option<i64>,
        expires: Option<i64>,
    },
    /// Transport failure, malformed body, or anything else
    OtherFailure,
}

impl CommitOutcome {
    /// Classify a finished result
    pub fn of<T, E: ClassifyOutcome>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => CommitOutcome::Success,
            Err(e) => e.commit_outcome(),
        }
    }
}

/// Errors that know whether they should still be cached
pub trait ClassifyOutcome {
    fn commit_outcome(&self) -> CommitOutcome;
}

/// Per-call cache slot bound to one key
pub struct CacheTransaction<'a> {
    store: &'a dyn CacheStore,
    key: String,
    value: Option<Vec<u8>>,
    duration: Option<i64>,
    hit: bool,
    closed: bool,
}

impl<'a> CacheTransaction<'a> {
    /// Open a transaction, pre-populated with the store's live value if any.
    ///
    /// A store read failure is logged and treated as a miss.
    pub fn begin(store: &'a dyn CacheStore, key: impl Into<String>) -> Self {
        let key = key.into();
        let value = match store.get(&key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", key, e);
                None
            }
        };

        let hit = value.is_some();
        debug!("Cache {} for {}", if hit { "hit" } else { "miss" }, key);

        Self {
            store,
            key,
            value,
            duration: None,
            hit,
            closed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the transaction started from a live cache entry
    pub fn is_hit(&self) -> bool {
        self.hit
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    pub fn set_value(&mut self, value: Vec<u8>) {
        self.value = Some(value);
    }

    pub fn set_duration(&mut self, seconds: i64) {
        self.duration = Some(seconds);
    }

    /// Set the duration to `expires - timestamp`; leaves it untouched if either is absent
    pub fn set_duration_from(&mut self, timestamp: Option<i64>, expires: Option<i64>) {
        if let Some(duration) = derive_duration(timestamp, expires) {
            self.duration = Some(duration);
        }
    }

    /// Close the transaction, committing according to `outcome`
    pub fn close(mut self, outcome: CommitOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: CommitOutcome) {
        if self.closed {
            return;
        }
        self.closed = true;

        match outcome {
            CommitOutcome::Success => self.sync(),
            CommitOutcome::ApplicationFailure { timestamp, expires } => {
                self.set_duration_from(timestamp, expires);
                self.sync();
            }
            CommitOutcome::OtherFailure => {
                debug!("Discarding cache slot for {}", self.key);
            }
        }
    }

    fn sync(&self) {
        if self.hit {
            return;
        }

        let (Some(value), Some(duration)) = (&self.value, self.duration) else {
            debug!("Incomplete cache slot for {}, not committing", self.key);
            return;
        };

        if let Err(e) = self.store.put(&self.key, value, duration) {
            warn!("Failed to commit cache entry {}: {}", self.key, e);
        }
    }
}

impl Drop for CacheTransaction<'_> {
    fn drop(&mut self) {
        self.finish(CommitOutcome::OtherFailure);
    }
}

/// Run `f` inside a transaction for `key` and close it with the classified result
pub fn scoped<T, E, F>(store: &dyn CacheStore, key: &str, f: F) -> Result<T, E>
where
    E: ClassifyOutcome,
    F: FnOnce(&mut CacheTransaction<'_>) -> Result<T, E>,
{
    let mut txn = CacheTransaction::begin(store, key);
    let result = f(&mut txn);
    txn.close(CommitOutcome::of(&result));
    result
}
