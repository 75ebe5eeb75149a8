//! Partitioned, parallel batch lookups.
//!
//! An ordered key list is split into contiguous groups of `batch_size`
//! keys. Each non-empty group is looked up by its own task with a single
//! backend `batch_get`, and each task owns the result buffer for its group.
//! Group ranges are disjoint by construction, so the caller can copy each
//! buffer into its slot range of the pre-sized output without locking.
//!
//! A group that fails (error, timeout, panic, or a result count that does
//! not match its key count) leaves its slots empty. The batch as a whole
//! still succeeds; empty slots are misses for the caller to re-resolve.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::backend::{KvBackend, Miss, Namespace};
use crate::error::KvError;

/// Group size used when a caller passes 0.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Clamp a signed, caller-supplied batch size: anything non-positive
/// becomes [`DEFAULT_BATCH_SIZE`].
pub fn normalize_batch_size(batch_size: i64) -> usize {
    if batch_size <= 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size as usize
    }
}

/// How `len` keys are split into groups.
///
/// The plan always holds `len / batch_size + 1` groups. When `len` is an
/// exact multiple of `batch_size` the last group is empty; it is kept in
/// the plan so the group count stays stable, and is never dispatched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    len: usize,
    batch_size: usize,
    groups: Vec<Range<usize>>,
}

impl BatchPlan {
    /// Plan `len` keys in groups of `batch_size` (0 means [`DEFAULT_BATCH_SIZE`]).
    pub fn new(len: usize, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        let count = len / batch_size + 1;
        let groups = (0..count)
            .map(|g| {
                let left = g * batch_size;
                let right = len.min(batch_size * (g + 1));
                left..right
            })
            .collect();
        Self {
            len,
            batch_size,
            groups,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Every planned group, including a trailing empty one.
    pub fn groups(&self) -> &[Range<usize>] {
        &self.groups
    }

    /// Groups that carry at least one key, with their group index.
    pub fn dispatched(&self) -> impl Iterator<Item = (usize, &Range<usize>)> + '_ {
        self.groups.iter().enumerate().filter(|(_, r)| !r.is_empty())
    }

    /// Number of groups that will be looked up: `ceil(len / batch_size)`.
    pub fn dispatched_count(&self) -> usize {
        self.dispatched().count()
    }
}

/// Result of running a [`BatchPlan`].
#[derive(Debug)]
pub struct BatchOutcome {
    /// One value per input key; empty for misses and failed groups.
    pub values: Vec<String>,
    /// Groups that were looked up.
    pub dispatched: usize,
    /// Errors from failed groups, in completion order.
    pub failures: Vec<KvError>,
}

impl BatchOutcome {
    /// Returns `true` if at least one group ran and every group failed
    /// because the backend was unreachable.
    pub fn backend_unreachable(&self) -> bool {
        self.dispatched > 0
            && self.failures.len() == self.dispatched
            && self
                .failures
                .iter()
                .all(|e| matches!(e, KvError::Connection(_)))
    }
}

/// Run `plan` over `keys`, one task per non-empty group, and wait for all
/// of them.
///
/// Dropping the returned future aborts every in-flight group task.
pub(crate) async fn fetch_batched(
    backend: Arc<dyn KvBackend>,
    ns: Arc<Namespace>,
    keys: &[String],
    plan: &BatchPlan,
    timeout: Option<Duration>,
) -> BatchOutcome {
    let mut values = vec![String::new(); keys.len()];
    let mut failures = Vec::new();
    let mut tasks = JoinSet::new();

    for (group, range) in plan.dispatched() {
        let range = range.clone();
        let group_keys = keys[range.clone()].to_vec();
        let backend = Arc::clone(&backend);
        let ns = Arc::clone(&ns);
        tasks.spawn(async move {
            let lookup = backend.batch_get(&ns, &group_keys);
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, lookup)
                    .await
                    .unwrap_or_else(|_| Err(KvError::Timeout(limit.as_millis() as u64))),
                None => lookup.await,
            };
            (group, range, result)
        });
    }
    let dispatched = tasks.len();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((group, range, Ok(lookups))) if lookups.len() == range.len() => {
                debug!(group, left = range.start, right = range.end, "batch group fetched");
                for (slot, lookup) in values[range].iter_mut().zip(lookups) {
                    match lookup {
                        Ok(value) => *slot = value,
                        Err(Miss::NotFound) => {}
                        Err(Miss::Failed(reason)) => debug!(%reason, "batch entry unreadable"),
                    }
                }
            }
            Ok((group, range, Ok(lookups))) => {
                warn!(
                    group,
                    expected = range.len(),
                    got = lookups.len(),
                    "batch group result count mismatch, treating group as misses"
                );
                failures.push(KvError::Backend(format!(
                    "group {group} returned {} results for {} keys",
                    lookups.len(),
                    range.len()
                )));
            }
            Ok((group, range, Err(e))) => {
                warn!(
                    group,
                    left = range.start,
                    right = range.end,
                    error = %e,
                    "batch group failed, treating group as misses"
                );
                failures.push(e);
            }
            Err(join_err) => {
                error!(error = %join_err, "batch group task aborted");
                failures.push(KvError::Backend(join_err.to_string()));
            }
        }
    }

    if !failures.is_empty() {
        warn!(
            failed = failures.len(),
            dispatched,
            keys = keys.len(),
            "partial batch failure"
        );
    }

    BatchOutcome {
        values,
        dispatched,
        failures,
    }
}
