//! Concurrent all-pairs correspondence discovery.
//!
//! One task per left candidate runs on a dedicated rayon pool. Each task scans the shared
//! pool of right candidates of the same kind, compares, and claims every right entity it
//! shares nodes with by removing it from the pool. Removal is the only claim authority:
//! a right entity can end up in at most one left entity's change list.
//!
//! Tasks hand their results back by value; only the coordinating thread builds the
//! outcome collections. The right-hand pool is the single piece of shared mutable state.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info, instrument, warn};

use crate::application::cancel::CancellationFlag;
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::{
    compare, ensure_unique_ids, Change, CompareOptions, DomainError, Entity, EntityId, EntityKind,
};
use crate::infrastructure::traits::{NoProgress, ProgressSink};

/// Seam for the per-pair comparison, so tests can inject faults.
pub trait PairComparator: Send + Sync {
    fn compare(&self, e1: &Entity, e2: &Entity, options: &CompareOptions) -> Result<Change, DomainError>;
}

/// The geometric tree comparison from [`crate::domain::compare`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GeometricComparator;

impl PairComparator for GeometricComparator {
    fn compare(&self, e1: &Entity, e2: &Entity, options: &CompareOptions) -> Result<Change, DomainError> {
        compare(e1, e2, options)
    }
}

impl<F> PairComparator for F
where
    F: Fn(&Entity, &Entity, &CompareOptions) -> Result<Change, DomainError> + Send + Sync,
{
    fn compare(&self, e1: &Entity, e2: &Entity, options: &CompareOptions) -> Result<Change, DomainError> {
        self(e1, e2, options)
    }
}

/// Number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    pub compare: CompareOptions,
    /// Worker threads; 0 means one per available core
    pub threads: usize,
    pub accepted: BTreeSet<EntityKind>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            compare: CompareOptions::default(),
            threads: 0,
            accepted: EntityKind::DEFAULT_ACCEPTED.into_iter().collect(),
        }
    }
}

impl MatchOptions {
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus()
        } else {
            self.threads
        }
    }
}

/// A left entity whose task panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub entity: EntityId,
    pub message: String,
}

/// What the matcher found. All collections are keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Left entity -> claimed changes, highest `common_nodes` first
    pub matched: BTreeMap<EntityId, Vec<Change>>,
    pub unmatched1: BTreeSet<EntityId>,
    /// Right candidates nobody claimed
    pub unmatched2: BTreeSet<EntityId>,
    /// Deletable left entities met during matching
    pub empty1: BTreeSet<EntityId>,
    /// Left entities of a kind that is not accepted
    pub ignored1: BTreeSet<EntityId>,
    pub failures: Vec<TaskFailure>,
    /// Candidate pairs whose comparison failed and were skipped
    pub pair_failures: usize,
}

#[derive(Debug)]
enum TaskOutcome {
    Ignored,
    Empty,
    Matched(Vec<Change>),
    Unmatched,
    Failed(String),
    /// Cancellation observed; carries whatever the task had already claimed
    Interrupted(Vec<Change>),
}

#[derive(Debug)]
struct TaskReport {
    entity: EntityId,
    outcome: TaskOutcome,
    pair_failures: usize,
}

/// Per-task scratch state, kept outside the unwind boundary so claims survive a panic.
struct TaskState<'a> {
    claimed: Vec<&'a Entity>,
    changes: Vec<Change>,
    pair_failures: usize,
}

type Pool<'a> = Mutex<BTreeMap<EntityId, &'a Entity>>;

fn lock<'g, 'a>(pool: &'g Pool<'a>) -> MutexGuard<'g, BTreeMap<EntityId, &'a Entity>> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ParallelMatcher {
    options: MatchOptions,
    cancel: CancellationFlag,
    progress: Arc<dyn ProgressSink>,
    comparator: Arc<dyn PairComparator>,
}

impl ParallelMatcher {
    pub fn new(options: MatchOptions) -> Self {
        Self {
            options,
            cancel: CancellationFlag::new(),
            progress: Arc::new(NoProgress),
            comparator: Arc::new(GeometricComparator),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn PairComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Match every left candidate against the pool of right candidates.
    ///
    /// Fails with [`DomainError::DuplicateEntity`] when an id repeats on either side.
    /// Returns [`ApplicationError::Cancelled`] with the partial outcome when the
    /// cancellation flag is raised before all tasks finish.
    #[instrument(level = "debug", skip_all, fields(left = candidates1.len(), right = candidates2.len()))]
    pub fn run(
        &self,
        candidates1: &[&Entity],
        candidates2: &[&Entity],
    ) -> ApplicationResult<MatchOutcome> {
        ensure_unique_ids(candidates1.iter().copied())?;
        ensure_unique_ids(candidates2.iter().copied())?;

        let total = candidates1.len();
        let pool: Pool<'_> = Mutex::new(candidates2.iter().map(|e| (e.id, *e)).collect());
        let counter = AtomicUsize::new(0);

        let threads = self.options.worker_threads();
        let workers = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("treemerge-worker-{i}"))
            .build()?;
        debug!(threads, "worker pool ready");

        let reports: Vec<TaskReport> = workers.install(|| {
            candidates1
                .par_iter()
                .map(|e1| {
                    let report = self.process(e1, &pool);
                    if !matches!(report.outcome, TaskOutcome::Interrupted(_)) {
                        let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
                        self.progress.report(done as f32 / total.max(1) as f32);
                    }
                    report
                })
                .collect()
        });
        // reset
        self.progress.report(1.0);

        let remaining = pool.into_inner().unwrap_or_else(PoisonError::into_inner);
        let (outcome, interrupted) = Self::assemble(reports, remaining);

        info!(
            matched = outcome.matched.len(),
            unmatched1 = outcome.unmatched1.len(),
            unmatched2 = outcome.unmatched2.len(),
            empty1 = outcome.empty1.len(),
            failures = outcome.failures.len(),
            "matching finished"
        );

        if interrupted > 0 {
            warn!("Matching cancelled: {} of {} entities processed", total - interrupted, total);
            return Err(ApplicationError::Cancelled {
                completed: total - interrupted,
                total,
                partial: Box::new(outcome),
            });
        }
        Ok(outcome)
    }

    fn assemble(
        reports: Vec<TaskReport>,
        remaining: BTreeMap<EntityId, &Entity>,
    ) -> (MatchOutcome, usize) {
        let mut outcome = MatchOutcome::default();
        let mut interrupted = 0;

        for report in reports {
            outcome.pair_failures += report.pair_failures;
            let id = report.entity;
            match report.outcome {
                TaskOutcome::Ignored => {
                    outcome.ignored1.insert(id);
                }
                TaskOutcome::Empty => {
                    outcome.empty1.insert(id);
                }
                TaskOutcome::Matched(changes) => {
                    outcome.matched.insert(id, rank(changes));
                }
                TaskOutcome::Unmatched => {
                    outcome.unmatched1.insert(id);
                }
                TaskOutcome::Failed(message) => {
                    outcome.unmatched1.insert(id);
                    outcome.failures.push(TaskFailure { entity: id, message });
                }
                TaskOutcome::Interrupted(changes) => {
                    interrupted += 1;
                    if !changes.is_empty() {
                        outcome.matched.insert(id, rank(changes));
                    }
                }
            }
        }
        outcome.unmatched2 = remaining.into_keys().collect();
        (outcome, interrupted)
    }

    /// One left entity: never panics, never propagates an error.
    fn process<'a>(&self, e1: &Entity, pool: &Pool<'a>) -> TaskReport {
        let mut state = TaskState {
            claimed: Vec::new(),
            changes: Vec::new(),
            pair_failures: 0,
        };

        if self.cancel.is_cancelled() {
            return TaskReport {
                entity: e1.id,
                outcome: TaskOutcome::Interrupted(Vec::new()),
                pair_failures: 0,
            };
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.scan(e1, pool, &mut state)));

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Task for {} failed: {}", e1, message);
                // Hand claimed entities back so they are reported as unmatched
                let mut guard = lock(pool);
                for e2 in state.claimed.drain(..) {
                    guard.insert(e2.id, e2);
                }
                TaskOutcome::Failed(message)
            }
        };

        TaskReport {
            entity: e1.id,
            outcome,
            pair_failures: state.pair_failures,
        }
    }

    fn scan<'a>(&self, e1: &Entity, pool: &Pool<'a>, state: &mut TaskState<'a>) -> TaskOutcome {
        if !self.options.accepted.contains(&e1.kind) {
            info!("Ignoring: [A] {}", e1);
            return TaskOutcome::Ignored;
        }
        if e1.is_deletable() {
            return TaskOutcome::Empty;
        }

        let snapshot: Vec<&Entity> = lock(pool)
            .values()
            .filter(|e2| e2.kind == e1.kind)
            .copied()
            .collect();

        for e2 in snapshot {
            if self.cancel.is_cancelled() {
                debug!("{} interrupted", e1.id);
                return TaskOutcome::Interrupted(std::mem::take(&mut state.changes));
            }
            if !lock(pool).contains_key(&e2.id) {
                continue;
            }

            let change = match self.comparator.compare(e1, e2, &self.options.compare) {
                Ok(change) => change,
                Err(e) => {
                    warn!("Skipping pair {} / {}: {}", e1.id, e2.id, e);
                    state.pair_failures += 1;
                    continue;
                }
            };
            if !change.has_similar_nodes() {
                continue;
            }

            if lock(pool).remove(&e2.id).is_some() {
                state.claimed.push(e2);
                state.changes.push(change);
                if state.changes.len() == 1 {
                    debug!("{} matched {}", e1.id, e2.id);
                } else {
                    debug!("{} also matched {}", e1.id, e2.id);
                }
            } else {
                debug!("{} was claimed concurrently; discarding change for {}", e2.id, e1.id);
            }
        }

        if state.changes.is_empty() {
            TaskOutcome::Unmatched
        } else {
            TaskOutcome::Matched(std::mem::take(&mut state.changes))
        }
    }
}

/// Primary match first: most common nodes, then lowest right id.
fn rank(mut changes: Vec<Change>) -> Vec<Change> {
    changes.sort_by(|a, b| {
        b.common_nodes
            .cmp(&a.common_nodes)
            .then_with(|| a.right.cmp(&b.right))
    });
    changes
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
