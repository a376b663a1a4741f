//! Project merge service
//!
//! Runs the whole pipeline for two projects: partition, match, report.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::cancel::CancellationFlag;
use crate::application::classifier::{EntityClassifier, Partition};
use crate::application::matcher::{MatchOptions, ParallelMatcher, PairComparator};
use crate::application::report::{ClassificationResult, ReportBuilder};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{EntityId, Project};
use crate::infrastructure::traits::{NoProgress, ProgressSink};

/// Service comparing two projects entity by entity.
pub struct MergeService {
    options: MatchOptions,
    cancel: CancellationFlag,
    progress: Arc<dyn ProgressSink>,
    comparator: Option<Arc<dyn PairComparator>>,
}

impl MergeService {
    /// Create a new merge service.
    pub fn new(options: MatchOptions) -> Self {
        Self {
            options,
            cancel: CancellationFlag::new(),
            progress: Arc::new(NoProgress),
            comparator: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn PairComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Handle for cancelling a running [`MergeService::compare`] from another thread.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Classify every entity of both projects.
    ///
    /// On cancellation the returned [`ApplicationError::Cancelled`] carries the partial
    /// matcher outcome, with the left partition's empty and ignored sets folded in.
    #[instrument(level = "debug", skip_all, fields(left = %p1.name, right = %p2.name))]
    pub fn compare(&self, p1: &Project, p2: &Project) -> ApplicationResult<ClassificationResult> {
        p1.ensure_unique_ids()?;
        p2.ensure_unique_ids()?;

        let classifier = EntityClassifier::new(self.options.accepted.iter().copied());
        let left = classifier.partition("A", &p1.entities);
        let right = classifier.partition("B", &p2.entities);
        info!(
            "Comparing {} candidates of '{}' against {} of '{}'",
            left.candidates.len(),
            p1.name,
            right.candidates.len(),
            p2.name
        );

        let mut matcher = ParallelMatcher::new(self.options.clone())
            .with_cancellation(self.cancel.clone())
            .with_progress(Arc::clone(&self.progress));
        if let Some(comparator) = &self.comparator {
            matcher = matcher.with_comparator(Arc::clone(comparator));
        }

        let mut outcome = match matcher.run(&left.candidates, &right.candidates) {
            Ok(outcome) => outcome,
            Err(ApplicationError::Cancelled {
                completed,
                total,
                mut partial,
            }) => {
                fold_left(&mut partial.empty1, &mut partial.ignored1, &left);
                return Err(ApplicationError::Cancelled {
                    completed,
                    total,
                    partial,
                });
            }
            Err(e) => return Err(e),
        };
        fold_left(&mut outcome.empty1, &mut outcome.ignored1, &left);

        let result = ReportBuilder::new(outcome)
            .empty2(right.empty_ids())
            .ignored2(right.ignored.iter().map(|e| e.id).collect())
            .build();
        info!("{}", result.summary());
        Ok(result)
    }
}

fn fold_left(empty1: &mut BTreeSet<EntityId>, ignored1: &mut BTreeSet<EntityId>, left: &Partition<'_>) {
    empty1.extend(left.empty_ids());
    ignored1.extend(left.ignored.iter().map(|e| e.id));
}
