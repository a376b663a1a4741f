//! Parallel matching: scenarios, partition invariants, fault containment, cancellation

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use rstest::rstest;

use treemerge::application::{
    ApplicationError, CancellationFlag, MatchOptions, MatchOutcome, ParallelMatcher,
};
use treemerge::domain::{
    compare, Change, CompareOptions, DomainError, Entity, EntityBuilder, EntityId, EntityKind, IndexStrategy,
    NodeData,
};
use treemerge::infrastructure::traits::ProgressSink;
use treemerge::util::testing::{self, chain_entity};

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

fn opts(threads: usize) -> MatchOptions {
    MatchOptions {
        threads,
        ..MatchOptions::default()
    }
}

fn refs(entities: &[Entity]) -> Vec<&Entity> {
    entities.iter().collect()
}

fn ids(entities: &[Entity]) -> BTreeSet<EntityId> {
    entities.iter().map(|e| e.id).collect()
}

/// Every right id appears in at most one change list, and never also in unmatched2.
fn assert_at_most_one_claim(outcome: &MatchOutcome) {
    let mut seen = HashSet::new();
    for change in outcome.matched.values().flatten() {
        assert!(seen.insert(change.right), "{} claimed twice", change.right);
        assert!(!outcome.unmatched2.contains(&change.right));
    }
}

/// Every left candidate is in exactly one of matched / unmatched1 / empty1 / ignored1, and
/// every right candidate is either claimed or unmatched2.
fn assert_partition_complete(outcome: &MatchOutcome, left: &[Entity], right: &[Entity]) {
    for id in ids(left) {
        let hits = [
            outcome.matched.contains_key(&id),
            outcome.unmatched1.contains(&id),
            outcome.empty1.contains(&id),
            outcome.ignored1.contains(&id),
        ]
        .into_iter()
        .filter(|b| *b)
        .count();
        assert_eq!(hits, 1, "left {id} in {hits} buckets");
    }
    let claimed: BTreeSet<EntityId> = outcome.matched.values().flatten().map(|c| c.right).collect();
    for id in ids(right) {
        assert!(
            claimed.contains(&id) ^ outcome.unmatched2.contains(&id),
            "right {id} neither or both claimed and unmatched"
        );
    }
}

/// Deterministic scatter of polylines; entity `i` of both sides shares most geometry.
fn scatter(seed: u64, count: u64, first_id: u64, perturb: bool) -> Vec<Entity> {
    let mut state = seed;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };
    (0..count)
        .map(|i| {
            let origin = (i as f64 * 100.0, (i % 7) as f64 * 100.0);
            let points: Vec<(f64, f64)> = (0..6)
                .map(|k| {
                    let jitter = if perturb && k == 5 { 3.0 + next() } else { next() * 1e-3 };
                    (origin.0 + k as f64 * 2.5 + jitter, origin.1 + (k * k) as f64 * 0.5)
                })
                .collect();
            chain_entity(first_id + i, EntityKind::Treeline, &points)
        })
        .collect()
}

// ============================================================
// Scenarios
// ============================================================

#[test]
fn given_identical_treelines_when_matching_then_matched_and_identical() {
    let five = [(0.0, 0.0), (1.0, 0.0), (2.0, 1.0), (3.0, 1.0), (4.0, 2.0)];
    let a1 = vec![chain_entity(1, EntityKind::Treeline, &five)];
    let mut a2 = vec![chain_entity(2, EntityKind::Treeline, &five)];
    a2[0].title = a1[0].title.clone();

    let outcome = ParallelMatcher::new(opts(0)).run(&refs(&a1), &refs(&a2)).unwrap();

    let change = &outcome.matched[&EntityId(1)][0];
    assert!(change.identical());
    assert_eq!(change.common_nodes, 5);
    assert_eq!(change.diff, 0);
    assert!(outcome.unmatched1.is_empty());
    assert!(outcome.unmatched2.is_empty());
}

#[test]
fn given_same_geometry_of_different_kinds_when_matching_then_never_compared() {
    let four = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
    let b1 = vec![chain_entity(1, EntityKind::AreaTree, &four)];
    let b2 = vec![chain_entity(2, EntityKind::Connector, &four)];

    let outcome = ParallelMatcher::new(opts(2)).run(&refs(&b1), &refs(&b2)).unwrap();

    assert!(outcome.matched.is_empty());
    assert_eq!(outcome.unmatched1, ids(&b1));
    assert_eq!(outcome.unmatched2, ids(&b2));
    assert_eq!(outcome.pair_failures, 0);
}

#[test]
fn given_partially_overlapping_entities_when_matching_then_similar_not_identical() {
    let c1 = vec![chain_entity(1, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0), (3.0, 0.0)])];
    let c2 = vec![chain_entity(2, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])];

    let outcome = ParallelMatcher::new(opts(1)).run(&refs(&c1), &refs(&c2)).unwrap();

    let change = &outcome.matched[&EntityId(1)][0];
    assert_eq!(change.common_nodes, 2);
    assert_eq!(change.diff, 0);
    assert!(change.has_similar_nodes());
    assert!(!change.identical());
}

// ============================================================
// Invariants
// ============================================================

#[rstest]
#[case(1)]
#[case(4)]
fn given_many_lefts_sharing_one_right_when_matching_then_claimed_once(#[case] threads: usize) {
    let left: Vec<Entity> = (1..=8)
        .map(|i| chain_entity(i, EntityKind::Treeline, &[(0.0, 0.0), (i as f64, 10.0)]))
        .collect();
    let right = vec![chain_entity(100, EntityKind::Treeline, &[(0.0, 0.0), (-1.0, -1.0)])];

    let outcome = ParallelMatcher::new(opts(threads)).run(&refs(&left), &refs(&right)).unwrap();

    assert_eq!(outcome.matched.len(), 1);
    assert_eq!(outcome.unmatched1.len(), 7);
    assert!(outcome.unmatched2.is_empty());
    assert_at_most_one_claim(&outcome);
    assert_partition_complete(&outcome, &left, &right);
}

#[test]
fn given_scattered_collections_when_matching_then_partition_complete() {
    let mut left = scatter(7, 40, 1, false);
    let mut right = scatter(7, 40, 1000, true);
    // Extra unmatched entities on both sides
    left.push(chain_entity(500, EntityKind::Treeline, &[(-900.0, -900.0), (-901.0, -900.0)]));
    right.push(chain_entity(5000, EntityKind::Treeline, &[(900.0, -900.0), (901.0, -900.0)]));

    let outcome = ParallelMatcher::new(opts(0)).run(&refs(&left), &refs(&right)).unwrap();

    assert_eq!(outcome.matched.len(), 40);
    assert!(outcome.unmatched1.contains(&EntityId(500)));
    assert!(outcome.unmatched2.contains(&EntityId(5000)));
    assert!(outcome.matched.values().all(|changes| changes.len() == 1));
    assert_at_most_one_claim(&outcome);
    assert_partition_complete(&outcome, &left, &right);
}

#[test]
fn given_deletable_entities_when_matching_then_only_in_empty() {
    let left = vec![
        chain_entity(1, EntityKind::Treeline, &[]),
        chain_entity(2, EntityKind::Connector, &[(0.0, 0.0)]),
        chain_entity(3, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)]),
    ];
    let right = vec![chain_entity(10, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)])];

    let outcome = ParallelMatcher::new(opts(2)).run(&refs(&left), &refs(&right)).unwrap();

    assert_eq!(outcome.empty1, [EntityId(1), EntityId(2)].into_iter().collect());
    for id in [EntityId(1), EntityId(2)] {
        assert!(!outcome.matched.contains_key(&id));
        assert!(!outcome.unmatched1.contains(&id));
    }
    assert_partition_complete(&outcome, &left, &right);
}

#[test]
fn given_unaccepted_kind_when_matching_then_ignored() {
    let left = vec![chain_entity(1, EntityKind::Ball, &[(0.0, 0.0), (1.0, 0.0)])];
    let right = vec![chain_entity(2, EntityKind::Ball, &[(0.0, 0.0), (1.0, 0.0)])];

    let outcome = ParallelMatcher::new(opts(1)).run(&refs(&left), &refs(&right)).unwrap();

    assert_eq!(outcome.ignored1, ids(&left));
    assert!(outcome.matched.is_empty());
    assert_eq!(outcome.unmatched2, ids(&right));
}

#[test]
fn given_same_inputs_when_matching_twice_then_same_membership() {
    let left = scatter(11, 30, 1, false);
    let right = scatter(11, 30, 1000, true);
    let matcher = ParallelMatcher::new(opts(4));

    let pairs = |o: &MatchOutcome| -> BTreeSet<(EntityId, EntityId)> {
        o.matched.iter().flat_map(|(l, cs)| cs.iter().map(move |c| (*l, c.right))).collect()
    };
    let first = matcher.run(&refs(&left), &refs(&right)).unwrap();
    let second = matcher.run(&refs(&left), &refs(&right)).unwrap();

    assert_eq!(pairs(&first), pairs(&second));
    assert_eq!(first.unmatched1, second.unmatched1);
    assert_eq!(first.unmatched2, second.unmatched2);
}

#[test]
fn given_grid_and_linear_index_when_matching_then_same_outcome() {
    let left = scatter(3, 25, 1, false);
    let right = scatter(3, 25, 1000, true);
    let with_index = |index| MatchOptions {
        compare: CompareOptions {
            index,
            ..CompareOptions::default()
        },
        threads: 1,
        ..MatchOptions::default()
    };

    let grid = ParallelMatcher::new(with_index(IndexStrategy::Grid))
        .run(&refs(&left), &refs(&right))
        .unwrap();
    let linear = ParallelMatcher::new(with_index(IndexStrategy::Linear))
        .run(&refs(&left), &refs(&right))
        .unwrap();

    assert_eq!(grid.matched, linear.matched);
    assert_eq!(grid.unmatched1, linear.unmatched1);
    assert_eq!(grid.unmatched2, linear.unmatched2);
}

// ============================================================
// Fault containment
// ============================================================

#[test]
fn given_non_finite_candidate_when_matching_then_pair_skipped_and_batch_continues() {
    let left = vec![
        chain_entity(1, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)]),
        chain_entity(2, EntityKind::Treeline, &[(5.0, 5.0), (6.0, 5.0)]),
    ];
    let broken = EntityBuilder::new(EntityId(10), EntityKind::Treeline)
        .chain([NodeData::new(0.0, 0.0, 0.0), NodeData::new(f64::INFINITY, 0.0, 0.0)])
        .build()
        .unwrap();
    let right = vec![broken, chain_entity(20, EntityKind::Treeline, &[(5.0, 5.0), (6.0, 5.0)])];

    let outcome = ParallelMatcher::new(opts(2)).run(&refs(&left), &refs(&right)).unwrap();

    assert_eq!(outcome.pair_failures, 2);
    assert!(outcome.unmatched1.contains(&EntityId(1)));
    assert_eq!(outcome.matched[&EntityId(2)][0].right, EntityId(20));
    assert!(outcome.unmatched2.contains(&EntityId(10)));
    assert!(outcome.failures.is_empty());
}

#[test]
fn given_panicking_task_when_matching_then_entity_unmatched_and_claims_returned() {
    let left = vec![
        chain_entity(1, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)]),
        chain_entity(2, EntityKind::Treeline, &[(5.0, 5.0), (6.0, 5.0)]),
    ];
    let right = vec![
        chain_entity(10, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)]),
        chain_entity(20, EntityKind::Treeline, &[(5.0, 5.0), (6.0, 5.0)]),
        chain_entity(21, EntityKind::Treeline, &[(50.0, 5.0)]),
    ];
    // Entity 2 claims 20, then blows up on 21
    let comparator = Arc::new(|e1: &Entity, e2: &Entity, o: &CompareOptions| -> Result<Change, DomainError> {
        if e1.id == EntityId(2) && e2.id == EntityId(21) {
            panic!("corrupt node data");
        }
        compare(e1, e2, o)
    });

    let outcome = ParallelMatcher::new(opts(1))
        .with_comparator(comparator)
        .run(&refs(&left), &refs(&right))
        .unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].entity, EntityId(2));
    assert!(outcome.failures[0].message.contains("corrupt node data"));
    assert!(outcome.unmatched1.contains(&EntityId(2)));
    assert_eq!(outcome.matched[&EntityId(1)][0].right, EntityId(10));
    assert!(outcome.unmatched2.contains(&EntityId(20)), "claim was not returned");
    assert_partition_complete(&outcome, &left, &right);
}

#[rstest]
#[case::right_side(false)]
#[case::left_side(true)]
fn given_repeated_entity_id_when_matching_then_rejected_before_any_task(#[case] on_left: bool) {
    let single = vec![chain_entity(1, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)])];
    let twins = vec![
        chain_entity(7, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)]),
        chain_entity(7, EntityKind::Treeline, &[(50.0, 0.0), (51.0, 0.0)]),
    ];
    let (left, right) = if on_left { (&twins, &single) } else { (&single, &twins) };

    let err = ParallelMatcher::new(opts(2))
        .run(&refs(left), &refs(right))
        .unwrap_err();

    assert!(
        matches!(err, ApplicationError::Domain(DomainError::DuplicateEntity(EntityId(7)))),
        "{err}"
    );
}

// ============================================================
// Cancellation and progress
// ============================================================

#[test]
fn given_cancellation_during_scan_when_matching_then_cancelled_with_partial() {
    let left: Vec<Entity> = (1..=4)
        .map(|i| chain_entity(i, EntityKind::Treeline, &[(i as f64, 0.0), (i as f64, 1.0)]))
        .collect();
    let right: Vec<Entity> = (1..=4)
        .map(|i| chain_entity(100 + i, EntityKind::Treeline, &[(i as f64, 0.0), (i as f64, 1.0)]))
        .collect();
    let cancel = CancellationFlag::new();
    let trigger = cancel.clone();
    let comparator = Arc::new(move |e1: &Entity, e2: &Entity, o: &CompareOptions| -> Result<Change, DomainError> {
        trigger.cancel();
        compare(e1, e2, o)
    });

    let err = ParallelMatcher::new(opts(1))
        .with_cancellation(cancel)
        .with_comparator(comparator)
        .run(&refs(&left), &refs(&right))
        .unwrap_err();

    match err {
        ApplicationError::Cancelled {
            completed,
            total,
            partial,
        } => {
            assert_eq!(total, 4);
            assert!(completed < total);
            assert_at_most_one_claim(&partial);
        }
        other => panic!("expected cancellation, got {other}"),
    }
}

#[test]
fn given_cancelled_flag_before_start_when_matching_then_nothing_processed() {
    let left = vec![chain_entity(1, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)])];
    let right = vec![chain_entity(2, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)])];
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = ParallelMatcher::new(opts(1))
        .with_cancellation(cancel)
        .run(&refs(&left), &refs(&right))
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Cancelled { completed: 0, total: 1, .. }));
}

#[derive(Default)]
struct Recorder(Mutex<Vec<f32>>);

impl ProgressSink for Recorder {
    fn report(&self, fraction: f32) {
        self.0.lock().unwrap().push(fraction);
    }
}

#[test]
fn given_progress_sink_when_matching_then_reports_each_task_and_final_reset() {
    let left = scatter(5, 6, 1, false);
    let right = scatter(5, 6, 1000, false);
    let recorder = Arc::new(Recorder::default());

    ParallelMatcher::new(opts(2))
        .with_progress(recorder.clone())
        .run(&refs(&left), &refs(&right))
        .unwrap();

    let seen = recorder.0.lock().unwrap();
    assert_eq!(seen.len(), 7);
    assert_eq!(*seen.last().unwrap(), 1.0);
    assert!(seen.iter().all(|f| (0.0..=1.0).contains(f)));
}
