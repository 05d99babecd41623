//! Property tests for the status pool invariants.

use proptest::prelude::*;
use sinfall::{StatusKind, StatusPool};

const KINDS: [StatusKind; 5] = [
    StatusKind::Wound,
    StatusKind::Stun,
    StatusKind::Sin,
    StatusKind::Fire,
    StatusKind::Poison,
];

#[derive(Debug, Clone)]
enum Op {
    Spend(i32),
    Free(i32),
    Add(usize, i32),
    Reduce(usize, i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..24i32).prop_map(Op::Spend),
        (0..24i32).prop_map(Op::Free),
        (0..KINDS.len(), 0..12i32).prop_map(|(k, w)| Op::Add(k, w)),
        (0..KINDS.len(), 0..12i32).prop_map(|(k, w)| Op::Reduce(k, w)),
    ]
}

proptest! {
    /// For any op sequence: spending stays within what statuses leave
    /// free, remaining is exactly the gap, and no dead segment survives.
    #[test]
    fn pool_invariants_hold(
        capacity in 1..40i32,
        ops in prop::collection::vec(op_strategy(), 0..64),
    ) {
        let mut pool = StatusPool::new(capacity).unwrap();
        for op in ops {
            match op {
                Op::Spend(n) => {
                    let had_room = pool.remaining() > 0;
                    prop_assert_eq!(pool.spend(n), had_room);
                }
                Op::Free(n) => pool.free(n),
                Op::Add(k, w) => pool.add_status(KINDS[k], w),
                Op::Reduce(k, w) => pool.reduce_status(KINDS[k], w),
            }
            prop_assert!(pool.spent() >= 0);
            prop_assert!(pool.spent() <= capacity - pool.consumed());
            prop_assert_eq!(
                pool.remaining(),
                capacity - pool.consumed() - pool.spent()
            );
            for segment in pool.segments() {
                prop_assert!(segment.width > 0);
            }
        }
    }

    /// Adding a status and immediately reducing it by the same width puts
    /// the pool back exactly, and drops the segment.
    #[test]
    fn add_then_reduce_round_trips(capacity in 2..40i32, width in 1..10i32) {
        let mut pool = StatusPool::new(capacity).unwrap();
        let before = pool.consumed();
        pool.add_status(StatusKind::Wound, width);
        let applied = pool.width_of(StatusKind::Wound);
        pool.reduce_status(StatusKind::Wound, applied);
        prop_assert_eq!(pool.consumed(), before);
        prop_assert!(!pool.contains(StatusKind::Wound));
    }

    /// A spend against a fresh pool always reserves something (clamped);
    /// against a drained one it refuses without mutating.
    #[test]
    fn spend_is_all_or_something(capacity in 1..40i32, n in 0..60i32) {
        let mut pool = StatusPool::new(capacity).unwrap();
        prop_assert!(pool.spend(n));
        prop_assert_eq!(pool.spent(), n.clamp(0, capacity));
        pool.spend(capacity);
        prop_assert_eq!(pool.remaining(), 0);
        prop_assert!(!pool.spend(1));
        prop_assert_eq!(pool.spent(), capacity);
    }
}

/// The walk-through from a starved pool: statuses and spending eat the
/// same capacity, and a full bar refuses new statuses outright.
#[test]
fn starved_pool_refuses_new_statuses() {
    let mut pool = StatusPool::new(10).unwrap();
    pool.add_status(StatusKind::Wound, 4);
    assert_eq!(pool.remaining(), 6);
    assert!(pool.spend(5));
    assert_eq!(pool.remaining(), 1);
    assert!(pool.spend(5), "clamps to the last unit");
    assert_eq!(pool.remaining(), 0);
    pool.add_status(StatusKind::Stun, 1);
    assert!(!pool.contains(StatusKind::Stun));
}
