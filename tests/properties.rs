mod common;

use common::{disposals_of, init_logging, Tracer, NULL};
use owned_handles::{ScopedHandle, SharedHandle};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

type Shared = SharedHandle<Tracer>;

const SLOTS: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    New(usize),
    Join { from: usize, to: usize },
    Assign { from: usize, to: usize },
    Discard(usize),
    Reset(usize),
    Clear(usize),
    Take { from: usize, to: usize },
    TakeFrom { from: usize, to: usize },
    Swap(usize, usize),
    OutSlot(usize),
}

fn op() -> impl Strategy<Value = Op> {
    let slot = || 0..SLOTS;
    prop_oneof![
        slot().prop_map(Op::New),
        (slot(), slot()).prop_map(|(from, to)| Op::Join { from, to }),
        (slot(), slot()).prop_map(|(from, to)| Op::Assign { from, to }),
        slot().prop_map(Op::Discard),
        slot().prop_map(Op::Reset),
        slot().prop_map(Op::Clear),
        (slot(), slot()).prop_map(|(from, to)| Op::Take { from, to }),
        (slot(), slot()).prop_map(|(from, to)| Op::TakeFrom { from, to }),
        (slot(), slot()).prop_map(|(a, b)| Op::Swap(a, b)),
        slot().prop_map(Op::OutSlot),
    ]
}

fn two_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Owners in a few slots, shadowed by the handle and ring each slot is expected to have.
struct World {
    slots: Vec<Option<Shared>>,
    shadow: Vec<Option<(i32, usize)>>,
    issued: Vec<i32>,
    next_ring: usize,
}

impl World {
    fn new() -> Self {
        World {
            slots: (0..SLOTS).map(|_| None).collect(),
            shadow: vec![None; SLOTS],
            issued: Vec::new(),
            next_ring: 0,
        }
    }

    fn fresh_value(&mut self) -> i32 {
        let value = self.issued.len() as i32;
        self.issued.push(value);
        value
    }

    fn fresh_ring(&mut self) -> usize {
        self.next_ring += 1;
        self.next_ring
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::New(to) => {
                let value = self.fresh_value();
                self.slots[to] = Some(Shared::new(value));
                self.shadow[to] = Some((value, self.fresh_ring()));
            }
            Op::Join { from, to } => {
                if let Some(source) = &self.slots[from] {
                    let copy = source.clone();
                    self.slots[to] = Some(copy);
                    self.shadow[to] = self.shadow[from];
                }
            }
            Op::Assign { from, to } => {
                if from == to {
                    return;
                }
                if let (Some(source), target) = two_mut(&mut self.slots, from, to) {
                    target.get_or_insert_with(Shared::null).assign(source);
                    self.shadow[to] = self.shadow[from];
                }
            }
            Op::Discard(at) => {
                self.slots[at] = None;
                self.shadow[at] = None;
            }
            Op::Reset(at) => {
                if self.slots[at].is_some() {
                    let value = self.fresh_value();
                    self.slots[at].as_mut().unwrap().reset(value);
                    self.shadow[at] = Some((value, self.fresh_ring()));
                }
            }
            Op::Clear(at) => {
                if let Some(owner) = &mut self.slots[at] {
                    let was_null = owner.is_null();
                    owner.clear();
                    if !was_null {
                        self.shadow[at] = Some((NULL, self.fresh_ring()));
                    }
                }
            }
            Op::Take { from, to } => {
                if let Some(source) = &mut self.slots[from] {
                    let taken = source.take();
                    let moved = self.shadow[from];
                    self.shadow[from] = Some((NULL, self.fresh_ring()));
                    self.slots[to] = Some(taken);
                    self.shadow[to] = moved;
                }
            }
            Op::TakeFrom { from, to } => {
                if from == to {
                    return;
                }
                if let (Some(source), Some(target)) = two_mut(&mut self.slots, from, to) {
                    target.take_from(source);
                    self.shadow[to] = self.shadow[from];
                    self.shadow[from] = Some((NULL, self.fresh_ring()));
                }
            }
            Op::Swap(a, b) => {
                if a == b {
                    return;
                }
                if let (Some(left), Some(right)) = two_mut(&mut self.slots, a, b) {
                    left.swap(right);
                    self.shadow.swap(a, b);
                }
            }
            Op::OutSlot(at) => {
                if self.slots[at].is_some() {
                    let value = self.fresh_value();
                    *self.slots[at].as_mut().unwrap().out_slot() = value;
                    self.shadow[at] = Some((value, self.fresh_ring()));
                }
            }
        }
    }

    fn check(&self) -> Result<(), TestCaseError> {
        for (owner, expected) in self.slots.iter().zip(&self.shadow) {
            let (owner, (value, ring)) = match (owner, expected) {
                (Some(owner), Some(expected)) => (owner, *expected),
                (None, None) => continue,
                _ => return Err(TestCaseError::fail("slot occupancy diverged")),
            };
            let members = self.shadow.iter().flatten().filter(|(_, r)| *r == ring).count();
            prop_assert_eq!(owner.get(), value);
            prop_assert_eq!(owner.owner_count(), members);
            prop_assert_eq!(owner.is_sole_owner(), members == 1);
        }

        for &value in &self.issued {
            let held = self.shadow.iter().flatten().any(|&(v, _)| v == value);
            prop_assert_eq!(disposals_of(value), if held { 0 } else { 1 }, "handle {}", value);
        }
        prop_assert_eq!(disposals_of(NULL), 0);
        Ok(())
    }
}

proptest! {
    /// Every handle is disposed of exactly once, exactly when its last owner goes away, and
    /// every owner sees the ring it is expected to be in.
    #[test]
    fn shared_owners_dispose_exactly_once(ops in prop::collection::vec(op(), 0..64)) {
        init_logging();
        let mut world = World::new();
        for op in &ops {
            world.apply(op);
            world.check()?;
        }

        let issued = world.issued.clone();
        drop(world);
        for value in issued {
            prop_assert_eq!(disposals_of(value), 1);
        }
    }

    /// Swapping the same two owners twice restores both rings.
    #[test]
    fn swap_is_an_involution(
        left_size in 1usize..5,
        right_size in 1usize..5,
        left_at in 0usize..5,
        right_at in 0usize..5
    ) {
        init_logging();
        let first = Shared::new(1);
        let mut left: Vec<Shared> = (1..left_size).map(|_| first.clone()).collect();
        left.push(first);
        let first = Shared::new(2);
        let mut right: Vec<Shared> = (1..right_size).map(|_| first.clone()).collect();
        right.push(first);
        let (l, r) = (left_at % left_size, right_at % right_size);

        left[l].swap(&mut right[r]);
        prop_assert_eq!(left[l].get(), 2);
        prop_assert_eq!(left[l].owner_count(), right_size);
        prop_assert_eq!(right[r].owner_count(), left_size);

        left[l].swap(&mut right[r]);
        prop_assert!(left.iter().all(|owner| owner.get() == 1 && owner.owner_count() == left_size));
        prop_assert!(right.iter().all(|owner| owner.get() == 2 && owner.owner_count() == right_size));
        prop_assert_eq!(disposals_of(1) + disposals_of(2), 0);
    }

    /// Releasing and resetting a scoped owner never disposes; dropping it disposes once.
    #[test]
    fn scoped_release_reset_disposes_once(handle in 0i32..1000, rounds in 0usize..8) {
        init_logging();
        let mut owner: ScopedHandle<Tracer> = ScopedHandle::new(handle);
        for _ in 0..rounds {
            let raw = owner.release();
            prop_assert!(owner.is_null());
            owner.reset(raw);
        }
        prop_assert_eq!(disposals_of(handle), 0);
        drop(owner);
        prop_assert_eq!(disposals_of(handle), 1);
    }
}
