//! Subregion Release Tests - Worklist Verification
//!
//! A dead member that points at the root of another region makes that
//! region unreachable. These tests verify that such subregions are:
//! - Queued, not freed while the owning region is being swept
//! - Released exactly once, whatever their kind
//! - Released iteratively, however deep the nesting
//!
//! ============================================================================
//! EACH TEST FINDS SPECIFIC SUBREGION BUGS - DO NOT WEAKEN ASSERTIONS
//! ============================================================================

mod common;

use common::{
    assert_all_alive, assert_all_freed, assert_region_invariants, RegionFixture, FINAL, NODE,
    OWNER, SHARED,
};
use isogc::{GcEvent, ObjectId, Region, RegionArena, RegionKind, RegionTrace, TransferOwnership};

fn released_count(fx: &RegionFixture, root: ObjectId) -> usize {
    fx.logger
        .events()
        .iter()
        .filter(|e| matches!(e, GcEvent::SubregionReleased { root: r, .. } if *r == root))
        .count()
}

/// ============================================================================
/// DEFERRED RELEASE
/// ============================================================================

/// Dropping the only path to a nested region releases it after the sweep
///
/// **Bug this finds:** Subregion freed inline during the sweep, released
/// twice, or leaked
#[test]
fn test_unreachable_subregion_released_once() {
    // Arrange
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o = fx.alloc(r, &OWNER);
    fx.link(r, 0, o);

    let s = fx.region(&NODE);
    let s1 = fx.alloc(s, &FINAL);
    fx.link(s, 0, s1);
    fx.link(o, 0, s);

    // Act
    fx.unlink(r, 0);
    let stats = fx.gc(r);

    // Assert
    assert_all_freed(&fx.heap, &[o, s, s1]);
    assert_eq!(stats.objects_swept, 1);
    assert_eq!(stats.subregions_released, 1);
    assert_eq!(stats.subregion_objects_freed, 2);
    assert_eq!(released_count(&fx, s), 1);
    assert_eq!(fx.finalised_count(s1), 1);

    // Discovered while sweeping, freed only after the owner
    let discovered = fx
        .event_index(|e| matches!(e, GcEvent::SubregionDiscovered { subregion, .. } if *subregion == s))
        .unwrap();
    let owner_freed = fx.dealloc_index(o).unwrap();
    let sub_freed = fx.dealloc_index(s).unwrap();
    assert!(discovered < owner_freed);
    assert!(owner_freed < sub_freed);
    assert_eq!(fx.members(r), vec![r]);
}

/// A reachable subregion is neither entered nor released
///
/// **Bug this finds:** Marking crossing into foreign regions
#[test]
fn test_reachable_subregion_untouched() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o = fx.alloc(r, &OWNER);
    fx.link(r, 0, o);

    let s = fx.region(&NODE);
    let s1 = fx.alloc(s, &NODE);
    let s_garbage = fx.alloc(s, &NODE);
    fx.link(s, 0, s1);
    fx.link(o, 0, s);

    let stats = fx.gc(r);

    assert_eq!(stats.objects_marked, 1);
    assert_eq!(stats.subregions_released, 0);
    assert_all_alive(&fx.heap, &[o, s, s1, s_garbage]);
    assert_region_invariants(&fx.heap, s);
    assert_eq!(fx.members(s).len(), 3);
}

/// A dead member pointing back at its own root does not queue the root
#[test]
fn test_own_root_not_queued() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o = fx.alloc(r, &OWNER);
    let s = fx.region(&NODE);
    fx.link(o, 0, r);
    fx.link(o, 1, s);

    let stats = fx.gc(r);

    assert_eq!(stats.subregions_released, 1);
    assert_all_alive(&fx.heap, &[r]);
    assert_all_freed(&fx.heap, &[o, s]);
}

/// ============================================================================
/// NESTING
/// ============================================================================

/// A long chain of nested regions is released without recursion
///
/// **Bug this finds:** Stack overflow on deep nesting, chain cut short
#[test]
fn test_deep_nesting_released_iteratively() {
    const DEPTH: usize = 10_000;

    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o = fx.alloc(r, &OWNER);
    fx.link(r, 0, o);

    let mut roots = Vec::with_capacity(DEPTH);
    let mut owner = o;
    for _ in 0..DEPTH {
        let s = fx.region(&OWNER);
        fx.link(owner, 0, s);
        roots.push(s);
        owner = s;
    }
    let baseline = fx.heap.live_objects();

    fx.unlink(r, 0);
    let stats = fx.gc(r);

    assert_eq!(stats.subregions_released, DEPTH);
    assert_eq!(stats.subregion_objects_freed, DEPTH);
    // Each nested region is a root plus its metadata
    assert_eq!(fx.heap.live_objects(), baseline - 1 - 2 * DEPTH);
    assert_all_freed(&fx.heap, &roots);
}

/// Subregions owned by members of a subregion are found during its release
#[test]
fn test_nested_through_members() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o = fx.alloc(r, &OWNER);

    let s1 = fx.region(&NODE);
    let m1 = fx.alloc(s1, &OWNER);
    fx.link(s1, 0, m1);
    let s2 = fx.region(&NODE);
    let m2 = fx.alloc(s2, &NODE);
    fx.link(m1, 0, s2);
    fx.link(o, 0, s1);

    let stats = fx.gc(r);

    assert_eq!(stats.subregions_released, 2);
    assert_eq!(stats.subregion_objects_freed, 4);
    assert_all_freed(&fx.heap, &[o, s1, m1, s2, m2]);
    assert_eq!(released_count(&fx, s1), 1);
    assert_eq!(released_count(&fx, s2), 1);
}

/// ============================================================================
/// ARENA SUBREGIONS
/// ============================================================================

/// Subregion release dispatches on region kind
///
/// **Bug this finds:** Arena released as a trace region, members leaked
#[test]
fn test_arena_subregion_released() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o = fx.alloc(r, &OWNER);

    let a = RegionArena::create(&mut fx.heap, &NODE).unwrap();
    let a1 = RegionArena::alloc(&mut fx.heap, a, &FINAL).unwrap();
    let a2 = RegionArena::alloc(&mut fx.heap, a, &NODE).unwrap();
    fx.link(a1, 0, a2);
    fx.link(o, 0, a);

    let stats = fx.gc(r);

    assert_eq!(stats.subregions_released, 1);
    assert_eq!(stats.subregion_objects_freed, 3);
    assert_all_freed(&fx.heap, &[a, a1, a2]);
    assert_eq!(fx.finalised_count(a1), 1);
    assert!(fx
        .event_index(|e| matches!(e, GcEvent::SubregionReleased { root, kind: RegionKind::Arena } if *root == a))
        .is_some());
}

/// Trace regions owned by arena members are released with the arena
#[test]
fn test_trace_subregion_of_arena() {
    let mut fx = RegionFixture::new();
    let a = RegionArena::create(&mut fx.heap, &NODE).unwrap();
    let m = RegionArena::alloc(&mut fx.heap, a, &OWNER).unwrap();
    let s = fx.region(&NODE);
    let s1 = fx.alloc(s, &NODE);
    fx.link(m, 0, s);

    Region::release(&mut fx.heap, a);

    assert_all_freed(&fx.heap, &[a, m, s, s1]);
    assert_eq!(fx.heap.live_objects(), 0);
}

#[test]
fn test_gc_on_arena_is_noop() {
    let mut fx = RegionFixture::new();
    let a = RegionArena::create(&mut fx.heap, &NODE).unwrap();
    let m = RegionArena::alloc(&mut fx.heap, a, &NODE).unwrap();

    assert!(Region::gc(&mut fx.heap, a).is_none());
    assert_all_alive(&fx.heap, &[a, m]);
}

/// ============================================================================
/// WHOLE REGION RELEASE
/// ============================================================================

/// Releasing a region frees every member, subregion and held count
///
/// **Bug this finds:** Root finaliser skipped, members or counts leaked
#[test]
fn test_release_whole_region() {
    // Arrange
    let mut fx = RegionFixture::new();
    let r = fx.region(&FINAL);
    let a = fx.alloc(r, &NODE);
    let f = fx.alloc(r, &FINAL);
    let o = fx.alloc(r, &OWNER);
    fx.link(r, 0, a);
    fx.link(r, 1, f);
    fx.link(a, 0, o);

    let s = fx.region(&NODE);
    let s1 = fx.alloc(s, &NODE);
    fx.link(o, 0, s);

    let imm = fx.heap.alloc_immutable(&SHARED).unwrap();
    fx.link(s1, 0, imm);
    RegionTrace::insert(&mut fx.heap, s, imm, TransferOwnership::NoTransfer);
    assert_eq!(fx.heap.rc(imm), 2);

    // Act
    Region::release(&mut fx.heap, r);

    // Assert
    assert_all_freed(&fx.heap, &[r, a, f, o, s, s1]);
    assert_eq!(fx.finalised_count(r), 1);
    assert_eq!(fx.finalised_count(f), 1);
    assert_eq!(fx.heap.rc(imm), 1);
    assert_eq!(fx.heap.object_ids(), vec![imm]);

    let released = fx.logger.events().into_iter().find_map(|e| match e {
        GcEvent::RegionReleased {
            root,
            objects_freed,
            subregions_released,
        } if root == r => Some((objects_freed, subregions_released)),
        _ => None,
    });
    assert_eq!(released, Some((6, 1)));
}

/// ============================================================================
/// ALIASED AND MISPLACED OWNERS
/// ============================================================================

/// Two fields of one dead owner naming the same subregion release it once
///
/// **Bug this finds:** Subregion queued per field and released twice
#[test]
fn test_subregion_in_two_fields_released_once() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o = fx.alloc(r, &OWNER);
    let s = fx.region(&NODE);
    let s1 = fx.alloc(s, &NODE);
    fx.link(s, 0, s1);
    fx.link(o, 0, s);
    fx.link(o, 1, s);

    let stats = fx.gc(r);

    assert_eq!(stats.subregions_released, 1);
    assert_eq!(stats.subregion_objects_freed, 2);
    assert_eq!(released_count(&fx, s), 1);
    assert_all_freed(&fx.heap, &[o, s, s1]);
}

/// A subregion reachable from two dead owners has broken isolation
#[test]
#[should_panic(expected = "is owned by more than one dead object")]
fn test_subregion_shared_by_two_owners_is_fatal() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let o1 = fx.alloc(r, &OWNER);
    let o2 = fx.alloc(r, &OWNER);
    let s = fx.region(&NODE);
    fx.link(o1, 0, s);
    fx.link(o2, 0, s);

    RegionTrace::gc(&mut fx.heap, r);
}

/// A member whose descriptor rules out subregions must not hold one
///
/// **Bug this finds:** Subregion silently leaked when its only owner is
/// swept from the plain ring
#[test]
#[should_panic(expected = "but is outside the finaliser ring")]
fn test_plain_member_holding_subregion_is_fatal() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let x = fx.alloc(r, &NODE);
    fx.link(r, 0, x);
    let s = fx.region(&NODE);
    fx.link(x, 0, s);

    fx.unlink(r, 0);
    RegionTrace::gc(&mut fx.heap, r);
}

/// The same plain member is fine once the subregion has been merged in
#[test]
fn test_plain_member_after_merge_collects() {
    let mut fx = RegionFixture::new();
    let r = fx.region(&NODE);
    let x = fx.alloc(r, &NODE);
    fx.link(r, 0, x);
    let s = fx.region(&NODE);
    fx.link(x, 0, s);
    RegionTrace::merge(&mut fx.heap, r, s);

    fx.unlink(r, 0);
    let stats = fx.gc(r);

    assert_eq!(stats.subregions_released, 0);
    assert_all_freed(&fx.heap, &[x, s]);
    assert_eq!(fx.members(r), vec![r]);
}
