//! Incidence-list traversal: walking a node's relationship chain and
//! filtering it by direction. Implemented once against the [`RecordStore`]
//! trait so both the disk-backed engine and the in-memory reference run the
//! exact same traversal code instead of two hand-synced copies.

use crate::config::SENTINEL;
use crate::error::Result;
use crate::record::{NodeRecord, RelationshipRecord, Side, SideOf};

/// `OUTGOING` (source-side only), `INCOMING` (target-side only), `BOTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    /// Whether a relationship touching `node_id` on `side` should be
    /// surfaced under this direction. A self-loop touches both sides at
    /// once ([`Side::Both`]) and so passes every direction unconditionally,
    /// matching the two independent endpoint checks a caller would run
    /// (`source_node == node_id`, `target_node == node_id`) rather than an
    /// either/or choice between them.
    fn allows(self, side: Side) -> bool {
        match side {
            Side::Source => matches!(self, Direction::Outgoing | Direction::Both),
            Side::Target => matches!(self, Direction::Incoming | Direction::Both),
            Side::Both => true,
            Side::Neither => false,
        }
    }
}

/// Read access to nodes and relationships, independent of whether they live
/// on disk ([`crate::heap_file::HeapFile`]) or in a hash map
/// ([`crate::in_memory::InMemoryGraph`]).
pub trait RecordStore {
    fn read_node(&mut self, id: u64) -> Result<NodeRecord>;
    fn read_relationship(&mut self, id: u64) -> Result<RelationshipRecord>;
}

/// Which chain-side `current` occupies relative to `node_id`, for the
/// purposes of deciding which `next_rel_*`/`prev_rel_*` field to follow next.
/// This only has to pick one field to advance through, even for a self-loop
/// — `create_relationship` wires a self-loop's source-side and target-side
/// chain pointers to the same values, so either choice advances correctly.
/// Whether the arrived-at relationship should be *surfaced* under the
/// caller's `Direction` is a separate question, answered by
/// [`RelationshipRecord::side_of`] below, not by this function.
fn walk_side(current: &RelationshipRecord, node_id: u64) -> SideOf {
    if current.source_node == node_id {
        SideOf::Source
    } else {
        debug_assert_eq!(current.target_node, node_id);
        SideOf::Target
    }
}

pub fn next_relationship_id<S: RecordStore>(
    store: &mut S,
    node_id: u64,
    current: u64,
    direction: Direction,
) -> Result<u64> {
    let start = current;
    let mut current_rec = store.read_relationship(current)?;

    loop {
        let side = walk_side(&current_rec, node_id);
        let next_id = current_rec.next_on_side(side);

        if next_id == start {
            return Ok(SENTINEL);
        }

        let next_rec = store.read_relationship(next_id)?;
        if direction.allows(next_rec.side_of(node_id)) {
            return Ok(next_id);
        }

        current_rec = next_rec;
    }
}

pub fn expand<S: RecordStore>(
    store: &mut S,
    node_id: u64,
    direction: Direction,
) -> Result<Vec<RelationshipRecord>> {
    let node = store.read_node(node_id)?;
    if node.degree_is_zero() {
        return Ok(Vec::new());
    }

    let first = store.read_relationship(node.first_relationship)?;

    let mut results = Vec::new();
    let start_id = if direction.allows(first.side_of(node_id)) {
        results.push(first);
        first.id
    } else {
        let advanced = next_relationship_id(store, node_id, first.id, direction)?;
        if advanced == SENTINEL {
            return Ok(Vec::new());
        }
        results.push(store.read_relationship(advanced)?);
        advanced
    };

    loop {
        let current_id = results.last().unwrap().id;
        let next_id = next_relationship_id(store, node_id, current_id, direction)?;
        if next_id == SENTINEL || next_id == start_id {
            break;
        }
        results.push(store.read_relationship(next_id)?);
    }

    Ok(results)
}

/// Returns `Ok(None)` when no such relationship exists rather than an
/// error — absence is an ordinary outcome here, not a failure.
pub fn contains_relationship_from_to<S: RecordStore>(
    store: &mut S,
    a: u64,
    b: u64,
    direction: Direction,
) -> Result<Option<RelationshipRecord>> {
    for rel in expand(store, a, direction)? {
        let matches = match direction {
            Direction::Outgoing => rel.source_node == a && rel.target_node == b,
            Direction::Incoming => rel.source_node == b && rel.target_node == a,
            Direction::Both => {
                (rel.source_node == a && rel.target_node == b)
                    || (rel.source_node == b && rel.target_node == a)
            }
        };
        if matches {
            return Ok(Some(rel));
        }
    }
    Ok(None)
}

/// Enumerate every relationship id in the chain reachable from `first`,
/// matching chain sides against `node_id`. Used by [`crate::reorg`] while a
/// node's record is mid-move: the node may already live under a different id
/// than the one still encoded in its relationships' endpoint fields, so the
/// match value (`node_id`) and the record lookup (`first`) must be supplied
/// independently rather than derived from `store.read_node`.
pub fn incident_ids<S: RecordStore>(store: &mut S, node_id: u64, first: u64) -> Result<Vec<u64>> {
    if first == SENTINEL {
        return Ok(Vec::new());
    }
    let mut ids = vec![first];
    let mut current = first;
    loop {
        let next = next_relationship_id(store, node_id, current, Direction::Both)?;
        if next == SENTINEL || next == first {
            break;
        }
        ids.push(next);
        current = next;
    }
    Ok(ids)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::in_memory::InMemoryGraph;
    use crate::incidence;

    #[test]
    fn triangle_expand_and_contains() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(0).unwrap();
        let n1 = g.create_node(0).unwrap();
        let n2 = g.create_node(0).unwrap();

        let r0 = incidence::create_relationship(&mut g, n0, n1, 1.0, 0).unwrap();
        let r1 = incidence::create_relationship(&mut g, n1, n2, 1.0, 0).unwrap();
        let _r2 = incidence::create_relationship(&mut g, n2, n0, 1.0, 0).unwrap();

        let around_n1 = expand(&mut g, n1, Direction::Both).unwrap();
        let ids: Vec<u64> = around_n1.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![r0, r1]);

        assert!(contains_relationship_from_to(&mut g, n0, n2, Direction::Outgoing)
            .unwrap()
            .is_none());
        let both = contains_relationship_from_to(&mut g, n0, n2, Direction::Both)
            .unwrap()
            .unwrap();
        assert_eq!(both.source_node, n2);
        assert_eq!(both.target_node, n0);
    }

    #[test]
    fn self_loop_expand_is_singleton() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(0).unwrap();
        let s = incidence::create_relationship(&mut g, n0, n0, 1.0, 0).unwrap();

        let around = expand(&mut g, n0, Direction::Both).unwrap();
        assert_eq!(around.len(), 1);
        assert_eq!(around[0].id, s);

        let rel = g.read_relationship(s).unwrap();
        assert_eq!(rel.prev_rel_source, s);
        assert_eq!(rel.next_rel_source, s);
        assert_eq!(rel.prev_rel_target, s);
        assert_eq!(rel.next_rel_target, s);
    }

    #[test]
    fn self_loop_passes_incoming_and_outgoing_filters() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(0).unwrap();
        let n1 = g.create_node(0).unwrap();

        let s = incidence::create_relationship(&mut g, n0, n0, 1.0, 0).unwrap();
        let r = incidence::create_relationship(&mut g, n1, n0, 1.0, 0).unwrap();

        let incoming = expand(&mut g, n0, Direction::Incoming).unwrap();
        let ids: Vec<u64> = incoming.iter().map(|rel| rel.id).collect();
        assert_eq!(ids, vec![s, r]);

        let outgoing = expand(&mut g, n0, Direction::Outgoing).unwrap();
        let ids: Vec<u64> = outgoing.iter().map(|rel| rel.id).collect();
        assert_eq!(ids, vec![s]);
    }
}
