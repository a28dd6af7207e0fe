//! The incidence-list maintenance protocol: `create_relationship` and
//! `delete_relationship` splice a relationship into (or out of) the two
//! circular doubly-linked chains hanging off its source and target nodes.
//! Implemented once against the [`GraphStore`] trait so both the
//! disk-backed engine ([`crate::graph::GraphDb`]) and
//! [`crate::in_memory::InMemoryGraph`] run identical logic.

use crate::error::{GraphError, Result};
use crate::record::{NodeRecord, RelationshipRecord, SideOf};
use crate::traversal::RecordStore;

/// Write access needed to maintain incidence lists, layered on top of
/// [`RecordStore`]'s read access.
pub trait GraphStore: RecordStore {
    fn update_node(&mut self, rec: &NodeRecord) -> Result<()>;
    fn update_relationship(&mut self, rec: &RelationshipRecord) -> Result<()>;
    /// Allocates a fresh slot, persists `rec` into it (its `id` is
    /// overwritten to the allocated slot), and returns the id.
    fn insert_relationship(&mut self, rec: RelationshipRecord) -> Result<u64>;
    fn remove_relationship(&mut self, id: u64) -> Result<()>;
}

/// Which side(s) of `rel` equal `node_id` — both, for a self-loop neighbor.
/// Factored out so the pointer fix-up below is local and testable instead
/// of inlined at each call site.
fn sides_touching(rel: &RelationshipRecord, node_id: u64) -> Vec<SideOf> {
    let mut sides = Vec::new();
    if rel.source_node == node_id {
        sides.push(SideOf::Source);
    }
    if rel.target_node == node_id {
        sides.push(SideOf::Target);
    }
    sides
}

pub fn create_relationship<S: GraphStore>(
    store: &mut S,
    n_from: u64,
    n_to: u64,
    weight: f64,
    label: u64,
) -> Result<u64> {
    let mut src = store.read_node(n_from)?;
    let mut tgt = store.read_node(n_to)?;

    // Locate (first, last) on each side before the new relationship exists,
    // so the "wire new pointers first" step below has something to read
    // from.
    let (first_src, last_src) = first_and_last(store, &src, n_from)?;
    let (first_tgt, last_tgt) = first_and_last(store, &tgt, n_to)?;

    // Wire the new relationship's own pointers before touching any
    // neighbor — overwriting a neighbor first would destroy the very field
    // this relationship still needs to read. `RelationshipRecord::new`
    // leaves them at SENTINEL for the degree-0 case; those get patched to
    // self-reference once the id is known, right after insertion.
    let mut rel = RelationshipRecord::new(0, n_from, n_to, weight, label);
    if let (Some(first_src), Some(last_src)) = (&first_src, &last_src) {
        rel.prev_rel_source = last_src.id;
        rel.next_rel_source = first_src.id;
    }
    if let (Some(first_tgt), Some(last_tgt)) = (&first_tgt, &last_tgt) {
        rel.prev_rel_target = last_tgt.id;
        rel.next_rel_target = first_tgt.id;
    }

    let new_id = store.insert_relationship(rel)?;
    let mut rel = store.read_relationship(new_id)?;

    if first_src.is_none() {
        rel.prev_rel_source = new_id;
        rel.next_rel_source = new_id;
    }
    if first_tgt.is_none() {
        rel.prev_rel_target = new_id;
        rel.next_rel_target = new_id;
    }

    // For each of last_src, last_tgt, first_src, first_tgt, point the
    // appropriate pointer at the new relationship. `last_*` is this node's
    // predecessor, so its *forward* pointer advances to the new
    // relationship; `first_*` is the successor, so its *backward* pointer
    // does. Self-loops touch a neighbor on both sides independently, which
    // `sides_touching` (via `set_*_on_touching_sides`) accounts for.
    if let (Some(first_src), Some(last_src)) = (&first_src, &last_src) {
        set_next_on_touching_sides(store, last_src.id, n_from, new_id)?;
        set_prev_on_touching_sides(store, first_src.id, n_from, new_id)?;
    }
    if let (Some(first_tgt), Some(last_tgt)) = (&first_tgt, &last_tgt) {
        set_next_on_touching_sides(store, last_tgt.id, n_to, new_id)?;
        set_prev_on_touching_sides(store, first_tgt.id, n_to, new_id)?;
    }

    // If either endpoint had no incidence yet, point it at the new
    // relationship and mark the corresponding chain-head flag.
    if first_src.is_none() {
        src.first_relationship = new_id;
        rel.set_first_source(true);
        store.update_node(&src)?;
    }
    if first_tgt.is_none() {
        tgt.first_relationship = new_id;
        rel.set_first_target(true);
        store.update_node(&tgt)?;
    }
    store.update_relationship(&rel)?;

    Ok(new_id)
}

/// The head (`first`) and tail (`last`) of `node`'s incidence chain, or
/// `None` if the node has degree 0.
fn first_and_last<S: GraphStore>(
    store: &mut S,
    node: &NodeRecord,
    node_id: u64,
) -> Result<(Option<RelationshipRecord>, Option<RelationshipRecord>)> {
    if node.degree_is_zero() {
        return Ok((None, None));
    }

    let first = store.read_relationship(node.first_relationship)?;
    // The tail is whichever neighbor points forward into `first` on the side
    // where `first` meets `node_id` — i.e. `first`'s own `prev_*` on that
    // side, since the chain is circular.
    let side = if first.source_node == node_id {
        SideOf::Source
    } else {
        debug_assert_eq!(first.target_node, node_id);
        SideOf::Target
    };
    let last_id = first.prev_on_side(side);
    let last = store.read_relationship(last_id)?;

    Ok((Some(first), Some(last)))
}

/// Set `neighbor_id`'s forward (`next_*`) pointer to `new_id` on every side
/// that touches `node_id` (both sides, for a self-loop neighbor).
fn set_next_on_touching_sides<S: GraphStore>(
    store: &mut S,
    neighbor_id: u64,
    node_id: u64,
    new_id: u64,
) -> Result<()> {
    let mut neighbor = store.read_relationship(neighbor_id)?;
    for side in sides_touching(&neighbor, node_id) {
        neighbor.set_next_on_side(side, new_id);
    }
    store.update_relationship(&neighbor)
}

/// Set `neighbor_id`'s backward (`prev_*`) pointer to `new_id` on every side
/// that touches `node_id` (both sides, for a self-loop neighbor).
fn set_prev_on_touching_sides<S: GraphStore>(
    store: &mut S,
    neighbor_id: u64,
    node_id: u64,
    new_id: u64,
) -> Result<()> {
    let mut neighbor = store.read_relationship(neighbor_id)?;
    for side in sides_touching(&neighbor, node_id) {
        neighbor.set_prev_on_side(side, new_id);
    }
    store.update_relationship(&neighbor)
}

/// Symmetric unlink on each endpoint, then clear the in-use bit.
pub fn delete_relationship<S: GraphStore>(store: &mut S, id: u64) -> Result<()> {
    let rel = store.read_relationship(id)?;

    unlink_side(store, &rel, rel.source_node, SideOf::Source)?;
    if rel.target_node != rel.source_node {
        unlink_side(store, &rel, rel.target_node, SideOf::Target)?;
    } else {
        // Self-loop: both sides pass through the same relationship and must
        // both be unlinked, but `unlink_side` already read `node` once; a
        // second, independent unlink on the target side is still required
        // since the two chains are logically distinct even though they
        // share storage.
        unlink_side(store, &rel, rel.target_node, SideOf::Target)?;
    }

    store.remove_relationship(id)
}

fn unlink_side<S: GraphStore>(
    store: &mut S,
    rel: &RelationshipRecord,
    node_id: u64,
    side: SideOf,
) -> Result<()> {
    let mut node = store.read_node(node_id)?;
    let prev_id = rel.prev_on_side(side);
    let next_id = rel.next_on_side(side);

    if prev_id == rel.id && next_id == rel.id {
        // Sole incidence on this side: the node has no relationships left
        // after this unlink.
        node.first_relationship = crate::config::SENTINEL;
        store.update_node(&node)?;
        return Ok(());
    }

    let mut prev = store.read_relationship(prev_id)?;
    let prev_side = *sides_touching(&prev, node_id)
        .first()
        .ok_or_else(|| GraphError::invariant("prev neighbor does not touch this node"))?;
    match prev_side {
        SideOf::Source => prev.next_rel_source = next_id,
        SideOf::Target => prev.next_rel_target = next_id,
    }
    store.update_relationship(&prev)?;

    let mut next = store.read_relationship(next_id)?;
    let next_side = *sides_touching(&next, node_id)
        .first()
        .ok_or_else(|| GraphError::invariant("next neighbor does not touch this node"))?;
    match next_side {
        SideOf::Source => next.prev_rel_source = prev_id,
        SideOf::Target => next.prev_rel_target = prev_id,
    }
    store.update_relationship(&next)?;

    if node.first_relationship == rel.id {
        node.first_relationship = next_id;
        store.update_node(&node)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::in_memory::InMemoryGraph;

    #[test]
    fn triangle_reciprocity_holds() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(0).unwrap();
        let n1 = g.create_node(0).unwrap();
        let n2 = g.create_node(0).unwrap();

        let r0 = create_relationship(&mut g, n0, n1, 1.0, 0).unwrap();
        let r1 = create_relationship(&mut g, n1, n2, 1.0, 0).unwrap();
        let r2 = create_relationship(&mut g, n2, n0, 1.0, 0).unwrap();

        let rec0 = g.read_relationship(r0).unwrap();
        let rec1 = g.read_relationship(r1).unwrap();
        let rec2 = g.read_relationship(r2).unwrap();

        // n1's chain: r0 (target side) <-> r1 (source side).
        assert_eq!(rec0.next_rel_target, r1);
        assert_eq!(rec1.prev_rel_source, r0);

        // n2's chain: r1 (target side) <-> r2 (source side).
        assert_eq!(rec1.next_rel_target, r2);
        assert_eq!(rec2.prev_rel_source, r1);

        // n0's chain: r2 (target side) <-> r0 (source side).
        assert_eq!(rec2.next_rel_target, r0);
        assert_eq!(rec0.prev_rel_source, r2);
    }

    #[test]
    fn star_then_delete_center_preserves_invariants() {
        let mut g = InMemoryGraph::new();
        let center = g.create_node(0).unwrap();
        let mut leaves = Vec::new();
        let mut rels = Vec::new();
        for _ in 0..10 {
            let leaf = g.create_node(0).unwrap();
            leaves.push(leaf);
            rels.push(create_relationship(&mut g, center, leaf, 1.0, 0).unwrap());
        }

        for &r in &rels {
            delete_relationship(&mut g, r).unwrap();
            let center_rec = g.read_node(center).unwrap();
            if !center_rec.degree_is_zero() {
                let first = g.read_relationship(center_rec.first_relationship).unwrap();
                assert!(first.in_use());
            }
        }

        let center_rec = g.read_node(center).unwrap();
        assert!(center_rec.degree_is_zero());
    }

    #[test]
    fn self_loop_create_and_delete() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(0).unwrap();
        let s = create_relationship(&mut g, n0, n0, 1.0, 0).unwrap();

        let rel = g.read_relationship(s).unwrap();
        assert_eq!(rel.prev_rel_source, s);
        assert_eq!(rel.next_rel_source, s);
        assert_eq!(rel.prev_rel_target, s);
        assert_eq!(rel.next_rel_target, s);

        delete_relationship(&mut g, s).unwrap();
        let node = g.read_node(n0).unwrap();
        assert!(node.degree_is_zero());
    }
}
