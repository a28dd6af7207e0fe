//! Reorganization primitives: `prepare_move_node`/`prepare_move_relationship`
//! (relocate one record, patch every neighbor reference) and reference
//! patching after `swap_page` physically exchanges two pages. This is the
//! mechanism an external compaction or locality tool would drive; it moves
//! records and keeps every reference consistent, it does not decide when or
//! where to move anything. Generalized over the [`ReorgStore`] trait so the
//! same patching logic runs for both the disk-backed engine
//! ([`crate::graph::GraphDb`]) and [`crate::in_memory::InMemoryGraph`] — the
//! same pattern [`crate::incidence`] and [`crate::traversal`] already use.

use crate::error::Result;
use crate::heap_file::Remap;
use crate::incidence::GraphStore;
use crate::record::RelationshipRecord;
use crate::traversal::incident_ids;

/// Write access a reorganization tool needs beyond [`GraphStore`]: moving a
/// record from one slot to another while leaving reference patching to the
/// caller.
pub trait ReorgStore: GraphStore {
    fn relocate_node(&mut self, id: u64, to_id: u64) -> Result<()>;
    fn relocate_relationship(&mut self, id: u64, to_id: u64) -> Result<()>;
}

fn patch_node_ref(rel: &mut RelationshipRecord, old: u64, new: u64) -> bool {
    let mut changed = false;
    if rel.source_node == old {
        rel.source_node = new;
        changed = true;
    }
    if rel.target_node == old {
        rel.target_node = new;
        changed = true;
    }
    changed
}

fn chain_neighbors(rel: &RelationshipRecord) -> [u64; 4] {
    [
        rel.prev_rel_source,
        rel.next_rel_source,
        rel.prev_rel_target,
        rel.next_rel_target,
    ]
}

fn patch_rel_ref(rel: &mut RelationshipRecord, old: u64, new: u64) -> bool {
    let mut changed = false;
    if rel.prev_rel_source == old {
        rel.prev_rel_source = new;
        changed = true;
    }
    if rel.next_rel_source == old {
        rel.next_rel_source = new;
        changed = true;
    }
    if rel.prev_rel_target == old {
        rel.prev_rel_target = new;
        changed = true;
    }
    if rel.next_rel_target == old {
        rel.next_rel_target = new;
        changed = true;
    }
    changed
}

/// Move node `id`'s record to slot `to_id` and rewrite every relationship
/// endpoint that referenced it. The incident chain is walked *before* the
/// move (matching against the old id, since relationship endpoint fields
/// still hold it at that point) and patched afterward.
pub fn prepare_move_node<S: ReorgStore>(store: &mut S, id: u64, to_id: u64) -> Result<()> {
    if id == to_id {
        return Ok(());
    }
    let node = store.read_node(id)?;
    let ids = if node.degree_is_zero() {
        Vec::new()
    } else {
        incident_ids(store, id, node.first_relationship)?
    };

    store.relocate_node(id, to_id)?;

    for rid in ids {
        let mut rel = store.read_relationship(rid)?;
        if patch_node_ref(&mut rel, id, to_id) {
            store.update_relationship(&rel)?;
        }
    }
    Ok(())
}

/// Move relationship `id`'s record to slot `to_id` and rewrite every chain
/// neighbor and endpoint node that referenced it.
pub fn prepare_move_relationship<S: ReorgStore>(store: &mut S, id: u64, to_id: u64) -> Result<()> {
    if id == to_id {
        return Ok(());
    }
    let rel = store.read_relationship(id)?;

    for neighbor_id in chain_neighbors(&rel) {
        if neighbor_id == id {
            continue; // self-reference; patched on the moved record below
        }
        let mut neighbor = store.read_relationship(neighbor_id)?;
        if patch_rel_ref(&mut neighbor, id, to_id) {
            store.update_relationship(&neighbor)?;
        }
    }

    store.relocate_relationship(id, to_id)?;

    let mut moved = store.read_relationship(to_id)?;
    if patch_rel_ref(&mut moved, id, to_id) {
        store.update_relationship(&moved)?;
    }

    for node_id in [rel.source_node, rel.target_node] {
        let mut node = store.read_node(node_id)?;
        if node.first_relationship == id {
            node.first_relationship = to_id;
            store.update_node(&node)?;
        }
    }
    Ok(())
}

/// Patch relationship endpoints after `swap_page` has already physically
/// exchanged the node records at `remap.from`/`remap.to` (the heap file
/// corrects the `id` field embedded in the bytes itself; only other records'
/// references need rewriting here).
pub fn apply_node_remap<S: ReorgStore>(store: &mut S, remap: Remap) -> Result<()> {
    let node = store.read_node(remap.to)?;
    if node.degree_is_zero() {
        return Ok(());
    }
    let ids = incident_ids(store, remap.from, node.first_relationship)?;
    for rid in ids {
        let mut rel = store.read_relationship(rid)?;
        if patch_node_ref(&mut rel, remap.from, remap.to) {
            store.update_relationship(&rel)?;
        }
    }
    Ok(())
}

/// Symmetric for relationship-file page swaps.
pub fn apply_relationship_remap<S: ReorgStore>(store: &mut S, remap: Remap) -> Result<()> {
    let mut moved = store.read_relationship(remap.to)?;
    if patch_rel_ref(&mut moved, remap.from, remap.to) {
        store.update_relationship(&moved)?;
    }

    for neighbor_id in chain_neighbors(&moved) {
        if neighbor_id == remap.to {
            continue;
        }
        let mut neighbor = store.read_relationship(neighbor_id)?;
        if patch_rel_ref(&mut neighbor, remap.from, remap.to) {
            store.update_relationship(&neighbor)?;
        }
    }

    for node_id in [moved.source_node, moved.target_node] {
        let mut node = store.read_node(node_id)?;
        if node.first_relationship == remap.from {
            node.first_relationship = remap.to;
            store.update_node(&node)?;
        }
    }
    Ok(())
}
