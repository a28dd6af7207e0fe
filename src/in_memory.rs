//! A hash-map-backed graph that runs the same incidence-list protocol as
//! the disk-backed engine, with no pages, no cache, and no pinning. Useful
//! as a reference implementation to test the disk-backed engine against,
//! and anywhere an algorithm needs to run without touching a filesystem.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::incidence::{self, GraphStore};
use crate::record::{NodeRecord, RelationshipRecord};
use crate::reorg::{self, ReorgStore};
use crate::traversal::{self, Direction, RecordStore};

/// A graph held entirely in memory, keyed by id exactly as the disk-backed
/// engine's ids are slot indices.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    nodes: HashMap<u64, NodeRecord>,
    relationships: HashMap<u64, RelationshipRecord>,
    next_node_id: u64,
    next_relationship_id: u64,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_node(&mut self, label: u64) -> Result<u64> {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.insert(id, NodeRecord::new(id, label));
        Ok(id)
    }

    pub fn create_relationship(&mut self, from: u64, to: u64, weight: f64, label: u64) -> Result<u64> {
        incidence::create_relationship(self, from, to, weight, label)
    }

    pub fn delete_node(&mut self, id: u64) -> Result<()> {
        let node = self.read_node(id)?;
        if !node.degree_is_zero() {
            return Err(GraphError::invariant(format!(
                "cannot delete node {id} with nonzero degree"
            )));
        }
        self.nodes.remove(&id);
        Ok(())
    }

    pub fn delete_relationship(&mut self, id: u64) -> Result<()> {
        incidence::delete_relationship(self, id)
    }

    pub fn check_node_exists(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn check_relationship_exists(&self, id: u64) -> bool {
        self.relationships.contains_key(&id)
    }

    pub fn get_nodes(&self) -> Vec<NodeRecord> {
        let mut ids: Vec<&u64> = self.nodes.keys().collect();
        ids.sort();
        ids.into_iter().map(|id| self.nodes[id]).collect()
    }

    pub fn get_relationships(&self) -> Vec<RelationshipRecord> {
        let mut ids: Vec<&u64> = self.relationships.keys().collect();
        ids.sort();
        ids.into_iter().map(|id| self.relationships[id]).collect()
    }

    pub fn expand(&mut self, node_id: u64, direction: Direction) -> Result<Vec<RelationshipRecord>> {
        traversal::expand(self, node_id, direction)
    }

    pub fn next_relationship_id(
        &mut self,
        node_id: u64,
        current: u64,
        direction: Direction,
    ) -> Result<u64> {
        traversal::next_relationship_id(self, node_id, current, direction)
    }

    pub fn contains_relationship_from_to(
        &mut self,
        a: u64,
        b: u64,
        direction: Direction,
    ) -> Result<Option<RelationshipRecord>> {
        traversal::contains_relationship_from_to(self, a, b, direction)
    }

    /// Rename node `id` to `to_id` and patch every relationship that
    /// referenced it. Delegates to [`crate::reorg`] so this runs the exact
    /// same patching logic as the disk-backed engine.
    pub fn prepare_move_node(&mut self, id: u64, to_id: u64) -> Result<()> {
        reorg::prepare_move_node(self, id, to_id)
    }

    /// Rename relationship `id` to `to_id` and patch the two endpoints'
    /// `first_relationship` plus every chain neighbor.
    pub fn prepare_move_relationship(&mut self, id: u64, to_id: u64) -> Result<()> {
        reorg::prepare_move_relationship(self, id, to_id)
    }
}

impl RecordStore for InMemoryGraph {
    fn read_node(&mut self, id: u64) -> Result<NodeRecord> {
        self.nodes
            .get(&id)
            .copied()
            .ok_or_else(|| GraphError::argument(format!("no such node {id}")))
    }

    fn read_relationship(&mut self, id: u64) -> Result<RelationshipRecord> {
        self.relationships
            .get(&id)
            .copied()
            .ok_or_else(|| GraphError::argument(format!("no such relationship {id}")))
    }
}

impl GraphStore for InMemoryGraph {
    fn update_node(&mut self, rec: &NodeRecord) -> Result<()> {
        if !self.nodes.contains_key(&rec.id) {
            return Err(GraphError::argument(format!("no such node {}", rec.id)));
        }
        self.nodes.insert(rec.id, *rec);
        Ok(())
    }

    fn update_relationship(&mut self, rec: &RelationshipRecord) -> Result<()> {
        if !self.relationships.contains_key(&rec.id) {
            return Err(GraphError::argument(format!("no such relationship {}", rec.id)));
        }
        self.relationships.insert(rec.id, *rec);
        Ok(())
    }

    fn insert_relationship(&mut self, mut rec: RelationshipRecord) -> Result<u64> {
        let id = self.next_relationship_id;
        self.next_relationship_id += 1;
        rec.set_id(id);
        self.relationships.insert(id, rec);
        Ok(id)
    }

    fn remove_relationship(&mut self, id: u64) -> Result<()> {
        self.relationships
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| GraphError::argument(format!("no such relationship {id}")))
    }
}

impl ReorgStore for InMemoryGraph {
    fn relocate_node(&mut self, id: u64, to_id: u64) -> Result<()> {
        let mut node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| GraphError::argument(format!("no such node {id}")))?;
        if self.nodes.contains_key(&to_id) {
            self.nodes.insert(id, node);
            return Err(GraphError::argument(format!(
                "destination id {to_id} is already in use"
            )));
        }
        node.id = to_id;
        self.nodes.insert(to_id, node);
        Ok(())
    }

    fn relocate_relationship(&mut self, id: u64, to_id: u64) -> Result<()> {
        let mut rel = self
            .relationships
            .remove(&id)
            .ok_or_else(|| GraphError::argument(format!("no such relationship {id}")))?;
        if self.relationships.contains_key(&to_id) {
            self.relationships.insert(id, rel);
            return Err(GraphError::argument(format!(
                "destination id {to_id} is already in use"
            )));
        }
        rel.id = to_id;
        self.relationships.insert(to_id, rel);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delete_node_requires_zero_degree() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(0).unwrap();
        let n1 = g.create_node(0).unwrap();
        g.create_relationship(n0, n1, 1.0, 0).unwrap();

        assert!(g.delete_node(n0).is_err());
    }

    #[test]
    fn get_nodes_and_relationships_are_ordered() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(10).unwrap();
        let n1 = g.create_node(20).unwrap();
        g.create_relationship(n0, n1, 2.5, 3).unwrap();

        let nodes = g.get_nodes();
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![n0, n1]);
        assert_eq!(g.get_relationships().len(), 1);
    }

    #[test]
    fn prepare_move_node_rewrites_endpoints() {
        let mut g = InMemoryGraph::new();
        let n0 = g.create_node(0).unwrap();
        let n1 = g.create_node(0).unwrap();
        let r = g.create_relationship(n0, n1, 1.0, 0).unwrap();

        g.prepare_move_node(n0, 1000).unwrap();

        let rel = g.read_relationship(r).unwrap();
        assert_eq!(rel.source_node, 1000);
        assert!(!g.check_node_exists(n0));
        assert!(g.check_node_exists(1000));
    }
}
