//! Local copy of the consortium database

use cactus_core::{CactusNode, ConsortiumDatabase};
use parking_lot::RwLock;
use tracing::info;

/// Holds the node's view of the topology.
///
/// Readers get a cloned snapshot, so an attestation never signs a
/// half-applied update.
#[derive(Debug, Default)]
pub struct ConsortiumRepository {
    database: RwLock<ConsortiumDatabase>,
}

impl ConsortiumRepository {
    pub fn new(database: ConsortiumDatabase) -> Self {
        Self {
            database: RwLock::new(database),
        }
    }

    pub fn snapshot(&self) -> ConsortiumDatabase {
        self.database.read().clone()
    }

    pub fn node_count(&self) -> usize {
        self.database.read().cactus_node.len()
    }

    /// Append a node, returning the new node count
    pub fn add_cactus_node(&self, node: CactusNode) -> usize {
        let mut db = self.database.write();
        info!(node_id = %node.id, member_id = %node.member_id, "Adding cactus node");
        db.cactus_node.push(node);
        db.cactus_node.len()
    }
}
