//! In-memory [`VectorStore`] implementation for tests and embedding callers.
//!
//! Nodes are kept in insertion order behind a `std::sync::RwLock`.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::ContentNode;

use super::{page_order, StoreStats, VectorStore};

/// In-memory node store.
pub struct InMemoryStore {
    nodes: RwLock<Vec<ContentNode>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every stored node, in insertion order.
    pub fn all_nodes(&self) -> Result<Vec<ContentNode>> {
        let nodes = self.nodes.read().map_err(|_| anyhow!("node store lock poisoned"))?;
        Ok(nodes.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add_nodes(&self, nodes: &[ContentNode]) -> Result<()> {
        let mut stored = self.nodes.write().map_err(|_| anyhow!("node store lock poisoned"))?;
        stored.extend_from_slice(nodes);
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<ContentNode>> {
        let stored = self.nodes.read().map_err(|_| anyhow!("node store lock poisoned"))?;
        Ok(stored.iter().find(|n| n.id == id).cloned())
    }

    async fn document_nodes(&self, document_id: &str) -> Result<Vec<ContentNode>> {
        let stored = self.nodes.read().map_err(|_| anyhow!("node store lock poisoned"))?;
        let mut nodes: Vec<ContentNode> = stored
            .iter()
            .filter(|n| n.document_id() == document_id)
            .cloned()
            .collect();
        nodes.sort_by_key(page_order);
        Ok(nodes)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let stored = self.nodes.read().map_err(|_| anyhow!("node store lock poisoned"))?;
        Ok(StoreStats::from_nodes(stored.iter()))
    }
}
