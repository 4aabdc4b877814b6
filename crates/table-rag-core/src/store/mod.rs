//! Storage abstraction for assembled nodes.
//!
//! The [`VectorStore`] trait is what the index build hands its node
//! collection to. Embedding computation and similarity search live behind
//! the concrete backend; the pipeline only appends nodes and reads them back
//! for inspection.
//!
//! A [`StorageContext`] is the caller-supplied container a build can append
//! into in place. It must carry a vector store.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ContentKind, ContentNode};

/// Node counts reported by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub documents: usize,
    pub by_kind: BTreeMap<ContentKind, usize>,
}

impl StoreStats {
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a ContentNode>) -> Self {
        let mut stats = StoreStats::default();
        let mut docs = std::collections::BTreeSet::new();
        for node in nodes {
            stats.total += 1;
            *stats.by_kind.entry(node.kind()).or_insert(0) += 1;
            docs.insert(node.document_id().to_string());
        }
        stats.documents = docs.len();
        stats
    }

    pub fn count(&self, kind: ContentKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Abstract node storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add_nodes`](VectorStore::add_nodes) | Append a batch of nodes |
/// | [`get_node`](VectorStore::get_node) | Fetch one node by id |
/// | [`document_nodes`](VectorStore::document_nodes) | All nodes of a document, in page order |
/// | [`stats`](VectorStore::stats) | Node counts |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append nodes. Called once per index build with the full collection.
    async fn add_nodes(&self, nodes: &[ContentNode]) -> Result<()>;

    async fn get_node(&self, id: &str) -> Result<Option<ContentNode>>;

    /// Nodes of one document ordered by `(page, kind)`, page-less last.
    async fn document_nodes(&self, document_id: &str) -> Result<Vec<ContentNode>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Caller-supplied storage that a build appends into in place.
#[derive(Clone, Default)]
pub struct StorageContext {
    pub vector_store: Option<Arc<dyn VectorStore>>,
}

impl StorageContext {
    pub fn new(vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            vector_store: Some(vector_store),
        }
    }
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("vector_store", &self.vector_store.is_some())
            .finish()
    }
}

/// Sort key shared by store implementations.
pub fn page_order(node: &ContentNode) -> (u32, ContentKind) {
    (node.page().unwrap_or(u32::MAX), node.kind())
}
