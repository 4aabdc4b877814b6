//! On-disk index snapshots.
//!
//! A persist directory holds two files:
//!
//! - `index.sqlite`: every node, see [`crate::sqlite_store`]
//! - `manifest.json`: node count, build time, and the metadata key names the
//!   snapshot was written with
//!
//! Writing a snapshot replaces whatever the directory held before.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use table_rag_core::models::{ContentNode, MetadataKeys};
use table_rag_core::store::VectorStore;

use crate::db;
use crate::error::{Error, Result};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

pub const INDEX_FILE: &str = "index.sqlite";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub node_count: usize,
    pub built_at: DateTime<Utc>,
    pub metadata_keys: MetadataKeys,
}

/// A reopened snapshot.
pub struct PersistedIndex {
    pub dir: PathBuf,
    pub manifest: Manifest,
    pub store: SqliteStore,
}

impl PersistedIndex {
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }
}

/// Write `nodes` as a fresh snapshot in `dir`.
///
/// The snapshot is built in a staging directory inside `dir` and only moved
/// into place once the database and manifest are complete. A failed build
/// leaves the previous snapshot untouched.
pub async fn persist_index(
    dir: &Path,
    nodes: &[ContentNode],
    keys: &MetadataKeys,
) -> Result<Manifest> {
    std::fs::create_dir_all(dir)?;
    let staging = tempfile::Builder::new().prefix(".staging-").tempdir_in(dir)?;

    let staged_db = staging.path().join(INDEX_FILE);
    let pool = db::connect(&staged_db).await?;
    let written = match migrate::run_migrations(&pool).await {
        Ok(()) => {
            let store = SqliteStore::new(pool, keys.clone());
            let written = store
                .add_nodes(nodes)
                .await
                .map_err(|e| Error::Store(format!("{:#}", e)));
            store.close().await;
            written
        }
        Err(e) => {
            pool.close().await;
            Err(e)
        }
    };
    written?;

    let manifest = Manifest {
        node_count: nodes.len(),
        built_at: Utc::now(),
        metadata_keys: keys.clone(),
    };
    let staged_manifest = staging.path().join(MANIFEST_FILE);
    std::fs::write(&staged_manifest, serde_json::to_vec_pretty(&manifest)?)?;

    // Manifest goes first so an interrupted swap reads as "no index".
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        std::fs::remove_file(&manifest_path)?;
    }
    let db_path = dir.join(INDEX_FILE);
    for suffix in ["-journal", "-wal", "-shm"] {
        let stale = PathBuf::from(format!("{}{}", db_path.display(), suffix));
        if stale.exists() {
            std::fs::remove_file(&stale)?;
        }
    }
    std::fs::rename(&staged_db, &db_path)?;
    std::fs::rename(&staged_manifest, &manifest_path)?;

    info!(dir = %dir.display(), nodes = nodes.len(), "index persisted");
    Ok(manifest)
}

/// Reopen a snapshot written by [`persist_index`].
pub async fn load_index(dir: &Path) -> Result<PersistedIndex> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let db_path = dir.join(INDEX_FILE);
    if !manifest_path.is_file() || !db_path.is_file() {
        return Err(Error::Store(format!(
            "no index found in {} (expected {} and {})",
            dir.display(),
            INDEX_FILE,
            MANIFEST_FILE
        )));
    }

    let manifest: Manifest = serde_json::from_slice(&std::fs::read(&manifest_path)?)?;
    let pool = db::connect(&db_path).await?;
    let store = SqliteStore::new(pool, manifest.metadata_keys.clone());

    Ok(PersistedIndex {
        dir: dir.to_path_buf(),
        manifest,
        store,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_rag_core::models::{ContentKind, NodeMetadata};

    fn text_node(doc: &str, page: u32, text: &str) -> ContentNode {
        ContentNode::new(
            text.to_string(),
            NodeMetadata {
                document_id: doc.to_string(),
                page: Some(page),
                kind: ContentKind::Text,
                table_html: None,
            },
            None,
        )
    }

    #[tokio::test]
    async fn persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("index");
        let nodes = vec![text_node("doc1", 1, "alpha"), text_node("doc1", 2, "beta")];

        let manifest = persist_index(&index_dir, &nodes, &MetadataKeys::default())
            .await
            .unwrap();
        assert_eq!(manifest.node_count, 2);
        assert!(index_dir.join(INDEX_FILE).is_file());
        assert!(index_dir.join(MANIFEST_FILE).is_file());

        let index = load_index(&index_dir).await.unwrap();
        assert_eq!(index.manifest, manifest);
        let back = index.store.document_nodes("doc1").await.unwrap();
        assert_eq!(back, nodes);
        index.store.close().await;
    }

    #[tokio::test]
    async fn second_persist_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        persist_index(
            dir.path(),
            &[text_node("old", 1, "stale")],
            &MetadataKeys::default(),
        )
        .await
        .unwrap();
        persist_index(
            dir.path(),
            &[text_node("new", 1, "fresh")],
            &MetadataKeys::default(),
        )
        .await
        .unwrap();

        let index = load_index(dir.path()).await.unwrap();
        let stats = index.store.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert!(index.store.document_nodes("old").await.unwrap().is_empty());
        index.store.close().await;
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let keys = MetadataKeys::default();
        let first = persist_index(dir.path(), &[text_node("old", 1, "kept")], &keys)
            .await
            .unwrap();

        let node = text_node("new", 1, "fresh");
        let err = persist_index(dir.path(), &[node.clone(), node], &keys)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        let index = load_index(dir.path()).await.unwrap();
        assert_eq!(index.manifest, first);
        let stats = index.store.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(index.store.document_nodes("old").await.unwrap().len(), 1);
        index.store.close().await;

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".staging-"))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[tokio::test]
    async fn loading_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_index(dir.path()).await, Err(Error::Store(_))));
    }
}
