//! SQLite-backed [`VectorStore`] used for on-disk index snapshots.
//!
//! Nodes are stored one row each. Metadata is written as JSON under the
//! configured [`MetadataKeys`], so the same keys must be used to read a
//! snapshot back (the manifest records them).

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use table_rag_core::models::{ContentKind, ContentNode, ImagePayload, MetadataKeys, NodeMetadata};
use table_rag_core::store::{page_order, StoreStats, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    keys: MetadataKeys,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, keys: MetadataKeys) -> Self {
        Self { pool, keys }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn node_from_row(&self, row: &SqliteRow) -> anyhow::Result<ContentNode> {
        let id: String = row.get("id");
        let metadata_json: String = row.get("metadata_json");
        let value: serde_json::Value = serde_json::from_str(&metadata_json)
            .with_context(|| format!("node {} has invalid metadata", id))?;
        let metadata = NodeMetadata::from_json(&value, &self.keys)
            .with_context(|| format!("node {} has invalid metadata", id))?;

        let image_type: Option<String> = row.get("image_type");
        let image_value: Option<String> = row.get("image_value");
        let image = match (image_type.as_deref(), image_value) {
            (Some("url"), Some(v)) => Some(ImagePayload::Url(v)),
            (Some("base64"), Some(v)) => Some(ImagePayload::Base64(v)),
            (None, _) => None,
            (Some(other), _) => {
                return Err(anyhow!("node {} has unknown image type '{}'", id, other))
            }
        };

        Ok(ContentNode {
            id,
            text: row.get("text"),
            hash: row.get("hash"),
            metadata,
            image,
        })
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add_nodes(&self, nodes: &[ContentNode]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for node in nodes {
            let (image_type, image_value) = match &node.image {
                Some(ImagePayload::Url(v)) => (Some("url"), Some(v.as_str())),
                Some(ImagePayload::Base64(v)) => (Some("base64"), Some(v.as_str())),
                None => (None, None),
            };
            sqlx::query(
                "INSERT INTO nodes (id, document_id, page, kind, text, hash, metadata_json, image_type, image_value) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&node.id)
            .bind(node.document_id())
            .bind(node.page().map(i64::from))
            .bind(node.kind().as_str())
            .bind(&node.text)
            .bind(&node.hash)
            .bind(node.metadata.to_json(&self.keys).to_string())
            .bind(image_type)
            .bind(image_value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_node(&self, id: &str) -> anyhow::Result<Option<ContentNode>> {
        let row = sqlx::query("SELECT * FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| self.node_from_row(&r)).transpose()
    }

    async fn document_nodes(&self, document_id: &str) -> anyhow::Result<Vec<ContentNode>> {
        let rows = sqlx::query("SELECT * FROM nodes WHERE document_id = ? ORDER BY rowid ASC")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        let mut nodes = rows
            .iter()
            .map(|r| self.node_from_row(r))
            .collect::<anyhow::Result<Vec<_>>>()?;
        nodes.sort_by_key(page_order);
        Ok(nodes)
    }

    async fn stats(&self) -> anyhow::Result<StoreStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&self.pool)
            .await?;
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT document_id) FROM nodes")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query("SELECT kind, COUNT(*) AS n FROM nodes GROUP BY kind")
            .fetch_all(&self.pool)
            .await?;
        let mut by_kind = BTreeMap::new();
        for row in &rows {
            let kind: String = row.get("kind");
            let n: i64 = row.get("n");
            by_kind.insert(kind.parse::<ContentKind>()?, n as usize);
        }

        Ok(StoreStats {
            total: total as usize,
            documents: documents as usize,
            by_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    fn node(
        doc: &str,
        page: Option<u32>,
        kind: ContentKind,
        image: Option<ImagePayload>,
    ) -> ContentNode {
        ContentNode::new(
            format!("{} {:?} {}", doc, page, kind),
            NodeMetadata {
                document_id: doc.to_string(),
                page,
                kind,
                table_html: (kind == ContentKind::Table).then(|| "<table></table>".to_string()),
            },
            image,
        )
    }

    async fn open(dir: &std::path::Path, keys: MetadataKeys) -> SqliteStore {
        let pool = db::connect(&dir.join("index.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool, keys)
    }

    #[tokio::test]
    async fn nodes_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), MetadataKeys::default()).await;

        let table = node("doc1", Some(2), ContentKind::Table, None);
        let text = node("doc1", Some(1), ContentKind::Text, None);
        let image = node(
            "doc1",
            None,
            ContentKind::Image,
            Some(ImagePayload::Url("https://cdn.example/a.png".to_string())),
        );
        let other = node(
            "doc2",
            Some(1),
            ContentKind::Image,
            Some(ImagePayload::Base64("AAAA".to_string())),
        );
        store
            .add_nodes(&[table.clone(), image.clone(), text.clone(), other.clone()])
            .await
            .unwrap();

        assert_eq!(store.get_node(&table.id).await.unwrap(), Some(table.clone()));
        assert_eq!(store.get_node(&other.id).await.unwrap(), Some(other));
        assert!(store.get_node("missing").await.unwrap().is_none());

        let doc1 = store.document_nodes("doc1").await.unwrap();
        assert_eq!(doc1, vec![text, table, image]);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.count(ContentKind::Image), 2);
        assert_eq!(stats.count(ContentKind::Table), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn custom_metadata_keys_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let keys = MetadataKeys {
            document_id: "source".to_string(),
            ..MetadataKeys::default()
        };
        let store = open(dir.path(), keys).await;
        let table = node("doc1", Some(3), ContentKind::Table, None);
        store.add_nodes(&[table.clone()]).await.unwrap();

        let json: String = sqlx::query_scalar("SELECT metadata_json FROM nodes WHERE id = ?")
            .bind(&table.id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["source"], "doc1");
        assert_eq!(value["page_label"], "3");
        assert_eq!(value["table_html"], "<table></table>");
        store.close().await;
    }
}
