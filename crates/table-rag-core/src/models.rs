//! Core data models used throughout table-rag.
//!
//! These types represent the page artifacts pulled out of a document archive
//! and the [`ContentNode`]s handed to the index backend.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What a [`ContentNode`] was built from.
///
/// The declaration order is the tie-break order used by the assembler when
/// two nodes share a page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Table,
    Text,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Table => "table",
            ContentKind::Text => "text",
            ContentKind::Image => "image",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(ContentKind::Table),
            "text" => Ok(ContentKind::Text),
            "image" => Ok(ContentKind::Image),
            other => bail!("unknown content kind: '{}'", other),
        }
    }
}

/// Binary image content attached to an image node.
///
/// `Url` when an upload capability stored the bytes elsewhere, `Base64` when
/// the bytes are kept inline in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum ImagePayload {
    Url(String),
    Base64(String),
}

/// Names under which node metadata is serialized for the index backend.
///
/// Different downstream consumers expect different key names for the same
/// fields, so the key set is configuration rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataKeys {
    pub document_id: String,
    pub page: String,
    pub kind: String,
    pub table_markup: String,
}

impl Default for MetadataKeys {
    fn default() -> Self {
        Self {
            document_id: "file_name".to_string(),
            page: "page_label".to_string(),
            kind: "chunk_type".to_string(),
            table_markup: "table_html".to_string(),
        }
    }
}

/// Typed metadata carried by every [`ContentNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    pub document_id: String,
    /// Required for text and table nodes, optional for images.
    pub page: Option<u32>,
    pub kind: ContentKind,
    /// Raw `<table>` markup, present only on table nodes.
    pub table_html: Option<String>,
}

impl NodeMetadata {
    /// Render as a JSON object using the configured key names.
    ///
    /// Page numbers are written as strings, matching how they appear in the
    /// source archives.
    pub fn to_json(&self, keys: &MetadataKeys) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            keys.document_id.clone(),
            serde_json::Value::String(self.document_id.clone()),
        );
        if let Some(page) = self.page {
            map.insert(keys.page.clone(), serde_json::Value::String(page.to_string()));
        }
        map.insert(
            keys.kind.clone(),
            serde_json::Value::String(self.kind.as_str().to_string()),
        );
        if let Some(ref html) = self.table_html {
            map.insert(keys.table_markup.clone(), serde_json::Value::String(html.clone()));
        }
        serde_json::Value::Object(map)
    }

    /// Inverse of [`to_json`](NodeMetadata::to_json).
    pub fn from_json(value: &serde_json::Value, keys: &MetadataKeys) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow!("node metadata must be a JSON object"))?;

        let document_id = obj
            .get(&keys.document_id)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("node metadata is missing '{}'", keys.document_id))?
            .to_string();

        let kind: ContentKind = obj
            .get(&keys.kind)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("node metadata is missing '{}'", keys.kind))?
            .parse()?;

        let page = match obj.get(&keys.page) {
            Some(serde_json::Value::String(s)) => Some(s.trim().parse::<u32>()?),
            Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        };

        let table_html = obj
            .get(&keys.table_markup)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(Self {
            document_id,
            page,
            kind,
            table_html,
        })
    }
}

/// The retrievable unit produced by the pipeline and consumed by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentNode {
    pub id: String,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
    pub metadata: NodeMetadata,
    pub image: Option<ImagePayload>,
}

impl ContentNode {
    /// Build a node with a fresh UUID.
    pub fn new(text: String, metadata: NodeMetadata, image: Option<ImagePayload>) -> Self {
        let hash = text_hash(&text);
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            hash,
            metadata,
            image,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.metadata.kind
    }

    pub fn page(&self) -> Option<u32> {
        self.metadata.page
    }

    pub fn document_id(&self) -> &str {
        &self.metadata.document_id
    }

    /// True when the node carries raw table markup.
    pub fn has_table_markup(&self) -> bool {
        self.metadata.table_html.is_some()
    }

    /// Replace the text payload, keeping metadata intact.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.hash = text_hash(&self.text);
    }
}

pub(crate) fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A table pulled out of one page's HTML member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFragment {
    pub page: u32,
    pub title: String,
    pub description: String,
    pub core_text: String,
    pub table_html: String,
}

/// One entry of an archive's image metadata, with its payload resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMeta {
    pub title: String,
    pub description: String,
    pub page: Option<u32>,
    pub path: String,
    pub payload: ImagePayload,
}

/// Text of one physical page of a [`PaginatedDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// A paginated document whose page index equals the logical page number.
///
/// Pages are contiguous from 1; pages with no source text have empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedDocument {
    pub document_id: String,
    pub pages: Vec<PageText>,
}

impl PaginatedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, number: u32) -> Option<&PageText> {
        self.pages.iter().find(|p| p.page == number)
    }
}

/// A splitter output unit, attributed to the page it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    pub page: u32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_meta() -> NodeMetadata {
        NodeMetadata {
            document_id: "doc1".to_string(),
            page: Some(3),
            kind: ContentKind::Table,
            table_html: Some("<table></table>".to_string()),
        }
    }

    #[test]
    fn metadata_uses_configured_keys() {
        let keys = MetadataKeys::default();
        let json = table_meta().to_json(&keys);
        assert_eq!(json["file_name"], "doc1");
        assert_eq!(json["page_label"], "3");
        assert_eq!(json["chunk_type"], "table");
        assert_eq!(json["table_html"], "<table></table>");

        let alt = MetadataKeys {
            document_id: "source".to_string(),
            page: "page".to_string(),
            kind: "type".to_string(),
            table_markup: "html".to_string(),
        };
        let json = table_meta().to_json(&alt);
        assert_eq!(json["source"], "doc1");
        assert_eq!(json["page"], "3");
        assert!(json.get("file_name").is_none());
    }

    #[test]
    fn metadata_json_roundtrip_with_custom_keys() {
        let keys = MetadataKeys {
            document_id: "doc".to_string(),
            ..MetadataKeys::default()
        };
        let meta = table_meta();
        let back = NodeMetadata::from_json(&meta.to_json(&keys), &keys).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn image_metadata_without_page_omits_key() {
        let meta = NodeMetadata {
            document_id: "doc1".to_string(),
            page: None,
            kind: ContentKind::Image,
            table_html: None,
        };
        let json = meta.to_json(&MetadataKeys::default());
        assert!(json.get("page_label").is_none());
        assert!(json.get("table_html").is_none());
    }

    #[test]
    fn numeric_page_out_of_range_is_dropped() {
        let keys = MetadataKeys::default();
        let json = serde_json::json!({
            "file_name": "doc1",
            "page_label": 4_294_967_297u64,
            "chunk_type": "text",
        });
        let meta = NodeMetadata::from_json(&json, &keys).unwrap();
        assert_eq!(meta.page, None);

        let json = serde_json::json!({
            "file_name": "doc1",
            "page_label": 7,
            "chunk_type": "text",
        });
        assert_eq!(NodeMetadata::from_json(&json, &keys).unwrap().page, Some(7));
    }

    #[test]
    fn set_text_refreshes_hash() {
        let mut node = ContentNode::new("abc".to_string(), table_meta(), None);
        let before = node.hash.clone();
        node.set_text("");
        assert_ne!(node.hash, before);
        assert!(node.has_table_markup());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("chart".parse::<ContentKind>().is_err());
        assert_eq!("image".parse::<ContentKind>().unwrap(), ContentKind::Image);
    }
}
