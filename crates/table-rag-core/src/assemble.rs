//! Node assembly.
//!
//! Merges the table fragments, image entries, and splitter chunks of one
//! archive into a single ordered list of [`ContentNode`]s.
//!
//! Ordering is `(page, kind, input order)`: page ascending with page-less
//! images last, then tables before text before images, then the order the
//! artifacts were produced in. The sort is stable, so two runs over the same
//! archive give the same sequence (ids aside).

use crate::models::{
    ContentKind, ContentNode, ImageMeta, NodeMetadata, PageChunk, TableFragment,
};

/// Build the node list for one document.
pub fn assemble(
    document_id: &str,
    tables: Vec<TableFragment>,
    images: Vec<ImageMeta>,
    chunks: Vec<PageChunk>,
) -> Vec<ContentNode> {
    let mut nodes = Vec::with_capacity(tables.len() + images.len() + chunks.len());

    for table in tables {
        nodes.push(table_node(document_id, table));
    }
    for chunk in chunks {
        nodes.push(text_node(document_id, chunk));
    }
    for image in images {
        nodes.push(image_node(document_id, image));
    }

    nodes.sort_by_key(|n| (n.page().unwrap_or(u32::MAX), n.kind()));
    nodes
}

pub fn table_node(document_id: &str, table: TableFragment) -> ContentNode {
    let text = format!("{}\n{}\n{}", table.title, table.description, table.core_text);
    ContentNode::new(
        text,
        NodeMetadata {
            document_id: document_id.to_string(),
            page: Some(table.page),
            kind: ContentKind::Table,
            table_html: Some(table.table_html),
        },
        None,
    )
}

pub fn text_node(document_id: &str, chunk: PageChunk) -> ContentNode {
    ContentNode::new(
        chunk.text,
        NodeMetadata {
            document_id: document_id.to_string(),
            page: Some(chunk.page),
            kind: ContentKind::Text,
            table_html: None,
        },
        None,
    )
}

pub fn image_node(document_id: &str, image: ImageMeta) -> ContentNode {
    let text = format!("{}\n{}", image.title, image.description);
    ContentNode::new(
        text,
        NodeMetadata {
            document_id: document_id.to_string(),
            page: image.page,
            kind: ContentKind::Image,
            table_html: None,
        },
        Some(image.payload),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImagePayload;
    use std::collections::HashSet;

    fn table(page: u32, title: &str) -> TableFragment {
        TableFragment {
            page,
            title: title.to_string(),
            description: "desc".to_string(),
            core_text: "a b".to_string(),
            table_html: "<table><tr><td>a</td><td>b</td></tr></table>".to_string(),
        }
    }

    fn image(page: Option<u32>, title: &str) -> ImageMeta {
        ImageMeta {
            title: title.to_string(),
            description: String::new(),
            page,
            path: "./img.png".to_string(),
            payload: ImagePayload::Base64("AAAA".to_string()),
        }
    }

    fn chunk(page: u32, text: &str) -> PageChunk {
        PageChunk {
            page,
            text: text.to_string(),
        }
    }

    #[test]
    fn table_node_text_and_metadata() {
        let nodes = assemble("doc1", vec![table(1, "Specs")], vec![], vec![]);
        assert_eq!(nodes.len(), 1);
        let n = &nodes[0];
        assert_eq!(n.text, "Specs\ndesc\na b");
        assert_eq!(n.kind(), ContentKind::Table);
        assert_eq!(n.page(), Some(1));
        assert_eq!(n.document_id(), "doc1");
        assert!(n.has_table_markup());
        assert!(n.image.is_none());
    }

    #[test]
    fn image_node_text_keeps_trailing_newline() {
        let nodes = assemble("doc1", vec![], vec![image(Some(2), "Chart")], vec![]);
        assert_eq!(nodes[0].text, "Chart\n");
        assert_eq!(nodes[0].kind(), ContentKind::Image);
        assert_eq!(
            nodes[0].image,
            Some(ImagePayload::Base64("AAAA".to_string()))
        );
    }

    #[test]
    fn ordering_is_page_then_kind_then_input_order() {
        let nodes = assemble(
            "doc1",
            vec![table(2, "T2"), table(1, "T1a"), table(1, "T1b")],
            vec![image(None, "loose"), image(Some(1), "I1")],
            vec![chunk(2, "c2"), chunk(1, "c1a"), chunk(1, "c1b")],
        );
        let seq: Vec<(Option<u32>, ContentKind, &str)> = nodes
            .iter()
            .map(|n| (n.page(), n.kind(), n.text.lines().next().unwrap_or("")))
            .collect();
        assert_eq!(
            seq,
            vec![
                (Some(1), ContentKind::Table, "T1a"),
                (Some(1), ContentKind::Table, "T1b"),
                (Some(1), ContentKind::Text, "c1a"),
                (Some(1), ContentKind::Text, "c1b"),
                (Some(1), ContentKind::Image, "I1"),
                (Some(2), ContentKind::Table, "T2"),
                (Some(2), ContentKind::Text, "c2"),
                (None, ContentKind::Image, "loose"),
            ]
        );
    }

    #[test]
    fn ids_are_unique() {
        let nodes = assemble(
            "doc1",
            vec![table(1, "T")],
            vec![image(Some(1), "I")],
            vec![chunk(1, "x"), chunk(1, "x")],
        );
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), nodes.len());
    }
}
