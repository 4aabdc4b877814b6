//! Retrieval-side node postprocessing.
//!
//! Table nodes are embedded with their flattened cell text, but a
//! presentation layer renders the raw table markup instead. Before retrieved
//! nodes are turned into prompt context, [`TableHtmlReplacement`] blanks the
//! text of every node that carries table markup so the same table is not fed
//! twice.

use crate::models::ContentNode;

/// A retrieved node with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNode {
    pub node: ContentNode,
    pub score: f64,
}

/// Transforms a retrieved node list before response synthesis.
pub trait NodePostprocessor: Send + Sync {
    fn name(&self) -> &str;

    fn postprocess(&self, nodes: Vec<ScoredNode>) -> Vec<ScoredNode>;
}

/// Blanks the text of table nodes, keeping their markup metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableHtmlReplacement;

impl NodePostprocessor for TableHtmlReplacement {
    fn name(&self) -> &str {
        "TableHtmlReplacementPostProcessor"
    }

    fn postprocess(&self, mut nodes: Vec<ScoredNode>) -> Vec<ScoredNode> {
        let mut blanked = 0usize;
        for scored in nodes.iter_mut() {
            if scored.node.has_table_markup() {
                scored.node.set_text("");
                blanked += 1;
            }
        }
        tracing::debug!(blanked, total = nodes.len(), "table text replaced by markup");
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, NodeMetadata};

    fn node(kind: ContentKind, html: Option<&str>) -> ScoredNode {
        ScoredNode {
            node: ContentNode::new(
                "Specs\nDevice specs\nWeight x".to_string(),
                NodeMetadata {
                    document_id: "doc1".to_string(),
                    page: Some(1),
                    kind,
                    table_html: html.map(|s| s.to_string()),
                },
                None,
            ),
            score: 0.5,
        }
    }

    #[test]
    fn blanks_table_text_and_keeps_markup() {
        let out = TableHtmlReplacement.postprocess(vec![
            node(ContentKind::Table, Some("<table></table>")),
            node(ContentKind::Text, None),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].node.text, "");
        assert_eq!(
            out[0].node.metadata.table_html.as_deref(),
            Some("<table></table>")
        );
        assert_eq!(out[0].score, 0.5);
        assert_eq!(out[1].node.text, "Specs\nDevice specs\nWeight x");
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(TableHtmlReplacement.postprocess(Vec::new()).is_empty());
    }
}
