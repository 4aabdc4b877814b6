//! Question-answering prompt for table-heavy context.
//!
//! The template pushes the model to read every row and column of the
//! retrieved tables instead of summarizing them. `{context_str}` and
//! `{query_str}` are substituted by [`render_table_qa_prompt`].
//! [`format_context`] builds the context block from retrieved nodes, metadata
//! first, so blanked table nodes still contribute their markup.

use crate::models::MetadataKeys;
use crate::postprocess::ScoredNode;

pub const TABLE_QA_TEMPLATE: &str = "Context information is below.\n\
You are helpful assistant. Read the tables row by row and col by col. \
DO NOT DO ANY SUMMARIZATION, instead, LIST ALL THE DETAILS CLEARLY. \
Then, Answer the {query_str} without using any guessing and implicit information. \
DO NOT ADD ANYTHING THAT IS NOT DIRECTLY RELEVANT TO ANSWER THE {query_str} AND DO NOT MISS ANYTHING ALSO. \
DO NOT RETURN THE FIRST ENTRY OF THE FIRST TABLE, If it does not answer to the {query_str} \n\
---------------------\n\
{context_str}\n\
---------------------\n\
Query: {query_str}\n\
only return the answers to the {query_str} \n\
IGNORE THE FIRST ENTRY OF THE FIRST TABLE IF IT IS NOT RELEVENT \n\
MAKE SURE THE LAST ENTRY OF THE LAST TABLE IS INCLUDED IF IT IS RELEVANT \n";

/// Fill [`TABLE_QA_TEMPLATE`] with a query and the joined context text.
pub fn render_table_qa_prompt(query: &str, context: &str) -> String {
    TABLE_QA_TEMPLATE
        .replace("{context_str}", context)
        .replace("{query_str}", query)
}

/// Join retrieved nodes into a context block.
///
/// Each node contributes its metadata as `key: value` lines followed by its
/// text, and nodes are separated by a blank line.
pub fn format_context(nodes: &[ScoredNode], keys: &MetadataKeys) -> String {
    nodes
        .iter()
        .map(|scored| {
            let metadata = scored.node.metadata.to_json(keys);
            let mut block = String::new();
            if let Some(map) = metadata.as_object() {
                for (key, value) in map {
                    let value = value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string());
                    block.push_str(&format!("{}: {}\n", key, value));
                }
            }
            if !scored.node.text.is_empty() {
                block.push('\n');
                block.push_str(&scored.node.text);
            }
            block.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, ContentNode, NodeMetadata};
    use crate::postprocess::{NodePostprocessor, TableHtmlReplacement};

    fn scored(kind: ContentKind, text: &str, html: Option<&str>) -> ScoredNode {
        ScoredNode {
            node: ContentNode::new(
                text.to_string(),
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
    fn context_lists_metadata_then_text() {
        let nodes = vec![scored(ContentKind::Text, "Hello world", None)];
        let context = format_context(&nodes, &MetadataKeys::default());
        let (metadata, text) = context.split_once("\n\n").unwrap();
        let mut lines: Vec<&str> = metadata.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["chunk_type: text", "file_name: doc1", "page_label: 1"]);
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn blanked_table_contributes_markup_only() {
        let nodes = TableHtmlReplacement.postprocess(vec![
            scored(
                ContentKind::Table,
                "Specs\nd\nWeight",
                Some("<table><tr><td>Weight</td></tr></table>"),
            ),
            scored(ContentKind::Text, "Body", None),
        ]);
        let context = format_context(&nodes, &MetadataKeys::default());
        let blocks: Vec<&str> = context.split("\n\n").collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].contains("table_html: <table><tr><td>Weight</td></tr></table>"));
        assert!(!blocks[0].contains("Specs"));
        assert_eq!(blocks[2], "Body");
    }

    #[test]
    fn substitutes_every_placeholder() {
        let prompt = render_table_qa_prompt("max weight?", "Weight 1.2kg");
        assert!(!prompt.contains("{query_str}"));
        assert!(!prompt.contains("{context_str}"));
        assert!(prompt.contains("Query: max weight?\n"));
        assert!(prompt.contains("---------------------\nWeight 1.2kg\n---------------------\n"));
    }
}
