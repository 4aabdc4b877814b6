//! Node inspection for one document.
//!
//! `trag show <document_id>` prints every node of a document in index order.
//! With `--blank-tables` the nodes first pass through the table markup
//! postprocessor, which is what retrieval feeds to a model. `--query`
//! renders the full table QA prompt for those nodes instead.

use anyhow::{bail, Result};
use std::path::Path;

use table_rag_core::postprocess::{NodePostprocessor, ScoredNode, TableHtmlReplacement};
use table_rag_core::prompt::{format_context, render_table_qa_prompt};
use table_rag_core::store::VectorStore;

use crate::persist::load_index;

pub async fn run_show(
    index_dir: &Path,
    document_id: &str,
    blank_tables: bool,
    query: Option<&str>,
) -> Result<()> {
    let index = load_index(index_dir).await?;
    let nodes = index.store.document_nodes(document_id).await;
    index.store.close().await;
    let nodes = nodes?;

    if nodes.is_empty() {
        bail!("document not found: {}", document_id);
    }

    let mut scored: Vec<ScoredNode> = nodes
        .into_iter()
        .map(|node| ScoredNode { node, score: 1.0 })
        .collect();
    if blank_tables || query.is_some() {
        scored = TableHtmlReplacement.postprocess(scored);
    }

    if let Some(query) = query {
        let context = format_context(&scored, &index.manifest.metadata_keys);
        print!("{}", render_table_qa_prompt(query, &context));
        return Ok(());
    }

    println!("--- Document {} ({} nodes) ---", document_id, scored.len());
    for ScoredNode { node, .. } in &scored {
        let page = node
            .page()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("[{} page {}] {}", node.kind(), page, node.id);
        if let Some(ref html) = node.metadata.table_html {
            println!("markup: {}", html);
        }
        if node.image.is_some() {
            println!("image:  attached");
        }
        println!("{}", node.text);
        println!();
    }

    Ok(())
}
