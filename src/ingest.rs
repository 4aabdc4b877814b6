//! Index build orchestration.
//!
//! Drives the pipeline for every archive under a root directory:
//!
//! ```text
//! archive ─▶ ArchiveWalker ─┬─ tables ───────────────────────────────┐
//!                           ├─ images ───────────────────────────────┤
//!                           └─ page texts ─▶ Synthesizer ─▶ Splitter ┴─▶ assemble
//! ```
//!
//! Nodes from every archive are collected and handed to the backend once,
//! either written as a snapshot to a persist directory or appended into a
//! caller-supplied [`StorageContext`].
//!
//! A failing archive is logged and counted, and the build moves on.
//! Configuration problems fail the build before any file is touched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use table_rag_core::assemble::assemble;
use table_rag_core::chunk::{SentenceSplitter, TextSplitter};
use table_rag_core::models::{ContentKind, ContentNode, MetadataKeys};
use table_rag_core::store::{StorageContext, VectorStore};
use table_rag_core::table::CellJoin;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::archive::{ArchiveWalker, ImageUploader};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::persist::persist_index;
use crate::synth::PageDocumentSynthesizer;

/// Inputs of one index build.
#[derive(Clone)]
pub struct BuildOptions {
    /// Directory scanned recursively for archives.
    pub root: Option<PathBuf>,
    /// Archive extension without the dot, matched case-insensitively.
    pub archive_extension: String,
    /// Persist the index as a snapshot in this directory.
    pub index_path: Option<PathBuf>,
    /// Append into existing storage instead of persisting.
    pub storage_context: Option<StorageContext>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub images_enabled: bool,
    pub cell_join: CellJoin,
    pub font_path: Option<PathBuf>,
    pub metadata_keys: MetadataKeys,
    pub image_uploader: Option<Arc<dyn ImageUploader>>,
    /// Replaces the built-in [`SentenceSplitter`].
    pub splitter: Option<Arc<dyn TextSplitter>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            root: None,
            archive_extension: "zip".to_string(),
            index_path: None,
            storage_context: None,
            chunk_size: 512,
            chunk_overlap: 200,
            images_enabled: true,
            cell_join: CellJoin::default(),
            font_path: None,
            metadata_keys: MetadataKeys::default(),
            image_uploader: None,
            splitter: None,
        }
    }
}

impl BuildOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.build.root.clone(),
            archive_extension: config.build.archive_extension.clone(),
            index_path: config.index.persist_dir.clone(),
            storage_context: None,
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            images_enabled: config.images.enabled,
            cell_join: config.tables.cell_join,
            font_path: config.render.font_path.clone(),
            metadata_keys: config.metadata.clone(),
            image_uploader: None,
            splitter: None,
        }
    }
}

/// Counters for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub archives_found: usize,
    pub archives_indexed: usize,
    pub archives_skipped: usize,
    /// HTML pages whose table could not be extracted, across all archives.
    pub pages_skipped: usize,
    pub nodes: usize,
    pub tables: usize,
    pub text_chunks: usize,
    pub images: usize,
}

impl BuildReport {
    fn record(&mut self, nodes: &[ContentNode]) {
        self.archives_indexed += 1;
        self.nodes += nodes.len();
        for node in nodes {
            match node.kind() {
                ContentKind::Table => self.tables += 1,
                ContentKind::Text => self.text_chunks += 1,
                ContentKind::Image => self.images += 1,
            }
        }
    }
}

enum IndexTarget {
    Persist(PathBuf),
    Append(Arc<dyn VectorStore>),
}

/// Validated, ready-to-run pipeline pieces.
struct Pipeline {
    root: PathBuf,
    extension: String,
    target: IndexTarget,
    walker: ArchiveWalker,
    synthesizer: PageDocumentSynthesizer,
    splitter: Arc<dyn TextSplitter>,
}

fn prepare(options: BuildOptions) -> Result<Pipeline> {
    let target = match (options.index_path, options.storage_context) {
        (Some(_), Some(_)) => {
            return Err(Error::config(
                "index_path and storage_context are mutually exclusive",
            ))
        }
        (None, None) => {
            return Err(Error::config(
                "either index_path or storage_context must be configured",
            ))
        }
        (Some(dir), None) => IndexTarget::Persist(dir),
        (None, Some(context)) => match context.vector_store {
            Some(store) => IndexTarget::Append(store),
            None => {
                return Err(Error::config(
                    "storage_context must carry a vector store",
                ))
            }
        },
    };

    let root = options
        .root
        .ok_or_else(|| Error::config("root path must be configured"))?;

    let extension = options.archive_extension.trim().trim_start_matches('.').to_string();
    if extension.is_empty() {
        return Err(Error::config("archive extension must not be empty"));
    }

    if options.chunk_size == 0 || options.chunk_overlap >= options.chunk_size {
        return Err(Error::config(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            options.chunk_overlap, options.chunk_size
        )));
    }
    let splitter: Arc<dyn TextSplitter> = match options.splitter {
        Some(splitter) => splitter,
        None => Arc::new(
            SentenceSplitter::new(options.chunk_size, options.chunk_overlap)
                .map_err(|e| Error::config(e.to_string()))?,
        ),
    };

    if let Some(ref font) = options.font_path {
        if !font.is_file() {
            return Err(Error::config(format!(
                "font file {} does not exist",
                font.display()
            )));
        }
    }

    let walker = ArchiveWalker::new(options.cell_join)
        .with_images(options.images_enabled)
        .with_uploader(options.image_uploader);

    Ok(Pipeline {
        root,
        extension,
        target,
        walker,
        synthesizer: PageDocumentSynthesizer::from_font_path(options.font_path.as_deref())
            .map_err(|e| Error::config(e.to_string()))?,
        splitter,
    })
}

/// Build an index from every archive under `options.root`.
pub async fn build_index(options: BuildOptions) -> Result<BuildReport> {
    let keys = options.metadata_keys.clone();
    let pipeline = prepare(options)?;

    let archives = discover_archives(&pipeline.root, &pipeline.extension)?;
    info!(root = %pipeline.root.display(), archives = archives.len(), "building index");

    let mut report = BuildReport {
        archives_found: archives.len(),
        ..BuildReport::default()
    };
    let mut nodes: Vec<ContentNode> = Vec::new();

    for path in &archives {
        match process_archive(&pipeline, path, &mut report) {
            Ok(archive_nodes) => {
                report.record(&archive_nodes);
                nodes.extend(archive_nodes);
            }
            Err(e) => {
                warn!(archive = %path.display(), error = %e, "skipping archive");
                report.archives_skipped += 1;
            }
        }
    }

    match &pipeline.target {
        IndexTarget::Persist(dir) => {
            persist_index(dir, &nodes, &keys).await?;
        }
        IndexTarget::Append(store) => {
            store
                .add_nodes(&nodes)
                .await
                .map_err(|e| Error::Store(format!("{:#}", e)))?;
        }
    }

    info!(
        archives_indexed = report.archives_indexed,
        archives_skipped = report.archives_skipped,
        nodes = report.nodes,
        "index built"
    );
    Ok(report)
}

fn process_archive(
    pipeline: &Pipeline,
    path: &Path,
    report: &mut BuildReport,
) -> Result<Vec<ContentNode>> {
    let contents = pipeline.walker.walk(path)?;
    report.pages_skipped += contents.skipped_pages;

    let chunks = match pipeline
        .synthesizer
        .synthesize(&contents.document_id, &contents.page_texts)?
    {
        Some(document) => pipeline.splitter.split(&document),
        None => Vec::new(),
    };

    Ok(assemble(
        &contents.document_id,
        contents.tables,
        contents.images,
        chunks,
    ))
}

/// Files under `root` with the given extension, sorted by path.
pub fn discover_archives(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::config(format!(
            "root {} is not a directory",
            root.display()
        )));
    }

    let mut archives = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            archives.push(entry.into_path());
        }
    }
    archives.sort();
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_rag_core::store::memory::InMemoryStore;

    fn context() -> StorageContext {
        StorageContext::new(Arc::new(InMemoryStore::new()))
    }

    fn options(root: &Path) -> BuildOptions {
        BuildOptions {
            root: Some(root.to_path_buf()),
            storage_context: Some(context()),
            ..BuildOptions::default()
        }
    }

    fn config_error(result: Result<BuildReport>) -> String {
        match result {
            Err(Error::Configuration(msg)) => msg,
            Err(other) => panic!("expected configuration error, got {other:?}"),
            Ok(_) => panic!("expected configuration error, got success"),
        }
    }

    #[tokio::test]
    async fn both_targets_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            index_path: Some(dir.path().join("index")),
            ..options(dir.path())
        };
        let msg = config_error(build_index(opts).await);
        assert!(msg.contains("mutually exclusive"));
        assert!(!dir.path().join("index").exists());
    }

    #[tokio::test]
    async fn no_target_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            storage_context: None,
            ..options(dir.path())
        };
        config_error(build_index(opts).await);
    }

    #[tokio::test]
    async fn context_without_vector_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            storage_context: Some(StorageContext::default()),
            ..options(dir.path())
        };
        let msg = config_error(build_index(opts).await);
        assert!(msg.contains("vector store"));
    }

    #[tokio::test]
    async fn missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            root: None,
            ..options(dir.path())
        };
        config_error(build_index(opts).await);
    }

    #[tokio::test]
    async fn overlap_not_smaller_than_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            chunk_size: 100,
            chunk_overlap: 100,
            ..options(dir.path())
        };
        config_error(build_index(opts).await);
    }

    #[tokio::test]
    async fn missing_font_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            font_path: Some(dir.path().join("missing.ttf")),
            ..options(dir.path())
        };
        let msg = config_error(build_index(opts).await);
        assert!(msg.contains("missing.ttf"));
    }

    #[tokio::test]
    async fn unparseable_font_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("broken.ttf");
        std::fs::write(&font, b"not a font").unwrap();
        let opts = BuildOptions {
            font_path: Some(font),
            ..options(dir.path())
        };
        let msg = config_error(build_index(opts).await);
        assert!(msg.contains("broken.ttf"));
    }

    #[tokio::test]
    async fn empty_root_builds_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let report = build_index(options(dir.path())).await.unwrap();
        assert_eq!(report, BuildReport::default());
    }

    #[test]
    fn discovery_is_recursive_sorted_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("b").join("c");
        std::fs::create_dir_all(&nested).unwrap();
        for p in [
            dir.path().join("z.zip"),
            dir.path().join("a.ZIP"),
            nested.join("m.zip"),
            dir.path().join("notes.txt"),
            dir.path().join("zip"),
        ] {
            std::fs::write(p, b"").unwrap();
        }

        let found = discover_archives(dir.path(), "zip").unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["a.ZIP", "b/c/m.zip", "z.zip"]);
    }
}
