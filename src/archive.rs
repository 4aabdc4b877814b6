//! Archive traversal.
//!
//! One zip archive holds one source document. Members are routed by layout:
//!
//! ```text
//! image.json          optional image metadata (top level)
//! <page>/<name>.txt   narrative text for a page
//! <page>/<name>.html  one table for a page
//! ```
//!
//! The first path segment of a nested member is the page number. Anything
//! under `__MACOSX`, directory entries, and members with other extensions
//! are skipped.
//!
//! A malformed HTML page costs only that page's table: it is logged and
//! counted in [`ArchiveContents::skipped_pages`]. A member that cannot be
//! read at all fails the whole archive with [`Error::ArchiveRead`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use serde::Deserialize;
use table_rag_core::models::{ImageMeta, ImagePayload, TableFragment};
use table_rag_core::table::{extract_table, CellJoin};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Maximum decompressed bytes read from a single member (zip-bomb protection).
pub const MAX_MEMBER_BYTES: u64 = 64 * 1024 * 1024;

/// Name of the top-level image metadata member.
pub const IMAGE_METADATA: &str = "image.json";

/// Stores image bytes somewhere addressable and returns the URL.
///
/// Implemented for any `Fn(&[u8]) -> anyhow::Result<String>` closure.
pub trait ImageUploader: Send + Sync {
    fn upload(&self, bytes: &[u8]) -> anyhow::Result<String>;
}

impl<F> ImageUploader for F
where
    F: Fn(&[u8]) -> anyhow::Result<String> + Send + Sync,
{
    fn upload(&self, bytes: &[u8]) -> anyhow::Result<String> {
        self(bytes)
    }
}

/// Everything extracted from one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveContents {
    /// Archive file name without its extension.
    pub document_id: String,
    pub tables: Vec<TableFragment>,
    /// Page number → raw text. A later `.txt` member for the same page wins.
    pub page_texts: BTreeMap<u32, String>,
    pub images: Vec<ImageMeta>,
    /// HTML pages whose table could not be extracted.
    pub skipped_pages: usize,
}

/// One entry of `image.json`. All fields are optional.
#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    page: Option<PageRef>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageRef {
    Number(u64),
    Text(String),
}

impl PageRef {
    fn resolve(&self) -> Option<u32> {
        match self {
            PageRef::Number(n) => u32::try_from(*n).ok().filter(|n| *n > 0),
            PageRef::Text(s) => s.trim().parse::<u32>().ok().filter(|n| *n > 0),
        }
    }
}

/// Walks document archives and collects their page artifacts.
#[derive(Clone)]
pub struct ArchiveWalker {
    cell_join: CellJoin,
    images_enabled: bool,
    uploader: Option<Arc<dyn ImageUploader>>,
}

impl Default for ArchiveWalker {
    fn default() -> Self {
        Self::new(CellJoin::default())
    }
}

impl ArchiveWalker {
    pub fn new(cell_join: CellJoin) -> Self {
        Self {
            cell_join,
            images_enabled: true,
            uploader: None,
        }
    }

    pub fn with_images(mut self, enabled: bool) -> Self {
        self.images_enabled = enabled;
        self
    }

    /// Upload image bytes instead of inlining them as base64.
    pub fn with_uploader(mut self, uploader: Option<Arc<dyn ImageUploader>>) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn walk(&self, path: &Path) -> Result<ArchiveContents> {
        let document_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if document_id.is_empty() {
            return Err(Error::archive(path, "archive has no file name"));
        }

        let file = File::open(path).map_err(|e| Error::archive(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::archive(path, e))?;

        let mut contents = ArchiveContents {
            document_id,
            ..ArchiveContents::default()
        };
        let mut image_metadata: Option<Vec<u8>> = None;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| Error::archive(path, e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches('/').to_string();
            if name.contains("__MACOSX") {
                continue;
            }

            let Some((folder, rest)) = name.split_once('/') else {
                if name == IMAGE_METADATA && self.images_enabled {
                    image_metadata = Some(read_bounded(&mut entry, &name, path)?);
                } else {
                    debug!(archive = %path.display(), member = %name, "ignoring top-level member");
                }
                continue;
            };

            let page = match folder.parse::<u32>() {
                Ok(page) if page > 0 => page,
                _ => {
                    warn!(archive = %path.display(), member = %name, "skipping member outside a numeric page folder");
                    continue;
                }
            };

            let ext = Path::new(rest)
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();

            match ext.as_str() {
                "txt" => {
                    let text = read_text(&mut entry, &name, path)?;
                    contents.page_texts.insert(page, text);
                }
                "html" | "htm" => {
                    let bytes = read_bounded(&mut entry, &name, path)?;
                    let html = match String::from_utf8(bytes) {
                        Ok(html) => html,
                        Err(e) => {
                            warn!(archive = %path.display(), member = %name, page, error = %e, "skipping table page that is not valid UTF-8");
                            contents.skipped_pages += 1;
                            continue;
                        }
                    };
                    match extract_table(&html, self.cell_join) {
                        Ok(table) => contents.tables.push(TableFragment {
                            page,
                            title: table.title,
                            description: table.description,
                            core_text: table.core_text,
                            table_html: table.table_html,
                        }),
                        Err(e) => {
                            warn!(archive = %path.display(), member = %name, page, error = %e, "skipping table page");
                            contents.skipped_pages += 1;
                        }
                    }
                }
                _ => {
                    debug!(archive = %path.display(), member = %name, "ignoring member");
                }
            }
        }

        if let Some(bytes) = image_metadata {
            contents.images = self.collect_images(&mut archive, &bytes, path)?;
        }

        debug!(
            archive = %path.display(),
            tables = contents.tables.len(),
            text_pages = contents.page_texts.len(),
            images = contents.images.len(),
            skipped_pages = contents.skipped_pages,
            "archive walked"
        );
        Ok(contents)
    }

    fn collect_images(
        &self,
        archive: &mut zip::ZipArchive<File>,
        metadata: &[u8],
        path: &Path,
    ) -> Result<Vec<ImageMeta>> {
        let entries: Vec<ImageEntry> = serde_json::from_slice(metadata)
            .map_err(|e| Error::archive(path, format!("invalid {}: {}", IMAGE_METADATA, e)))?;

        let mut images = Vec::new();
        for entry in entries {
            let title = entry.title.unwrap_or_default();
            let description = entry.description.unwrap_or_default();
            if title.trim().is_empty() && description.trim().is_empty() {
                continue;
            }

            let Some(raw_path) = entry.path else {
                warn!(archive = %path.display(), title = %title, "image entry has no path");
                continue;
            };
            let member = member_path(&raw_path);

            let bytes = match archive.by_name(member) {
                Ok(mut file) => read_bounded(&mut file, member, path)?,
                Err(zip::result::ZipError::FileNotFound) => {
                    warn!(archive = %path.display(), member, "image payload not found");
                    continue;
                }
                Err(e) => return Err(Error::archive(path, e)),
            };

            let payload = match &self.uploader {
                Some(uploader) => match uploader.upload(&bytes) {
                    Ok(url) => ImagePayload::Url(url),
                    Err(e) => {
                        warn!(archive = %path.display(), member, error = %e, "image upload failed");
                        continue;
                    }
                },
                None => {
                    ImagePayload::Base64(base64::engine::general_purpose::STANDARD.encode(&bytes))
                }
            };

            let page = match &entry.page {
                Some(page_ref) => {
                    let page = page_ref.resolve();
                    if page.is_none() {
                        warn!(archive = %path.display(), member, "image entry has an invalid page");
                    }
                    page
                }
                None => None,
            };

            images.push(ImageMeta {
                title,
                description,
                page,
                path: raw_path,
                payload,
            });
        }
        Ok(images)
    }
}

/// Archive member name for an `image.json` path: leading `./` and `/` removed.
fn member_path(raw: &str) -> &str {
    let mut p = raw.trim();
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            return p;
        }
    }
}

fn read_bounded(reader: &mut impl Read, member: &str, archive: &Path) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader
        .take(MAX_MEMBER_BYTES + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::archive(archive, format!("{}: {}", member, e)))?;
    if out.len() as u64 > MAX_MEMBER_BYTES {
        return Err(Error::archive(
            archive,
            format!("{} exceeds size limit ({} bytes)", member, MAX_MEMBER_BYTES),
        ));
    }
    Ok(out)
}

fn read_text(reader: &mut impl Read, member: &str, archive: &Path) -> Result<String> {
    let bytes = read_bounded(reader, member, archive)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::archive(archive, format!("{} is not valid UTF-8: {}", member, e)))
}
