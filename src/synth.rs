//! Page document synthesis.
//!
//! Turns the page-number → text map of one archive into a
//! [`PaginatedDocument`] by rendering a synthetic PDF and reading it back
//! page by page. The round trip gives the splitter a document whose physical
//! page index is the logical page number, blank gaps included.
//!
//! The rendered bytes live in a uniquely named temp file only for the read
//! back. The file is removed on every exit path.

use std::collections::BTreeMap;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use table_rag_core::models::{PageText, PaginatedDocument};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::render::{render_pages, PdfFont};

#[derive(Debug, Clone, Default)]
pub struct PageDocumentSynthesizer {
    font: PdfFont,
    temp_dir: Option<PathBuf>,
}

impl PageDocumentSynthesizer {
    pub fn new(font: PdfFont) -> Self {
        Self {
            font,
            temp_dir: None,
        }
    }

    /// Helvetica when `font_path` is `None`, otherwise the embedded TrueType font.
    pub fn from_font_path(font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => PdfFont::load(path)?,
            None => PdfFont::Helvetica,
        };
        Ok(Self::new(font))
    }

    /// Place temp files in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Build the paginated document for `pages`, or `None` when there is no text.
    pub fn synthesize(
        &self,
        document_id: &str,
        pages: &BTreeMap<u32, String>,
    ) -> Result<Option<PaginatedDocument>> {
        self.synthesize_with(document_id, pages, read_pages)
    }

    fn synthesize_with<F>(
        &self,
        document_id: &str,
        pages: &BTreeMap<u32, String>,
        read_back: F,
    ) -> Result<Option<PaginatedDocument>>
    where
        F: FnOnce(&Path) -> Result<Vec<String>>,
    {
        if pages.is_empty() {
            return Ok(None);
        }

        let bytes = render_pages(pages, &self.font)?;
        let expected = pages.keys().next_back().copied().unwrap_or(0) as usize;

        let mut builder = tempfile::Builder::new();
        builder.prefix("trag-").suffix(".pdf");
        let mut temp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        temp.write_all(&bytes)?;
        temp.flush()?;

        let extracted = read_back(temp.path());

        let temp_path = temp.path().to_path_buf();
        if let Err(e) = temp.close() {
            warn!(path = %temp_path.display(), error = %e, "failed to remove synthetic document");
        }

        let texts = extracted.map_err(|e| {
            Error::Render(format!(
                "failed to read back synthetic document for {}: {}",
                document_id, e
            ))
        })?;
        if texts.len() != expected {
            return Err(Error::Render(format!(
                "synthetic document for {} has {} pages, expected {}",
                document_id,
                texts.len(),
                expected
            )));
        }

        let pages: Vec<PageText> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page: i as u32 + 1,
                text: text.trim().to_string(),
            })
            .collect();

        debug!(document_id, pages = pages.len(), "synthetic document built");
        Ok(Some(PaginatedDocument {
            document_id: document_id.to_string(),
            pages,
        }))
    }
}

/// Per-page text of the PDF at `path`. A panic inside the extractor is
/// reported as an error so it stays confined to one archive.
fn read_pages(path: &Path) -> Result<Vec<String>> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path))) {
        Ok(Ok(texts)) => Ok(texts),
        Ok(Err(e)) => Err(Error::Render(e.to_string())),
        Err(_) => Err(Error::Render("text extraction panicked".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(entries: &[(u32, &str)]) -> BTreeMap<u32, String> {
        entries
            .iter()
            .map(|(n, t)| (*n, t.to_string()))
            .collect()
    }

    #[test]
    fn empty_map_builds_no_document() {
        let synth = PageDocumentSynthesizer::default();
        assert!(synth.synthesize("doc1", &BTreeMap::new()).unwrap().is_none());
    }

    #[test]
    fn gaps_become_blank_pages() {
        let dir = tempfile::tempdir().unwrap();
        let synth = PageDocumentSynthesizer::default().with_temp_dir(dir.path());
        let doc = synth
            .synthesize("doc1", &pages(&[(2, "Hello world")]))
            .unwrap()
            .unwrap();

        assert_eq!(doc.document_id, "doc1");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page(1).unwrap().text, "");
        assert_eq!(doc.page(2).unwrap().text, "Hello world");
    }

    #[test]
    fn page_count_is_max_page_number() {
        let dir = tempfile::tempdir().unwrap();
        let synth = PageDocumentSynthesizer::default().with_temp_dir(dir.path());
        let doc = synth
            .synthesize("doc1", &pages(&[(1, "one"), (4, "four"), (7, "seven")]))
            .unwrap()
            .unwrap();
        assert_eq!(doc.page_count(), 7);
        let numbers: Vec<u32> = doc.pages.iter().map(|p| p.page).collect();
        assert_eq!(numbers, (1..=7).collect::<Vec<_>>());
        assert_eq!(doc.page(4).unwrap().text, "four");
        assert_eq!(doc.page(5).unwrap().text, "");
    }

    #[test]
    fn temp_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let synth = PageDocumentSynthesizer::default().with_temp_dir(dir.path());
        synth
            .synthesize("doc1", &pages(&[(3, "three")]))
            .unwrap()
            .unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn temp_file_is_removed_when_read_back_fails() {
        let dir = tempfile::tempdir().unwrap();
        let synth = PageDocumentSynthesizer::default().with_temp_dir(dir.path());
        let mut seen = None;
        let err = synth
            .synthesize_with("doc1", &pages(&[(2, "two")]), |path| {
                assert!(path.exists());
                seen = Some(path.to_path_buf());
                Err(Error::Render("unreadable".to_string()))
            })
            .unwrap_err();

        assert!(matches!(err, Error::Render(ref m) if m.contains("unreadable")));
        assert!(!seen.unwrap().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn page_count_mismatch_is_an_error_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let synth = PageDocumentSynthesizer::default().with_temp_dir(dir.path());
        let err = synth
            .synthesize_with("doc1", &pages(&[(3, "three")]), |_| Ok(vec![String::new()]))
            .unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn oversized_page_number_fails_before_any_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let synth = PageDocumentSynthesizer::default().with_temp_dir(dir.path());
        let err = synth
            .synthesize("doc1", &pages(&[(3_000_000_000, "far away")]))
            .unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn embedded_font_keeps_non_latin_text() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("Test.ttf");
        std::fs::write(&font_path, crate::render::test_font_program()).unwrap();
        let synth = PageDocumentSynthesizer::from_font_path(Some(&font_path))
            .unwrap()
            .with_temp_dir(dir.path());
        let text = "价格表 Preis €5 — Ωmega";
        let doc = synth
            .synthesize("doc1", &pages(&[(1, text)]))
            .unwrap()
            .unwrap();
        assert_eq!(doc.page(1).unwrap().text, text);
    }

    #[test]
    fn temp_dir_failure_is_an_error() {
        let synth =
            PageDocumentSynthesizer::default().with_temp_dir("/nonexistent/trag-temp-dir");
        assert!(synth.synthesize("doc1", &pages(&[(1, "x")])).is_err());
    }
}
