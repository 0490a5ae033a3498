//! Text extraction seam.
//!
//! The index core never parses PDF content itself; it consumes per-page
//! text through the [`TextExtractor`] trait. Production deployments plug in
//! a real PDF text extractor; [`PlainTextExtractor`] reads files as UTF-8
//! with form-feed page breaks and backs the CLI and the test suite.

use crate::error::{Error, Result};
use memchr::memchr_iter;
use std::fs;
use std::path::Path;

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: u32,
    pub text: String,
}

/// Supplies per-page text for a document.
///
/// A failure applies to the whole document: the updater records it, skips
/// the document and continues the run.
pub trait TextExtractor {
    /// Extract every page of the document at `path`, in page order.
    ///
    /// All pages of one document are produced at once; the indexing loop
    /// never pauses mid-document, so there is nothing to stream.
    fn extract(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Extractor for plain-text files using form-feed (U+000C) page breaks.
///
/// A file without any form feed is a single page 0.
#[derive(Debug, Default, Clone)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<Page>> {
        let bytes =
            fs::read(path).map_err(|e| Error::extraction(path, format!("read failed: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| Error::extraction(path, "not valid UTF-8 text"))?;

        let raw = content.as_bytes();
        let mut pages = Vec::new();
        let mut page_start = 0usize;
        let mut index = 0u32;

        for brk in memchr_iter(b'\x0c', raw) {
            pages.push(Page {
                index,
                text: content[page_start..brk].to_string(),
            });
            index += 1;
            page_start = brk + 1;
        }
        pages.push(Page {
            index,
            text: content[page_start..].to_string(),
        });

        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f
    }

    #[test]
    fn test_single_page() {
        let f = write_temp(b"hello world");
        let pages = PlainTextExtractor.extract(f.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].index, 0);
        assert_eq!(pages[0].text, "hello world");
    }

    #[test]
    fn test_form_feed_pages() {
        let f = write_temp(b"page one\x0cpage two\x0cpage three");
        let pages = PlainTextExtractor.extract(f.path()).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].index, 1);
        assert_eq!(pages[1].text, "page two");
        assert_eq!(pages[2].text, "page three");
    }

    #[test]
    fn test_missing_file_is_extraction_error() {
        let err = PlainTextExtractor
            .extract(Path::new("/nonexistent/file.pdf"))
            .unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_extraction_error() {
        let f = write_temp(&[0xff, 0xfe, 0x00]);
        let err = PlainTextExtractor.extract(f.path()).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}
