use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a document in the index.
///
/// Ids are allocated monotonically and never reused; re-indexing a changed
/// file deletes the old record and allocates a fresh id.
pub type DocId = u32;

/// Cheap change-detection proxy for a file: size plus mtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub size: u64,
    pub mtime_ns: u64,
}

/// Document entry in the document table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub doc_id: DocId,
    /// Path relative to the collection root.
    pub rel_path: PathBuf,
    pub fingerprint: Fingerprint,
    pub page_count: u32,
}

/// One occurrence of a term: document, page, and code-point span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingEntry {
    pub doc_id: DocId,
    pub page_index: u32,
    pub start_offset: u32,
    pub end_offset: u32,
}

/// All occurrences of one term, sorted by (doc_id, page_index, start_offset).
pub type PostingList = Vec<PostingEntry>;

/// Index manifest stored in meta.json.
///
/// The manifest is the commit point: a generation's artifacts become
/// visible the instant the manifest rename lands, and never before.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub root_path: PathBuf,
    pub generation: u64,
    pub next_doc_id: DocId,
    pub doc_count: u32,
    pub term_count: u64,
    pub posting_count: u64,
    /// fnv1a64 checksums of the generation's artifact files, verified at open.
    pub docs_checksum: u64,
    pub dict_checksum: u64,
    pub postings_checksum: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

pub const FORMAT_VERSION: u32 = 1;

impl IndexMeta {
    pub fn empty(root_path: PathBuf, now: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            root_path,
            generation: 0,
            next_doc_id: 1,
            doc_count: 0,
            term_count: 0,
            posting_count: 0,
            docs_checksum: 0,
            dict_checksum: 0,
            postings_checksum: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Configuration for indexing a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Files larger than this are skipped during the scan.
    pub max_file_size: u64,
    /// Glob patterns selecting which files the scan picks up.
    pub include: Vec<String>,
    /// Documents extracted between store commits.
    pub commit_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024,
            include: vec!["*.pdf".to_string()],
            commit_batch_size: 16,
        }
    }
}
