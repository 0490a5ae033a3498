//! Persistent inverted index store.
//!
//! On-disk layout: an index directory holding a `meta.json` manifest plus
//! one set of artifact files per generation:
//!
//! - `docs_NNNNNNNN.bin`      document table
//! - `terms_NNNNNNNN.dict`    sorted term dictionary
//! - `terms_NNNNNNNN.postings` concatenated delta-encoded posting blobs
//!
//! A commit writes a complete new generation and then atomically renames a
//! fresh manifest over `meta.json`. Readers see the old generation until
//! the rename lands; a failed or interrupted commit leaves only orphan
//! files the manifest never references.

use crate::error::{Error, Result};
use crate::index::types::{
    DocId, DocumentRecord, Fingerprint, IndexMeta, PostingEntry, PostingList, FORMAT_VERSION,
};
use crate::utils::checksum::checksum_file;
use crate::utils::encoding::{
    decode_varint, encode_varint, read_u32_le, read_u64_le, write_u32_le, write_u64_le,
};
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Term dictionary entry pointing into the postings file.
#[derive(Debug)]
struct TermEntry {
    term: String,
    offset: u64,
    length: u32,
    entry_count: u32,
}

/// A set of store mutations applied atomically by [`IndexStore::commit`].
///
/// A batch is independent of the store it came from: nothing it records is
/// visible to `lookup` until the commit succeeds, and dropping it discards
/// everything.
pub struct Batch {
    base_generation: u64,
    next_doc_id: DocId,
    deletes: BTreeSet<DocId>,
    new_docs: Vec<DocumentRecord>,
    postings: BTreeMap<String, Vec<PostingEntry>>,
}

impl Batch {
    /// Schedule removal of a document and all its postings.
    pub fn delete_document(&mut self, doc_id: DocId) {
        self.deletes.insert(doc_id);
    }

    /// Allocate a fresh document record. The returned id is valid for
    /// `insert_postings` within this batch and becomes durable at commit.
    pub fn add_document(
        &mut self,
        rel_path: &Path,
        fingerprint: Fingerprint,
        page_count: u32,
    ) -> DocId {
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.new_docs.push(DocumentRecord {
            doc_id,
            rel_path: rel_path.to_path_buf(),
            fingerprint,
            page_count,
        });
        doc_id
    }

    /// Record occurrences of one term.
    pub fn insert_postings(&mut self, term: &str, entries: &[PostingEntry]) {
        if entries.is_empty() {
            return;
        }
        self.postings
            .entry(term.to_string())
            .or_default()
            .extend_from_slice(entries);
    }

    /// Number of documents scheduled for insertion.
    pub fn pending_docs(&self) -> usize {
        self.new_docs.len()
    }
}

/// The persistent index for one collection.
#[derive(Debug)]
pub struct IndexStore {
    index_dir: PathBuf,
    meta: IndexMeta,
    documents: Vec<DocumentRecord>,
    doc_by_id: FxHashMap<DocId, usize>,
    doc_by_path: FxHashMap<PathBuf, usize>,
    dict: Vec<TermEntry>,
    postings: Option<Mmap>,
}

impl IndexStore {
    /// Open an existing store or create an empty one.
    ///
    /// An existing store is integrity-checked: unparseable manifest,
    /// unsupported version, missing artifacts or checksum mismatches all
    /// surface as [`Error::Corrupt`] and are never repaired silently. A
    /// store created for one collection root refuses to open for another.
    pub fn open(index_dir: &Path, root_path: &Path) -> Result<Self> {
        fs::create_dir_all(index_dir)?;
        let root_path = root_path.canonicalize()?;
        let meta_path = index_dir.join("meta.json");

        if !meta_path.exists() {
            let meta = IndexMeta::empty(root_path, unix_now());
            let store = Self {
                index_dir: index_dir.to_path_buf(),
                meta,
                documents: Vec::new(),
                doc_by_id: FxHashMap::default(),
                doc_by_path: FxHashMap::default(),
                dict: Vec::new(),
                postings: None,
            };
            store.write_manifest(&store.meta)?;
            info!(dir = %index_dir.display(), "created empty index store");
            return Ok(store);
        }

        let meta_file = File::open(&meta_path)?;
        let meta: IndexMeta = serde_json::from_reader(meta_file)
            .map_err(|e| Error::Corrupt(format!("unreadable manifest: {e}")))?;

        if meta.version != FORMAT_VERSION {
            return Err(Error::Corrupt(format!(
                "unsupported index version {}",
                meta.version
            )));
        }
        if meta.root_path != root_path {
            return Err(Error::Config(format!(
                "index at {} belongs to collection {}, not {}",
                index_dir.display(),
                meta.root_path.display(),
                root_path.display()
            )));
        }

        let (documents, dict, postings) = if meta.generation == 0 {
            (Vec::new(), Vec::new(), None)
        } else {
            Self::load_generation(index_dir, &meta)?
        };

        let doc_by_id = documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.doc_id, i))
            .collect();
        let doc_by_path = documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.rel_path.clone(), i))
            .collect();

        Ok(Self {
            index_dir: index_dir.to_path_buf(),
            meta,
            documents,
            doc_by_id,
            doc_by_path,
            dict,
            postings,
        })
    }

    /// Load and verify one generation's artifacts.
    fn load_generation(
        index_dir: &Path,
        meta: &IndexMeta,
    ) -> Result<(Vec<DocumentRecord>, Vec<TermEntry>, Option<Mmap>)> {
        let docs_path = index_dir.join(docs_name(meta.generation));
        let dict_path = index_dir.join(dict_name(meta.generation));
        let postings_path = index_dir.join(postings_name(meta.generation));

        for (path, expected) in [
            (&docs_path, meta.docs_checksum),
            (&dict_path, meta.dict_checksum),
            (&postings_path, meta.postings_checksum),
        ] {
            let actual = checksum_file(path).map_err(|e| {
                Error::Corrupt(format!("missing artifact {}: {e}", path.display()))
            })?;
            if actual != expected {
                return Err(Error::Corrupt(format!(
                    "checksum mismatch in {}",
                    path.display()
                )));
            }
        }

        // Doc table and dictionary load concurrently; both are needed
        // before the store can serve anything.
        let (documents, dict) = rayon::join(
            || read_documents(&docs_path),
            || read_dict(&dict_path),
        );
        let documents = documents?;
        let dict = dict?;

        let postings_file = File::open(&postings_path)?;
        let postings = if postings_file.metadata()?.len() == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&postings_file)? })
        };

        Ok((documents, dict, postings))
    }

    /// All postings for a term. Unknown terms yield an empty list.
    pub fn lookup(&self, term: &str) -> PostingList {
        let entry = match self
            .dict
            .binary_search_by(|e| e.term.as_str().cmp(term))
            .ok()
            .map(|i| &self.dict[i])
        {
            Some(e) => e,
            None => return Vec::new(),
        };

        let mmap = match &self.postings {
            Some(m) => m,
            None => return Vec::new(),
        };

        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        if end > mmap.len() {
            return Vec::new();
        }
        decode_postings(&mmap[start..end])
    }

    /// Document record by collection-relative path.
    pub fn document_record(&self, rel_path: &Path) -> Option<&DocumentRecord> {
        self.doc_by_path
            .get(rel_path)
            .map(|&i| &self.documents[i])
    }

    /// Document record by id.
    pub fn document(&self, doc_id: DocId) -> Option<&DocumentRecord> {
        self.doc_by_id.get(&doc_id).map(|&i| &self.documents[i])
    }

    /// All live documents in doc-id order.
    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn root_path(&self) -> &Path {
        &self.meta.root_path
    }

    /// Start a batch of mutations. The batch stays invisible to readers
    /// until [`commit`](Self::commit) succeeds.
    pub fn begin_batch(&self) -> Batch {
        Batch {
            base_generation: self.meta.generation,
            next_doc_id: self.meta.next_doc_id,
            deletes: BTreeSet::new(),
            new_docs: Vec::new(),
            postings: BTreeMap::new(),
        }
    }

    /// Durably apply a batch: either every deletion and insertion in it
    /// becomes visible, or the store keeps its pre-batch contents.
    pub fn commit(&mut self, batch: Batch) -> Result<()> {
        if batch.base_generation != self.meta.generation {
            return Err(Error::CommitFailure(format!(
                "stale batch: based on generation {}, store is at {}",
                batch.base_generation, self.meta.generation
            )));
        }

        let generation = self.meta.generation + 1;
        match self.write_generation(&batch, generation) {
            Ok(state) => {
                let old_generation = self.meta.generation;
                let CommittedState {
                    meta,
                    documents,
                    dict,
                    postings,
                } = state;
                info!(
                    generation,
                    docs = meta.doc_count,
                    terms = meta.term_count,
                    "committed batch"
                );
                self.meta = meta;
                self.documents = documents;
                self.doc_by_id = self
                    .documents
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (d.doc_id, i))
                    .collect();
                self.doc_by_path = self
                    .documents
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (d.rel_path.clone(), i))
                    .collect();
                self.dict = dict;
                self.postings = postings;
                self.remove_generation_files(old_generation);
                Ok(())
            }
            Err(e) => {
                // Leave the visible state untouched and drop the partial
                // generation; the caller retries the whole batch.
                self.remove_generation_files(generation);
                debug!(generation, error = %e, "commit rolled back");
                Err(match e {
                    Error::CommitFailure(_) => e,
                    other => Error::CommitFailure(other.to_string()),
                })
            }
        }
    }

    /// Write a full artifact generation and flip the manifest to it.
    fn write_generation(&self, batch: &Batch, generation: u64) -> Result<CommittedState> {
        // Merged document table: survivors in id order, then new records.
        let mut documents: Vec<DocumentRecord> = self
            .documents
            .iter()
            .filter(|d| !batch.deletes.contains(&d.doc_id))
            .cloned()
            .collect();
        documents.extend(batch.new_docs.iter().cloned());

        let docs_path = self.index_dir.join(docs_name(generation));
        let dict_path = self.index_dir.join(dict_name(generation));
        let postings_path = self.index_dir.join(postings_name(generation));

        write_documents(&docs_path, &documents)?;
        let (dict, posting_count) =
            self.write_postings(batch, &dict_path, &postings_path)?;

        let meta = IndexMeta {
            version: FORMAT_VERSION,
            root_path: self.meta.root_path.clone(),
            generation,
            next_doc_id: batch.next_doc_id,
            doc_count: documents.len() as u32,
            term_count: dict.len() as u64,
            posting_count,
            docs_checksum: checksum_file(&docs_path)?,
            dict_checksum: checksum_file(&dict_path)?,
            postings_checksum: checksum_file(&postings_path)?,
            created_at: self.meta.created_at,
            updated_at: unix_now(),
        };

        let postings_file = File::open(&postings_path)?;
        let postings = if postings_file.metadata()?.len() == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&postings_file)? })
        };

        // The rename is the commit point and the last fallible step:
        // before it readers (and any reopen after a crash) resolve the
        // previous generation.
        self.write_manifest(&meta)?;

        Ok(CommittedState {
            meta,
            documents,
            dict,
            postings,
        })
    }

    /// Merge the visible postings with a batch's and write the new
    /// dictionary + postings files. Returns the in-memory dictionary and
    /// the total posting count.
    fn write_postings(
        &self,
        batch: &Batch,
        dict_path: &Path,
        postings_path: &Path,
    ) -> Result<(Vec<TermEntry>, u64)> {
        let merged = self.merge_terms(batch);

        let mut dict_file = BufWriter::new(File::create(dict_path)?);
        let mut postings_file = BufWriter::new(File::create(postings_path)?);

        let mut dict: Vec<TermEntry> = Vec::with_capacity(merged.len());
        let mut offset: u64 = 0;
        let mut posting_count: u64 = 0;
        let mut blob = Vec::new();

        write_u64_le(&mut dict_file, merged.len() as u64)?;

        for (term, entries) in merged {
            blob.clear();
            encode_postings(&entries, &mut blob);
            postings_file.write_all(&blob)?;

            let term_bytes = term.as_bytes();
            dict_file.write_all(&(term_bytes.len() as u16).to_le_bytes())?;
            dict_file.write_all(term_bytes)?;
            write_u64_le(&mut dict_file, offset)?;
            write_u32_le(&mut dict_file, blob.len() as u32)?;
            write_u32_le(&mut dict_file, entries.len() as u32)?;

            posting_count += entries.len() as u64;
            dict.push(TermEntry {
                term,
                offset,
                length: blob.len() as u32,
                entry_count: entries.len() as u32,
            });
            offset += blob.len() as u64;
        }

        dict_file.flush()?;
        let dict_inner = dict_file
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        dict_inner.sync_all()?;

        postings_file.flush()?;
        let postings_inner = postings_file
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        postings_inner.sync_all()?;

        Ok((dict, posting_count))
    }

    /// Two-way merge over sorted term streams: the visible dictionary and
    /// the batch's BTreeMap. Terms whose postings all belong to deleted
    /// documents drop out.
    fn merge_terms(&self, batch: &Batch) -> Vec<(String, Vec<PostingEntry>)> {
        use std::cmp::Ordering;

        let mut merged = Vec::with_capacity(self.dict.len() + batch.postings.len());
        let mut existing = self.dict.iter().peekable();
        let mut fresh = batch.postings.iter().peekable();

        loop {
            let ord = match (existing.peek(), fresh.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(old), Some((term, _))) => old.term.as_str().cmp(term.as_str()),
            };

            let (term, mut entries) = match ord {
                Ordering::Less => {
                    let entry = existing.next().unwrap();
                    (entry.term.clone(), self.surviving_entries(entry, batch))
                }
                Ordering::Greater => {
                    let (term, list) = fresh.next().unwrap();
                    (term.clone(), list.clone())
                }
                Ordering::Equal => {
                    let entry = existing.next().unwrap();
                    let (_, list) = fresh.next().unwrap();
                    let mut entries = self.surviving_entries(entry, batch);
                    entries.extend_from_slice(list);
                    (entry.term.clone(), entries)
                }
            };

            if entries.is_empty() {
                continue;
            }
            entries.sort_by_key(|e| (e.doc_id, e.page_index, e.start_offset));
            merged.push((term, entries));
        }

        merged
    }

    /// Decode a term's visible postings, dropping entries for documents
    /// the batch deletes.
    fn surviving_entries(&self, entry: &TermEntry, batch: &Batch) -> Vec<PostingEntry> {
        let mmap = match &self.postings {
            Some(m) => m,
            None => return Vec::new(),
        };
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        if end > mmap.len() {
            return Vec::new();
        }
        decode_postings(&mmap[start..end])
            .into_iter()
            .filter(|e| !batch.deletes.contains(&e.doc_id))
            .collect()
    }

    /// Write the manifest to a temp file and atomically rename it over
    /// `meta.json`.
    fn write_manifest(&self, meta: &IndexMeta) -> Result<()> {
        let tmp_path = self.index_dir.join("meta.json.tmp");
        let file = File::create(&tmp_path)?;
        serde_json::to_writer_pretty(&file, meta)?;
        file.sync_all()?;
        fs::rename(&tmp_path, self.index_dir.join("meta.json"))?;
        Ok(())
    }

    /// Best-effort cleanup of a generation's artifact files.
    fn remove_generation_files(&self, generation: u64) {
        if generation == 0 {
            return;
        }
        for name in [
            docs_name(generation),
            dict_name(generation),
            postings_name(generation),
        ] {
            let _ = fs::remove_file(self.index_dir.join(name));
        }
    }
}

struct CommittedState {
    meta: IndexMeta,
    documents: Vec<DocumentRecord>,
    dict: Vec<TermEntry>,
    postings: Option<Mmap>,
}

fn docs_name(generation: u64) -> String {
    format!("docs_{generation:08}.bin")
}

fn dict_name(generation: u64) -> String {
    format!("terms_{generation:08}.dict")
}

fn postings_name(generation: u64) -> String {
    format!("terms_{generation:08}.postings")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Encode postings sorted by (doc_id, page_index, start_offset):
/// per entry a doc-id delta, page index, start, and span length.
fn encode_postings(entries: &[PostingEntry], buf: &mut Vec<u8>) {
    let mut prev_doc = 0u32;
    for e in entries {
        encode_varint(e.doc_id - prev_doc, buf);
        encode_varint(e.page_index, buf);
        encode_varint(e.start_offset, buf);
        encode_varint(e.end_offset - e.start_offset, buf);
        prev_doc = e.doc_id;
    }
}

fn decode_postings(mut buf: &[u8]) -> Vec<PostingEntry> {
    let mut entries = Vec::new();
    let mut prev_doc = 0u32;

    while !buf.is_empty() {
        let next = |data: &mut &[u8]| -> Option<u32> {
            let (value, consumed) = decode_varint(data)?;
            *data = &data[consumed..];
            Some(value)
        };

        let (delta, page, start, len) = match (
            next(&mut buf),
            next(&mut buf),
            next(&mut buf),
            next(&mut buf),
        ) {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => break,
        };

        prev_doc = prev_doc.saturating_add(delta);
        entries.push(PostingEntry {
            doc_id: prev_doc,
            page_index: page,
            start_offset: start,
            end_offset: start.saturating_add(len),
        });
    }

    entries
}

/// Document table layout: u32 count, then per record doc_id, path
/// (length-prefixed), size, mtime, page_count.
fn write_documents(path: &Path, documents: &[DocumentRecord]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    write_u32_le(&mut file, documents.len() as u32)?;
    for doc in documents {
        write_u32_le(&mut file, doc.doc_id)?;
        let path_str = doc.rel_path.to_string_lossy();
        let bytes = path_str.as_bytes();
        write_u32_le(&mut file, bytes.len() as u32)?;
        file.write_all(bytes)?;
        write_u64_le(&mut file, doc.fingerprint.size)?;
        write_u64_le(&mut file, doc.fingerprint.mtime_ns)?;
        write_u32_le(&mut file, doc.page_count)?;
    }

    file.flush()?;
    let inner = file.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    inner.sync_all()?;
    Ok(())
}

fn read_documents(path: &Path) -> Result<Vec<DocumentRecord>> {
    let mut file = BufReader::new(File::open(path)?);

    let count = read_u32_le(&mut file)? as usize;
    let mut documents = Vec::with_capacity(count);

    for _ in 0..count {
        let doc_id = read_u32_le(&mut file)?;
        let path_len = read_u32_le(&mut file)? as usize;
        let mut path_bytes = vec![0u8; path_len];
        file.read_exact(&mut path_bytes)?;
        let rel_path = PathBuf::from(String::from_utf8_lossy(&path_bytes).as_ref());
        let size = read_u64_le(&mut file)?;
        let mtime_ns = read_u64_le(&mut file)?;
        let page_count = read_u32_le(&mut file)?;

        documents.push(DocumentRecord {
            doc_id,
            rel_path,
            fingerprint: Fingerprint { size, mtime_ns },
            page_count,
        });
    }

    Ok(documents)
}

/// Dictionary layout: u64 entry count, then per entry a length-prefixed
/// term, postings offset, blob length, and entry count.
fn read_dict(path: &Path) -> Result<Vec<TermEntry>> {
    let mut file = BufReader::new(File::open(path)?);

    let count = read_u64_le(&mut file)? as usize;
    let mut entries = Vec::with_capacity(count);

    for _ in 0..count {
        let mut len_buf = [0u8; 2];
        file.read_exact(&mut len_buf)?;
        let term_len = u16::from_le_bytes(len_buf) as usize;
        let mut term_bytes = vec![0u8; term_len];
        file.read_exact(&mut term_bytes)?;
        let term = String::from_utf8_lossy(&term_bytes).to_string();

        let offset = read_u64_le(&mut file)?;
        let length = read_u32_le(&mut file)?;
        let entry_count = read_u32_le(&mut file)?;

        entries.push(TermEntry {
            term,
            offset,
            length,
            entry_count,
        });
    }

    // Sorted on write (merge of two sorted streams); binary search relies
    // on it.
    Ok(entries)
}

#[allow(dead_code)]
impl TermEntry {
    fn doc_freq(&self) -> u32 {
        self.entry_count
    }
}
