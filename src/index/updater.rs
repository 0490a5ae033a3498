//! Progressive index updater.
//!
//! Drives one update run as an explicit state machine:
//!
//! ```text
//! Scanning -> Diffing -> Extracting -> Committing -> Finished
//!                             ^             |
//!                             +-------------+
//! ```
//!
//! Each `continue_step` call does a bounded amount of work and returns,
//! so the caller decides the pacing and may stop calling at any point.
//! Every commit is durable; a run abandoned between steps resumes on the
//! next run through the fingerprint diff.

use crate::error::{Error, Result};
use crate::extract::TextExtractor;
use crate::index::source::{Candidate, DocumentSource};
use crate::index::store::IndexStore;
use crate::index::types::{DocId, IndexConfig, PostingEntry};
use crate::progress::{Progressive, StepOutcome};
use crate::utils::tokenizer::tokenize;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Progress state for one update run.
///
/// Serializable so an embedding application can persist it and rebuild an
/// updater that picks up at the next unprocessed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Relative paths already extracted and committed this run.
    pub processed: Vec<PathBuf>,
    /// Relative paths still awaiting extraction, in processing order.
    pub pending: Vec<PathBuf>,
    /// Stale documents not yet deleted from the store.
    pub pending_deletes: Vec<DocId>,
}

/// One scheduled (re)extraction.
#[derive(Debug, Clone)]
struct Scheduled {
    candidate: Candidate,
    /// Previous incarnation to delete in the same batch, if any.
    replaces: Option<DocId>,
}

enum UpdaterState {
    Scanning,
    Diffing,
    Extracting,
    Committing,
    Finished,
    Failed,
}

/// Orchestrates a progressive re-index of a collection against the store.
pub struct IndexUpdater<'a, E: TextExtractor> {
    store: &'a mut IndexStore,
    source: DocumentSource,
    extractor: &'a E,
    config: IndexConfig,
    reupdate: bool,
    state: UpdaterState,

    scan: Vec<Candidate>,
    scan_skipped: Vec<(PathBuf, String)>,
    schedule: Vec<Scheduled>,
    deletes: Vec<DocId>,
    cursor: usize,
    total_scheduled: usize,
    processed: usize,
    /// Extracted-but-uncommitted documents for the next commit.
    staged: Vec<ExtractedDoc>,
    /// Documents skipped because extraction failed.
    failures: Vec<(PathBuf, Error)>,
}

struct ExtractedDoc {
    candidate: Candidate,
    replaces: Option<DocId>,
    page_count: u32,
    /// term -> occurrences, offsets in code points.
    postings: FxHashMap<String, Vec<(u32, u32, u32)>>,
}

impl<'a, E: TextExtractor> IndexUpdater<'a, E> {
    /// Prepare an update run. `reupdate` forces re-extraction of every
    /// file on disk regardless of fingerprint match.
    pub fn new(
        store: &'a mut IndexStore,
        extractor: &'a E,
        config: IndexConfig,
        reupdate: bool,
    ) -> Result<Self> {
        let source = DocumentSource::new(&store.root_path().to_path_buf(), &config)?;
        Ok(Self {
            store,
            source,
            extractor,
            config,
            reupdate,
            state: UpdaterState::Scanning,
            scan: Vec::new(),
            scan_skipped: Vec::new(),
            schedule: Vec::new(),
            deletes: Vec::new(),
            cursor: 0,
            total_scheduled: 0,
            processed: 0,
            staged: Vec::new(),
            failures: Vec::new(),
        })
    }

    /// Documents skipped this run because their text could not be
    /// extracted.
    pub fn failures(&self) -> &[(PathBuf, Error)] {
        &self.failures
    }

    /// Filesystem entries the scan could not read.
    pub fn scan_skipped(&self) -> &[(PathBuf, String)] {
        &self.scan_skipped
    }

    /// Snapshot of run progress, serializable for external persistence.
    ///
    /// The processed/pending boundary is the commit point: staged but
    /// uncommitted documents count as pending, since abandoning the run
    /// now would lose them.
    pub fn checkpoint(&self) -> Checkpoint {
        let committed = self.processed.min(self.schedule.len());
        Checkpoint {
            processed: self.schedule[..committed]
                .iter()
                .map(|s| s.candidate.rel_path.clone())
                .collect(),
            pending: self.schedule[committed..]
                .iter()
                .map(|s| s.candidate.rel_path.clone())
                .collect(),
            pending_deletes: self.deletes.clone(),
        }
    }

    fn step_scanning(&mut self) -> Result<StepOutcome> {
        let scan = self.source.enumerate()?;
        info!(
            candidates = scan.candidates.len(),
            skipped = scan.skipped.len(),
            "scan complete"
        );
        self.scan = scan.candidates;
        self.scan_skipped = scan.skipped;
        self.state = UpdaterState::Diffing;
        Ok(StepOutcome::ToBeContinued)
    }

    fn step_diffing(&mut self) -> Result<StepOutcome> {
        let mut seen: FxHashSet<PathBuf> = FxHashSet::default();

        for candidate in std::mem::take(&mut self.scan) {
            seen.insert(candidate.rel_path.clone());
            match self.store.document_record(&candidate.rel_path) {
                Some(record) if record.fingerprint == candidate.fingerprint && !self.reupdate => {
                    debug!(path = %candidate.rel_path.display(), "unchanged, skipping");
                }
                Some(record) => {
                    self.schedule.push(Scheduled {
                        candidate,
                        replaces: Some(record.doc_id),
                    });
                }
                None => {
                    self.schedule.push(Scheduled {
                        candidate,
                        replaces: None,
                    });
                }
            }
        }

        // Documents only the store knows about have disappeared from disk.
        self.deletes = self
            .store
            .documents()
            .iter()
            .filter(|d| !seen.contains(&d.rel_path))
            .map(|d| d.doc_id)
            .collect();

        self.total_scheduled = self.schedule.len();
        info!(
            scheduled = self.total_scheduled,
            deletions = self.deletes.len(),
            reupdate = self.reupdate,
            "diff complete"
        );

        if self.schedule.is_empty() && self.deletes.is_empty() {
            self.state = UpdaterState::Finished;
            return Ok(StepOutcome::Finished);
        }

        // Orphan deletions with nothing to extract still need a commit.
        self.state = if self.schedule.is_empty() {
            UpdaterState::Committing
        } else {
            UpdaterState::Extracting
        };
        Ok(StepOutcome::ToBeContinued)
    }

    /// Extract and tokenize one batch of scheduled documents. A document
    /// always runs to completion within the step; the pause boundary is
    /// between documents.
    fn step_extracting(&mut self) -> Result<StepOutcome> {
        let batch_end = (self.cursor + self.config.commit_batch_size).min(self.schedule.len());

        while self.cursor < batch_end {
            let scheduled = self.schedule[self.cursor].clone();
            self.cursor += 1;

            match self.extract_one(&scheduled) {
                Ok(doc) => self.staged.push(doc),
                Err(e) => {
                    warn!(path = %scheduled.candidate.rel_path.display(), error = %e, "extraction failed, skipping document");
                    // A changed file that no longer extracts still loses
                    // its stale postings.
                    if let Some(doc_id) = scheduled.replaces {
                        self.deletes.push(doc_id);
                    }
                    self.failures.push((scheduled.candidate.rel_path, e));
                }
            }
        }

        self.state = UpdaterState::Committing;
        Ok(StepOutcome::ToBeContinued)
    }

    fn extract_one(&self, scheduled: &Scheduled) -> Result<ExtractedDoc> {
        let pages = self.extractor.extract(&scheduled.candidate.abs_path)?;

        let mut postings: FxHashMap<String, Vec<(u32, u32, u32)>> = FxHashMap::default();
        let mut page_count = 0u32;

        for page in &pages {
            page_count = page_count.max(page.index + 1);
            for token in tokenize(&page.text) {
                postings
                    .entry(token.term)
                    .or_default()
                    .push((page.index, token.start, token.end));
            }
        }

        Ok(ExtractedDoc {
            candidate: scheduled.candidate.clone(),
            replaces: scheduled.replaces,
            page_count,
            postings,
        })
    }

    /// Apply the staged batch: deletions first, then insertions, one
    /// atomic store commit.
    fn step_committing(&mut self) -> Result<StepOutcome> {
        let mut batch = self.store.begin_batch();

        for doc_id in self.deletes.drain(..) {
            batch.delete_document(doc_id);
        }

        let staged = std::mem::take(&mut self.staged);
        let staged_count = staged.len();
        for doc in staged {
            if let Some(old) = doc.replaces {
                batch.delete_document(old);
            }
            let doc_id = batch.add_document(
                &doc.candidate.rel_path,
                doc.candidate.fingerprint,
                doc.page_count,
            );

            for (term, spans) in &doc.postings {
                let entries: Vec<PostingEntry> = spans
                    .iter()
                    .map(|&(page_index, start, end)| PostingEntry {
                        doc_id,
                        page_index,
                        start_offset: start,
                        end_offset: end,
                    })
                    .collect();
                batch.insert_postings(term, &entries);
            }
        }

        // A commit failure is fatal to the run; everything committed by
        // earlier batches stays visible and durable.
        if let Err(e) = self.store.commit(batch) {
            self.state = UpdaterState::Failed;
            return Err(e);
        }

        self.processed = self.cursor;
        debug!(
            committed = staged_count,
            processed = self.processed,
            total = self.total_scheduled,
            "batch committed"
        );

        if self.cursor >= self.schedule.len() {
            self.state = UpdaterState::Finished;
            Ok(StepOutcome::Finished)
        } else {
            self.state = UpdaterState::Extracting;
            Ok(StepOutcome::ToBeContinued)
        }
    }
}

impl<E: TextExtractor> Progressive for IndexUpdater<'_, E> {
    fn continue_step(&mut self) -> Result<StepOutcome> {
        match self.state {
            UpdaterState::Scanning => self.step_scanning(),
            UpdaterState::Diffing => self.step_diffing(),
            UpdaterState::Extracting => self.step_extracting(),
            UpdaterState::Committing => self.step_committing(),
            UpdaterState::Finished => Ok(StepOutcome::Finished),
            UpdaterState::Failed => Err(Error::CommitFailure(
                "update run already failed".to_string(),
            )),
        }
    }

    fn rate_of_progress(&self) -> i32 {
        match self.state {
            UpdaterState::Scanning | UpdaterState::Diffing => -1,
            UpdaterState::Finished => 100,
            _ => {
                if self.total_scheduled == 0 {
                    100
                } else {
                    (self.processed * 100 / self.total_scheduled) as i32
                }
            }
        }
    }
}
