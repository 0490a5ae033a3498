//! Query execution: index lookup, span recovery, ranking.
//!
//! The index narrows the search to candidate `(document, page)` pairs;
//! match spans are then recovered against the page's actual text, pulled
//! back through the same extractor that fed the index. Only pages that
//! reach emission are extracted, so an early stop from the consumer cuts
//! the expensive work off immediately.

use crate::error::Result;
use crate::extract::TextExtractor;
use crate::index::store::IndexStore;
use crate::index::types::DocId;
use crate::query::parser::parse_query;
use crate::utils::tokenizer::{slice_by_chars, tokenize};
use lru::LruCache;
use roaring::RoaringBitmap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::warn;

/// Pages of extracted text kept hot during one engine's lifetime.
const PAGE_CACHE_SIZE: usize = 64;

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMode {
    /// Index traversal order, no sorting.
    None,
    /// Documents with the fewest query-term occurrences first.
    HitCountAsc,
    /// Documents with the most query-term occurrences first.
    HitCountDesc,
}

/// Consumer verdict after each match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchControl {
    Continue,
    Stop,
}

/// One hit: where the query matched and the exact original text it
/// matched. Offsets are code points into the page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Collection-relative document path.
    pub path: PathBuf,
    pub page_index: u32,
    pub matched_text: String,
    pub start_offset: u32,
    pub end_offset: u32,
}

/// Executes queries against a store.
pub struct QueryEngine<'a, E: TextExtractor> {
    store: &'a IndexStore,
    extractor: &'a E,
    page_cache: RefCell<LruCache<(DocId, u32), Rc<str>>>,
}

impl<'a, E: TextExtractor> QueryEngine<'a, E> {
    pub fn new(store: &'a IndexStore, extractor: &'a E) -> Self {
        Self {
            store,
            extractor,
            page_cache: RefCell::new(LruCache::new(
                NonZeroUsize::new(PAGE_CACHE_SIZE).unwrap(),
            )),
        }
    }

    /// Run a query, invoking `on_match` per hit until exhaustion or the
    /// consumer returns [`SearchControl::Stop`]. Returns the number of
    /// matches emitted.
    pub fn search<F>(&self, query: &str, rank: RankMode, mut on_match: F) -> Result<usize>
    where
        F: FnMut(&SearchMatch) -> SearchControl,
    {
        let parsed = parse_query(query)?;
        let unique = parsed.unique_terms();

        // Posting lists per term; any absent term empties the AND.
        let mut term_postings = Vec::with_capacity(unique.len());
        for term in &unique {
            let postings = self.store.lookup(term);
            if postings.is_empty() {
                return Ok(0);
            }
            term_postings.push(postings);
        }

        // Candidate documents: docs containing every term.
        let mut candidates: Option<RoaringBitmap> = None;
        for postings in &term_postings {
            let docs: RoaringBitmap = postings.iter().map(|e| e.doc_id).collect();
            candidates = Some(match candidates {
                Some(existing) => existing & docs,
                None => docs,
            });
        }
        let candidates = candidates.unwrap_or_default();
        if candidates.is_empty() {
            return Ok(0);
        }

        // Pages within each candidate doc where every term occurs, plus
        // per-doc hit counts for ranking.
        let mut pages_per_doc: FxHashMap<DocId, Vec<u32>> = FxHashMap::default();
        let mut hits_per_doc: FxHashMap<DocId, usize> = FxHashMap::default();

        for (i, postings) in term_postings.iter().enumerate() {
            let mut term_pages: FxHashMap<DocId, FxHashSet<u32>> = FxHashMap::default();
            for entry in postings {
                if !candidates.contains(entry.doc_id) {
                    continue;
                }
                term_pages
                    .entry(entry.doc_id)
                    .or_default()
                    .insert(entry.page_index);
                *hits_per_doc.entry(entry.doc_id).or_default() += 1;
            }

            if i == 0 {
                for (doc, pages) in term_pages {
                    let mut sorted: Vec<u32> = pages.into_iter().collect();
                    sorted.sort_unstable();
                    pages_per_doc.insert(doc, sorted);
                }
            } else {
                pages_per_doc.retain(|doc, pages| {
                    match term_pages.get(doc) {
                        Some(present) => {
                            pages.retain(|p| present.contains(p));
                            !pages.is_empty()
                        }
                        None => false,
                    }
                });
            }
        }

        // Deterministic document order: traversal order for RankNone,
        // hit count with an ascending-path tie-break otherwise.
        let mut docs: Vec<DocId> = pages_per_doc.keys().copied().collect();
        docs.sort_unstable();
        if rank != RankMode::None {
            let empty = std::path::Path::new("");
            docs.sort_by(|a, b| {
                let count_a = hits_per_doc.get(a).copied().unwrap_or(0);
                let count_b = hits_per_doc.get(b).copied().unwrap_or(0);
                let ordered = match rank {
                    RankMode::HitCountAsc => count_a.cmp(&count_b),
                    _ => count_b.cmp(&count_a),
                };
                ordered.then_with(|| {
                    let path_a = self.store.document(*a).map(|r| r.rel_path.as_path());
                    let path_b = self.store.document(*b).map(|r| r.rel_path.as_path());
                    path_a.unwrap_or(empty).cmp(path_b.unwrap_or(empty))
                })
            });
        }

        let mut emitted = 0usize;
        for doc_id in docs {
            let record = match self.store.document(doc_id) {
                Some(r) => r,
                None => continue,
            };
            let pages = &pages_per_doc[&doc_id];

            for &page_index in pages {
                let text = match self.page_text(doc_id, page_index, record.rel_path.clone()) {
                    Some(t) => t,
                    None => continue,
                };

                for m in find_matches(&text, &parsed.terms, &record.rel_path, page_index) {
                    emitted += 1;
                    if on_match(&m) == SearchControl::Stop {
                        return Ok(emitted);
                    }
                }
            }
        }

        Ok(emitted)
    }

    /// Run a query and collect every match.
    pub fn search_collect(&self, query: &str, rank: RankMode) -> Result<Vec<SearchMatch>> {
        let mut results = Vec::new();
        self.search(query, rank, |m| {
            results.push(m.clone());
            SearchControl::Continue
        })?;
        Ok(results)
    }

    /// Page text via the LRU cache; a document is extracted at most once
    /// per cache residency.
    fn page_text(&self, doc_id: DocId, page_index: u32, rel_path: PathBuf) -> Option<Rc<str>> {
        if let Some(text) = self.page_cache.borrow_mut().get(&(doc_id, page_index)) {
            return Some(Rc::clone(text));
        }

        let abs_path = self.store.root_path().join(&rel_path);
        let pages = match self.extractor.extract(&abs_path) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(path = %rel_path.display(), error = %e, "page no longer extractable, skipping");
                return None;
            }
        };

        let mut cache = self.page_cache.borrow_mut();
        let mut requested = None;
        for page in pages {
            let text: Rc<str> = Rc::from(page.text.as_str());
            if page.index == page_index {
                requested = Some(Rc::clone(&text));
            }
            cache.put((doc_id, page.index), text);
        }
        requested
    }
}

/// Recover match spans on one page.
///
/// A run of tokens matching the full query in order collapses into a
/// single match spanning the run, so searching for a phrase that appears
/// verbatim yields that phrase as `matched_text`. Tokens matching a query
/// term outside such a run yield individual spans. Output is in ascending
/// start order by construction.
fn find_matches(
    text: &str,
    query_terms: &[String],
    rel_path: &std::path::Path,
    page_index: u32,
) -> Vec<SearchMatch> {
    let tokens = tokenize(text);
    let term_set: FxHashSet<&str> = query_terms.iter().map(|s| s.as_str()).collect();
    let run_len = query_terms.len();

    let mut matches = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if run_len > 1 && i + run_len <= tokens.len() {
            let is_run = query_terms
                .iter()
                .zip(&tokens[i..i + run_len])
                .all(|(q, t)| *q == t.term);
            if is_run {
                let start = tokens[i].start;
                let end = tokens[i + run_len - 1].end;
                matches.push(SearchMatch {
                    path: rel_path.to_path_buf(),
                    page_index,
                    matched_text: slice_by_chars(text, start, end).to_string(),
                    start_offset: start,
                    end_offset: end,
                });
                i += run_len;
                continue;
            }
        }

        if term_set.contains(tokens[i].term.as_str()) {
            let token = &tokens[i];
            matches.push(SearchMatch {
                path: rel_path.to_path_buf(),
                page_index,
                matched_text: slice_by_chars(text, token.start, token.end).to_string(),
                start_offset: token.start,
                end_offset: token.end,
            });
        }
        i += 1;
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PlainTextExtractor;
    use crate::index::types::IndexConfig;
    use crate::index::updater::IndexUpdater;
    use crate::progress::Progressive;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn indexed(files: &[(&str, &str)]) -> (TempDir, IndexStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("collection");
        fs::create_dir_all(&root).unwrap();
        for (name, content) in files {
            fs::write(root.join(name), content).unwrap();
        }
        let mut store = IndexStore::open(&dir.path().join("index"), &root).unwrap();
        let extractor = PlainTextExtractor;
        let mut updater =
            IndexUpdater::new(&mut store, &extractor, IndexConfig::default(), false).unwrap();
        updater.run_to_end().unwrap();
        drop(updater);
        (dir, store)
    }

    #[test]
    fn test_scenario_two_documents() {
        let (_dir, store) = indexed(&[
            ("a.pdf", "hello world"),
            ("b.pdf", "hello there world"),
        ]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);

        let matches = engine
            .search_collect("hello world", RankMode::HitCountDesc)
            .unwrap();
        let paths: FxHashSet<&Path> = matches.iter().map(|m| m.path.as_path()).collect();
        assert!(paths.contains(Path::new("a.pdf")));
        assert!(paths.contains(Path::new("b.pdf")));

        let matches = engine.search_collect("there", RankMode::None).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, Path::new("b.pdf"));
        assert_eq!(matches[0].matched_text, "there");
    }

    #[test]
    fn test_round_trip_phrase() {
        let (_dir, store) = indexed(&[(
            "paper.pdf",
            "Introduction.\x0cThe quick brown fox jumps over the lazy dog.",
        )]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);

        let matches = engine
            .search_collect("quick brown fox", RankMode::None)
            .unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0].path, Path::new("paper.pdf"));
        assert_eq!(matches[0].page_index, 1);
        assert_eq!(matches[0].matched_text, "quick brown fox");
    }

    #[test]
    fn test_and_semantics() {
        let (_dir, store) = indexed(&[
            ("a.pdf", "alpha beta"),
            ("b.pdf", "alpha gamma"),
        ]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);

        let matches = engine.search_collect("alpha beta", RankMode::None).unwrap();
        assert!(matches.iter().all(|m| m.path == Path::new("a.pdf")));
        assert!(!matches.is_empty());
    }

    #[test]
    fn test_and_requires_same_page() {
        let (_dir, store) = indexed(&[("split.pdf", "alpha only here\x0cbeta only here")]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);

        // Both terms exist in the document but never on the same page.
        let matches = engine.search_collect("alpha beta", RankMode::None).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_rank_hit_count() {
        let (_dir, store) = indexed(&[
            ("a.pdf", "needle"),
            ("b.pdf", "needle needle needle"),
        ]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);

        let desc = engine
            .search_collect("needle", RankMode::HitCountDesc)
            .unwrap();
        assert_eq!(desc[0].path, Path::new("b.pdf"));
        assert_eq!(desc.last().unwrap().path, Path::new("a.pdf"));
        assert_eq!(desc.len(), 4);

        let asc = engine
            .search_collect("needle", RankMode::HitCountAsc)
            .unwrap();
        assert_eq!(asc[0].path, Path::new("a.pdf"));
    }

    #[test]
    fn test_early_stop() {
        let (_dir, store) = indexed(&[
            ("a.pdf", "stop here stop here"),
            ("b.pdf", "stop again"),
        ]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);

        let mut seen = 0;
        let emitted = engine
            .search("stop", RankMode::None, |_| {
                seen += 1;
                SearchControl::Stop
            })
            .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(emitted, 1);
    }

    #[test]
    fn test_unknown_term_no_matches() {
        let (_dir, store) = indexed(&[("a.pdf", "some words")]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);
        assert_eq!(
            engine.search_collect("absent", RankMode::None).unwrap(),
            Vec::new()
        );
    }

    #[test]
    fn test_empty_query_is_syntax_error() {
        let (_dir, store) = indexed(&[("a.pdf", "words")]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);
        assert!(engine.search_collect("  ", RankMode::None).is_err());
    }

    #[test]
    fn test_case_insensitive_match_preserves_original_text() {
        let (_dir, store) = indexed(&[("a.pdf", "Hello World")]);
        let extractor = PlainTextExtractor;
        let engine = QueryEngine::new(&store, &extractor);

        let matches = engine.search_collect("hello world", RankMode::None).unwrap();
        assert_eq!(matches.len(), 1);
        // matched_text is the original page text, not the normalized form.
        assert_eq!(matches[0].matched_text, "Hello World");
    }

    #[test]
    fn test_find_matches_mixed_runs_and_singles() {
        let terms = vec!["big".to_string(), "cat".to_string()];
        let matches = find_matches(
            "a big cat saw a cat near a big dog",
            &terms,
            Path::new("x.pdf"),
            0,
        );
        let texts: Vec<&str> = matches.iter().map(|m| m.matched_text.as_str()).collect();
        assert_eq!(texts, vec!["big cat", "cat", "big"]);
    }
}
