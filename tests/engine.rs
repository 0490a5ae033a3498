//! End-to-end tests driving the full pipeline: scan, extract, tokenize,
//! commit, query.

use pdfxi::extract::PlainTextExtractor;
use pdfxi::index::{IndexConfig, IndexStore, IndexUpdater};
use pdfxi::progress::Progressive;
use pdfxi::query::{QueryEngine, RankMode, SearchControl};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    index_dir: PathBuf,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("collection");
        fs::create_dir_all(&root).unwrap();
        for (name, content) in files {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        Self {
            index_dir: dir.path().join("index"),
            _dir: dir,
            root,
        }
    }

    fn open_store(&self) -> IndexStore {
        IndexStore::open(&self.index_dir, &self.root).unwrap()
    }

    fn config() -> IndexConfig {
        IndexConfig {
            include: vec!["*.pdf".to_string()],
            commit_batch_size: 2,
            ..Default::default()
        }
    }

    fn index(&self, store: &mut IndexStore) {
        let extractor = PlainTextExtractor;
        let mut updater =
            IndexUpdater::new(store, &extractor, Self::config(), false).unwrap();
        updater.run_to_end().unwrap();
    }
}

#[test]
fn scenario_hello_world() {
    // Directory contains a.pdf (page 0 "hello world") and b.pdf
    // (page 0 "hello there world").
    let fixture = Fixture::new(&[("a.pdf", "hello world"), ("b.pdf", "hello there world")]);
    let mut store = fixture.open_store();
    fixture.index(&mut store);

    let extractor = PlainTextExtractor;
    let engine = QueryEngine::new(&store, &extractor);

    // "hello world" matches both documents.
    let matches = engine
        .search_collect("hello world", RankMode::HitCountDesc)
        .unwrap();
    let paths: std::collections::HashSet<_> = matches.iter().map(|m| m.path.clone()).collect();
    assert!(paths.contains(Path::new("a.pdf")));
    assert!(paths.contains(Path::new("b.pdf")));

    // "there" matches exactly once, in b.pdf.
    let matches = engine.search_collect("there", RankMode::None).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].path, Path::new("b.pdf"));
    assert_eq!(matches[0].page_index, 0);
}

#[test]
fn round_trip_exact_phrase() {
    let fixture = Fixture::new(&[(
        "thesis.pdf",
        "Abstract text here.\x0cResults show gradient descent converges quickly in practice.",
    )]);
    let mut store = fixture.open_store();
    fixture.index(&mut store);

    let extractor = PlainTextExtractor;
    let engine = QueryEngine::new(&store, &extractor);

    let matches = engine
        .search_collect("gradient descent converges", RankMode::None)
        .unwrap();
    assert!(!matches.is_empty());
    assert_eq!(matches[0].path, Path::new("thesis.pdf"));
    assert_eq!(matches[0].page_index, 1);
    assert_eq!(matches[0].matched_text, "gradient descent converges");
}

#[test]
fn deleted_document_leaves_no_postings() {
    let fixture = Fixture::new(&[("gone.pdf", "unique zanzibar text"), ("kept.pdf", "other")]);
    let mut store = fixture.open_store();
    fixture.index(&mut store);
    assert_eq!(store.lookup("zanzibar").len(), 1);

    fs::remove_file(fixture.root.join("gone.pdf")).unwrap();
    fixture.index(&mut store);

    assert!(store.lookup("zanzibar").is_empty());
    assert!(store.lookup("unique").is_empty());
    assert!(store.document_record(Path::new("gone.pdf")).is_none());
    assert_eq!(store.documents().len(), 1);
}

#[test]
fn idempotent_rerun_without_changes() {
    let fixture = Fixture::new(&[("a.pdf", "repeat repeat"), ("b.pdf", "once")]);
    let mut store = fixture.open_store();
    fixture.index(&mut store);

    let docs_before = store.documents().to_vec();
    let repeat_before = store.lookup("repeat");
    let generation_before = store.meta().generation;

    fixture.index(&mut store);

    assert_eq!(store.documents(), docs_before.as_slice());
    assert_eq!(store.lookup("repeat"), repeat_before);
    // No filesystem changes means no new commit at all.
    assert_eq!(store.meta().generation, generation_before);
}

#[test]
fn resumption_matches_uninterrupted_run_at_every_pause_point() {
    let files: Vec<(String, String)> = (0..6)
        .map(|i| {
            (
                format!("doc{i}.pdf"),
                format!("shared corpus words plus token{i}"),
            )
        })
        .collect();
    let file_refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(n, c)| (n.as_str(), c.as_str()))
        .collect();

    // Reference run, never paused.
    let reference = Fixture::new(&file_refs);
    let mut ref_store = reference.open_store();
    reference.index(&mut ref_store);
    let ref_shared = ref_store.lookup("shared");

    // With batch size 2 the full run takes: scan, diff, then three
    // extract+commit pairs. Pause after every possible number of steps
    // and finish with a fresh run.
    for pause_after in 1..=8 {
        let fixture = Fixture::new(&file_refs);
        let mut store = fixture.open_store();

        {
            let extractor = PlainTextExtractor;
            let mut updater =
                IndexUpdater::new(&mut store, &extractor, Fixture::config(), false).unwrap();
            for _ in 0..pause_after {
                use pdfxi::progress::StepOutcome;
                if updater.continue_step().unwrap() == StepOutcome::Finished {
                    break;
                }
            }
            // Updater dropped here: the pause is just not calling again.
        }

        fixture.index(&mut store);

        assert_eq!(
            store.documents().len(),
            ref_store.documents().len(),
            "pause_after={pause_after}"
        );
        assert_eq!(
            store.lookup("shared").len(),
            ref_shared.len(),
            "pause_after={pause_after}"
        );
        for i in 0..6 {
            assert_eq!(
                store.lookup(&format!("token{i}")).len(),
                1,
                "pause_after={pause_after} token{i}"
            );
        }
    }
}

#[test]
fn rank_by_hit_count() {
    // Term appears once in doc a, three times in doc b.
    let fixture = Fixture::new(&[
        ("a.pdf", "entropy at the end"),
        ("b.pdf", "entropy entropy entropy"),
    ]);
    let mut store = fixture.open_store();
    fixture.index(&mut store);

    let extractor = PlainTextExtractor;
    let engine = QueryEngine::new(&store, &extractor);

    let desc = engine
        .search_collect("entropy", RankMode::HitCountDesc)
        .unwrap();
    assert_eq!(desc.first().unwrap().path, Path::new("b.pdf"));
    assert_eq!(desc.last().unwrap().path, Path::new("a.pdf"));

    let asc = engine
        .search_collect("entropy", RankMode::HitCountAsc)
        .unwrap();
    assert_eq!(asc.first().unwrap().path, Path::new("a.pdf"));
}

#[test]
fn early_stop_terminates_search() {
    let fixture = Fixture::new(&[
        ("a.pdf", "target target target"),
        ("b.pdf", "target target"),
    ]);
    let mut store = fixture.open_store();
    fixture.index(&mut store);

    let extractor = PlainTextExtractor;
    let engine = QueryEngine::new(&store, &extractor);

    let mut seen = Vec::new();
    let emitted = engine
        .search("target", RankMode::HitCountDesc, |m| {
            seen.push(m.clone());
            if seen.len() == 2 {
                SearchControl::Stop
            } else {
                SearchControl::Continue
            }
        })
        .unwrap();

    assert_eq!(emitted, 2);
    assert_eq!(seen.len(), 2);
}

#[test]
fn commit_failure_keeps_prior_index_intact() {
    let fixture = Fixture::new(&[("a.pdf", "original stable content")]);
    let mut store = fixture.open_store();
    fixture.index(&mut store);
    assert_eq!(store.lookup("original").len(), 1);

    // Change the file, then block the next generation's artifacts so the
    // follow-up commit fails.
    fs::write(fixture.root.join("a.pdf"), "totally different words now").unwrap();
    let blocker = fixture.index_dir.join("docs_00000002.bin");
    fs::create_dir(&blocker).unwrap();

    {
        let extractor = PlainTextExtractor;
        let mut updater =
            IndexUpdater::new(&mut store, &extractor, Fixture::config(), false).unwrap();
        assert!(updater.run_to_end().is_err());
    }

    // Visible index content equals the pre-batch content exactly.
    assert_eq!(store.lookup("original").len(), 1);
    assert!(store.lookup("totally").is_empty());

    // With the fault cleared the next run converges.
    fs::remove_dir(&blocker).unwrap();
    fixture.index(&mut store);
    assert!(store.lookup("original").is_empty());
    assert_eq!(store.lookup("totally").len(), 1);
}

#[test]
fn reopened_store_serves_existing_index() {
    let fixture = Fixture::new(&[("a.pdf", "persistent knowledge")]);
    {
        let mut store = fixture.open_store();
        fixture.index(&mut store);
    }

    let store = fixture.open_store();
    let extractor = PlainTextExtractor;
    let engine = QueryEngine::new(&store, &extractor);
    let matches = engine
        .search_collect("persistent knowledge", RankMode::None)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched_text, "persistent knowledge");
}
