//! # pdfxi - Full-Text Search for PDF Collections
//!
//! pdfxi maintains a persistent, crash-consistent inverted index over a
//! directory of PDF documents and answers ranked full-text queries against
//! it. Indexing is progressive: a caller-driven stepping loop advances the
//! run in bounded units, can pause between documents, and resumes without
//! re-processing anything already committed.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Document scanning, the persistent store, the progressive updater
//! - [`query`] - Query parsing, execution, and ranking
//! - [`extract`] - The text-extraction seam (PDF parsing stays external)
//! - [`progress`] - The pausable/resumable stepping contract
//! - [`output`] - Result formatting for the CLI
//! - [`utils`] - Tokenization, encodings, checksums, index housing
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdfxi::extract::PlainTextExtractor;
//! use pdfxi::index::{IndexConfig, IndexStore, IndexUpdater};
//! use pdfxi::progress::Progressive;
//! use pdfxi::query::{QueryEngine, RankMode};
//! use std::path::Path;
//!
//! let extractor = PlainTextExtractor;
//! let mut store = IndexStore::open(Path::new("/tmp/idx"), Path::new("/data/papers"))?;
//!
//! // Index the collection, one bounded step at a time.
//! let mut updater = IndexUpdater::new(&mut store, &extractor, IndexConfig::default(), false)?;
//! updater.run_to_end()?;
//!
//! // Search it.
//! let engine = QueryEngine::new(&store, &extractor);
//! for m in engine.search_collect("neural network", RankMode::HitCountDesc)? {
//!     println!("{}:{}: {}", m.path.display(), m.page_index, m.matched_text);
//! }
//! ```
//!
//! ## Durability
//!
//! Every store commit writes a complete artifact generation and flips a
//! manifest atomically: readers never observe a partially applied batch,
//! and a crashed run reopens at the last committed state. Corruption is
//! detected at open via artifact checksums and reported, never repaired
//! silently.

pub mod error;
pub mod extract;
pub mod index;
pub mod output;
pub mod progress;
pub mod query;
pub mod utils;

pub use error::{Error, Result};
