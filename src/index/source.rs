use crate::error::{Error, Result};
use crate::index::types::{Fingerprint, IndexConfig};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// A file the scan picked up: identity plus change-detection fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path relative to the collection root; the stable identity of the
    /// document across runs.
    pub rel_path: PathBuf,
    pub abs_path: PathBuf,
    pub fingerprint: Fingerprint,
}

/// Result of one full enumeration pass.
#[derive(Debug, Default)]
pub struct Scan {
    /// Candidates in lexicographic rel_path order. Repeated scans over an
    /// unchanged tree produce an identical sequence.
    pub candidates: Vec<Candidate>,
    /// Entries that could not be read, with the reason. Not fatal.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Enumerates indexable files under a collection root.
pub struct DocumentSource {
    root: PathBuf,
    include: GlobSet,
    max_file_size: u64,
}

impl DocumentSource {
    pub fn new(root: &Path, config: &IndexConfig) -> Result<Self> {
        let root = root.canonicalize().map_err(Error::Io)?;
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            )));
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.include {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::Config(format!("bad include glob {pattern:?}: {e}")))?;
            builder.add(glob);
        }
        let include = builder
            .build()
            .map_err(|e| Error::Config(format!("bad include globs: {e}")))?;

        Ok(Self {
            root,
            include,
            max_file_size: config.max_file_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the collection recursively and fingerprint every matching file.
    ///
    /// Individual unreadable entries are skipped and reported in the
    /// returned [`Scan`]; only a missing or unreadable root is fatal.
    pub fn enumerate(&self) -> Result<Scan> {
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(true)
            .follow_links(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let mut scan = Scan::default();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    scan.skipped.push((self.root.clone(), e.to_string()));
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let name = match path.file_name() {
                Some(n) => n,
                None => continue,
            };
            if !self.include.is_match(Path::new(name)) {
                continue;
            }

            let meta = match path.metadata() {
                Ok(m) => m,
                Err(e) => {
                    scan.skipped.push((path.to_path_buf(), e.to_string()));
                    continue;
                }
            };

            if meta.len() > self.max_file_size {
                debug!(path = %path.display(), size = meta.len(), "skipping oversize file");
                continue;
            }

            let rel_path = match path.strip_prefix(&self.root) {
                Ok(p) => p.to_path_buf(),
                Err(_) => continue,
            };

            let mtime_ns = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);

            scan.candidates.push(Candidate {
                rel_path,
                abs_path: path.to_path_buf(),
                fingerprint: Fingerprint {
                    size: meta.len(),
                    mtime_ns,
                },
            });
        }

        Ok(scan)
    }
}
