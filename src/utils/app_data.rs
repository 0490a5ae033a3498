use anyhow::{Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "pdfxi";

/// Get the application data directory for storing indexes
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Get the index directory for a specific collection root
pub fn get_index_dir(root_path: &Path) -> Result<PathBuf> {
    let app_data = get_app_data_dir()?;
    let indexes_dir = app_data.join("indexes");
    fs::create_dir_all(&indexes_dir)?;

    let folder_name = hash_path(root_path);
    Ok(indexes_dir.join(folder_name))
}

/// Hash a path to create a unique folder name
/// Format: first chars of dir name + hash
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    let dir_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let sanitized: String = dir_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(16)
        .collect();

    let mut hasher = DefaultHasher::new();
    path_str.hash(&mut hasher);
    let hash = hasher.finish();

    format!("{}-{:016x}", sanitized, hash)
}

/// Check if a collection root has an existing index
pub fn is_indexed(root_path: &Path) -> Result<bool> {
    let index_dir = get_index_dir(root_path)?;
    Ok(index_dir.join("meta.json").exists())
}

/// Information about an indexed collection
#[derive(Debug, Clone)]
pub struct IndexLocation {
    pub root_path: PathBuf,
    pub index_dir: PathBuf,
}

/// List all indexed collections
pub fn list_indexed_collections() -> Result<Vec<IndexLocation>> {
    let app_data = get_app_data_dir()?;
    let indexes_dir = app_data.join("indexes");

    if !indexes_dir.exists() {
        return Ok(Vec::new());
    }

    let mut collections = Vec::new();

    for entry in fs::read_dir(&indexes_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            let meta_path = path.join("meta.json");
            if meta_path.exists() {
                // Read the manifest to recover the collection root
                if let Ok(file) = fs::File::open(&meta_path) {
                    if let Ok(meta) = serde_json::from_reader::<_, serde_json::Value>(file) {
                        if let Some(root) = meta.get("root_path").and_then(|v| v.as_str()) {
                            collections.push(IndexLocation {
                                root_path: PathBuf::from(root),
                                index_dir: path,
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(collections)
}

/// Remove the index for a collection
pub fn remove_index(root_path: &Path) -> Result<()> {
    let index_dir = get_index_dir(root_path)?;
    if index_dir.exists() {
        fs::remove_dir_all(&index_dir)?;
    }
    Ok(())
}
