use crate::index::store::IndexStore;
use crate::utils::app_data::{get_index_dir, list_indexed_collections};
use anyhow::Result;
use std::path::Path;

/// Display index statistics
pub fn show_stats(root_path: &Path) -> Result<()> {
    let index_dir = get_index_dir(root_path)?;
    let store = IndexStore::open(&index_dir, root_path)?;
    let meta = store.meta();

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Collection root:  {}", store.root_path().display());
    println!("Index location:   {}", index_dir.display());
    println!("Index version:    {}", meta.version);
    println!("Generation:       {}", meta.generation);
    println!("Document count:   {}", meta.doc_count);
    println!("Term count:       {}", meta.term_count);
    println!("Posting count:    {}", meta.posting_count);

    let total_pages: u64 = store.documents().iter().map(|d| d.page_count as u64).sum();
    println!("Page count:       {}", total_pages);

    if let Ok(size) = dir_size(&index_dir) {
        println!();
        println!("Index size:       {}", format_size(size));
    }

    println!();
    println!("Created:          {}", format_timestamp(meta.created_at));
    println!("Updated:          {}", format_timestamp(meta.updated_at));

    Ok(())
}

/// List all indexed collections
pub fn list_indexes() -> Result<()> {
    let collections = list_indexed_collections()?;

    if collections.is_empty() {
        println!("No indexed collections found.");
        return Ok(());
    }

    println!("Indexed Collections");
    println!("===================");
    println!();

    for collection in collections {
        let exists = collection.root_path.exists();
        let status = if exists { "" } else { " [missing]" };
        println!("  {}{}", collection.root_path.display(), status);
        println!("    Index: {}", collection.index_dir.display());
        println!();
    }

    Ok(())
}

/// Calculate directory size recursively
fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                size += entry.metadata()?.len();
            } else if path.is_dir() {
                size += dir_size(&path)?;
            }
        }
    }
    Ok(size)
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format unix timestamp
fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?}", datetime)
}
