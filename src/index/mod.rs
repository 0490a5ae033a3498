pub mod source;
pub mod stats;
pub mod store;
pub mod types;
pub mod updater;

pub use source::DocumentSource;
pub use store::{Batch, IndexStore};
pub use types::*;
pub use updater::{Checkpoint, IndexUpdater};
