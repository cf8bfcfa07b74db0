pub mod decision;
pub mod engine;
pub mod state;

pub use decision::needs_sync;
pub use engine::{SyncEngine, SyncReport, SyncStatus};
pub use state::{SyncState, SyncStateStore};
