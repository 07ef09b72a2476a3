//! Job item preparation.
//!
//! - [`context`]: per-item and per-job runtime state
//! - [`position`]: inventory position resolution
//! - [`splitter`]: inventory task splitting
//! - [`preparer`]: lock-guarded target preparation and task construction

pub mod context;
pub mod position;
pub mod preparer;
pub mod splitter;

pub use context::{JobItemContext, JobProcessContext};
pub use position::InventoryPositionResolver;
pub use preparer::{MigrationJobPreparer, PrepareOutcome};
pub use splitter::{InventoryDumperConfiguration, InventoryTaskSplitter};
