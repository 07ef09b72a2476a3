//! Core types shared by the splitter and the preparer.
//!
//! - [`position`]: inventory and incremental positions
//! - [`schema`]: table names, columns, and unique key classification
//! - [`traits`]: collaborator traits injected into the preparer

pub mod position;
pub mod schema;
pub mod traits;

pub use position::{IncrementalPosition, IngestPosition, STRING_KEY_HIGH, STRING_KEY_LOW};
pub use schema::{Column, KeyKind, TableMapping, TableName, UniqueKeyColumn};
pub use traits::{
    Dialect, IncrementalPositionManager, JobRegistry, MetadataLoader, SourceDataSource, TargetPreparer,
};
