//! Microsoft SQL Server driver.
//!
//! Only the dialect is provided; change-data capture is not available for SQL Server sources.

mod dialect;

pub use dialect::MssqlDialect;
