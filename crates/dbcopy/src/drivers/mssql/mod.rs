//! Microsoft SQL Server driver.
//!
//! - [`MssqlEndpoint`]: bb8-pooled Tiberius connections implementing the
//!   catalog reader (`reader`) and the statement executor (`writer`)
//! - [`TiberiusConnectionManager`]: bb8 connection manager with TCP keepalive

mod reader;
mod writer;

pub use reader::{MssqlEndpoint, TiberiusConnectionManager};
