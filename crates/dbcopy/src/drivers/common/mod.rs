//! Pieces shared by the PostgreSQL and SQL Server drivers.
//!
//! - [`tls`]: transport encryption settings for both dialects

pub mod tls;

pub use tls::{MssqlTls, SslMode, TlsBuilder};
