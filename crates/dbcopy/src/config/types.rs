//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::dialect::Dialect;
use crate::drivers::common::tls::SslMode;

/// Root configuration: logical endpoint name to connection details.
///
/// ```yaml
/// erp:
///   driver: mssql
///   hostname: 10.0.0.5
///   database: ERP
///   username: sa
///   password: secret
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

/// Connection details for one database.
#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Dialect (`postgres`, `pgx`, `postgresql`, `mssql`, `sqlserver`).
    #[serde(alias = "type")]
    pub driver: Dialect,

    /// Server host name or address.
    #[serde(alias = "host")]
    pub hostname: String,

    /// TCP port; the dialect default when absent.
    #[serde(default)]
    pub port: Option<u16>,

    /// Database (catalog) name.
    pub database: String,

    #[serde(alias = "user")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Encrypt the TDS connection (mssql only).
    #[serde(default)]
    pub encrypt: bool,

    /// Accept any server certificate (mssql only).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Name under which other servers reach this endpoint: the FDW server on
    /// a PostgreSQL destination or the linked server on a SQL Server one.
    #[serde(default)]
    pub link_server: Option<String>,

    /// TLS mode (postgres only).
    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl EndpointConfig {
    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.driver.default_port())
    }

    /// `host:port/database`, for logs and error messages.
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.hostname, self.port(), self.database)
    }
}

// Custom Debug implementation that redacts the password
impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("driver", &self.driver)
            .field("hostname", &self.hostname)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("link_server", &self.link_server)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_map() {
        let yaml = r#"
erp:
  driver: mssql
  hostname: 10.0.0.5
  database: ERP
  username: sa
  password: secret
  link_server: ERPLINK
warehouse:
  type: pgx
  host: localhost
  port: 6432
  database: wh
  user: etl
  ssl_mode: verify-full
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let erp = &config.endpoints["erp"];
        assert_eq!(erp.driver, Dialect::Mssql);
        assert_eq!(erp.port(), 1433);
        assert!(!erp.encrypt);
        assert_eq!(erp.link_server.as_deref(), Some("ERPLINK"));

        let wh = &config.endpoints["warehouse"];
        assert_eq!(wh.driver, Dialect::Postgres);
        assert_eq!(wh.port(), 6432);
        assert_eq!(wh.username, "etl");
        assert_eq!(wh.password, "");
        assert_eq!(wh.ssl_mode, SslMode::VerifyFull);
        assert_eq!(wh.address(), "localhost:6432/wh");
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let yaml = "x:\n  driver: oracle\n  hostname: h\n  database: d\n  username: u\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }
}
