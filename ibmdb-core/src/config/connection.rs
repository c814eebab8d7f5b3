//! Connection settings for a DB2 data source.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::dsn::{ConnectionParts, ResolvedConnection, generate_connection_string, resolve_dsn};
use crate::error::IbmDbError;

/// Database used when the settings name none
pub const DEFAULT_DATABASE: &str = "testdb";
/// Transport protocol used when the settings name none
pub const DEFAULT_PROTOCOL: &str = "TCPIP";
/// Driver name placed in `DRIVER={...}`
pub const DEFAULT_DRIVER: &str = "DB2";
/// Connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT: u64 = 60;

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_connection_timeout() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT
}

/// Settings for connecting to DB2, either as discrete fields or a DSN.
///
/// The password is held in a zeroizing buffer, is never serialized and is
/// masked in `Debug` output. `Display` omits credentials entirely.
///
/// # Example
/// ```rust
/// use ibmdb_core::config::ConnectionSettings;
///
/// let settings = ConnectionSettings::new("db.example.com")
///     .with_port(50000)
///     .with_database("sample")
///     .with_credentials("db2inst1", "secret")
///     .with_schema("store");
///
/// assert!(settings.validate().is_ok());
/// assert!(settings.has_required_settings());
/// assert_eq!(settings.schema().as_deref(), Some("STORE"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    #[serde(alias = "host")]
    pub hostname: Option<String>,
    pub port: Option<u16>,
    #[serde(alias = "db")]
    pub database: Option<String>,
    #[serde(alias = "user")]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<Zeroizing<String>>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub schema: Option<String>,
    /// Full connection string; takes precedence over the discrete fields
    #[serde(default, skip_serializing)]
    pub dsn: Option<Zeroizing<String>>,
    #[serde(default = "default_driver")]
    pub driver_name: String,
    /// Connections opened when the pool is initialised (0 = driver default)
    #[serde(default)]
    pub min_pool_size: u32,
    /// Upper bound on open connections (0 = unbounded)
    #[serde(default)]
    pub max_pool_size: u32,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Send LIMIT/OFFSET to the server instead of slicing results locally
    #[serde(default)]
    pub use_limit_offset: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            hostname: None,
            port: None,
            database: None,
            username: None,
            password: None,
            protocol: default_protocol(),
            schema: None,
            dsn: None,
            driver_name: default_driver(),
            min_pool_size: 0,
            max_pool_size: 0,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            use_limit_offset: false,
        }
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.dsn.is_some() {
            return write!(f, "ConnectionSettings(dsn)");
        }
        write!(
            f,
            "ConnectionSettings({}{}/{})",
            self.hostname.as_deref().unwrap_or("<unset>"),
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database_name()
        )
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("protocol", &self.protocol)
            .field("schema", &self.schema)
            .field(
                "dsn",
                &self
                    .dsn
                    .as_ref()
                    .map(|dsn| crate::error::redact_connection_string(dsn)),
            )
            .field("driver_name", &self.driver_name)
            .field("min_pool_size", &self.min_pool_size)
            .field("max_pool_size", &self.max_pool_size)
            .field("connection_timeout", &self.connection_timeout)
            .field("use_limit_offset", &self.use_limit_offset)
            .finish()
    }
}

impl ConnectionSettings {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            ..Default::default()
        }
    }

    /// Settings backed by a full DSN
    pub fn from_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: Some(Zeroizing::new(dsn.into())),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_pool_size(mut self, min: u32, max: u32) -> Self {
        self.min_pool_size = min;
        self.max_pool_size = max;
        self
    }

    pub fn with_use_limit_offset(mut self, enabled: bool) -> Self {
        self.use_limit_offset = enabled;
        self
    }

    /// Database name, defaulting to `testdb`
    pub fn database_name(&self) -> &str {
        self.database
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DATABASE)
    }

    /// Whether enough is configured to attempt a connection: a DSN, or all of
    /// hostname, port, username, password and protocol.
    pub fn has_required_settings(&self) -> bool {
        if self.dsn.as_ref().is_some_and(|dsn| !dsn.trim().is_empty()) {
            return true;
        }
        let present = |value: Option<&str>| value.is_some_and(|v| !v.is_empty());
        present(self.hostname.as_deref())
            && self.port.is_some()
            && present(self.username.as_deref())
            && self.password.is_some()
            && !self.protocol.is_empty()
    }

    /// Validates settings values that are wrong regardless of completeness.
    ///
    /// Missing connection fields are not an error here; they put the
    /// connector into its degraded mode instead.
    pub fn validate(&self) -> crate::Result<()> {
        if self.port == Some(0) {
            return Err(IbmDbError::configuration("port must be greater than 0"));
        }

        if self.dsn.as_ref().is_some_and(|dsn| dsn.trim().is_empty()) {
            return Err(IbmDbError::configuration("dsn cannot be empty"));
        }

        if self.max_pool_size > 0 && self.min_pool_size > self.max_pool_size {
            return Err(IbmDbError::configuration(
                "min_pool_size must not exceed max_pool_size",
            ));
        }

        if self.driver_name.trim().is_empty() {
            return Err(IbmDbError::configuration("driver_name cannot be empty"));
        }

        Ok(())
    }

    /// Builds the driver connection string and the effective schema.
    ///
    /// Fields that are missing render as empty values; callers check
    /// [`has_required_settings`](Self::has_required_settings) before
    /// handing the string to a driver.
    pub fn resolve(&self) -> ResolvedConnection {
        if let Some(dsn) = self.dsn.as_ref().filter(|dsn| !dsn.trim().is_empty()) {
            return resolve_dsn(dsn);
        }

        generate_connection_string(ConnectionParts {
            driver: &self.driver_name,
            database: self.database_name(),
            hostname: self.hostname.as_deref().unwrap_or_default(),
            username: self.username.as_deref().unwrap_or_default(),
            password: self.password.as_deref().map_or("", String::as_str),
            port: self.port.unwrap_or_default(),
            protocol: &self.protocol,
            schema: self.schema.as_deref(),
        })
    }

    /// Driver connection string; contains the password
    pub fn connection_string(&self) -> Zeroizing<String> {
        Zeroizing::new(self.resolve().connection_string)
    }

    /// Effective schema for unqualified statements
    pub fn schema(&self) -> Option<String> {
        self.resolve().schema
    }
}
