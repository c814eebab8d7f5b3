//! DB2 connection string parsing and generation.

use std::collections::BTreeMap;

/// Key DB2 uses for the default schema of a session
pub const CURRENT_SCHEMA_KEY: &str = "CurrentSchema";

/// Splits a `KEY=value;KEY=value` string into its entries.
///
/// A trailing `;` does not produce an empty entry. Only the first `=` of an
/// entry separates key from value, so values may contain `=`.
pub fn parse_dsn(dsn: &str) -> BTreeMap<String, String> {
    dsn.split(';')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.to_string()),
            None => (entry.trim().to_string(), String::new()),
        })
        .collect()
}

fn lookup<'a>(entries: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

/// A connection string ready for the driver together with the schema that
/// unqualified statements will target.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub connection_string: String,
    pub schema: Option<String>,
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field(
                "connection_string",
                &crate::error::redact_connection_string(&self.connection_string),
            )
            .field("schema", &self.schema)
            .finish()
    }
}

/// Uses a caller-supplied DSN verbatim, appending `CurrentSchema=<UID>` when
/// the DSN does not name a schema itself.
pub fn resolve_dsn(dsn: &str) -> ResolvedConnection {
    let entries = parse_dsn(dsn);
    let current_schema = lookup(&entries, CURRENT_SCHEMA_KEY);
    let uid = lookup(&entries, "UID");

    let mut connection_string = dsn.to_string();
    if current_schema.is_none()
        && let Some(uid) = uid
    {
        let base = connection_string.trim_end().trim_end_matches(';').to_string();
        connection_string = format!("{base};{CURRENT_SCHEMA_KEY}={uid}");
    }

    ResolvedConnection {
        connection_string,
        schema: current_schema.or(uid).map(str::to_string),
    }
}

/// Parts of a generated connection string
#[derive(Clone, Copy)]
pub struct ConnectionParts<'a> {
    pub driver: &'a str,
    pub database: &'a str,
    pub hostname: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub port: u16,
    pub protocol: &'a str,
    pub schema: Option<&'a str>,
}

/// Generates a connection string with the key order the DB2 CLI expects.
///
/// The schema is upper-cased; without one the username doubles as schema.
pub fn generate_connection_string(parts: ConnectionParts<'_>) -> ResolvedConnection {
    let schema = parts
        .schema
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| parts.username.to_string());

    let connection_string = format!(
        "DRIVER={{{}}};DATABASE={};HOSTNAME={};UID={};PWD={};PORT={};PROTOCOL={};{}={}",
        parts.driver,
        parts.database,
        parts.hostname,
        parts.username,
        parts.password,
        parts.port,
        parts.protocol,
        CURRENT_SCHEMA_KEY,
        schema
    );

    ResolvedConnection {
        connection_string,
        schema: Some(schema).filter(|s| !s.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dsn_trailing_separator() {
        let entries = parse_dsn("DATABASE=sample;UID=db2inst1;PWD=a=b;");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries["DATABASE"], "sample");
        assert_eq!(entries["PWD"], "a=b");
    }

    #[test]
    fn test_resolve_dsn_appends_schema_from_uid() {
        let resolved = resolve_dsn("DATABASE=sample;HOSTNAME=db;UID=db2inst1;PWD=pw;PORT=50000");
        assert_eq!(
            resolved.connection_string,
            "DATABASE=sample;HOSTNAME=db;UID=db2inst1;PWD=pw;PORT=50000;CurrentSchema=db2inst1"
        );
        assert_eq!(resolved.schema.as_deref(), Some("db2inst1"));
    }

    #[test]
    fn test_resolve_dsn_trailing_semicolon_not_doubled() {
        let resolved = resolve_dsn("DATABASE=sample;UID=user1;");
        assert_eq!(
            resolved.connection_string,
            "DATABASE=sample;UID=user1;CurrentSchema=user1"
        );
    }

    #[test]
    fn test_resolve_dsn_keeps_current_schema() {
        let dsn = "DATABASE=sample;UID=db2inst1;CurrentSchema=STORE";
        let resolved = resolve_dsn(dsn);
        assert_eq!(resolved.connection_string, dsn);
        assert_eq!(resolved.schema.as_deref(), Some("STORE"));
    }

    #[test]
    fn test_resolve_dsn_without_uid() {
        let resolved = resolve_dsn("DATABASE=sample;Authentication=KERBEROS");
        assert_eq!(
            resolved.connection_string,
            "DATABASE=sample;Authentication=KERBEROS"
        );
        assert_eq!(resolved.schema, None);
    }

    #[test]
    fn test_generate_connection_string_order() {
        let resolved = generate_connection_string(ConnectionParts {
            driver: "DB2",
            database: "testdb",
            hostname: "localhost",
            username: "db2inst1",
            password: "secret",
            port: 50000,
            protocol: "TCPIP",
            schema: Some("store"),
        });
        assert_eq!(
            resolved.connection_string,
            "DRIVER={DB2};DATABASE=testdb;HOSTNAME=localhost;UID=db2inst1;PWD=secret;PORT=50000;PROTOCOL=TCPIP;CurrentSchema=STORE"
        );
        assert_eq!(resolved.schema.as_deref(), Some("STORE"));
        assert!(!format!("{resolved:?}").contains("secret"));
    }

    #[test]
    fn test_generate_connection_string_schema_defaults_to_username() {
        let resolved = generate_connection_string(ConnectionParts {
            driver: "DB2",
            database: "testdb",
            hostname: "localhost",
            username: "db2inst1",
            password: "secret",
            port: 50000,
            protocol: "TCPIP",
            schema: None,
        });
        assert!(resolved.connection_string.ends_with(";CurrentSchema=db2inst1"));
        assert_eq!(resolved.schema.as_deref(), Some("db2inst1"));
    }
}
