//! Connection configuration.
//!
//! - `connection`: [`ConnectionSettings`] with builder methods and validation
//! - `dsn`: connection string parsing and generation

pub mod connection;
pub mod dsn;

pub use connection::ConnectionSettings;
pub use dsn::{ResolvedConnection, parse_dsn};
