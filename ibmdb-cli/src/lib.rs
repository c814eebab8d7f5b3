//! Library module for the `ibmdb` binary.
//!
//! Argument parsing, settings resolution, model loading and plan rendering
//! live here so they can be tested without a database. The binary itself is
//! in main.rs.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use ibmdb_core::{ConnectionSettings, MigrationPlan, ModelDefinition};
use zeroize::Zeroizing;

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "ibmdb")]
#[command(about = "DB2 connectivity checks and model-driven table migration")]
#[command(version)]
#[command(long_about = "
ibmdb - DB2 connectivity checks and model-driven table migration

Connection settings come from flags or the DB2_* environment variables.
A DSN (DB2_DSN) takes precedence over the discrete fields.

SECURITY FEATURES:
- Passwords are never printed; connection strings show PWD=****
- --prompt-password reads the password without echo

EXAMPLES:
  ibmdb --hostname db.example.com --port 50000 --username db2inst1 --prompt-password ping
  DB2_DSN='DATABASE=sample;HOSTNAME=db;PORT=50000;UID=app;PWD=...' ibmdb plan --models models.json
  ibmdb plan --offline --models models.json --json
  ibmdb migrate --models models.json --recreate --only Customer
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the resolved connection string with the password masked
    Dsn,
    /// Run the probe query against the database
    Ping,
    /// Show the DDL that would bring tables in line with the models
    Plan(PlanArgs),
    /// Apply the DDL that brings tables in line with the models
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
pub struct ModelArgs {
    /// Model definition files
    #[arg(
        long,
        required = true,
        value_delimiter = ',',
        value_name = "FILE",
        help = "JSON files holding one model definition or an array of them"
    )]
    pub models: Vec<PathBuf>,

    /// Restrict the run to these models
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "MODEL",
        help = "Comma-separated model names (default: every loaded model)"
    )]
    pub only: Vec<String>,
}

impl ModelArgs {
    /// Selected model names as the connector expects them
    pub fn selected(&self) -> Vec<&str> {
        self.only.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub models: ModelArgs,

    /// Plan table creation without reading the catalog
    #[arg(long, help = "Render CREATE statements without connecting")]
    pub offline: bool,

    /// Print plans as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub models: ModelArgs,

    /// Drop and recreate instead of altering in place
    #[arg(long, help = "Drop and recreate tables (destroys their data)")]
    pub recreate: bool,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress all output except errors"
    )]
    pub quiet: bool,
}

/// Connection flags, each backed by a `DB2_*` environment variable
#[derive(Args)]
pub struct ConnectionArgs {
    #[arg(long, env = "DB2_DSN", hide_env_values = true, help = "Full DB2 connection string")]
    pub dsn: Option<String>,

    #[arg(long, env = "DB2_HOSTNAME")]
    pub hostname: Option<String>,

    #[arg(long, env = "DB2_PORTNUM")]
    pub port: Option<u16>,

    #[arg(long, env = "DB2_DATABASE")]
    pub database: Option<String>,

    #[arg(long, env = "DB2_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "DB2_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "DB2_SCHEMA")]
    pub schema: Option<String>,

    /// Read the password interactively
    #[arg(long, conflicts_with = "password")]
    pub prompt_password: bool,

    #[arg(long, default_value_t = 0)]
    pub min_pool_size: u32,

    #[arg(long, default_value_t = 0)]
    pub max_pool_size: u32,

    /// Send LIMIT/OFFSET to the server
    #[arg(long)]
    pub use_limit_offset: bool,
}

impl std::fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("dsn", &self.dsn.as_ref().map(|_| "****"))
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("schema", &self.schema)
            .field("prompt_password", &self.prompt_password)
            .finish_non_exhaustive()
    }
}

impl ConnectionArgs {
    /// Builds validated connection settings.
    ///
    /// `prompt` is only called with `--prompt-password`.
    ///
    /// # Errors
    /// Returns an error if the prompt fails or the settings are invalid.
    pub fn into_settings<F>(self, prompt: F) -> Result<ConnectionSettings>
    where
        F: FnOnce() -> std::io::Result<String>,
    {
        let mut settings = match self.dsn.filter(|dsn| !dsn.trim().is_empty()) {
            Some(dsn) => ConnectionSettings::from_dsn(dsn),
            None => ConnectionSettings::default(),
        };
        settings.hostname = self.hostname;
        settings.port = self.port;
        settings.database = self.database;
        settings.username = self.username;
        settings.schema = self.schema;
        settings.min_pool_size = self.min_pool_size;
        settings.max_pool_size = self.max_pool_size;
        settings.use_limit_offset = self.use_limit_offset;

        let password = if self.prompt_password {
            Some(prompt().context("Failed to read password")?)
        } else {
            self.password
        };
        settings.password = password.map(Zeroizing::new);

        settings
            .validate()
            .context("Invalid connection settings")?;
        Ok(settings)
    }
}

/// Loads every model from the given files, rejecting duplicate names
///
/// # Errors
/// Returns an error if a file cannot be read or parsed, or a model name
/// appears twice.
pub fn load_models(paths: &[PathBuf]) -> Result<Vec<ModelDefinition>> {
    let mut models: Vec<ModelDefinition> = Vec::new();
    for path in paths {
        let loaded = ModelDefinition::from_json_file(path)
            .with_context(|| format!("Failed to load models from {}", path.display()))?;
        tracing::debug!("Loaded {} model(s) from {}", loaded.len(), path.display());
        for model in loaded {
            if models.iter().any(|m| m.name == model.name) {
                bail!("Model '{}' is defined more than once", model.name);
            }
            models.push(model);
        }
    }
    if models.is_empty() {
        bail!("No model definitions found");
    }
    Ok(models)
}

/// Renders plans as SQL script text, one block per model
pub fn render_plans(plans: &[MigrationPlan]) -> String {
    let mut out = String::new();
    for plan in plans {
        if plan.is_empty() {
            out.push_str(&format!("-- {}: up to date\n", plan.model));
            continue;
        }
        out.push_str(&format!(
            "-- {} ({} statements)\n",
            plan.model,
            plan.operations.len()
        ));
        for sql in plan.statements() {
            out.push_str(sql);
            out.push_str(";\n");
        }
    }
    out
}

/// Renders plans as pretty-printed JSON
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_plans_json(plans: &[MigrationPlan]) -> Result<String> {
    serde_json::to_string_pretty(plans).context("Failed to serialize migration plans")
}
