//! DB2 connectivity and migration tool.
//!
//! Resolves connection settings from flags or `DB2_*` variables, then pings
//! the database or plans and applies model-driven table migrations.
//!
//! # Security Guarantees
//! - Passwords are never printed or logged
//! - Connection strings are shown with `PWD=****`

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use ibmdb_cli::{Cli, Command, MigrateArgs, PlanArgs, load_models, render_plans, render_plans_json};
use ibmdb_core::driver::scripted::ScriptedDriver;
use ibmdb_core::error::redact_connection_string;
use ibmdb_core::logging::init_logging;
use ibmdb_core::{ConnectionSettings, Db2Connector, ModelDefinition, create_driver};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let settings = cli
        .connection
        .into_settings(|| rpassword::prompt_password("DB2 password: "))?;

    match cli.command {
        Command::Dsn => {
            println!("{}", redact_connection_string(&settings.connection_string()));
            Ok(())
        }
        Command::Ping => ping(settings).await,
        Command::Plan(args) => plan(settings, args).await,
        Command::Migrate(args) => migrate(settings, args).await,
    }
}

fn require_complete(settings: &ConnectionSettings) -> Result<()> {
    if !settings.has_required_settings() {
        bail!(
            "Incomplete connection settings: set DB2_DSN, or hostname, port, username and password"
        );
    }
    Ok(())
}

/// Connector on the native driver with the given models defined
async fn connect(settings: ConnectionSettings, models: Vec<ModelDefinition>) -> Result<Db2Connector> {
    require_complete(&settings)?;
    let driver = create_driver(settings.max_pool_size)?;
    info!("Using {} driver for {}", driver.name(), settings);
    let mut connector = Db2Connector::initialize(settings, driver).await?;
    connector.define_all(models)?;
    Ok(connector)
}

async fn ping(settings: ConnectionSettings) -> Result<()> {
    let connector = connect(settings, Vec::new()).await?;
    let alive = connector.ping(None).await.map_err(|e| {
        error!("Ping failed: {}", e);
        e
    })?;
    if !alive {
        bail!("Probe query returned no rows");
    }
    println!("Connection to {} successful", connector.settings());
    Ok(())
}

async fn plan(settings: ConnectionSettings, args: PlanArgs) -> Result<()> {
    let models = load_models(&args.models.models)?;
    let selected = args.models.selected();

    let plans = if args.offline {
        // Nothing is sent to the scripted driver; it only satisfies the connector
        let mut connector = Db2Connector::new(settings, Arc::new(ScriptedDriver::new()))?;
        connector.define_all(models)?;
        let names: Vec<&str> = if selected.is_empty() {
            connector.model_names()
        } else {
            selected
        };
        names
            .into_iter()
            .map(|name| {
                let model = connector.model(name)?;
                connector.create_table_plan(model)
            })
            .collect::<ibmdb_core::Result<Vec<_>>>()?
    } else {
        let connector = connect(settings, models).await?;
        connector
            .plan_migration(&selected)
            .await
            .context("Failed to plan migration")?
    };

    if args.json {
        println!("{}", render_plans_json(&plans)?);
    } else {
        print!("{}", render_plans(&plans));
    }
    Ok(())
}

async fn migrate(settings: ConnectionSettings, args: MigrateArgs) -> Result<()> {
    let models = load_models(&args.models.models)?;
    let selected = args.models.selected();
    let connector = connect(settings, models).await?;

    if args.recreate {
        connector
            .automigrate(&selected)
            .await
            .context("Failed to recreate tables")?;
        info!("Tables recreated");
        return Ok(());
    }

    let plans = connector
        .autoupdate(&selected)
        .await
        .context("Failed to update tables")?;
    let applied: usize = plans.iter().map(|p| p.operations.len()).sum();
    info!("Applied {} statement(s) across {} model(s)", applied, plans.len());
    print!("{}", render_plans(&plans));
    Ok(())
}
