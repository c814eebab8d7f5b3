//! In-memory driver replaying canned results.
//!
//! `ScriptedDriver` never touches a network. Statements are matched against
//! registered SQL fragments and answered with scripted rows or errors, and
//! every call is recorded so callers can assert on what was sent. It backs
//! the test suites and offline `plan` runs where no database is reachable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{Connection, Driver, IsolationLevel, Statement};
use crate::error::IbmDbError;
use crate::value::{Row, SqlValue};
use crate::Result;

/// A call observed by the scripted driver
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Init { min_pool_size: u32 },
    Open,
    Query { sql: String, params: Vec<SqlValue> },
    Begin(IsolationLevel),
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Clone)]
enum Outcome {
    Rows(Vec<Row>),
    Error {
        message: String,
        sqlstate: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct Rule {
    fragment: String,
    outcome: Outcome,
    once: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    rules: Vec<Rule>,
    events: Vec<DriverEvent>,
    open_error: Option<String>,
}

impl ScriptState {
    /// One-shot rules win over persistent ones; the first match is used
    fn answer(&mut self, sql: &str) -> Outcome {
        let position = self
            .rules
            .iter()
            .position(|r| r.once && sql.contains(&r.fragment))
            .or_else(|| self.rules.iter().position(|r| sql.contains(&r.fragment)));
        match position {
            Some(index) if self.rules[index].once => self.rules.remove(index).outcome,
            Some(index) => self.rules[index].outcome.clone(),
            None => Outcome::Rows(Vec::new()),
        }
    }
}

/// Builds a result row from `(label, value)` pairs
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<SqlValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Driver answering statements from a script.
///
/// Clones share the same script and event log.
///
/// # Example
/// ```rust
/// use ibmdb_core::driver::scripted::{ScriptedDriver, row};
/// use ibmdb_core::value::SqlValue;
///
/// let driver = ScriptedDriver::new();
/// driver.respond("SYSIBM.SYSDUMMY1", vec![row([("COUNT", SqlValue::Integer(1))])]);
/// assert!(driver.events().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_rule(&self, fragment: &str, outcome: Outcome, once: bool) {
        self.lock().rules.push(Rule {
            fragment: fragment.to_string(),
            outcome,
            once,
        });
    }

    /// Answers every statement containing `fragment` with `rows`
    pub fn respond(&self, fragment: &str, rows: Vec<Row>) -> &Self {
        self.push_rule(fragment, Outcome::Rows(rows), false);
        self
    }

    /// Answers the next statement containing `fragment` with `rows`
    pub fn respond_once(&self, fragment: &str, rows: Vec<Row>) -> &Self {
        self.push_rule(fragment, Outcome::Rows(rows), true);
        self
    }

    /// Fails every statement containing `fragment`
    pub fn fail(&self, fragment: &str, message: &str, sqlstate: Option<&str>) -> &Self {
        self.push_rule(
            fragment,
            Outcome::Error {
                message: message.to_string(),
                sqlstate: sqlstate.map(str::to_string),
            },
            false,
        );
        self
    }

    /// Makes `open` fail with `message`
    pub fn fail_open(&self, message: &str) -> &Self {
        self.lock().open_error = Some(message.to_string());
        self
    }

    /// Every call recorded so far
    pub fn events(&self) -> Vec<DriverEvent> {
        self.lock().events.clone()
    }

    /// SQL text of every executed statement, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Query { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of executed statements containing `fragment`
    pub fn count_statements(&self, fragment: &str) -> usize {
        self.statements()
            .iter()
            .filter(|sql| sql.contains(fragment))
            .count()
    }

    /// Number of recorded events equal to `event`
    pub fn count_events(&self, event: &DriverEvent) -> usize {
        self.lock().events.iter().filter(|e| *e == event).count()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    fn record(&self, event: DriverEvent) {
        self.lock().events.push(event);
    }

    fn run(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let outcome = {
            let mut state = self.lock();
            state.events.push(DriverEvent::Query {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
            state.answer(sql)
        };
        match outcome {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Error { message, sqlstate } => Err(IbmDbError::driver(message, sqlstate)),
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn init(&self, min_pool_size: u32, _connection_string: &str) -> Result<()> {
        self.record(DriverEvent::Init { min_pool_size });
        Ok(())
    }

    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let open_error = self.lock().open_error.clone();
        if let Some(message) = open_error {
            return Err(IbmDbError::connection_failed(
                connection_string,
                IbmDbError::driver(message, None),
            ));
        }
        self.record(DriverEvent::Open);
        Ok(Box::new(ScriptedConnection {
            driver: self.clone(),
        }))
    }
}

/// Connection handed out by [`ScriptedDriver`]
#[derive(Debug)]
pub struct ScriptedConnection {
    driver: ScriptedDriver,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        let rows = self.driver.run(&statement.sql, &statement.params)?;
        Ok(if statement.no_results { Vec::new() } else { rows })
    }

    fn query_sync(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.driver.run(sql, &[])
    }

    async fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<()> {
        self.driver.record(DriverEvent::Begin(isolation));
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        self.driver.record(DriverEvent::Commit);
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        self.driver.record(DriverEvent::Rollback);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.driver.record(DriverEvent::Close);
        Ok(())
    }
}
