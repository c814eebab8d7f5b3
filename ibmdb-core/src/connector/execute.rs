//! Statement execution.

use super::{Db2Connector, Transaction};
use crate::builder::pagination::{slice_rows, strip_limit_offset};
use crate::dialect::SqlDialect;
use crate::driver::{Connection, Statement};
use crate::sql::ParameterizedSql;
use crate::value::Row;
use crate::Result;

impl Db2Connector {
    /// Runs one statement on `conn`.
    ///
    /// Unless `use_limit_offset` is set, `LIMIT n`/`OFFSET n` tokens are
    /// removed before the statement is sent and applied to the fetched rows
    /// instead, offset first.
    pub(crate) async fn run(
        &self,
        conn: &mut dyn Connection,
        stmt: ParameterizedSql,
        no_results: bool,
    ) -> Result<Vec<Row>> {
        stmt.check()?;

        let (stmt, window) = if self.settings.use_limit_offset {
            (stmt, None)
        } else {
            let stripped = strip_limit_offset(&stmt.sql);
            let window = (stripped.limit.is_some() || stripped.offset.is_some())
                .then_some((stripped.limit, stripped.offset));
            (ParameterizedSql::with_params(stripped.sql, stmt.params), window)
        };

        let stmt = self.dialect.parameterize(stmt);
        tracing::debug!("SQL: {} ({} params)", stmt.sql, stmt.params.len());
        let mut statement = Statement::new(stmt.sql, stmt.params);
        if no_results {
            statement = statement.without_results();
        }

        let rows = conn.query(&statement).await?;
        Ok(match window {
            Some((limit, offset)) => slice_rows(rows, limit, offset),
            None => rows,
        })
    }

    /// Executes arbitrary SQL and returns its rows
    pub async fn execute(
        &self,
        sql: impl Into<ParameterizedSql>,
        transaction: Option<&mut Transaction>,
    ) -> Result<Vec<Row>> {
        let stmt = sql.into();
        let mut scope = self.scope(transaction).await?;
        let result = match scope.connection() {
            Ok(conn) => self.run(conn, stmt, false).await,
            Err(error) => Err(error),
        };
        scope.finish(result).await
    }
}
