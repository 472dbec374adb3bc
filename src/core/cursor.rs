// Owned handle for the most recent row-producing query: Open -> Exhausted, or Closed.
use rusqlite::Statement;

use crate::core::db::sql_error;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorState {
    Open,
    Exhausted,
    Closed,
}

/// First rows of a result, for display only.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub truncated: bool,
}

pub struct QueryCursor<'db> {
    sql: String,
    columns: Vec<String>,
    statement: Option<Statement<'db>>,
    state: CursorState,
}

impl<'db> QueryCursor<'db> {
    pub fn new(sql: impl Into<String>, statement: Statement<'db>) -> Self {
        let columns = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            sql: sql.into(),
            columns,
            statement: Some(statement),
            state: CursorState::Open,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == CursorState::Open
    }

    /// Steps at most `limit + 1` rows; the statement is reset afterwards and stays `Open`.
    pub fn preview(&mut self, limit: usize) -> Result<ResultPreview, Error> {
        let statement = open_statement(self.state, &mut self.statement)?;
        let column_count = statement.column_count();
        let mut rows = statement.query([]).map_err(sql_error)?;
        let mut preview = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next().map_err(sql_error)? {
            if preview.len() == limit {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(Value::from(row.get_ref(idx).map_err(sql_error)?));
            }
            preview.push(values);
        }
        Ok(ResultPreview {
            columns: self.columns.clone(),
            rows: preview,
            truncated,
        })
    }

    /// Streams every row through `on_row`, reusing one row buffer. Consumes the cursor:
    /// it is `Exhausted` afterwards whether or not streaming succeeded.
    pub fn for_each_row<F>(&mut self, mut on_row: F) -> Result<u64, Error>
    where
        F: FnMut(&[Value]) -> Result<(), Error>,
    {
        let statement = open_statement(self.state, &mut self.statement)?;
        self.state = CursorState::Exhausted;
        let column_count = statement.column_count();
        let mut rows = statement.query([]).map_err(sql_error)?;
        let mut values = Vec::with_capacity(column_count);
        let mut count = 0u64;
        while let Some(row) = rows.next().map_err(sql_error)? {
            values.clear();
            for idx in 0..column_count {
                values.push(Value::from(row.get_ref(idx).map_err(sql_error)?));
            }
            on_row(&values)?;
            count += 1;
        }
        Ok(count)
    }

    /// Finalizes the prepared statement. Idempotent.
    pub fn close(&mut self) {
        if let Some(statement) = self.statement.take() {
            if let Err(err) = statement.finalize() {
                tracing::warn!(sql = %self.sql, error = %err, "failed to finalize result cursor");
            }
        }
        self.state = CursorState::Closed;
    }
}

fn open_statement<'a, 'db>(
    state: CursorState,
    statement: &'a mut Option<Statement<'db>>,
) -> Result<&'a mut Statement<'db>, Error> {
    match (state, statement.as_mut()) {
        (CursorState::Open, Some(statement)) => Ok(statement),
        (CursorState::Exhausted, _) => Err(Error::new(ErrorKind::NoCurrentResult)
            .with_message("the current result was already consumed")
            .with_hint("Re-run the query to read its rows again.")),
        _ => Err(Error::new(ErrorKind::NoCurrentResult).with_message("the result cursor is closed")),
    }
}

impl Drop for QueryCursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
