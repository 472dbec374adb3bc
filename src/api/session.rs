//! Purpose: Query dispatcher that owns the current result between REPL commands.
//! Exports: `Session`, `SessionOptions`, `QueryOutcome`.
//! Role: Single entry point for SQL, import, and export used by the CLI.
//! Invariants: At most one live result cursor; a replaced cursor is finalized first.
//! Invariants: A failing query leaves the previous current result untouched.
use std::path::Path;

use crate::core::csv_export::{self, ExportOptions};
use crate::core::csv_import::{self, ImportOptions, ImportResult};
use crate::core::cursor::{QueryCursor, ResultPreview};
use crate::core::db::{Database, sql_error};
use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_PREVIEW_ROWS: usize = 20;

#[derive(Copy, Clone, Debug)]
pub struct SessionOptions {
    pub preview_rows: usize,
    pub import: ImportOptions,
    pub export: ExportOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            import: ImportOptions::default(),
            export: ExportOptions::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    Rows(ResultPreview),
    Modified(usize),
    Done,
}

pub struct Session<'db> {
    db: &'db Database,
    options: SessionOptions,
    current: Option<QueryCursor<'db>>,
}

impl<'db> Session<'db> {
    pub fn new(db: &'db Database, options: SessionOptions) -> Self {
        Self {
            db,
            options,
            current: None,
        }
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn current(&self) -> Option<&QueryCursor<'db>> {
        self.current.as_ref()
    }

    pub fn execute(&mut self, sql: &str) -> Result<QueryOutcome, Error> {
        let mut statement = self.db.prepare(sql)?;
        if statement.column_count() == 0 {
            let affected = statement.execute([]).map_err(sql_error)?;
            return Ok(if modifies_rows(sql) {
                QueryOutcome::Modified(affected)
            } else {
                QueryOutcome::Done
            });
        }

        let mut cursor = QueryCursor::new(sql, statement);
        let preview = cursor.preview(self.options.preview_rows)?;
        self.install(cursor);
        Ok(QueryOutcome::Rows(preview))
    }

    pub fn import<P>(
        &mut self,
        path: &Path,
        table_name: &str,
        on_progress: P,
    ) -> Result<ImportResult, Error>
    where
        P: FnMut(u64),
    {
        csv_import::import_csv(self.db, path, table_name, self.options.import, on_progress)
    }

    /// Exports the current result. The result is consumed; export again only after re-querying.
    pub fn export<P>(&mut self, path: &Path, on_progress: P) -> Result<u64, Error>
    where
        P: FnMut(u64),
    {
        let cursor = self.current.as_mut().ok_or_else(|| {
            Error::new(ErrorKind::NoCurrentResult)
                .with_message("you must run a SQL query before exporting")
                .with_hint("Run a SELECT query, then export its result.")
        })?;
        csv_export::export_result(cursor, path, self.options.export, on_progress)
    }

    /// Releases the current result, if any.
    pub fn close(&mut self) {
        if let Some(mut cursor) = self.current.take() {
            cursor.close();
        }
    }

    fn install(&mut self, cursor: QueryCursor<'db>) {
        if let Some(mut previous) = self.current.take() {
            tracing::debug!(sql = previous.sql(), "releasing previous result");
            previous.close();
        }
        self.current = Some(cursor);
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

fn modifies_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|ch: char| !ch.is_ascii_alphabetic())
        .next()
        .unwrap_or("");
    ["INSERT", "UPDATE", "DELETE", "REPLACE", "WITH"]
        .iter()
        .any(|dml| keyword.eq_ignore_ascii_case(dml))
}
