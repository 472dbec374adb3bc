//! Purpose: Thin collaborator over an SQLite connection (`rusqlite`).
//! Exports: `Database`, `Batch`, `quote_identifier`, `sql_error`.
//! Role: The only place that issues DDL/DML on behalf of the import path.
//! Invariants: Identifiers are always double-quoted with embedded quotes doubled.
//! Invariants: Engine failures surface as `ErrorKind::Sql` carrying the engine message.
use std::path::{Path, PathBuf};

use rusqlite::{Connection, Statement, Transaction, params_from_iter};

use crate::core::error::{Error, ErrorKind};
use crate::core::schema::ColumnSpec;
use crate::core::value::Value;

pub fn sql_error(err: rusqlite::Error) -> Error {
    Error::new(ErrorKind::Sql)
        .with_message(err.to_string())
        .with_source(err)
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to open database")
                .with_path(path)
                .with_source(err)
        })?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(sql_error)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Prepares exactly one statement. Trailing whitespace and comments are allowed;
    /// a second statement is rejected before anything runs.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>, Error> {
        let mut statements = rusqlite::Batch::new(&self.conn, sql);
        let statement = statements.next().map_err(sql_error)?.ok_or_else(|| {
            Error::new(ErrorKind::Sql).with_message("no SQL statement to execute")
        })?;
        match statements.next() {
            Ok(None) => Ok(statement),
            Ok(Some(_)) | Err(_) => Err(Error::new(ErrorKind::Sql)
                .with_message("You can only execute one statement at a time.")
                .with_hint("Run each statement on its own line.")),
        }
    }

    /// True when a table or view with this name exists (SQLite names are case-insensitive).
    pub fn table_exists(&self, name: &str) -> Result<bool, Error> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE)",
                [name],
                |row| row.get::<_, bool>(0),
            )
            .map_err(sql_error)
    }

    pub fn create_table(&self, name: &str, columns: &[ColumnSpec]) -> Result<(), Error> {
        if columns.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("table \"{name}\" needs at least one column")));
        }
        if self.table_exists(name)? {
            return Err(table_exists_error(name));
        }
        let column_sql = columns
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    quote_identifier(&column.name),
                    column.data_type.sql_name()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("CREATE TABLE {} ({column_sql})", quote_identifier(name));
        tracing::debug!(%sql, "creating table");
        self.conn.execute(&sql, []).map_err(sql_error)?;
        Ok(())
    }

    pub fn insert_row(&self, table: &str, values: &[Value]) -> Result<(), Error> {
        let placeholders = (1..=values.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} VALUES ({placeholders})",
            quote_identifier(table)
        );
        let mut statement = self.conn.prepare_cached(&sql).map_err(sql_error)?;
        statement
            .execute(params_from_iter(values.iter()))
            .map_err(sql_error)?;
        Ok(())
    }

    /// Opens a write batch. Inside a user-opened transaction the batch is a no-op
    /// so that the user's own COMMIT/ROLLBACK stays in charge.
    pub fn begin_batch(&self) -> Result<Batch<'_>, Error> {
        if !self.conn.is_autocommit() {
            return Ok(Batch { tx: None });
        }
        let tx = self.conn.unchecked_transaction().map_err(sql_error)?;
        Ok(Batch { tx: Some(tx) })
    }

    pub fn close(self) -> Result<(), Error> {
        self.conn.close().map_err(|(_, err)| {
            Error::new(ErrorKind::Io)
                .with_message("failed to close database")
                .with_source(err)
        })
    }
}

fn table_exists_error(name: &str) -> Error {
    Error::new(ErrorKind::TableAlreadyExists)
        .with_message(format!("table \"{name}\" already exists"))
        .with_hint("Pick another table name or DROP the existing table first.")
}

pub(crate) fn ensure_table_absent(db: &Database, name: &str) -> Result<(), Error> {
    if db.table_exists(name)? {
        return Err(table_exists_error(name));
    }
    Ok(())
}

/// A group of inserts committed together.
pub struct Batch<'db> {
    tx: Option<Transaction<'db>>,
}

impl Batch<'_> {
    pub fn commit(self) -> Result<(), Error> {
        match self.tx {
            Some(tx) => tx.commit().map_err(sql_error),
            None => Ok(()),
        }
    }
}
