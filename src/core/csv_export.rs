//! Purpose: Stream the current query result into a CSV file.
//! Exports: `ExportOptions`, `export_result`.
//! Role: Export engine behind the REPL `export` command.
//! Invariants: At most one row is buffered at a time; fields are written as they are read.
//! Invariants: The writer is flushed on success and on failure.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::cursor::QueryCursor;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

pub const DEFAULT_PROGRESS_ROWS: u64 = 10_000;

#[derive(Copy, Clone, Debug)]
pub struct ExportOptions {
    pub progress_rows: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            progress_rows: DEFAULT_PROGRESS_ROWS,
        }
    }
}

pub fn export_result<P>(
    cursor: &mut QueryCursor<'_>,
    path: &Path,
    options: ExportOptions,
    mut on_progress: P,
) -> Result<u64, Error>
where
    P: FnMut(u64),
{
    if !cursor.is_open() {
        return Err(no_current_result());
    }

    let file = File::create(path).map_err(|err| {
        Error::new(ErrorKind::FileWrite)
            .with_message("failed to create CSV file")
            .with_path(path)
            .with_source(err)
    })?;
    let mut writer = csv::WriterBuilder::new().from_writer(BufWriter::new(file));

    let progress_rows = options.progress_rows.max(1);
    let mut field = String::new();
    let result = writer
        .write_record(cursor.columns())
        .map_err(|err| write_error(err, path))
        .and_then(|()| {
            let mut written = 0u64;
            cursor.for_each_row(|row| {
                write_row(&mut writer, row, &mut field).map_err(|err| write_error(err, path))?;
                written += 1;
                if written % progress_rows == 0 {
                    on_progress(written);
                }
                Ok(())
            })
        });

    let flushed = writer.flush().map_err(|err| {
        Error::new(ErrorKind::FileWrite)
            .with_message("failed to flush CSV file")
            .with_path(path)
            .with_source(err)
    });
    let rows = result?;
    flushed?;
    tracing::debug!(path = %path.display(), rows, "export complete");
    Ok(rows)
}

fn write_row<W: Write>(
    writer: &mut csv::Writer<W>,
    row: &[Value],
    field: &mut String,
) -> Result<(), csv::Error> {
    for value in row {
        field.clear();
        value.write_text(field);
        writer.write_field(field.as_str())?;
    }
    writer.write_record(None::<&[u8]>)
}

fn write_error(err: csv::Error, path: &Path) -> Error {
    Error::new(ErrorKind::FileWrite)
        .with_message(format!("failed to write CSV record: {err}"))
        .with_path(path)
        .with_source(err)
}

fn no_current_result() -> Error {
    Error::new(ErrorKind::NoCurrentResult)
        .with_message("no query result to export")
        .with_hint("Run a SELECT query first; each result can be exported once.")
}
