//! Purpose: Stream a CSV file into a new SQLite table in two linear passes.
//! Exports: `ImportOptions`, `ImportResult`, `import_csv`.
//! Role: Import engine behind the REPL `import` command.
//! Invariants: Memory is O(columns): one reused record, one row of values, one type per column.
//! Invariants: Pass 1 fixes the schema before any row is inserted; no retyping afterwards.
//! Invariants: A failure after insertion starts keeps the rows already inserted (committed).
use std::fs::File;
use std::io;
use std::path::Path;

use csv::StringRecord;

use crate::core::db::{self, Database};
use crate::core::error::{Error, ErrorKind};
use crate::core::infer::{self, InferredType};
use crate::core::schema::{self, ColumnSpec};
use crate::core::value::Value;

pub const DEFAULT_BATCH_ROWS: u64 = 10_000;

#[derive(Copy, Clone, Debug)]
pub struct ImportOptions {
    /// Rows per committed batch; progress is reported after each full batch.
    pub batch_rows: u64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportResult {
    pub table_name: String,
    pub row_count: u64,
    pub columns: Vec<ColumnSpec>,
}

impl ImportResult {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

pub fn import_csv<P>(
    db: &Database,
    path: &Path,
    table_name: &str,
    options: ImportOptions,
    mut on_progress: P,
) -> Result<ImportResult, Error>
where
    P: FnMut(u64),
{
    validate_table_name(table_name)?;
    db::ensure_table_absent(db, table_name)?;

    let scan = scan_types(path)?;
    tracing::debug!(
        path = %path.display(),
        rows = scan.rows,
        columns = scan.header.len(),
        "inference pass complete"
    );

    let columns = schema::build(&scan.header, &scan.types).map_err(|err| err.with_path(path))?;
    db.create_table(table_name, &columns)?;

    let mut reader = open_reader(path)?;
    let mut record = StringRecord::new();
    if !read_record(&mut reader, &mut record, path)? {
        return Err(missing_header(path));
    }
    let row_count = insert_rows(
        db,
        &mut reader,
        path,
        table_name,
        &columns,
        options.batch_rows.max(1),
        &mut on_progress,
    )?;
    tracing::debug!(table = table_name, rows = row_count, "insert pass complete");

    Ok(ImportResult {
        table_name: table_name.to_string(),
        row_count,
        columns,
    })
}

fn validate_table_name(table_name: &str) -> Result<(), Error> {
    if table_name.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("table name is empty"));
    }
    if table_name.contains('"') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("table name may not contain a quotation mark")
            .with_hint(
                "The name is quoted automatically; enter a plain name rather than a quoted identifier.",
            ));
    }
    Ok(())
}

struct TypeScan {
    header: Vec<String>,
    types: Vec<InferredType>,
    rows: u64,
}

fn scan_types(path: &Path) -> Result<TypeScan, Error> {
    let mut reader = open_reader(path)?;
    let mut record = StringRecord::new();
    if !read_record(&mut reader, &mut record, path)? {
        return Err(missing_header(path));
    }
    let mut header: Vec<String> = record.iter().map(str::to_string).collect();
    if let Some(first) = header.first_mut() {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    let mut types = vec![InferredType::Null; header.len()];
    let mut rows = 0u64;
    while read_record(&mut reader, &mut record, path)? {
        check_width(&record, header.len(), path)?;
        for (ty, field) in types.iter_mut().zip(record.iter()) {
            *ty = infer::widen(*ty, infer::infer(field));
        }
        rows += 1;
    }

    Ok(TypeScan {
        header,
        types,
        rows,
    })
}

fn insert_rows<R, P>(
    db: &Database,
    reader: &mut csv::Reader<R>,
    path: &Path,
    table_name: &str,
    columns: &[ColumnSpec],
    batch_rows: u64,
    on_progress: &mut P,
) -> Result<u64, Error>
where
    R: io::Read,
    P: FnMut(u64),
{
    let mut record = StringRecord::new();
    let mut values = Vec::with_capacity(columns.len());
    let mut inserted = 0u64;
    let mut batch = db.begin_batch()?;
    loop {
        let step = next_row(reader, &mut record, &mut values, path, columns).and_then(|more| {
            if more {
                db.insert_row(table_name, &values)
                    .map_err(|err| at_line(err, &record))?;
            }
            Ok(more)
        });
        match step {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                if let Err(commit_err) = batch.commit() {
                    tracing::warn!(error = %commit_err, "failed to commit rows inserted before the error");
                }
                tracing::debug!(table = table_name, rows = inserted, "import aborted");
                return Err(err);
            }
        }
        inserted += 1;
        if inserted % batch_rows == 0 {
            batch.commit()?;
            on_progress(inserted);
            batch = db.begin_batch()?;
        }
    }
    batch.commit()?;
    Ok(inserted)
}

fn next_row<R: io::Read>(
    reader: &mut csv::Reader<R>,
    record: &mut StringRecord,
    values: &mut Vec<Value>,
    path: &Path,
    columns: &[ColumnSpec],
) -> Result<bool, Error> {
    if !read_record(reader, record, path)? {
        return Ok(false);
    }
    check_width(record, columns.len(), path)?;
    values.clear();
    for (column, field) in columns.iter().zip(record.iter()) {
        let value = Value::from_field(field, column.data_type).ok_or_else(|| {
            at_line(
                Error::new(ErrorKind::MalformedCsv)
                    .with_message(format!(
                        "value {field:?} in column \"{}\" does not fit its inferred type {}",
                        column.name,
                        column.data_type.sql_name()
                    ))
                    .with_hint("The file changed while it was being imported.")
                    .with_path(path),
                record,
            )
        })?;
        values.push(value);
    }
    Ok(true)
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, Error> {
    let file = File::open(path).map_err(|err| {
        let kind = if err.kind() == io::ErrorKind::NotFound {
            ErrorKind::FileNotFound
        } else {
            ErrorKind::Io
        };
        Error::new(kind)
            .with_message("failed to open CSV file")
            .with_path(path)
            .with_source(err)
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file))
}

fn read_record<R: io::Read>(
    reader: &mut csv::Reader<R>,
    record: &mut StringRecord,
    path: &Path,
) -> Result<bool, Error> {
    reader.read_record(record).map_err(|err| csv_error(err, path))
}

fn csv_error(err: csv::Error, path: &Path) -> Error {
    let line = err.position().map(|pos| pos.line());
    let kind = if err.is_io_error() {
        ErrorKind::Io
    } else {
        ErrorKind::MalformedCsv
    };
    let mut error = Error::new(kind)
        .with_message(format!("failed to read CSV record: {err}"))
        .with_path(path);
    if let Some(line) = line {
        error = error.with_line(line);
    }
    error.with_source(err)
}

fn check_width(record: &StringRecord, expected: usize, path: &Path) -> Result<(), Error> {
    if record.len() == expected {
        return Ok(());
    }
    Err(at_line(
        Error::new(ErrorKind::MalformedCsv)
            .with_message(format!(
                "expected {expected} fields like the header, found {}",
                record.len()
            ))
            .with_path(path),
        record,
    ))
}

fn at_line(err: Error, record: &StringRecord) -> Error {
    match record.position() {
        Some(pos) if err.line().is_none() => err.with_line(pos.line()),
        _ => err,
    }
}

fn missing_header(path: &Path) -> Error {
    Error::new(ErrorKind::MalformedCsv)
        .with_message("CSV file has no header row")
        .with_path(path)
}

#[cfg(test)]
mod tests {
    use super::{ImportOptions, import_csv, insert_rows};
    use crate::core::db::Database;
    use crate::core::error::ErrorKind;
    use crate::core::infer::InferredType;
    use crate::core::schema::ColumnSpec;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().expect("create tmp");
        tmp.write_all(contents.as_bytes()).expect("write");
        tmp.flush().expect("flush");
        tmp
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.prepare(&format!("SELECT COUNT(*) FROM \"{table}\""))
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn people_scenario() {
        let tmp = csv_file("name,age\nAlice,30\nBob,\nEve,25\n");
        let db = Database::open_in_memory().expect("open");
        let result = import_csv(&db, tmp.path(), "people", ImportOptions::default(), |_| {})
            .expect("import");

        assert_eq!(result.row_count, 3);
        assert_eq!(result.column_names(), ["name", "age"]);
        assert_eq!(result.columns[0].data_type, InferredType::Text);
        assert_eq!(result.columns[1].data_type, InferredType::Integer);

        let bob_age: Option<i64> = db
            .prepare("SELECT age FROM people WHERE name = 'Bob'")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(bob_age, None);
        let eve_type: String = db
            .prepare("SELECT typeof(age) FROM people WHERE name = 'Eve'")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(eve_type, "integer");
    }

    #[test]
    fn mixed_numeric_column_widens_to_real() {
        let tmp = csv_file("x\n1\n2.5\n\n3\n");
        let db = Database::open_in_memory().expect("open");
        let result =
            import_csv(&db, tmp.path(), "t", ImportOptions::default(), |_| {}).expect("import");
        assert_eq!(result.columns[0].data_type, InferredType::Real);
        let total: f64 = db
            .prepare("SELECT SUM(x) FROM t")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 6.5);
    }

    #[test]
    fn quoted_fields_may_span_lines() {
        let tmp = csv_file("id,note\n1,\"hello, \"\"world\"\"\nsecond line\"\n");
        let db = Database::open_in_memory().expect("open");
        let result =
            import_csv(&db, tmp.path(), "notes", ImportOptions::default(), |_| {}).expect("import");
        assert_eq!(result.row_count, 1);
        let note: String = db
            .prepare("SELECT note FROM notes")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(note, "hello, \"world\"\nsecond line");
    }

    #[test]
    fn width_mismatch_aborts_before_table_creation() {
        let tmp = csv_file("a,b\n1,2\n3\n4,5\n");
        let db = Database::open_in_memory().expect("open");
        let err = import_csv(&db, tmp.path(), "t", ImportOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedCsv);
        assert_eq!(err.line(), Some(3));
        assert!(!db.table_exists("t").unwrap());
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open_in_memory().expect("open");
        let err = import_csv(
            &db,
            &dir.path().join("nope.csv"),
            "t",
            ImportOptions::default(),
            |_| {},
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn empty_file_has_no_header() {
        let tmp = csv_file("");
        let db = Database::open_in_memory().expect("open");
        let err = import_csv(&db, tmp.path(), "t", ImportOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedCsv);
    }

    #[test]
    fn header_only_file_creates_empty_text_table() {
        let tmp = csv_file("\u{feff}a,b\n");
        let db = Database::open_in_memory().expect("open");
        let result =
            import_csv(&db, tmp.path(), "t", ImportOptions::default(), |_| {}).expect("import");
        assert_eq!(result.row_count, 0);
        assert_eq!(result.column_names(), ["a", "b"]);
        assert!(
            result
                .columns
                .iter()
                .all(|column| column.data_type == InferredType::Text)
        );
        assert_eq!(count(&db, "t"), 0);
    }

    #[test]
    fn existing_table_is_rejected_before_scanning() {
        let tmp = csv_file("a\n1\n");
        let db = Database::open_in_memory().expect("open");
        import_csv(&db, tmp.path(), "t", ImportOptions::default(), |_| {}).expect("first");
        let err = import_csv(&db, tmp.path(), "t", ImportOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableAlreadyExists);
        assert_eq!(count(&db, "t"), 1);
    }

    #[test]
    fn quoted_table_name_is_usage_error() {
        let tmp = csv_file("a\n1\n");
        let db = Database::open_in_memory().expect("open");
        let err =
            import_csv(&db, tmp.path(), "bad\"name", ImportOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn progress_reports_each_full_batch() {
        let mut contents = String::from("n\n");
        for n in 0..7 {
            contents.push_str(&format!("{n}\n"));
        }
        let tmp = csv_file(&contents);
        let db = Database::open_in_memory().expect("open");
        let mut seen = Vec::new();
        let result = import_csv(
            &db,
            tmp.path(),
            "t",
            ImportOptions { batch_rows: 3 },
            |rows| seen.push(rows),
        )
        .expect("import");
        assert_eq!(seen, vec![3u64, 6]);
        assert_eq!(result.row_count, 7);
        assert_eq!(count(&db, "t"), 7);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut tmp = NamedTempFile::new().expect("create tmp");
        tmp.write_all(b"a\n\xff\xfe\n").expect("write");
        tmp.flush().expect("flush");
        let db = Database::open_in_memory().expect("open");
        let err = import_csv(&db, tmp.path(), "t", ImportOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedCsv);
    }

    #[test]
    fn mismatch_during_insert_keeps_committed_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("partial.db");
        let db = Database::open(&db_path).expect("open");
        let columns = [ColumnSpec::new("n", InferredType::Integer)];
        db.create_table("nums", &columns).expect("create");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader("1\n2\n3,4\n5\n".as_bytes());
        let mut progress = Vec::new();
        let err = insert_rows(
            &db,
            &mut reader,
            Path::new("changed.csv"),
            "nums",
            &columns,
            10,
            &mut |n| progress.push(n),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedCsv);
        assert_eq!(err.line(), Some(3));
        assert!(progress.is_empty());

        // A second connection only sees committed rows.
        let other = Database::open(&db_path).expect("reopen");
        let count: i64 = other
            .prepare("SELECT COUNT(*) FROM nums")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
