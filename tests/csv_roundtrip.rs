// Library-level scenarios: import a CSV, query it, export it, import the export again.
use sqlbridge::api::{
    Database, ErrorKind, InferredType, QueryOutcome, Session, SessionOptions, Value,
};

fn rows(db: &Database, sql: &str) -> Vec<Vec<Value>> {
    let mut session = Session::new(
        db,
        SessionOptions {
            preview_rows: 1_000,
            ..SessionOptions::default()
        },
    );
    match session.execute(sql).expect("query") {
        QueryOutcome::Rows(preview) => preview.rows,
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn export_then_reimport_preserves_rows() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("source.csv");
    std::fs::write(
        &source,
        "id,label,ratio\n1,\"plain\",0.5\n2,\"comma, inside\",\n3,\"line\nbreak\",2\n",
    )
    .expect("write csv");

    let db = Database::open(temp.path().join("db.sqlite")).expect("open");
    let mut session = Session::new(&db, SessionOptions::default());
    let imported = session
        .import(&source, "original", |_| {})
        .expect("import");
    assert_eq!(imported.row_count, 3);
    assert_eq!(
        imported
            .columns
            .iter()
            .map(|column| column.data_type)
            .collect::<Vec<_>>(),
        [InferredType::Integer, InferredType::Text, InferredType::Real]
    );

    session
        .execute("SELECT id, label, ratio FROM original ORDER BY id")
        .expect("select");
    let exported = temp.path().join("exported.csv");
    assert_eq!(session.export(&exported, |_| {}).expect("export"), 3);

    session
        .import(&exported, "copy", |_| {})
        .expect("reimport");
    drop(session);

    let original = rows(&db, "SELECT id, label, ratio FROM original ORDER BY id");
    let copy = rows(&db, "SELECT id, label, ratio FROM copy ORDER BY id");
    assert_eq!(original, copy);
    assert_eq!(copy[1][2], Value::Null);
    assert_eq!(copy[2][1], Value::Text("line\nbreak".to_string()));
}

#[test]
fn duplicate_headers_get_suffixes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("dupes.csv");
    std::fs::write(&source, "First Name,first name,Total ($)\nAda,Lovelace,10\n")
        .expect("write csv");

    let db = Database::open_in_memory().expect("open");
    let mut session = Session::new(&db, SessionOptions::default());
    let imported = session.import(&source, "names", |_| {}).expect("import");
    assert_eq!(
        imported.column_names(),
        ["first_name", "first_name_2", "total_"]
    );
}

#[test]
fn batches_commit_and_report_progress() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("numbers.csv");
    let mut text = String::from("n\n");
    for n in 0..25 {
        text.push_str(&format!("{n}\n"));
    }
    std::fs::write(&source, text).expect("write csv");

    let db = Database::open_in_memory().expect("open");
    let mut options = SessionOptions::default();
    options.import.batch_rows = 10;
    let mut session = Session::new(&db, options);
    let mut progress = Vec::new();
    let imported = session
        .import(&source, "numbers", |n| progress.push(n))
        .expect("import");
    assert_eq!(imported.row_count, 25);
    assert_eq!(progress, vec![10u64, 20]);
    drop(session);

    assert_eq!(
        rows(&db, "SELECT COUNT(*), SUM(n) FROM numbers"),
        vec![vec![Value::Integer(25), Value::Integer(300)]]
    );
}

#[test]
fn inconsistent_rows_leave_no_table() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("ragged.csv");
    std::fs::write(&source, "a,b\n1,2\n3,4,5\n").expect("write csv");

    let db = Database::open_in_memory().expect("open");
    let mut session = Session::new(&db, SessionOptions::default());
    let err = session.import(&source, "ragged", |_| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedCsv);
    assert_eq!(err.line(), Some(3));
    assert!(!db.table_exists("ragged").expect("lookup"));
}
