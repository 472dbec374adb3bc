//! Purpose: `sqlbridge` CLI entry point: open the database and run the command loop.
//! Role: Binary crate root; parses args, sets up logging, hands lines to `command_dispatch`.
//! Invariants: Errors inside the loop are reported and the loop continues.
//! Invariants: Errors are human text on a terminal stderr, one JSON object per line otherwise.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod repl;

use command_dispatch::Flow;
use repl::LineSource;
use sqlbridge::api::{
    Database, Error, ErrorKind, ExportOptions, ImportOptions, Session, SessionOptions,
    to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run `sqlbridge --help` for usage."),
                    ColorMode::Auto,
                ));
            }
        },
    };
    init_tracing();

    let color_mode = cli.color;
    let db = Database::open(&cli.db)
        .map_err(add_hints)
        .map_err(|err| (err, color_mode))?;
    let options = SessionOptions {
        preview_rows: cli.preview_rows,
        import: ImportOptions {
            batch_rows: cli.batch_rows,
        },
        export: ExportOptions {
            progress_rows: cli.batch_rows,
        },
    };
    let mut session = Session::new(&db, options);

    let result = if cli.commands.is_empty() {
        LineSource::from_stdin()
            .and_then(|mut lines| run_loop(&mut session, &mut lines, color_mode))
    } else {
        let mut lines = LineSource::scripted(cli.commands);
        run_script(&mut session, &mut lines)
    };

    session.close();
    drop(session);
    if let Err(err) = db.close() {
        tracing::warn!(error = %err, "database did not close cleanly");
    }

    result
        .map_err(add_hints)
        .map_err(|err| (err, color_mode))
}

/// Reads commands until EOF or `exit`; every error is reported and the loop continues.
fn run_loop(
    session: &mut Session<'_>,
    lines: &mut LineSource,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    if lines.is_interactive() {
        println!("Enter \"import\", \"export\", or a SQL query. Type \"help\" for more.");
    }
    while let Some(line) = lines.read_line("> ")? {
        match command_dispatch::dispatch_line(&line, session, lines) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(err) => emit_error(&add_hints(err), color_mode),
        }
    }
    Ok(RunOutcome::ok())
}

/// Runs `--command` arguments in order; the first error ends the run.
fn run_script(session: &mut Session<'_>, lines: &mut LineSource) -> Result<RunOutcome, Error> {
    while let Some(line) = lines.read_line("")? {
        if let Flow::Exit = command_dispatch::dispatch_line(&line, session, lines)? {
            break;
        }
    }
    Ok(RunOutcome::ok())
}

#[derive(Parser)]
#[command(
    name = "sqlbridge",
    version,
    about = "Run SQL against an SQLite file and stream CSV files in and out of it",
    after_help = r#"COMMANDS (inside the shell)
  import [FILE [TABLE]]   Create TABLE from a CSV file (prompts for missing arguments)
  export [FILE]           Write the most recent query result to a CSV file
  help                    Show the command summary
  exit                    Leave the shell
  anything else           Run as SQL

EXAMPLES
  $ sqlbridge data.db
  $ sqlbridge data.db -c 'import people.csv people' -c 'SELECT COUNT(*) FROM people'
  $ echo 'SELECT 1.5 AS x' | sqlbridge data.db"#
)]
struct Cli {
    #[arg(
        default_value = "sqlite.db",
        help = "SQLite database file (created if missing)",
        value_hint = ValueHint::FilePath
    )]
    db: PathBuf,
    #[arg(
        short = 'c',
        long = "command",
        value_name = "CMD",
        help = "Run this shell command and exit (repeatable, runs in order)"
    )]
    commands: Vec<String>,
    #[arg(
        long,
        default_value_t = SessionOptions::default().preview_rows,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
        help = "Rows shown after a query"
    )]
    preview_rows: usize,
    #[arg(
        long,
        default_value_t = ImportOptions::default().batch_rows,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Rows per import commit and per progress line"
    )]
    batch_rows: u64,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn add_hints(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::FileNotFound => err.with_hint("Check the file name and working directory."),
        ErrorKind::FileWrite => {
            err.with_hint("Check that the directory exists and is writable, and that disk space remains.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and permissions."),
        ErrorKind::Internal => err.with_hint(
            "Unexpected internal failure. Retry with RUST_LOG=debug and share the command if it persists.",
        ),
        _ => err,
    }
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::FileNotFound => "file not found".to_string(),
        ErrorKind::FileWrite => "could not write file".to_string(),
        ErrorKind::MalformedCsv => "malformed CSV".to_string(),
        ErrorKind::TableAlreadyExists => "table already exists".to_string(),
        ErrorKind::NoCurrentResult => "no current result".to_string(),
        ErrorKind::Sql => "SQL error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(line) = err.line() {
        lines.push(format!(
            "{} {line}",
            colorize_label("line:", use_color, AnsiColor::Yellow)
        ));
    }

    // SQL error messages already carry the engine text.
    let causes = match err.kind() {
        ErrorKind::Sql => Vec::new(),
        _ => error_causes(err),
    };
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{error_json, error_text};
    use sqlbridge::api::{Error, ErrorKind};

    #[test]
    fn error_json_carries_kind_hint_and_line() {
        let err = Error::new(ErrorKind::MalformedCsv)
            .with_message("expected 2 fields like the header, found 1")
            .with_hint("fix the row")
            .with_path("people.csv")
            .with_line(3);
        let value = error_json(&err);
        let inner = value.get("error").and_then(|v| v.as_object()).expect("error");
        assert_eq!(inner["kind"], "MalformedCsv");
        assert_eq!(inner["hint"], "fix the row");
        assert_eq!(inner["path"], "people.csv");
        assert_eq!(inner["line"], 3);
    }

    #[test]
    fn error_text_without_color_is_plain() {
        let err = Error::new(ErrorKind::NoCurrentResult)
            .with_message("you must run a SQL query before exporting");
        assert_eq!(
            error_text(&err, false),
            "error: you must run a SQL query before exporting"
        );
    }
}
