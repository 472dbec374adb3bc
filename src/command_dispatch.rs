//! Purpose: Parse one shell line and run it against the session.
//! Exports: `Flow`, `dispatch_line`.
//! Role: Keep `main.rs` focused on bootstrap; command wording and output live here.
//! Invariants: Lines that are not a shell command go to SQLite unchanged.
//! Invariants: Missing `import`/`export` arguments are prompted for, never guessed.
use std::path::Path;

use sqlbridge::api::{Error, ErrorKind, Session};

use crate::repl::{LineSource, render_outcome};

const HELP: &str = r#"Commands:
  import [FILE [TABLE]]   Create TABLE from the CSV file FILE
  export [FILE]           Write the most recent query result to FILE as CSV
  help                    Show this message
  exit | quit | .exit     Leave the shell
Anything else runs as SQL. Quote arguments containing spaces: import "my data.csv" data"#;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum Flow {
    Continue,
    Exit,
}

#[derive(Clone, Debug, PartialEq)]
enum ShellCommand {
    Blank,
    Import {
        file: Option<String>,
        table: Option<String>,
    },
    Export {
        file: Option<String>,
    },
    Help,
    Exit,
    Sql(String),
}

pub(super) fn dispatch_line(
    line: &str,
    session: &mut Session<'_>,
    lines: &mut LineSource,
) -> Result<Flow, Error> {
    match parse_command(line)? {
        ShellCommand::Blank => {}
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Exit => return Ok(Flow::Exit),
        ShellCommand::Import { file, table } => {
            let file = match file {
                Some(file) => file,
                None => lines.prompt("CSV file to import: ", "CSV file name")?,
            };
            let table = match table {
                Some(table) => table,
                None => lines.prompt("Table name: ", "table name")?,
            };
            let result = session.import(Path::new(&file), &table, |rows| {
                println!("Imported {rows} rows...");
            })?;
            let columns = result
                .columns
                .iter()
                .map(|column| format!("{} {}", column.name, column.data_type.sql_name()))
                .collect::<Vec<_>>();
            println!("Imported {} row(s).", result.row_count);
            println!(
                "Imported table \"{}\" with columns: {}",
                result.table_name,
                columns.join(", ")
            );
        }
        ShellCommand::Export { file } => {
            let file = match file {
                Some(file) => file,
                None => lines.prompt("CSV file to export to: ", "CSV file name")?,
            };
            let rows = session.export(Path::new(&file), |rows| {
                println!("Exported {rows} rows...");
            })?;
            println!("Exported {rows} row(s).");
        }
        ShellCommand::Sql(sql) => {
            let outcome = session.execute(&sql)?;
            println!("{}", render_outcome(&outcome));
        }
    }
    Ok(Flow::Continue)
}

fn parse_command(line: &str) -> Result<ShellCommand, Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ShellCommand::Blank);
    }
    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (trimmed, ""),
    };

    if word.eq_ignore_ascii_case("import") {
        let mut args = split_args(rest)?.into_iter();
        let command = ShellCommand::Import {
            file: args.next(),
            table: args.next(),
        };
        reject_extra(args, "import [FILE [TABLE]]")?;
        return Ok(command);
    }
    if word.eq_ignore_ascii_case("export") {
        let mut args = split_args(rest)?.into_iter();
        let command = ShellCommand::Export { file: args.next() };
        reject_extra(args, "export [FILE]")?;
        return Ok(command);
    }
    if rest.trim().is_empty() {
        if word.eq_ignore_ascii_case("help") {
            return Ok(ShellCommand::Help);
        }
        if ["exit", "quit", ".exit"]
            .iter()
            .any(|exit| word.eq_ignore_ascii_case(exit))
        {
            return Ok(ShellCommand::Exit);
        }
    }
    Ok(ShellCommand::Sql(trimmed.to_string()))
}

fn reject_extra(mut args: impl Iterator<Item = String>, usage: &str) -> Result<(), Error> {
    match args.next() {
        None => Ok(()),
        Some(extra) => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("unexpected argument '{extra}'"))
            .with_hint(format!("Usage: {usage}"))),
    }
}

/// Splits on whitespace; double quotes group a value and `""` inside quotes is a literal quote.
fn split_args(input: &str) -> Result<Vec<String>, Error> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => {
                in_quotes = true;
                in_arg = true;
            }
            ch if ch.is_whitespace() && !in_quotes => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            ch => {
                current.push(ch);
                in_arg = true;
            }
        }
    }

    if in_quotes {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("unterminated quote in command arguments")
            .with_hint("Close the quoted argument with a matching \"."));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::{ShellCommand, parse_command, split_args};
    use sqlbridge::api::ErrorKind;

    #[test]
    fn split_args_handles_quotes() {
        assert_eq!(
            split_args(r#"  "my data.csv"   people "#).unwrap(),
            vec!["my data.csv", "people"]
        );
        assert_eq!(split_args(r#""" x"#).unwrap(), vec!["", "x"]);
        assert_eq!(split_args(r#""say ""hi""""#).unwrap(), vec![r#"say "hi""#]);
        assert!(split_args("").unwrap().is_empty());
        assert_eq!(
            split_args(r#""open"#).unwrap_err().kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn commands_are_case_insensitive_and_sql_passes_through() {
        assert_eq!(
            parse_command("IMPORT people.csv people").unwrap(),
            ShellCommand::Import {
                file: Some("people.csv".to_string()),
                table: Some("people".to_string()),
            }
        );
        assert_eq!(
            parse_command("export").unwrap(),
            ShellCommand::Export { file: None }
        );
        assert_eq!(parse_command(".exit").unwrap(), ShellCommand::Exit);
        assert_eq!(parse_command("   ").unwrap(), ShellCommand::Blank);
        assert_eq!(
            parse_command(" SELECT 1 ").unwrap(),
            ShellCommand::Sql("SELECT 1".to_string())
        );
        assert_eq!(
            parse_command("help me").unwrap(),
            ShellCommand::Sql("help me".to_string())
        );
    }

    #[test]
    fn extra_arguments_are_usage_errors() {
        let err = parse_command("export a.csv b.csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.hint(), Some("Usage: export [FILE]"));
    }
}
