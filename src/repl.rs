//! Purpose: Line input for the shell and human rendering of query outcomes.
//! Exports: `LineSource`, `render_table`, `render_outcome`.
//! Role: Terminal edge of the binary; everything here writes to stdout or reads stdin.
//! Invariants: `read_line` returns `None` only at end of input.
use std::collections::VecDeque;
use std::io::{self, IsTerminal};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sqlbridge::api::{Error, ErrorKind, QueryOutcome, ResultPreview};

pub(super) enum LineSource {
    Editor(Box<DefaultEditor>),
    Piped(io::Lines<io::StdinLock<'static>>),
    Scripted(VecDeque<String>),
}

impl LineSource {
    /// Line editor when stdin is a terminal, plain lines otherwise.
    pub(super) fn from_stdin() -> Result<Self, Error> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Ok(LineSource::Piped(stdin.lines()));
        }
        let editor = DefaultEditor::new().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to start line editor")
                .with_source(err)
        })?;
        Ok(LineSource::Editor(Box::new(editor)))
    }

    pub(super) fn scripted(commands: Vec<String>) -> Self {
        LineSource::Scripted(commands.into())
    }

    pub(super) fn is_interactive(&self) -> bool {
        matches!(self, LineSource::Editor(_))
    }

    pub(super) fn read_line(&mut self, prompt: &str) -> Result<Option<String>, Error> {
        match self {
            LineSource::Editor(editor) => match editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    Ok(Some(line))
                }
                // Ctrl-C abandons the current line only.
                Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
                Err(ReadlineError::Eof) => Ok(None),
                Err(err) => Err(Error::new(ErrorKind::Io)
                    .with_message("failed to read input line")
                    .with_source(err)),
            },
            LineSource::Piped(lines) => match lines.next() {
                Some(Ok(line)) => Ok(Some(line)),
                Some(Err(err)) => Err(Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)),
                None => Ok(None),
            },
            LineSource::Scripted(commands) => Ok(commands.pop_front()),
        }
    }

    /// Asks for a missing command argument. Scripted runs never prompt.
    pub(super) fn prompt(&mut self, prompt: &str, what: &str) -> Result<String, Error> {
        if let LineSource::Scripted(_) = self {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("missing {what}"))
                .with_hint("Pass every argument inline when using --command."));
        }
        match self.read_line(prompt)? {
            Some(line) if !line.trim().is_empty() => Ok(line.trim().to_string()),
            _ => Err(Error::new(ErrorKind::Usage).with_message(format!("missing {what}"))),
        }
    }
}

pub(super) fn render_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Rows(preview) => render_preview(preview),
        QueryOutcome::Modified(count) => format!("Modified {count} row(s)."),
        QueryOutcome::Done => "Done.".to_string(),
    }
}

fn render_preview(preview: &ResultPreview) -> String {
    let headers = preview.columns.iter().map(String::as_str).collect::<Vec<_>>();
    if preview.rows.is_empty() {
        return format!("{}\nQuery returned zero rows.", render_table(&headers, &[]));
    }
    let rows = preview
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let footer = if preview.truncated {
        format!("Output first {} rows.", preview.rows.len())
    } else {
        format!("Output all {} row(s).", preview.rows.len())
    };
    format!("{}\n{footer}", render_table(&headers, &rows))
}

pub(super) fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let column_count = headers.len();
    let mut sanitized_rows = Vec::with_capacity(rows.len());
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        let mut sanitized = Vec::with_capacity(column_count);
        for (idx, width) in widths.iter_mut().enumerate() {
            let value = row.get(idx).map(String::as_str).unwrap_or("");
            let cleaned = sanitize_table_cell(value);
            *width = (*width).max(cleaned.chars().count());
            sanitized.push(cleaned);
        }
        sanitized_rows.push(sanitized);
    }

    let mut lines = Vec::with_capacity(sanitized_rows.len() + 2);
    lines.push(format_table_line(
        &headers
            .iter()
            .map(|header| sanitize_table_cell(header))
            .collect::<Vec<_>>(),
        &widths,
    ));
    lines.push(format_rule(&widths));
    for row in sanitized_rows {
        lines.push(format_table_line(&row, &widths));
    }
    lines.join("\n")
}

fn sanitize_table_cell(value: &str) -> String {
    value.replace('\n', "\\n").replace('\r', "\\r")
}

fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (idx, width) in widths.iter().enumerate() {
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push(' ');
        line.push_str(cell);
        let cell_len = cell.chars().count();
        if *width > cell_len {
            line.push_str(&" ".repeat(*width - cell_len));
        }
        line.push_str(" |");
    }
    line
}

fn format_rule(widths: &[usize]) -> String {
    let mut line = String::from("|");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('|');
    }
    line
}
