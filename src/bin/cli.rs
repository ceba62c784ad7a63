//! FileDB - CLI Client

use anyhow::{bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::path::PathBuf;

use filedb::config::DEFAULT_DATA_DIR;
use filedb::storage::Record;
use filedb::Database;

/// Print welcome banner
fn print_banner(db: &Database) {
    println!(
        r#"
 FileDB - a file-per-record store
 Data directory: {}
 Type '.help' for help, '.quit' to exit
"#,
        db.config().root().display()
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help              Show this help message
  .quit              Exit FileDB
  .tables [--json]   List entity types with record counts
  .schema [table]    Show entity type declarations
  .reload <table>    Re-read an entity type from disk

Instructions:
  [get|all|run] <instruction> [| <param>, <param>, ...]

  Parameters are JSON values bound to `?` in order. Without a prefix,
  SELECT runs as `all` and everything else as `run`.

Examples:
  run INSERT INTO tasks (id, name) VALUES (?, ?) | "t1", "Demo"
  all SELECT * FROM stages WHERE task_id = ? ORDER BY idx | "t1"
  get SELECT COUNT(*) AS n FROM issues WHERE status = ? | "open"
  run DELETE FROM changelogs WHERE created_at < ? | "2024-01-01T00:00:00.000Z"
"#
    );
}

/// Format records as a table; columns are the union of their fields
fn format_results(records: &[Record]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for field in record.keys() {
            if !columns.contains(&field.as_str()) {
                columns.push(field);
            }
        }
    }

    let cell = |record: &Record, column: &str| match record.get(column) {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    // Calculate column widths
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for record in records {
        for (i, column) in columns.iter().enumerate() {
            widths[i] = widths[i].max(cell(record, *column).len());
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    if !columns.is_empty() {
        output.push_str(&separator);
        let header: String = columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", header));
        output.push_str(&separator);

        for record in records {
            let row: String = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!(" {:<width$} ", cell(record, *c), width = *w))
                .collect::<Vec<_>>()
                .join("|");
            output.push_str(&format!("|{}|\n", row));
        }
        output.push_str(&separator);
    }

    output.push_str(&format!("{} record(s) returned\n", records.len()));
    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Get,
    All,
    Run,
}

/// Split an input line into mode, instruction text and parameters
fn parse_line(line: &str) -> Result<(Mode, &str, Vec<Value>)> {
    let (body, params) = match line.split_once('|') {
        Some((body, params)) => (body.trim(), params.trim()),
        None => (line.trim(), ""),
    };

    let params: Vec<Value> = if params.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&format!("[{}]", params))
            .with_context(|| format!("parameters are not a JSON list: {}", params))?
    };

    let (first, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    let (mode, sql) = match first.to_ascii_lowercase().as_str() {
        "get" => (Mode::Get, rest.trim()),
        "all" => (Mode::All, rest.trim()),
        "run" => (Mode::Run, rest.trim()),
        "select" => (Mode::All, body),
        _ => (Mode::Run, body),
    };
    if sql.is_empty() {
        bail!("missing instruction");
    }

    Ok((mode, sql, params))
}

/// Execute one instruction line
fn execute_line(db: &Database, line: &str) -> Result<()> {
    let (mode, sql, params) = parse_line(line)?;
    let stmt = db.prepare(sql);
    if stmt.is_noop() {
        println!("(no-op: instruction not recognized)");
    }

    match mode {
        Mode::Get => match stmt.get(&params)? {
            Some(record) => print!("{}", format_results(&[record])),
            None => println!("(none)"),
        },
        Mode::All => print!("{}", format_results(&stmt.all(&params)?)),
        Mode::Run => {
            let result = stmt.run(&params)?;
            match result.inserted_key {
                Some(key) => println!("{} change(s), key {}", result.changes, key.to_value()),
                None => println!("{} change(s)", result.changes),
            }
        }
    }
    Ok(())
}

/// Handle special dot commands. Returns false when the REPL should stop.
fn handle_special_command(cmd: &str, db: &Database) -> Result<bool> {
    let parts: Vec<&str> = cmd.split_whitespace().collect();

    match parts.first().copied() {
        Some(".help") => print_help(),
        Some(".quit") | Some(".exit") => return Ok(false),
        Some(".tables") => {
            let stats = db.stats()?;
            if parts.get(1) == Some(&"--json") {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                for stats in stats {
                    println!("  {:<12} {:>6} record(s)  {}", stats.name, stats.records, stats.dir.display());
                }
            }
        }
        Some(".schema") => match parts.get(1) {
            Some(table) => println!("{}", db.catalog().describe(table)?),
            None => {
                for name in db.catalog().names() {
                    println!("{}", db.catalog().describe(name)?);
                }
            }
        },
        Some(".reload") => match parts.get(1) {
            Some(table) => println!("{} record(s) loaded", db.reload(table)?),
            None => eprintln!("Usage: .reload <table>"),
        },
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Type '.help' for available commands.");
        }
        None => {}
    }
    Ok(true)
}

/// Data directory from `--data-dir <path>` / `-d <path>`
fn data_dir_from_args() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--data-dir" || a == "-d")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Main REPL loop
fn run_repl(db: &Database) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    print_banner(db);

    loop {
        let line = match editor.readline("filedb> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        let outcome = if trimmed.starts_with('.') {
            match handle_special_command(trimmed, db) {
                Ok(true) => Ok(()),
                Ok(false) => break,
                Err(e) => Err(e),
            }
        } else {
            execute_line(db, trimmed)
        };
        if let Err(e) = outcome {
            eprintln!("Error: {:#}", e);
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let data_dir = data_dir_from_args();
    let db = Database::open_default(&data_dir)
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;

    run_repl(&db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_line_modes() {
        let (mode, sql, params) = parse_line("get SELECT * FROM tasks WHERE id = ? | \"t1\"").unwrap();
        assert_eq!(mode, Mode::Get);
        assert_eq!(sql, "SELECT * FROM tasks WHERE id = ?");
        assert_eq!(params, vec![json!("t1")]);

        let (mode, _, params) = parse_line("SELECT * FROM tasks").unwrap();
        assert_eq!(mode, Mode::All);
        assert!(params.is_empty());

        let (mode, _, params) =
            parse_line("INSERT INTO stages (task_id, idx) VALUES (?, ?) | \"t1\", 0").unwrap();
        assert_eq!(mode, Mode::Run);
        assert_eq!(params, vec![json!("t1"), json!(0)]);
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(parse_line("run").is_err());
        assert!(parse_line("all SELECT * FROM tasks | not json").is_err());
    }

    #[test]
    fn test_format_results() {
        let records = vec![
            filedb::storage::record_from([("id", json!("t1")), ("name", json!("Demo"))]),
            filedb::storage::record_from([("id", json!("t2")), ("done", json!(1))]),
        ];
        let output = format_results(&records);
        assert!(output.contains("| id | name | done |"));
        assert!(output.ends_with("2 record(s) returned\n"));
    }
}
