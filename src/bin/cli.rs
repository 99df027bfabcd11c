//! inkdb - CLI shell over the blog_system schema
//!
//! Usage: `inkdb-cli [config.json]`. Set `RUST_LOG` for engine logs.

use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{fmt, EnvFilter};

use inkdb::query::Select;
use inkdb::{blog, Database, EngineConfig, RowKey, Tuple, Value};

/// Print welcome banner
fn print_banner() {
    println!(
        r#"
 _       _       _ _
(_)_ __ | | __ _| | |__
| | '_ \| |/ _` | | '_ \
| | | | |   < (_| | | |_) |
|_|_| |_|_|\_\__,_|_|_.__/

 blog_system on inkdb
 Type '.help' for help, '.quit' to exit
"#
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help                     Show this help message
  .quit                     Exit
  .tables                   List all tables
  .schema [table]           Show table schema
  .select <table> [limit]   Show rows of a table
  .search <terms...>        Full-text search over posts
  .call <procedure> [args]  Call a stored procedure
  .delete <table> <key>     Delete a row (composite keys: a,b)
  .seed                     Add the demo user if missing

Examples:
  .call GetUserPosts aec92dd8-79dd-4b22-9deb-a2af00d568c8
  .search extraterrestrial
"#
    );
}

/// Format query results as a table
fn format_results(columns: &[String], rows: &[Tuple]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in rows {
        for (i, value) in row.values().iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in rows {
        let row_str: String = row
            .values()
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", v.to_string(), width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }
    if !rows.is_empty() {
        output.push_str(&separator);
    }
    output.push_str(&format!("{} row(s) returned\n", rows.len()));
    output
}

/// Integers stay integers, everything else is a string
fn parse_value(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) => Value::Integer(n),
        Err(_) => Value::from(raw),
    }
}

fn parse_key(raw: &str) -> RowKey {
    RowKey::new(raw.split(',').map(|part| parse_value(part.trim())).collect())
}

/// Handle one dot command; returns `false` to leave the shell
fn handle_command(line: &str, db: &Database) -> anyhow::Result<bool> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let catalog = db.catalog();

    match parts.first().copied() {
        Some(".help") => print_help(),
        Some(".quit") | Some(".exit") => return Ok(false),
        Some(".tables") => {
            println!("Tables:");
            for table in catalog.list_tables() {
                println!("  {}", table);
            }
        }
        Some(".schema") => {
            let tables = match parts.get(1) {
                Some(table) => vec![table.to_string()],
                None => catalog.list_tables(),
            };
            for table in tables {
                println!("{}", catalog.get_table_info(&table)?);
            }
        }
        Some(".select") => {
            let table = parts.get(1).context("usage: .select <table> [limit]")?;
            let mut query = Select::from(*table);
            if let Some(limit) = parts.get(2) {
                query = query.limit(limit.parse().context("limit must be a number")?);
            }
            let result = db.select(&query)?;
            print!("{}", format_results(&result.columns, &result.rows));
        }
        Some(".search") => {
            if parts.len() < 2 {
                anyhow::bail!("usage: .search <terms...>");
            }
            let terms = parts[1..].join(" ");
            let hits = db.search("posts", &terms)?;
            let def = catalog.get_table("posts")?;
            let title_idx = def.column_indices(&["title".to_string()])?[0];
            for hit in &hits {
                let title = hit.row.get(title_idx).cloned().unwrap_or(Value::Null);
                println!("{:>8.4}  {}  {}", hit.score, hit.key, title);
            }
            println!("{} match(es)", hits.len());
        }
        Some(".call") => {
            let name = parts.get(1).context("usage: .call <procedure> [args...]")?;
            let args = parts[2..].iter().map(|a| parse_value(a)).collect();
            let rows = db.call(name, args)?;
            let columns = rows.columns().to_vec();
            let rows: Vec<Tuple> = rows.collect();
            print!("{}", format_results(&columns, &rows));
        }
        Some(".delete") => {
            let (Some(table), Some(key)) = (parts.get(1), parts.get(2)) else {
                anyhow::bail!("usage: .delete <table> <key>");
            };
            let removed = db.transaction(|txn| txn.delete(table, parse_key(key)))?;
            println!("{} row(s) deleted", removed);
        }
        Some(".seed") => {
            if blog::seed_demo_data(db)? {
                println!("User {} added.", blog::DEMO_USERNAME);
            } else {
                println!("User already exists.");
            }
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Type '.help' for available commands.");
        }
        None => {}
    }
    Ok(true)
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).compact().init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => EngineConfig::default(),
    };
    let db = blog::open(config).context("failed to open blog_system")?;

    print_banner();
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("inkdb> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                match handle_command(line, &db) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("Goodbye!");
    Ok(())
}
