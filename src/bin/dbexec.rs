//! dbexec command-line interface
//!
//! Runs SQL statements against the configured database and prints the
//! normalized response as JSON.
//!
//! ```bash
//! dbexec --single-row --single-col "SELECT COUNT(*) FROM users"
//! dbexec --transaction "INSERT INTO t VALUES (1)" "INSERT INTO t VALUES (2)"
//! dbexec --persist --single-row=id "CREATE TEMP TABLE s AS SELECT 1 AS id" "SELECT * FROM s"
//! ```

use clap::Parser;
use dbexec::config::{default_config_path, load_config, ConfigFile};
use dbexec::core::debug::{DebugSetting, WriterSink};
use dbexec::core::{DbError, Result};
use dbexec::{QueryOptions, Session};
use serde_json::{json, Map};
use std::path::PathBuf;
use tracing::{info, Level};

/// Execute SQL statements and print JSON responses
#[derive(Parser, Debug)]
#[command(name = "dbexec", version, about)]
struct Args {
    /// Configuration file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep one connection open for all statements
    #[arg(long)]
    persist: bool,

    /// Run the statements as one transaction
    #[arg(long)]
    transaction: bool,

    /// Return only the first row, or a mapping keyed by FIELD
    #[arg(long, value_name = "FIELD", num_args = 0..=1, require_equals = true)]
    single_row: Option<Option<String>>,

    /// Reduce each row to its single column value
    #[arg(long)]
    single_col: bool,

    /// Keep only the last result set
    #[arg(long)]
    single_set: bool,

    /// Trace the next N calls (negative N skips |N| calls first)
    #[arg(long, value_name = "N", num_args = 0..=1, require_equals = true, allow_negative_numbers = true)]
    debug: Option<Option<i64>>,

    /// SQL statements, executed in order
    #[arg(required = true, value_name = "SQL")]
    statements: Vec<String>,
}

impl Args {
    fn query_options(&self) -> QueryOptions {
        let mut options = QueryOptions::new();
        match &self.single_row {
            Some(Some(field)) => options = options.keyed_by(field),
            Some(None) => options = options.first_row(),
            None => {}
        }
        if self.single_col {
            options = options.single_col();
        }
        if self.single_set {
            options = options.single_set();
        }
        options
    }

    fn debug_count(&self) -> Option<i64> {
        self.debug.map(|count| count.unwrap_or(1))
    }
}

fn configure_debug<D: dbexec::core::db::Driver>(session: &mut Session<D>, file: &ConfigFile, cli: Option<i64>) {
    if let Some(count) = cli {
        session.configure_debug(DebugSetting::from_count(count, None));
    } else if let Some(debug) = &file.debug {
        if let Some(calls) = debug.calls {
            session.configure_debug(DebugSetting::from_count(calls, debug.and_then));
        } else if let Some(enabled) = debug.enabled {
            session.configure_debug(enabled);
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let path = args
        .config
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| DbError::Config("No configuration file found".to_string()))?;
    let file = load_config(&path)?;
    info!("Loaded configuration from {}", path.display());

    let mut session = Session::sqlite(file.connection.clone()).with_debug_sink(Box::new(WriterSink::new(std::io::stderr())));
    configure_debug(&mut session, &file, args.debug_count());

    if args.transaction {
        let committed = session.run_transaction(args.statements)?;
        let report = json!({ "success": committed, "error": session.errors() });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(committed);
    }

    if args.persist && !session.connect(true, &Map::new()) {
        let report = json!({ "success": false, "error": session.errors() });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(false);
    }
    let options = args.query_options();
    let outcome = session.query(args.statements, &options)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if args.persist {
        session.close();
    }
    Ok(outcome.is_success())
}

fn main() {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    let level = if args.debug.is_some() { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbexec::core::db::RowReduction;

    fn parse(list: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("dbexec").chain(list.iter().copied()))
    }

    #[test]
    fn test_parse_flags() {
        let args = parse(&["--config", "c.toml", "--single-row=id", "--single-col", "--debug=-2", "SELECT 1", "SELECT 2"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        let options = args.query_options();
        assert_eq!(options.rows, RowReduction::KeyedByField("id".to_string()));
        assert!(options.single_col);
        assert_eq!(args.debug_count(), Some(-2));
        assert_eq!(args.statements.len(), 2);
    }

    #[test]
    fn test_bare_flags_take_no_value() {
        let args = parse(&["--single-row", "--debug", "SELECT 1"]).unwrap();
        assert_eq!(args.query_options().rows, RowReduction::FirstRowOnly);
        assert_eq!(args.debug_count(), Some(1));
        assert_eq!(args.statements, vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["--persist"]).is_err());
        assert!(parse(&["--bogus", "SELECT 1"]).is_err());
        assert!(parse(&["--debug=x", "SELECT 1"]).is_err());
        assert!(parse(&["SELECT 1", "--config"]).is_err());
    }
}
