//! Command-line behavior of the `dbexec` binary.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("app.db");
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
         INSERT INTO users (id, name) VALUES (1, 'a'), (2, 'b');",
    )
    .unwrap();

    let config = dir.path().join("config.toml");
    let toml = format!(
        "[connection]\nhost = \"localhost\"\ndatabase = {:?}\nuser = \"app\"\npassword = \"secret\"\n",
        db.to_string_lossy()
    );
    std::fs::write(&config, toml).unwrap();
    (dir, db, config)
}

fn count(db: &Path) -> i64 {
    rusqlite::Connection::open(db)
        .unwrap()
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap()
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_scalar_query_prints_json() {
    let (_dir, _db, config) = setup();
    let output = Command::cargo_bin("dbexec")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--single-row", "--single-col", "SELECT COUNT(*) FROM users"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["result"], 2);
}

#[test]
fn test_failing_statement_exits_with_one() {
    let (_dir, _db, config) = setup();
    let output = Command::cargo_bin("dbexec")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("SELECT * FROM missing")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["success"], false);
    assert!(json["result"].is_null());
    assert!(json["error"][0].as_str().unwrap().contains("no such table"));
}

#[test]
fn test_transaction_rolls_back() {
    let (_dir, db, config) = setup();
    let output = Command::cargo_bin("dbexec")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args([
            "--transaction",
            "INSERT INTO users (name) VALUES ('c')",
            "INSERT INTO users (name) VALUES ('a')",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["success"], false);
    assert_eq!(count(&db), 2);
}

#[test]
fn test_keyed_batch() {
    let (_dir, _db, config) = setup();
    let output = Command::cargo_bin("dbexec")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--persist", "--single-row=id", "--single-col", "SELECT 1 AS id, 'x' AS v", "SELECT id, name FROM users"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json[1]["result"]["2"], "b");
}

#[test]
fn test_missing_sql_prints_usage() {
    let output = Command::cargo_bin("dbexec").unwrap().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
    assert!(output.stdout.is_empty());
}
