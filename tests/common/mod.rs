#![allow(dead_code)]

use std::sync::Arc;

use inkdb::query::Select;
use inkdb::{blog, Database, ManualClock, Result, RowKey, Transaction, Value};

pub const T0: i64 = 1_700_000_000_000;

/// A fresh blog_system database on a manual clock
pub fn blog_db() -> (Database, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let db = blog::in_memory().unwrap().with_clock(clock.clone());
    (db, clock)
}

pub fn add_user(txn: &mut Transaction<'_>, id: &str, username: &str) -> Result<RowKey> {
    let email = format!("{}@example.com", username);
    txn.insert(
        "users",
        [
            ("id", Value::from(id)),
            ("username", Value::from(username)),
            ("email", Value::from(email)),
        ],
    )
}

pub fn add_post(
    txn: &mut Transaction<'_>,
    id: &str,
    user_id: &str,
    title: &str,
    summary: Option<&str>,
    content: &str,
) -> Result<RowKey> {
    txn.insert(
        "posts",
        [
            ("id", Value::from(id)),
            ("user_id", Value::from(user_id)),
            ("title", Value::from(title)),
            ("summary", Value::from(summary)),
            ("main_content", Value::from(content)),
        ],
    )
}

pub fn add_comment(txn: &mut Transaction<'_>, id: i64, post_id: &str, user_id: &str) -> Result<RowKey> {
    txn.insert(
        "comments",
        [
            ("id", Value::from(id)),
            ("post_id", Value::from(post_id)),
            ("user_id", Value::from(user_id)),
            ("content", Value::from("nice post")),
        ],
    )
}

/// Committed row count of a table
pub fn count(db: &Database, table: &str) -> usize {
    db.select(&Select::from(table)).unwrap().len()
}

/// Values of one column over the committed rows, in key order
pub fn column(db: &Database, table: &str, name: &str) -> Vec<Value> {
    db.select(&Select::from(table).columns([name]))
        .unwrap()
        .rows
        .into_iter()
        .flat_map(|row| row.into_values())
        .collect()
}
