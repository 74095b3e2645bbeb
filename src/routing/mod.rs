//! Decide whether a statement has to go through the native query path (it may return rows)
//! or the execute path (it returns an affected-row count).
//!
//! Classification runs a small tokenizer over the text so that keywords inside string
//! literals, comments and quoted identifiers are ignored. It errs toward
//! [`StatementKind::Rows`]: a spurious empty result set is harmless, silently dropping a
//! row set is not.

mod parsers;
mod scanner;

use serde::Serialize;

use scanner::Words;

/// Native path a statement must take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    /// May produce rows; use the query path and drain it.
    Rows,
    /// Produces an affected-row count only.
    RowCount,
}

/// Leading keyword category of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Begin,
    Commit,
    Rollback,
    Savepoint,
    Release,
    Pragma,
    Explain,
    With,
    Other,
}

const ROW_LEADERS: [&str; 5] = ["SELECT", "WITH", "EXPLAIN", "VALUES", "PRAGMA"];

/// Route a statement.
///
/// ```rust
/// use libsql_bridge::routing::{StatementKind, classify};
///
/// assert_eq!(classify("  -- lookup\n select 1"), StatementKind::Rows);
/// assert_eq!(classify("delete from t returning id"), StatementKind::Rows);
/// assert_eq!(classify("insert into t values ('returning')"), StatementKind::RowCount);
/// ```
#[must_use]
pub fn classify(sql: &str) -> StatementKind {
    let mut words = Words::new(sql);
    let Some(first) = words.next() else {
        return StatementKind::RowCount;
    };
    if ROW_LEADERS.iter().any(|k| first.eq_ignore_ascii_case(k))
        || words.any(|w| w.eq_ignore_ascii_case("RETURNING"))
    {
        StatementKind::Rows
    } else {
        StatementKind::RowCount
    }
}

/// Shorthand for `classify(sql) == StatementKind::Rows`.
#[must_use]
pub fn should_use_query(sql: &str) -> bool {
    classify(sql) == StatementKind::Rows
}

#[must_use]
pub fn detect_query_type(sql: &str) -> QueryType {
    let Some(first) = Words::new(sql).next() else {
        return QueryType::Other;
    };
    let table = [
        ("SELECT", QueryType::Select),
        ("VALUES", QueryType::Select),
        ("INSERT", QueryType::Insert),
        ("REPLACE", QueryType::Insert),
        ("UPDATE", QueryType::Update),
        ("DELETE", QueryType::Delete),
        ("CREATE", QueryType::Create),
        ("DROP", QueryType::Drop),
        ("ALTER", QueryType::Alter),
        ("BEGIN", QueryType::Begin),
        ("COMMIT", QueryType::Commit),
        ("END", QueryType::Commit),
        ("ROLLBACK", QueryType::Rollback),
        ("SAVEPOINT", QueryType::Savepoint),
        ("RELEASE", QueryType::Release),
        ("PRAGMA", QueryType::Pragma),
        ("EXPLAIN", QueryType::Explain),
        ("WITH", QueryType::With),
    ];
    table
        .iter()
        .find(|(kw, _)| first.eq_ignore_ascii_case(kw))
        .map_or(QueryType::Other, |(_, ty)| *ty)
}
