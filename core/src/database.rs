//! SQLite backing store. Catalog and export operations live in `catalog`
//! and `exports` as further `impl Database` blocks.

use crate::error::ExportResult;
use crate::model::{ExecutionType, Importance, Status};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, Row, ToSql};
use std::cell::Cell;
use std::path::Path;
use time::OffsetDateTime;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS projects (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_suites (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  project_id INTEGER NOT NULL REFERENCES projects(id),
  parent_suite_id INTEGER REFERENCES test_suites(id),
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_cases (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  test_suite_id INTEGER NOT NULL REFERENCES test_suites(id),
  user_story_id INTEGER,
  title TEXT NOT NULL,
  summary TEXT NOT NULL DEFAULT '',
  precondition TEXT NOT NULL DEFAULT '',
  postcondition TEXT NOT NULL DEFAULT '',
  status TEXT NOT NULL DEFAULT 'Not Run',
  manual_edit INTEGER NOT NULL DEFAULT 0,
  importance TEXT NOT NULL DEFAULT 'Medium',
  execution_type TEXT NOT NULL DEFAULT 'Manual',
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS test_steps (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  test_case_id INTEGER NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
  step_number INTEGER NOT NULL,
  step_action TEXT NOT NULL DEFAULT '',
  expected_result TEXT NOT NULL DEFAULT '',
  execution_type TEXT NOT NULL DEFAULT 'Manual'
);

CREATE TABLE IF NOT EXISTS exports (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  test_suite_id INTEGER NOT NULL,
  xml_file TEXT NOT NULL DEFAULT '',
  excel_file_path TEXT,
  created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_cases_suite ON test_cases(test_suite_id, id);
CREATE INDEX IF NOT EXISTS idx_test_steps_case ON test_steps(test_case_id, step_number);
CREATE INDEX IF NOT EXISTS idx_exports_suite_created ON exports(test_suite_id, created_at);
"#;

#[derive(Debug)]
pub struct Database {
    pub(crate) conn: Connection,
    last_export_stamp: Cell<i64>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> ExportResult<Self> {
        let path = path.as_ref();
        log::debug!("opening database {:?}", path);
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> ExportResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ExportResult<Self> {
        conn.execute_batch(SCHEMA)?;
        let last_stamp: i64 = conn.query_row(
            "SELECT COALESCE(MAX(created_at), 0) FROM exports",
            [],
            |row| row.get(0),
        )?;
        Ok(Self {
            conn,
            last_export_stamp: Cell::new(last_stamp),
        })
    }

    /// Creation stamp for a new export: the current time, bumped past the
    /// previous stamp so that two exports never share one.
    pub(crate) fn next_export_stamp(&self) -> i64 {
        let stamp = now_micros().max(self.last_export_stamp.get() + 1);
        self.last_export_stamp.set(stamp);
        stamp
    }
}

pub(crate) fn now_micros() -> i64 {
    to_micros(OffsetDateTime::now_utc())
}

pub(crate) fn to_micros(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000) as i64
}

pub(crate) fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let micros: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err))
    })
}

macro_rules! sql_text_enum {
    ($($name:ident),+) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|err| FromSqlError::Other(Box::new(err)))
                }
            }
        )+
    };
}

sql_text_enum!(Status, Importance, ExecutionType);
