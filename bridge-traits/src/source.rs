//! Row Store Abstraction
//!
//! Provides a backend-agnostic trait for executing queries and mutations
//! against the relational data source being exported.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::Result;

/// Connection parameters for the data source.
///
/// Opaque to the export engine; only the `RowSource` implementation
/// interprets them. The `Debug` impl redacts the password so the struct
/// can appear in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionParams {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }
}

/// A single cell of a query result.
///
/// Each variant renders to its natural text representation when the row set
/// is serialized to the transfer format: `Null` renders empty, temporal
/// values render in MySQL literal form.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Unsigned(u64),
    Real(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Bytes(Vec<u8>),
}

impl CellValue {
    /// Render this value as the text that appears in one CSV field.
    pub fn render(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Integer(v) => v.to_string(),
            CellValue::Unsigned(v) => v.to_string(),
            CellValue::Real(v) => v.to_string(),
            CellValue::Text(v) => v.clone(),
            CellValue::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            CellValue::Time(v) => v.format("%H:%M:%S").to_string(),
            CellValue::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

/// The result of one query: a header row plus zero or more data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names, in select order.
    pub columns: Vec<String>,
    /// Data rows; each row has exactly `columns.len()` cells.
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// True when the query returned only the header row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }
}

/// Query-execution capability consumed by the export engine.
///
/// Implementations own connection management; the engine never sees a
/// connection handle. A single implementation instance is shared across
/// all workers, so pooling belongs here, not in the engine.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Execute a query, returning column names and all data rows.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::DataSource` on connection or query failure.
    async fn execute(&self, params: &ConnectionParams, query: &str) -> Result<RowSet>;

    /// Execute a statement that returns no rows (DELETE, UPDATE, ...).
    ///
    /// Returns the number of affected rows.
    async fn execute_mutation(&self, params: &ConnectionParams, statement: &str) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_render() {
        assert_eq!(CellValue::Null.render(), "");
        assert_eq!(CellValue::Integer(-7).render(), "-7");
        assert_eq!(CellValue::Unsigned(42).render(), "42");
        assert_eq!(CellValue::Text("5,00".into()).render(), "5,00");

        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        assert_eq!(CellValue::DateTime(dt).render(), "2024-01-15 15:30:00");
    }

    #[test]
    fn test_row_set_empty() {
        let set = RowSet::new(vec!["id".into()], vec![]);
        assert!(set.is_empty());
        assert_eq!(set.row_count(), 0);

        let set = RowSet::new(vec!["id".into()], vec![vec![CellValue::Integer(1)]]);
        assert!(!set.is_empty());
        assert_eq!(set.row_count(), 1);
    }
}
