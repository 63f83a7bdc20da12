//! # Export Targets
//!
//! A target names one logical table (or a custom query) and knows how to
//! render the SQL the pipeline executes for it: the fetch query, optionally
//! narrowed by a time bound, and the matching delete statement.
//!
//! The delete statement reuses the exact predicate of the fetch, so a
//! post-upload delete removes only rows the fetch could have seen, never
//! rows inserted between fetch and delete.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// MySQL datetime literal format
const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A time window constraining which rows a cycle exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBound {
    /// Rows at or after an instant.
    Since(NaiveDateTime),
    /// Rows between two instants, inclusive.
    Between(NaiveDateTime, NaiveDateTime),
}

impl TimeBound {
    /// Render the SQL predicate for this bound over the given column.
    pub fn predicate(&self, column: &str) -> String {
        match self {
            TimeBound::Since(start) => {
                format!("`{}` >= '{}'", column, start.format(SQL_DATETIME_FORMAT))
            }
            TimeBound::Between(start, end) => format!(
                "`{}` BETWEEN '{}' AND '{}'",
                column,
                start.format(SQL_DATETIME_FORMAT),
                end.format(SQL_DATETIME_FORMAT)
            ),
        }
    }
}

/// How a target's rows are selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuerySpec {
    /// A whole table, optionally narrowed by a time bound over one column.
    Table {
        /// Source table name.
        table: String,
        /// Column a `TimeBound` predicate applies to, if any.
        time_column: Option<String>,
    },
    /// Verbatim SQL supplied by the operator. Custom targets never support
    /// post-upload deletion.
    Custom {
        /// The query text, executed as-is.
        query: String,
    },
}

/// A named logical table with its query template.
///
/// Immutable once configured; the engine only reads targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTarget {
    /// Logical name; drives the upload file name.
    pub name: String,
    /// Row selection for this target.
    pub spec: QuerySpec,
}

impl ExportTarget {
    /// A target exporting a whole table, named after the table.
    pub fn table(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            spec: QuerySpec::Table {
                table: name.clone(),
                time_column: None,
            },
            name,
        }
    }

    /// Set the column that time bounds apply to.
    ///
    /// Has no effect on custom-query targets.
    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        if let QuerySpec::Table { time_column, .. } = &mut self.spec {
            *time_column = Some(column.into());
        }
        self
    }

    /// A target running operator-supplied SQL.
    pub fn custom(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: QuerySpec::Custom {
                query: query.into(),
            },
        }
    }

    /// Render the fetch query, applying the time bound when this target has
    /// a time column.
    pub fn query_for(&self, bound: Option<&TimeBound>) -> String {
        match &self.spec {
            QuerySpec::Table { table, time_column } => match (bound, time_column) {
                (Some(bound), Some(column)) => format!(
                    "SELECT * FROM `{}` WHERE {};",
                    table,
                    bound.predicate(column)
                ),
                _ => format!("SELECT * FROM `{}`;", table),
            },
            QuerySpec::Custom { query } => query.clone(),
        }
    }

    /// Render the delete statement matching `query_for` with the same
    /// bound, or `None` when this target does not support deletion.
    pub fn delete_statement(&self, bound: Option<&TimeBound>) -> Option<String> {
        match &self.spec {
            QuerySpec::Table { table, time_column } => Some(match (bound, time_column) {
                (Some(bound), Some(column)) => format!(
                    "DELETE FROM `{}` WHERE {};",
                    table,
                    bound.predicate(column)
                ),
                _ => format!("DELETE FROM `{}`;", table),
            }),
            QuerySpec::Custom { .. } => None,
        }
    }

    /// Deterministic upload file name: lower-cased, spaces replaced with
    /// underscores, `.csv` suffix.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name.to_lowercase().replace(' ', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_query_without_bound() {
        let target = ExportTarget::table("st01 loading");
        assert_eq!(target.query_for(None), "SELECT * FROM `st01 loading`;");
    }

    #[test]
    fn test_query_with_since_bound() {
        let target = ExportTarget::table("orders").with_time_column("Date_Time");
        let bound = TimeBound::Since(datetime(2024, 1, 8, 0, 0, 0));

        assert_eq!(
            target.query_for(Some(&bound)),
            "SELECT * FROM `orders` WHERE `Date_Time` >= '2024-01-08 00:00:00';"
        );
    }

    #[test]
    fn test_query_with_between_bound() {
        let target = ExportTarget::table("orders").with_time_column("Date_Time");
        let bound = TimeBound::Between(
            datetime(2024, 1, 1, 0, 0, 0),
            datetime(2024, 1, 15, 23, 59, 59),
        );

        assert_eq!(
            target.query_for(Some(&bound)),
            "SELECT * FROM `orders` WHERE `Date_Time` BETWEEN '2024-01-01 00:00:00' AND '2024-01-15 23:59:59';"
        );
    }

    #[test]
    fn test_bound_ignored_without_time_column() {
        let target = ExportTarget::table("orders");
        let bound = TimeBound::Since(datetime(2024, 1, 8, 0, 0, 0));

        assert_eq!(target.query_for(Some(&bound)), "SELECT * FROM `orders`;");
    }

    #[test]
    fn test_delete_reuses_fetch_predicate() {
        let target = ExportTarget::table("orders").with_time_column("Date_Time");
        let bound = TimeBound::Since(datetime(2024, 1, 8, 0, 0, 0));

        assert_eq!(
            target.delete_statement(Some(&bound)),
            Some("DELETE FROM `orders` WHERE `Date_Time` >= '2024-01-08 00:00:00';".to_string())
        );
    }

    #[test]
    fn test_delete_whole_table_without_bound() {
        let target = ExportTarget::table("orders");
        assert_eq!(
            target.delete_statement(None),
            Some("DELETE FROM `orders`;".to_string())
        );
    }

    #[test]
    fn test_custom_target_has_no_delete() {
        let target = ExportTarget::custom("report", "SELECT a, b FROM t1 JOIN t2;");
        assert_eq!(target.query_for(None), "SELECT a, b FROM t1 JOIN t2;");
        assert_eq!(target.delete_statement(None), None);
    }

    #[test]
    fn test_file_name_derivation() {
        assert_eq!(
            ExportTarget::table("st01 loading").file_name(),
            "st01_loading.csv"
        );
        assert_eq!(ExportTarget::table("Result").file_name(), "result.csv");
    }
}
