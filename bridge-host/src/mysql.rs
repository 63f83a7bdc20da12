//! Row Source Implementation using sqlx/MySQL
//!
//! Implements the `RowSource` trait against MySQL. Connections are pooled
//! per connection-parameter set rather than opened per query, so repeated
//! pipeline runs against the same database reuse sockets.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    source::{CellValue, ConnectionParams, RowSet, RowSource},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Default size of each per-database connection pool
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default MySQL port when the host carries none
const DEFAULT_PORT: u16 = 3306;

/// sqlx-backed MySQL row source
///
/// One pool is kept per distinct `(user, host, database)` triple; the
/// first query against a database creates its pool lazily.
pub struct SqlxRowSource {
    max_connections: u32,
    pools: Mutex<HashMap<String, MySqlPool>>,
}

impl SqlxRowSource {
    /// Create a row source with the default pool size
    pub fn new() -> Self {
        Self::with_max_connections(DEFAULT_MAX_CONNECTIONS)
    }

    /// Create a row source with a custom per-database pool size
    pub fn with_max_connections(max_connections: u32) -> Self {
        Self {
            max_connections,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Split an optional `:port` suffix off a host string.
    ///
    /// A suffix that does not parse as a port is treated as part of the
    /// host name.
    fn split_host_port(host: &str) -> (&str, u16) {
        match host.rsplit_once(':') {
            Some((name, port)) => match port.parse::<u16>() {
                Ok(port) => (name, port),
                Err(_) => (host, DEFAULT_PORT),
            },
            None => (host, DEFAULT_PORT),
        }
    }

    /// Cache key for a connection-parameter set; never contains the password.
    fn pool_key(params: &ConnectionParams) -> String {
        format!("{}@{}/{}", params.user, params.host, params.database)
    }

    /// Get or lazily create the pool for a connection-parameter set.
    async fn pool_for(&self, params: &ConnectionParams) -> Result<MySqlPool> {
        let key = Self::pool_key(params);

        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }

        let (host, port) = Self::split_host_port(&params.host);
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&params.user)
            .password(&params.password)
            .database(&params.database);

        debug!(pool = %key, "Creating MySQL connection pool");
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| BridgeError::DataSource(format!("Failed to connect to {}: {}", key, e)))?;

        pools.insert(key, pool.clone());
        Ok(pool)
    }

    /// Decode one cell of a result row into a `CellValue`.
    fn decode_cell(row: &MySqlRow, index: usize) -> Result<CellValue> {
        let raw = row
            .try_get_raw(index)
            .map_err(|e| BridgeError::DataSource(format!("Failed to read column {}: {}", index, e)))?;

        if raw.is_null() {
            return Ok(CellValue::Null);
        }

        let type_name = raw.type_info().name().to_string();

        let decoded = match type_name.as_str() {
            "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                row.try_get::<i64, _>(index).map(CellValue::Integer)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => row.try_get::<u64, _>(index).map(CellValue::Unsigned),
            "FLOAT" => row
                .try_get::<f32, _>(index)
                .map(|v| CellValue::Real(v as f64)),
            "DOUBLE" => row.try_get::<f64, _>(index).map(CellValue::Real),
            "DECIMAL" => row
                .try_get::<sqlx::types::BigDecimal, _>(index)
                .map(|v| CellValue::Text(v.to_string())),
            "DATETIME" | "TIMESTAMP" => row
                .try_get::<NaiveDateTime, _>(index)
                .map(CellValue::DateTime),
            "DATE" => row.try_get::<NaiveDate, _>(index).map(CellValue::Date),
            "TIME" => row.try_get::<NaiveTime, _>(index).map(CellValue::Time),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                row.try_get::<Vec<u8>, _>(index).map(CellValue::Bytes)
            }
            _ => row.try_get::<String, _>(index).map(CellValue::Text),
        };

        decoded.map_err(|e| {
            BridgeError::DataSource(format!(
                "Failed to decode column {} ({}): {}",
                index, type_name, e
            ))
        })
    }

    /// Convert fetched rows into a `RowSet`.
    ///
    /// Column names come from row metadata, so a query with zero data rows
    /// yields an empty header as well; the engine treats an empty row set
    /// as nothing-to-do before the header is ever consumed.
    fn to_row_set(rows: Vec<MySqlRow>) -> Result<RowSet> {
        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(columns.len());
            for index in 0..row.columns().len() {
                cells.push(Self::decode_cell(row, index)?);
            }
            data.push(cells);
        }

        Ok(RowSet::new(columns, data))
    }
}

impl Default for SqlxRowSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RowSource for SqlxRowSource {
    #[instrument(skip(self, params, query), fields(database = %params.database))]
    async fn execute(&self, params: &ConnectionParams, query: &str) -> Result<RowSet> {
        let pool = self.pool_for(params).await?;

        let rows = sqlx::query(query)
            .fetch_all(&pool)
            .await
            .map_err(|e| BridgeError::DataSource(format!("Query failed: {}", e)))?;

        debug!(rows = rows.len(), "Query returned");
        Self::to_row_set(rows)
    }

    #[instrument(skip(self, params, statement), fields(database = %params.database))]
    async fn execute_mutation(&self, params: &ConnectionParams, statement: &str) -> Result<u64> {
        let pool = self.pool_for(params).await?;

        let result = sqlx::query(statement)
            .execute(&pool)
            .await
            .map_err(|e| BridgeError::DataSource(format!("Mutation failed: {}", e)))?;

        debug!(rows_affected = result.rows_affected(), "Mutation executed");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(SqlxRowSource::split_host_port("db.local"), ("db.local", 3306));
        assert_eq!(
            SqlxRowSource::split_host_port("db.local:3307"),
            ("db.local", 3307)
        );
        // Non-numeric suffix stays part of the host
        assert_eq!(
            SqlxRowSource::split_host_port("db:local"),
            ("db:local", 3306)
        );
    }

    #[test]
    fn test_pool_key_excludes_password() {
        let params = ConnectionParams::new("db.local", "exporter", "hunter2", "production");
        let key = SqlxRowSource::pool_key(&params);

        assert_eq!(key, "exporter@db.local/production");
        assert!(!key.contains("hunter2"));
    }
}
