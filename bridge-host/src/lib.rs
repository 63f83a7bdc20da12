//! # Host Adapters
//!
//! Concrete implementations of the boundary traits for a desktop/server
//! host:
//!
//! - [`ReqwestHttpClient`](http::ReqwestHttpClient) - `HttpClient` over
//!   reqwest with pooling, TLS, and retry
//! - [`SqlxRowSource`](mysql::SqlxRowSource) - `RowSource` over sqlx with
//!   one MySQL connection pool per parameter set
//!
//! The engine crates depend only on `bridge-traits`; the embedding
//! application constructs these adapters and hands them in.

pub mod http;
pub mod mysql;

pub use http::ReqwestHttpClient;
pub use mysql::SqlxRowSource;
