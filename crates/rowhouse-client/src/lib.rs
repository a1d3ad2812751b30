//! # rowhouse-client
//!
//! Asynchronous HTTP client for ClickHouse-compatible columnar databases,
//! speaking the RowBinary wire format. It includes:
//!
//! - **Connection Pooling**: per-endpoint pools with TTL, keep-alive and
//!   bounded checkout
//! - **Request Engine**: authentication, settings/header merging, retries
//!   classified by fault cause, out-of-band server error extraction
//! - **Schema Cache**: single-flight `DESCRIBE TABLE` resolution driving
//!   typed inserts
//! - **Streaming Results**: a row cursor decoding
//!   `RowBinaryWithNamesAndTypes` in value-reuse mode
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowhouse_client::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(
//!         ClientConfig::new()
//!             .add_endpoint("http://localhost:8123")
//!             .username("default")
//!             .password(""),
//!     )?;
//!
//!     // Stream a query.
//!     let mut rows = client.query("SELECT id, name FROM users").await?.rows();
//!     while let Some(row) = rows.next().await? {
//!         println!("{}", row.field("name")?.as_str()?);
//!     }
//!
//!     // Insert through the cached table schema.
//!     let mut insert = client.insert("users").await?;
//!     insert.set("id", 42u64)?;
//!     insert.set("name", "alice")?;
//!     insert.commit_row()?;
//!     let outcome = insert.send().await?;
//!     println!("wrote {} rows", outcome.written_rows());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// The client facade.
pub mod client;

/// Configuration.
pub mod config;

/// Error types.
pub mod error;

/// HTTP transport.
pub mod http;

/// Inserts.
pub mod insert;

/// Query responses and cursors.
pub mod query;

/// Per-call settings.
pub mod settings;

mod schema_cache;

// Re-exports
pub use client::{Client, ClientStats, CommandResponse};
pub use config::{ClientConfig, ConnectionReuseStrategy, FaultCause, TlsBundle};
pub use error::{ClientError, ClientResult, ConfigError, TransportError};
pub use http::Summary;
pub use insert::{Insert, InsertResponse, IntoRow};
pub use query::{QueryResponse, RowCursor};
pub use settings::Settings;

pub use rowhouse_data::{
    Column, Decimal, DefaultKind, Field, Record, RowFormat, TableSchema, TypeCategory, Value, I256,
    U256,
};
