//! TSBridge - a client for InfluxDB-style time-series stores
//!
//! This crate bridges application-level measurement records to a remote
//! time-series store over HTTP: validated point construction, line protocol
//! serialization, write/query round trips, and typed result rows.

pub mod client;
pub mod error;
pub mod metrics;
pub mod point;
pub mod query;

/// Session parameters for a store connection.
pub use crate::client::Config;
/// Username/password pair presented to the store.
pub use crate::client::Credentials;
/// Scoped session against a time-series store.
pub use crate::client::Client;
/// A single result row returned by a query.
pub use crate::client::Row;
/// Lazy, non-restartable sequence of result rows.
pub use crate::client::Rows;
/// Error type for client operations.
pub use crate::error::Error;
/// A validated measurement record.
pub use crate::point::{FieldValue, Point, PointBuilder, PointError};
/// A validated query expression.
pub use crate::query::{ParseError, Query, QueryBuilder, TimeRange};
