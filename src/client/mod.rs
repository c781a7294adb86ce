//! Store session: connect, write, query.
//!
//! A [`Client`] is an explicit, scoped session against one store endpoint
//! and one target dataset. Teardown is automatic when the value is dropped;
//! there is no explicit disconnect.

use std::time::Instant;

use reqwest::StatusCode;
use tracing::{debug, info};

use crate::error::Error;
use crate::metrics;
use crate::point::{line, Point};
use crate::query::ast::push_identifier;
use crate::query::Query;

pub mod config;
pub mod response;

pub use config::{Config, Credentials};
pub use response::{Row, Rows};

use response::QueryResponse;

/// Scoped session against a time-series store.
///
/// All operations are synchronous request/response: each call blocks the
/// caller until the store answers. The client coordinates nothing across
/// concurrent callers — ordering and atomicity of overlapping writes are
/// the store's concern. Cloning is cheap and shares the underlying
/// transport.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    dataset: String,
}

impl Client {
    /// Establishes a session: probes the endpoint and lazily creates the
    /// target dataset (a no-op on the store side if it already exists).
    ///
    /// Fails with [`Error::Connection`] if the endpoint is unreachable and
    /// [`Error::Auth`] if the credentials are rejected; no session exists
    /// on failure.
    pub async fn connect(config: Config) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let client = Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            dataset: config.dataset,
        };

        client.ping().await?;
        client.create_dataset().await?;

        info!(
            endpoint = %client.base_url,
            dataset = %client.dataset,
            "Session established"
        );
        Ok(client)
    }

    /// Returns the target dataset name
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Submits a single point. See [`Client::write_batch`].
    pub async fn write(&self, point: &Point) -> Result<(), Error> {
        self.write_batch(std::slice::from_ref(point)).await
    }

    /// Submits a batch of points.
    ///
    /// Every point is re-validated locally first; a malformed point fails
    /// the whole call with [`Error::Validation`] before anything is sent.
    /// On success the batch is durably queryable, subject to the store's
    /// documented eventual-consistency window. The client imposes no
    /// ordering across the records of a batch, and a failed batch is not
    /// guaranteed atomic — resubmission is the caller's decision
    /// ([`Error::Write`] is retryable).
    pub async fn write_batch(&self, points: &[Point]) -> Result<(), Error> {
        for point in points {
            point.validate()?;
        }
        if points.is_empty() {
            return Ok(());
        }

        let body = line::encode_batch(points);
        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/write", self.base_url))
            .query(&[("db", self.dataset.as_str()), ("precision", "ns")])
            .basic_auth(self.credentials.username(), Some(self.credentials.password()))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                metrics::record_failure("write");
                Error::Write(e.to_string())
            })?;

        let status = response.status();
        if credentials_rejected(status) {
            metrics::record_failure("write");
            return Err(Error::Auth(format!("write rejected with {}", status)));
        }
        if !status.is_success() {
            metrics::record_failure("write");
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Write(format!("{}: {}", status, body)));
        }

        metrics::record_write(points.len(), started.elapsed());
        debug!(points = points.len(), "Write acknowledged");
        Ok(())
    }

    /// Executes a query expression and returns the matching rows.
    ///
    /// The result is a lazy, finite, non-restartable sequence reflecting a
    /// snapshot of the store at query time; re-iterating requires
    /// re-querying.
    pub async fn query(&self, query: &Query) -> Result<Rows, Error> {
        let response = self.execute_statement(&query.to_statement()).await?;
        Rows::new(response)
    }

    /// Parses a textual query expression and executes it.
    ///
    /// Malformed text fails with [`Error::QuerySyntax`] before any network
    /// call.
    pub async fn query_str(&self, text: &str) -> Result<Rows, Error> {
        let parsed = Query::parse(text)?;
        self.query(&parsed).await
    }

    /// Lists the measurements present in the target dataset.
    pub async fn list_measurements(&self) -> Result<Vec<String>, Error> {
        let response = self.execute_statement("SHOW MEASUREMENTS").await?;

        let mut names = Vec::new();
        for result in response.results {
            if let Some(error) = result.error {
                return Err(Error::Query(error));
            }
            for series in result.series {
                for values in &series.values {
                    if let Some(name) = values.first().and_then(|v| v.as_str()) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Ok(names)
    }

    async fn ping(&self) -> Result<(), Error> {
        let response = self
            .http
            .get(format!("{}/ping", self.base_url))
            .basic_auth(self.credentials.username(), Some(self.credentials.password()))
            .send()
            .await
            .map_err(|e| {
                metrics::record_failure("connect");
                Error::Connection(e.to_string())
            })?;

        let status = response.status();
        if credentials_rejected(status) {
            return Err(Error::Auth(format!("ping rejected with {}", status)));
        }
        if !status.is_success() {
            return Err(Error::Connection(format!(
                "unexpected ping status {}",
                status
            )));
        }
        Ok(())
    }

    async fn create_dataset(&self) -> Result<(), Error> {
        let mut statement = String::from("CREATE DATABASE ");
        push_identifier(&mut statement, &self.dataset);

        let response = self
            .http
            .post(format!("{}/query", self.base_url))
            .query(&[("q", statement.as_str())])
            .basic_auth(self.credentials.username(), Some(self.credentials.password()))
            .send()
            .await
            .map_err(|e| {
                metrics::record_failure("connect");
                Error::Connection(e.to_string())
            })?;

        let status = response.status();
        if credentials_rejected(status) {
            return Err(Error::Auth(format!(
                "dataset creation rejected with {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Connection(format!(
                "dataset creation failed: {}: {}",
                status, body
            )));
        }

        debug!(dataset = %self.dataset, "Dataset ensured");
        Ok(())
    }

    async fn execute_statement(&self, statement: &str) -> Result<QueryResponse, Error> {
        debug!(statement, "Executing query");
        let started = Instant::now();
        let response = self
            .http
            .get(format!("{}/query", self.base_url))
            .query(&[
                ("db", self.dataset.as_str()),
                ("q", statement),
                ("epoch", "ns"),
            ])
            .basic_auth(self.credentials.username(), Some(self.credentials.password()))
            .send()
            .await
            .map_err(|e| {
                metrics::record_failure("query");
                Error::Query(e.to_string())
            })?;

        let status = response.status();
        if credentials_rejected(status) {
            metrics::record_failure("query");
            return Err(Error::Auth(format!("query rejected with {}", status)));
        }
        if !status.is_success() {
            metrics::record_failure("query");
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Query(format!("{}: {}", status, body)));
        }

        let decoded = response.json::<QueryResponse>().await.map_err(|e| {
            metrics::record_failure("query");
            Error::Query(format!("undecodable response: {}", e))
        })?;
        metrics::record_query(started.elapsed());
        Ok(decoded)
    }
}

fn credentials_rejected(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
