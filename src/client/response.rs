//! Decoding of the store's JSON query response envelope.
//!
//! The store answers a query with statement results, each carrying zero or
//! more series (`name`, optional `tags`, `columns`, `values`). Rows are
//! surfaced to the caller as a lazy iterator; rows the store sends in a
//! shape the client cannot decode are skipped with a warning.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Error;
use crate::point::FieldValue;

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatementResult {
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Series {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// A single result row: the originating measurement/tag context plus the
/// field values observed at one timestamp. Read-only.
#[derive(Debug, Clone)]
pub struct Row {
    measurement: String,
    tags: BTreeMap<String, String>,
    timestamp: DateTime<Utc>,
    fields: Vec<(String, FieldValue)>,
}

impl Row {
    /// Returns the measurement the row belongs to
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Returns the tag context of the row's series
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Returns the row's timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the `(field, value)` pairs in column order
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Looks up a field value by name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Lazy sequence of result rows.
///
/// Finite and non-restartable: the rows correspond to a snapshot of the
/// store at query time, and once consumed the sequence is gone —
/// re-iterating requires re-querying.
pub struct Rows {
    series: std::vec::IntoIter<Series>,
    current: Option<SeriesCursor>,
}

struct SeriesCursor {
    name: String,
    tags: BTreeMap<String, String>,
    columns: Vec<String>,
    time_index: usize,
    values: std::vec::IntoIter<Vec<Value>>,
}

impl Rows {
    /// Flattens a response into a row sequence, surfacing statement-level
    /// errors the store reported inside a 200 response.
    pub(crate) fn new(response: QueryResponse) -> Result<Self, Error> {
        let mut series = Vec::new();
        for result in response.results {
            if let Some(error) = result.error {
                return Err(Error::Query(error));
            }
            series.extend(result.series);
        }

        Ok(Self {
            series: series.into_iter(),
            current: None,
        })
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        loop {
            if let Some(cursor) = &mut self.current {
                for values in cursor.values.by_ref() {
                    match decode_row(
                        &cursor.name,
                        &cursor.tags,
                        &cursor.columns,
                        cursor.time_index,
                        values,
                    ) {
                        Some(row) => return Some(row),
                        None => {
                            warn!(measurement = %cursor.name, "Skipping undecodable result row");
                        }
                    }
                }
                self.current = None;
            }

            let series = self.series.next()?;
            match series.columns.iter().position(|c| c == "time") {
                Some(time_index) => {
                    self.current = Some(SeriesCursor {
                        name: series.name,
                        tags: series.tags,
                        columns: series.columns,
                        time_index,
                        values: series.values.into_iter(),
                    });
                }
                None => {
                    warn!(measurement = %series.name, "Skipping series without a time column");
                }
            }
        }
    }
}

fn decode_row(
    name: &str,
    tags: &BTreeMap<String, String>,
    columns: &[String],
    time_index: usize,
    values: Vec<Value>,
) -> Option<Row> {
    // Timestamps arrive as integer nanoseconds (the client always requests
    // epoch=ns).
    let nanos = values.get(time_index)?.as_i64()?;

    let mut fields = Vec::new();
    for (i, column) in columns.iter().enumerate() {
        if i == time_index {
            continue;
        }
        // Null marks a field absent from this row.
        match values.get(i) {
            Some(Value::Null) | None => continue,
            Some(value) => fields.push((column.clone(), field_value(value)?)),
        }
    }

    Some(Row {
        measurement: name.to_string(),
        tags: tags.clone(),
        timestamp: DateTime::from_timestamp_nanos(nanos),
        fields,
    })
}

fn field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Bool(b) => Some(FieldValue::Boolean(*b)),
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(FieldValue::Integer(i))
            } else {
                n.as_f64().map(FieldValue::Float)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_from_json(body: &str) -> Result<Rows, Error> {
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        Rows::new(response)
    }

    #[test]
    fn test_rows_decode_series() {
        let rows = rows_from_json(
            r#"{"results":[{"series":[{
                "name":"home",
                "tags":{"ticker":"bedroom"},
                "columns":["time","hum","temperature"],
                "values":[[1709294400000000000,35.5,22]]
            }]}]}"#,
        )
        .unwrap();

        let rows: Vec<Row> = rows.collect();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.measurement(), "home");
        assert_eq!(row.tags().get("ticker"), Some(&"bedroom".to_string()));
        assert_eq!(
            row.timestamp(),
            DateTime::from_timestamp_nanos(1_709_294_400_000_000_000)
        );
        assert_eq!(row.field("hum"), Some(&FieldValue::Float(35.5)));
        assert_eq!(row.field("temperature"), Some(&FieldValue::Integer(22)));
        assert_eq!(row.field("missing"), None);
    }

    #[test]
    fn test_rows_span_multiple_series() {
        let rows = rows_from_json(
            r#"{"results":[{"series":[
                {"name":"home","tags":{"ticker":"bedroom"},
                 "columns":["time","temperature"],"values":[[1,21],[2,22]]},
                {"name":"home","tags":{"ticker":"kitchen"},
                 "columns":["time","temperature"],"values":[[3,25]]}
            ]}]}"#,
        )
        .unwrap();

        let rows: Vec<Row> = rows.collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].tags().get("ticker"), Some(&"bedroom".to_string()));
        assert_eq!(rows[2].tags().get("ticker"), Some(&"kitchen".to_string()));
    }

    #[test]
    fn test_rows_skip_null_fields() {
        let rows = rows_from_json(
            r#"{"results":[{"series":[{
                "name":"status",
                "columns":["time","state","healthy"],
                "values":[[1,null,true]]
            }]}]}"#,
        )
        .unwrap();

        let rows: Vec<Row> = rows.collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields().len(), 1);
        assert_eq!(rows[0].field("healthy"), Some(&FieldValue::Boolean(true)));
    }

    #[test]
    fn test_rows_skip_undecodable_entries() {
        // First row has a non-numeric timestamp, second is fine. A series
        // without a time column is dropped entirely.
        let rows = rows_from_json(
            r#"{"results":[{"series":[
                {"name":"home","columns":["time","temperature"],
                 "values":[["not a time",21],[2,22]]},
                {"name":"measurements","columns":["name"],"values":[["home"]]}
            ]}]}"#,
        )
        .unwrap();

        let rows: Vec<Row> = rows.collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("temperature"), Some(&FieldValue::Integer(22)));
    }

    #[test]
    fn test_statement_error_surfaces_as_query_error() {
        let result = rows_from_json(
            r#"{"results":[{"error":"measurement not found"}]}"#,
        );
        assert!(matches!(result, Err(Error::Query(_))));
    }

    #[test]
    fn test_empty_response_yields_no_rows() {
        let rows = rows_from_json(r#"{"results":[{}]}"#).unwrap();
        assert_eq!(rows.count(), 0);
    }
}
