//! Measurement records submitted to the store.
//!
//! A [`Point`] is constructed through [`Point::builder`], which validates the
//! record shape before it can reach the wire: exactly one non-empty
//! measurement name, at least one field, zero or more tags.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod line;

#[derive(Error, Debug)]
pub enum PointError {
    #[error("Measurement name cannot be empty")]
    EmptyMeasurement,
    #[error("Invalid measurement name: {0}")]
    InvalidMeasurement(String),
    #[error("Point for measurement {0} has no fields")]
    NoFields(String),
    #[error("Invalid tag key: {0}")]
    InvalidTagKey(String),
    #[error("Invalid tag value for key {0}: {1}")]
    InvalidTagValue(String, String),
    #[error("Invalid field key: {0}")]
    InvalidFieldKey(String),
    #[error("Field {0} is not a finite number")]
    NonFiniteField(String),
}

/// A single field value carried by a point.
///
/// The store accepts floats, integers, booleans and strings as field
/// payloads. Tags are always strings and are not represented here.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Represents a single measurement record.
///
/// Immutable after construction; the store keys it by
/// (measurement, tags, timestamp).
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// The measurement this point belongs to
    measurement: String,
    /// Indexed key-value labels, sorted by key
    tags: BTreeMap<String, String>,
    /// Observed values, sorted by key
    fields: BTreeMap<String, FieldValue>,
    /// Timestamp of the observation
    timestamp: DateTime<Utc>,
}

impl Point {
    /// Starts building a point for the given measurement.
    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Returns the measurement name
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Returns a reference to the tags
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Returns a reference to the fields
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Returns the timestamp of the observation
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Validates the record shape.
    ///
    /// Runs at construction and again before every write, so no malformed
    /// point ever reaches the network.
    pub fn validate(&self) -> Result<(), PointError> {
        if self.measurement.is_empty() {
            return Err(PointError::EmptyMeasurement);
        }
        if self.measurement.contains('\n') {
            return Err(PointError::InvalidMeasurement(self.measurement.clone()));
        }
        if self.fields.is_empty() {
            return Err(PointError::NoFields(self.measurement.clone()));
        }
        for (key, value) in &self.tags {
            if key.is_empty() || key.contains('\n') {
                return Err(PointError::InvalidTagKey(key.clone()));
            }
            if value.is_empty() || value.contains('\n') {
                return Err(PointError::InvalidTagValue(key.clone(), value.clone()));
            }
        }
        for (key, value) in &self.fields {
            if key.is_empty() || key.contains('\n') {
                return Err(PointError::InvalidFieldKey(key.clone()));
            }
            // The wire format has no representation for NaN or infinity.
            if let FieldValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(PointError::NonFiniteField(key.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`Point`]; `build` rejects malformed shapes.
#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<DateTime<Utc>>,
}

impl PointBuilder {
    /// Adds an indexed tag. Later values overwrite earlier ones for the same key.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds an observed field value.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets an explicit observation timestamp. Defaults to build time.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validates and returns the point.
    pub fn build(self) -> Result<Point, PointError> {
        let point = Point {
            measurement: self.measurement,
            tags: self.tags,
            fields: self.fields,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        };
        point.validate()?;
        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_valid_point() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let point = Point::builder("home")
            .tag("ticker", "bedroom")
            .field("temperature", 22i64)
            .field("hum", 35.5)
            .timestamp(ts)
            .build()
            .unwrap();

        assert_eq!(point.measurement(), "home");
        assert_eq!(point.tags().get("ticker"), Some(&"bedroom".to_string()));
        assert_eq!(
            point.fields().get("temperature"),
            Some(&FieldValue::Integer(22))
        );
        assert_eq!(point.fields().get("hum"), Some(&FieldValue::Float(35.5)));
        assert_eq!(point.timestamp(), ts);
    }

    #[test]
    fn test_builder_defaults_timestamp_to_now() {
        let before = Utc::now();
        let point = Point::builder("home").field("temperature", 22i64).build().unwrap();
        let after = Utc::now();

        assert!(point.timestamp() >= before);
        assert!(point.timestamp() <= after);
    }

    #[test]
    fn test_empty_measurement_rejected() {
        let result = Point::builder("").field("value", 1.0).build();
        assert!(matches!(result, Err(PointError::EmptyMeasurement)));
    }

    #[test]
    fn test_point_without_fields_rejected() {
        let result = Point::builder("home").tag("ticker", "bedroom").build();
        assert!(matches!(result, Err(PointError::NoFields(_))));
    }

    #[test]
    fn test_invalid_tag_rejected() {
        let result = Point::builder("home")
            .tag("", "bedroom")
            .field("value", 1.0)
            .build();
        assert!(matches!(result, Err(PointError::InvalidTagKey(_))));

        let result = Point::builder("home")
            .tag("ticker", "")
            .field("value", 1.0)
            .build();
        assert!(matches!(result, Err(PointError::InvalidTagValue(_, _))));
    }

    #[test]
    fn test_newlines_rejected() {
        let result = Point::builder("ho\nme").field("value", 1.0).build();
        assert!(matches!(result, Err(PointError::InvalidMeasurement(_))));

        let result = Point::builder("home").field("val\nue", 1.0).build();
        assert!(matches!(result, Err(PointError::InvalidFieldKey(_))));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let result = Point::builder("home").field("value", f64::NAN).build();
        assert!(matches!(result, Err(PointError::NonFiniteField(_))));
    }

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from(1.5), FieldValue::Float(1.5));
        assert_eq!(FieldValue::from(7i64), FieldValue::Integer(7));
        assert_eq!(FieldValue::from(true), FieldValue::Boolean(true));
        assert_eq!(
            FieldValue::from("Prague"),
            FieldValue::Text("Prague".to_string())
        );
    }
}
