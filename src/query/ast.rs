use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::lexer::LexError;

/// Error raised for query expressions the client rejects locally, before
/// any network call.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Lexical error: {0}")]
    Lex(#[from] LexError),
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    #[error("Trailing input after statement: {0}")]
    TrailingInput(String),
    #[error("Measurement name cannot be empty")]
    EmptyMeasurement,
    #[error("Field name cannot be empty")]
    EmptyField,
    #[error("Tag predicate cannot be empty")]
    EmptyTagPredicate,
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),
}

/// Which fields a query returns.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSelection {
    All,
    Fields(Vec<String>),
}

/// An equality predicate on an indexed tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TagPredicate {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimeRange {
    /// Everything newer than `now() - duration`.
    Last(Duration),
    /// Absolute bounds; the upper bound is optional.
    Absolute {
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    },
}

/// A validated query expression.
///
/// Selects by measurement name, tag equality, field name and time range;
/// built either through [`Query::builder`] or parsed from text with
/// [`Query::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub measurement: String,
    pub selection: FieldSelection,
    pub predicates: Vec<TagPredicate>,
    pub range: Option<TimeRange>,
}

impl Query {
    /// Starts building a query against the given measurement.
    pub fn builder(measurement: impl Into<String>) -> QueryBuilder {
        QueryBuilder {
            measurement: measurement.into(),
            fields: Vec::new(),
            predicates: Vec::new(),
            last: None,
            start: None,
            end: None,
        }
    }

    /// Checks the expression shape shared by the builder and the parser.
    pub(crate) fn validate(&self) -> Result<(), ParseError> {
        if self.measurement.is_empty() {
            return Err(ParseError::EmptyMeasurement);
        }
        if let FieldSelection::Fields(fields) = &self.selection {
            if fields.iter().any(|f| f.is_empty()) {
                return Err(ParseError::EmptyField);
            }
        }
        for predicate in &self.predicates {
            if predicate.key.is_empty() || predicate.value.is_empty() {
                return Err(ParseError::EmptyTagPredicate);
            }
        }
        match &self.range {
            Some(TimeRange::Last(duration)) if *duration <= Duration::zero() => {
                Err(ParseError::InvalidTimeRange(
                    "duration must be positive".to_string(),
                ))
            }
            Some(TimeRange::Absolute {
                start,
                end: Some(end),
            }) if end < start => Err(ParseError::InvalidTimeRange(
                "end precedes start".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Renders the expression as the statement transmitted to the store.
    pub fn to_statement(&self) -> String {
        let mut out = String::from("SELECT ");

        match &self.selection {
            FieldSelection::All => out.push('*'),
            FieldSelection::Fields(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    push_identifier(&mut out, field);
                }
            }
        }

        out.push_str(" FROM ");
        push_identifier(&mut out, &self.measurement);

        let mut conditions: Vec<String> = Vec::new();
        for predicate in &self.predicates {
            let mut cond = String::new();
            push_identifier(&mut cond, &predicate.key);
            cond.push_str(" = ");
            push_string_literal(&mut cond, &predicate.value);
            conditions.push(cond);
        }
        match &self.range {
            Some(TimeRange::Last(duration)) => {
                conditions.push(format!("time > now() - {}", render_duration(duration)));
            }
            Some(TimeRange::Absolute { start, end }) => {
                conditions.push(format!("time >= {}", timestamp_nanos(start)));
                if let Some(end) = end {
                    conditions.push(format!("time <= {}", timestamp_nanos(end)));
                }
            }
            None => {}
        }

        if !conditions.is_empty() {
            out.push_str(" WHERE ");
            out.push_str(&conditions.join(" AND "));
        }

        out
    }
}

/// Builder for [`Query`]; `build` rejects malformed shapes.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    measurement: String,
    fields: Vec<String>,
    predicates: Vec<TagPredicate>,
    last: Option<Duration>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl QueryBuilder {
    /// Restricts the selection to a named field. Without any call the query
    /// selects all fields.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Adds a `tag == value` predicate.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(TagPredicate {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Selects the trailing window `now() - duration .. now()`.
    pub fn last(mut self, duration: Duration) -> Self {
        self.last = Some(duration);
        self
    }

    /// Sets an absolute lower time bound.
    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets an absolute upper time bound. Requires `since`.
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Validates and returns the query.
    pub fn build(self) -> Result<Query, ParseError> {
        let range = match (self.last, self.start, self.end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ParseError::InvalidTimeRange(
                    "trailing window and absolute bounds are mutually exclusive".to_string(),
                ))
            }
            (Some(duration), None, None) => Some(TimeRange::Last(duration)),
            (None, Some(start), end) => Some(TimeRange::Absolute { start, end }),
            (None, None, Some(_)) => {
                return Err(ParseError::InvalidTimeRange(
                    "upper bound without lower bound".to_string(),
                ))
            }
            (None, None, None) => None,
        };

        let query = Query {
            measurement: self.measurement,
            selection: if self.fields.is_empty() {
                FieldSelection::All
            } else {
                FieldSelection::Fields(self.fields)
            },
            predicates: self.predicates,
            range,
        };
        query.validate()?;
        Ok(query)
    }
}

pub(crate) fn push_identifier(out: &mut String, identifier: &str) {
    out.push('"');
    for c in identifier.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn push_string_literal(out: &mut String, value: &str) {
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
}

fn timestamp_nanos(timestamp: &DateTime<Utc>) -> i64 {
    timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Renders a duration in the largest unit that divides it evenly.
fn render_duration(duration: &Duration) -> String {
    const UNITS: &[(i64, &str)] = &[
        (604_800_000_000_000, "w"),
        (86_400_000_000_000, "d"),
        (3_600_000_000_000, "h"),
        (60_000_000_000, "m"),
        (1_000_000_000, "s"),
        (1_000_000, "ms"),
        (1_000, "us"),
        (1, "ns"),
    ];

    let nanos = duration.num_nanoseconds().unwrap_or(i64::MAX);
    for (unit, suffix) in UNITS {
        if nanos % unit == 0 {
            return format!("{}{}", nanos / unit, suffix);
        }
    }
    unreachable!("1ns divides every duration")
}
