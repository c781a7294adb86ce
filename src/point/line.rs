//! Line protocol encoding.
//!
//! Renders points to the store's line-oriented wire format:
//! `measurement,tag=value field=1.5,other="text" 1709294400000000000`.
//! Tags and fields are emitted in key order, timestamps in nanoseconds.

use super::{FieldValue, Point};

/// Characters that must be backslash-escaped in a measurement name.
const MEASUREMENT_SPECIALS: &[char] = &[',', ' '];
/// Characters that must be backslash-escaped in tag keys/values and field keys.
const KEY_SPECIALS: &[char] = &[',', '=', ' '];

/// Encodes a single point as one line (no trailing newline).
pub fn encode(point: &Point) -> String {
    let mut out = String::new();

    push_escaped(&mut out, point.measurement(), MEASUREMENT_SPECIALS);

    for (key, value) in point.tags() {
        out.push(',');
        push_escaped(&mut out, key, KEY_SPECIALS);
        out.push('=');
        push_escaped(&mut out, value, KEY_SPECIALS);
    }

    out.push(' ');
    for (i, (key, value)) in point.fields().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_escaped(&mut out, key, KEY_SPECIALS);
        out.push('=');
        push_field_value(&mut out, value);
    }

    out.push(' ');
    // Nanosecond timestamps saturate past the year 2262.
    let nanos = point.timestamp().timestamp_nanos_opt().unwrap_or(i64::MAX);
    out.push_str(&nanos.to_string());

    out
}

/// Encodes a batch as newline-separated lines, one per point.
pub fn encode_batch(points: &[Point]) -> String {
    points.iter().map(encode).collect::<Vec<_>>().join("\n")
}

fn push_escaped(out: &mut String, input: &str, specials: &[char]) {
    for c in input.chars() {
        if specials.contains(&c) || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

fn push_field_value(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Float(f) => out.push_str(&f.to_string()),
        FieldValue::Integer(i) => {
            out.push_str(&i.to_string());
            out.push('i');
        }
        FieldValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        FieldValue::Text(s) => {
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
    }
}
