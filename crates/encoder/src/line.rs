//! Line-protocol point construction.
//!
//! One [`Point`] renders to one wire line:
//!
//! ```text
//! <measurement>,<tag>=<v>,... <field>=<v>,... <timestamp_ns>
//! ```
//!
//! Tag order is insertion order, field values are pre-rendered so the
//! precision decisions (8 dp quantities, 2 dp binned mid price) live with the
//! field, not the serializer.

use std::fmt::Write as _;

/// One wire point: measurement, tag set, field set, nanosecond timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: &'static str,
    tags: Vec<(&'static str, String)>,
    fields: Vec<(&'static str, String)>,
    timestamp_ns: i64,
}

impl Point {
    #[must_use]
    pub fn new(measurement: &'static str, timestamp_ns: i64) -> Self {
        Self {
            measurement,
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ns,
        }
    }

    #[must_use]
    pub fn tag(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.tags.push((key, value.into()));
        self
    }

    /// Float field with default rendering.
    #[must_use]
    pub fn field_float(mut self, key: &'static str, value: f64) -> Self {
        self.fields.push((key, format!("{value}")));
        self
    }

    /// Float field rendered at a fixed number of decimal places.
    ///
    /// Quantities use 8 places so repeated downstream aggregation sees stable
    /// text; the binned mid price uses 2.
    #[must_use]
    pub fn field_fixed(mut self, key: &'static str, value: f64, places: usize) -> Self {
        self.fields.push((key, format!("{value:.places$}")));
        self
    }

    /// Integer field (`i` suffix on the wire).
    #[must_use]
    pub fn field_int(mut self, key: &'static str, value: i64) -> Self {
        self.fields.push((key, format!("{value}i")));
        self
    }

    /// String field, quoted and escaped on the wire.
    #[must_use]
    pub fn field_str(mut self, key: &'static str, value: &str) -> Self {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        self.fields.push((key, format!("\"{escaped}\"")));
        self
    }

    #[must_use]
    pub fn measurement(&self) -> &str {
        self.measurement
    }

    #[must_use]
    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    /// Rendered value of a tag, if present.
    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Rendered value of a field, if present.
    #[must_use]
    pub fn field_value(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Renders the point as one line-protocol line.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(96);
        line.push_str(&escape_measurement(self.measurement));

        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", key, escape_tag_value(value));
        }

        line.push(' ');
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                line.push(',');
            }
            first = false;
            let _ = write!(line, "{key}={value}");
        }

        let _ = write!(line, " {}", self.timestamp_ns);
        line
    }
}

fn escape_measurement(value: &str) -> String {
    value.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag_value(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
