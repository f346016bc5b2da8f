//! Output side of a gather: named gauges plus an error channel.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// A named measurement with integer fields and string tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gauge {
    /// Measurement name.
    pub measurement: String,
    /// Field values, in insertion order.
    pub fields: IndexMap<String, i64>,
    /// Tags, in insertion order.
    pub tags: IndexMap<String, String>,
}

impl Gauge {
    /// Create a gauge with no fields or tags.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            fields: IndexMap::new(),
            tags: IndexMap::new(),
        }
    }

    /// Add a field.
    pub fn field(mut self, key: impl Into<String>, value: i64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Add a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Look up a tag value.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Renders the gauge in InfluxDB line protocol, without a timestamp.
impl fmt::Display for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape(&self.measurement, &[',', ' ']))?;
        for (key, value) in &self.tags {
            write!(
                f,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            )?;
        }
        for (i, (key, value)) in self.fields.iter().enumerate() {
            let sep = if i == 0 { ' ' } else { ',' };
            write!(f, "{sep}{}={value}i", escape(key, &[',', '=', ' ']))?;
        }
        Ok(())
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Receives the records and errors produced by a gather.
pub trait Accumulator {
    /// Accept one measurement.
    fn add_gauge(&mut self, gauge: Gauge);

    /// Accept a non-fatal error.
    fn add_error(&mut self, error: ScanError);
}

impl<A: Accumulator + ?Sized> Accumulator for &mut A {
    fn add_gauge(&mut self, gauge: Gauge) {
        (**self).add_gauge(gauge);
    }

    fn add_error(&mut self, error: ScanError) {
        (**self).add_error(error);
    }
}

/// Accumulator that keeps everything it is given.
#[derive(Debug, Default)]
pub struct CollectingAccumulator {
    /// Gauges in arrival order.
    pub gauges: Vec<Gauge>,
    /// Errors in arrival order.
    pub errors: Vec<ScanError>,
}

impl CollectingAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the gauge tagged with `directory`.
    pub fn for_directory(&self, directory: impl AsRef<Path>) -> Option<&Gauge> {
        let wanted = directory.as_ref().to_string_lossy();
        self.gauges
            .iter()
            .find(|g| g.tag_value("directory") == Some(wanted.as_ref()))
    }

    /// Check if any errors were reported.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Drop everything collected so far.
    pub fn clear(&mut self) {
        self.gauges.clear();
        self.errors.clear();
    }
}

impl Accumulator for CollectingAccumulator {
    fn add_gauge(&mut self, gauge: Gauge) {
        self.gauges.push(gauge);
    }

    fn add_error(&mut self, error: ScanError) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_protocol() {
        let gauge = Gauge::new("filecount")
            .field("count", 2)
            .field("size_bytes", 1010)
            .tag("directory", "/var/my logs");

        assert_eq!(
            gauge.to_string(),
            "filecount,directory=/var/my\\ logs count=2i,size_bytes=1010i"
        );
    }

    #[test]
    fn test_collecting_accumulator() {
        let mut acc = CollectingAccumulator::new();
        acc.add_gauge(Gauge::new("filecount").tag("directory", "/a"));
        acc.add_error(ScanError::Other {
            message: "boom".into(),
        });

        assert!(acc.for_directory("/a").is_some());
        assert!(acc.for_directory("/b").is_none());
        assert!(acc.has_errors());

        acc.clear();
        assert!(acc.gauges.is_empty());
        assert!(!acc.has_errors());
    }
}
