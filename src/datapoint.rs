//! Carbon plaintext datapoints: `name value timestamp`.

use crate::error::{AggregatorError, Result};

/// One parsed plaintext line.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub name: Vec<u8>,
    pub value: f64,
    /// Epoch seconds
    pub timestamp: u64,
}

impl Datapoint {
    pub fn new(name: impl Into<Vec<u8>>, value: f64, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }

    /// Parse a line of the form `name value timestamp`.
    ///
    /// Fields are separated by runs of ASCII whitespace and a trailing line
    /// terminator is ignored. The timestamp must be a whole number of seconds.
    pub fn parse(line: &[u8]) -> Result<Self> {
        let mut fields = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|field| !field.is_empty());

        let (Some(name), Some(value), Some(timestamp), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid(line, "expected exactly three fields"));
        };

        let value = std::str::from_utf8(value)
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| invalid(line, "value is not a number"))?;
        let timestamp = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|ts| ts.parse::<u64>().ok())
            .ok_or_else(|| invalid(line, "timestamp is not a non-negative integer"))?;

        Ok(Self {
            name: name.to_vec(),
            value,
            timestamp,
        })
    }

    /// Render back to plaintext without a trailing newline.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = self.name.clone();
        line.extend_from_slice(format!(" {} {}", self.value, self.timestamp).as_bytes());
        line
    }
}

fn invalid(line: &[u8], reason: &str) -> AggregatorError {
    AggregatorError::InvalidDatapoint(format!(
        "{reason}: {:?}",
        String::from_utf8_lossy(line)
    ))
}
