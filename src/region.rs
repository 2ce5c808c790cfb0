//! Coordinate expressions of the form `[contig:]start-end`.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while parsing a region expression.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegionError {
    #[error("region '{0}' has more than one ':'")]
    TooManyColons(String),

    #[error("range '{0}' must be written as start-end")]
    MalformedRange(String),

    #[error("invalid coordinate '{value}': {source}")]
    InvalidCoordinate {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// A genomic span, optionally bound to a contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    pub contig: Option<String>,
    pub start: i64,
    pub end: i64,
}

impl RegionSpec {
    /// Parse `chr:start-end` or `start-end`.
    ///
    /// `start <= end` is not checked.
    pub fn parse(s: &str) -> Result<Self, RegionError> {
        let parts: Vec<&str> = s.split(':').collect();
        let (contig, range) = match parts.as_slice() {
            [range] => (None, *range),
            [contig, range] => (Some(contig.to_string()), *range),
            _ => return Err(RegionError::TooManyColons(s.to_string())),
        };

        let bounds: Vec<&str> = range.split('-').collect();
        let [start, end] = bounds.as_slice() else {
            return Err(RegionError::MalformedRange(range.to_string()));
        };

        Ok(RegionSpec {
            contig,
            start: parse_coordinate(start)?,
            end: parse_coordinate(end)?,
        })
    }

    /// The 0-based half-open window `[start - 1, end)` used for feature queries.
    pub fn query_window(&self) -> (i64, i64) {
        (self.start - 1, self.end)
    }
}

fn parse_coordinate(value: &str) -> Result<i64, RegionError> {
    value
        .parse()
        .map_err(|source| RegionError::InvalidCoordinate { value: value.to_string(), source })
}

impl FromStr for RegionSpec {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegionSpec::parse(s)
    }
}

impl fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contig {
            Some(contig) => write!(f, "{}:{}-{}", contig, self.start, self.end),
            None => write!(f, "{}-{}", self.start, self.end),
        }
    }
}
