//! Domain types for address queries
//!
//! A trace reports a return address as `function+0xOFFSET/0xLENGTH`. The
//! length is what lets us tell same-named statics from different translation
//! units apart, but it is optional, so queries carry it as a tagged variant.

use std::fmt;
use std::str::FromStr;

use super::errors::SpecError;

/// What the caller knows about the address inside a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Offset plus the function length recorded alongside it
    Exact { offset: u64, length: u64 },
    /// Offset only; the function length is not validated
    Unvalidated { offset: u64 },
}

impl Query {
    /// Build a query, treating a zero length as "do not validate"
    #[must_use]
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        match length {
            Some(length) if length > 0 => Query::Exact { offset, length },
            _ => Query::Unvalidated { offset },
        }
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        match self {
            Query::Exact { offset, .. } | Query::Unvalidated { offset } => offset,
        }
    }

    #[must_use]
    pub fn length(self) -> Option<u64> {
        match self {
            Query::Exact { length, .. } => Some(length),
            Query::Unvalidated { .. } => None,
        }
    }
}

/// A parsed `function+0xOFFSET[/0xLENGTH]` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpec {
    /// The text exactly as the caller supplied it, echoed in the output header
    pub raw: String,
    pub function: String,
    pub query: Query,
}

impl FromStr for AddressSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SpecError::Malformed(s.to_string());

        let (function, rest) = s.split_once('+').ok_or_else(malformed)?;
        if function.is_empty() || rest.is_empty() {
            return Err(malformed());
        }

        let (offset, length) = match rest.split_once('/') {
            Some((offset, length)) => (offset, Some(length)),
            None => (rest, None),
        };

        let offset = parse_hex(s, offset)?;
        let length = length.map(|l| parse_hex(s, l)).transpose()?;

        Ok(Self { raw: s.to_string(), function: function.to_string(), query: Query::new(offset, length) })
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_hex(spec: &str, value: &str) -> Result<u64, SpecError> {
    let digits =
        value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|_| SpecError::BadHex { spec: spec.to_string(), value: value.to_string() })
}
