//! Array-of-bytes signatures, in the `74 0E ?? B6` notation used by most memory scanners.

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// A byte signature where each position is either a concrete byte or a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<Option<u8>>,
}

impl Pattern {
    /// Parses a whitespace separated list of hex bytes. `?` and `??` are wildcards.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidPattern {
            pattern: pattern.to_owned(),
            reason,
        };

        let bytes = pattern
            .split_whitespace()
            .map(|token| match token {
                "?" | "??" => Ok(None),
                t if t.len() == 2 => u8::from_str_radix(t, 16)
                    .map(Some)
                    .map_err(|_| invalid(format!("'{t}' is not a hex byte"))),
                t => Err(invalid(format!("'{t}' is not a hex byte"))),
            })
            .collect::<Result<Vec<_>>>()?;

        if bytes.is_empty() {
            return Err(invalid("pattern is empty".into()));
        }
        if bytes.iter().all(Option::is_none) {
            return Err(invalid("pattern has no concrete bytes".into()));
        }

        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true if `data` starts with this pattern.
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= self.bytes.len()
            && self
                .bytes
                .iter()
                .zip(data)
                .all(|(p, d)| p.map_or(true, |p| p == *d))
    }

    /// The longest run of concrete bytes, along with its offset from the start of the pattern.
    ///
    /// The scanner searches for the anchor with `memmem` and only checks the full pattern
    /// around its hits.
    pub fn anchor(&self) -> (usize, Vec<u8>) {
        let mut best = (0, 0);
        let mut start = 0;
        for (i, b) in self.bytes.iter().chain([&None]).enumerate() {
            if b.is_none() {
                if i - start > best.1 {
                    best = (start, i - start);
                }
                start = i + 1;
            }
        }

        let (offset, len) = best;
        let run = self.bytes[offset..offset + len]
            .iter()
            .flatten()
            .copied()
            .collect();
        (offset, run)
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bytes.iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            match b {
                Some(b) => write!(f, "{b:02X}")?,
                None => f.write_str("??")?,
            }
        }
        Ok(())
    }
}
