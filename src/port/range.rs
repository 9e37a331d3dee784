use crate::error::{Error, Result};
use serde::Deserialize;

/// Inclusive range of ports handed out to runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPortRange")]
pub struct PortRange {
    start: u16,
    end: u16,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPortRange {
    start: u16,
    end: u16,
}

impl TryFrom<RawPortRange> for PortRange {
    type Error = Error;

    fn try_from(raw: RawPortRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start == 0 {
            return Err(Error::Config("Port range cannot start at 0".to_string()));
        }
        if start > end {
            return Err(Error::Config(format!(
                "Invalid port range {}-{}: start is greater than end",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range.
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    /// Port at `offset` from the start, for `offset < len()`.
    pub(crate) fn nth(&self, offset: usize) -> u16 {
        debug_assert!(offset < self.len());
        self.start + offset as u16
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 9000,
            end: 9899,
        }
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
