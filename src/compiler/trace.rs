//! Source locations attached to every token and tree node.

use std::fmt;

use serde::Serialize;

/// Identifies one compilation input. Assigned by whoever loads the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceId(pub u32);

/// Source location for diagnostics: `(source, line, column)`, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Trace {
    pub source: SourceId,
    pub line: u32,
    pub column: u32,
}

impl Trace {
    pub fn new(source: SourceId, line: u32, column: u32) -> Self {
        Self { source, line, column }
    }

    /// Start of the given source.
    pub fn start(source: SourceId) -> Self {
        Self::new(source, 1, 1)
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::start(SourceId::default())
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source.0, self.line, self.column)
    }
}
