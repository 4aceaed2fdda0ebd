//! Completed lines produced by the parser

use std::borrow::Cow;
use std::fmt;

/// A syntactically valid `var <name>=<content>;` line
///
/// `content` keeps its delimiters and the raw bytes between them, so writing
/// the line back out reproduces the wire bytes exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Variable name, 1-10 alphanumeric characters
    pub name: String,
    /// Payload including the opening and closing delimiter
    pub content: Vec<u8>,
}

impl Line {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Content as text, invalid UTF-8 replaced
    pub fn content_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// The line in wire syntax, without a line ending
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + self.content.len() + 6);
        write_wire(&mut out, &self.name, &self.content);
        out
    }
}

/// Append `var <name>=<content>;` to `out`
pub fn write_wire(out: &mut Vec<u8>, name: &str, content: &[u8]) {
    out.extend_from_slice(b"var ");
    out.extend_from_slice(name.as_bytes());
    out.push(b'=');
    out.extend_from_slice(content);
    out.push(b';');
}

/// Lossy for non-UTF-8 content; [`Line::to_wire`] gives the exact bytes
impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var {}={};", self.name, self.content_lossy())
    }
}
