//! Line State Machine
//!
//! The parser is a Mealy machine over single bytes. Each state carries the
//! data accumulated so far, and [`LineState::step`] is a pure transition:
//! it consumes the current state and one byte and returns the next state
//! plus, on the final `;`, the completed [`Line`].
//!
//! States:
//! - SeekKeyword: matching the literal `var `
//! - ParseName: collecting up to `name_cap` name characters until `=`
//! - ExpectOpenDelimiter: waiting for `"` or `[`
//! - ParseContent: collecting the payload until the matching closer
//! - ExpectTerminator: waiting for `;`
//!
//! Any unexpected byte abandons the line. The byte that broke the line is
//! then matched against the start of the keyword, so a line that directly
//! follows garbage is still picked up.

use super::grammar::{
    closing_for, is_name_byte, is_open_delimiter, matches_keyword, ASSIGN, DEFAULT_CONTENT_CAP,
    DEFAULT_NAME_CAP, KEYWORD, NAME_PAD, TERMINATOR,
};
use super::line::Line;

/// Length caps applied while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum name length
    pub name_cap: usize,
    /// Maximum payload length, delimiters excluded
    pub content_cap: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            name_cap: DEFAULT_NAME_CAP,
            content_cap: DEFAULT_CONTENT_CAP,
        }
    }
}

/// Parser state together with its accumulators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineState {
    /// Matching the keyword; `matched` bytes of `var ` seen so far
    SeekKeyword { matched: usize },
    /// Collecting the name; `padded` once the trailing space was consumed
    ParseName { name: String, padded: bool },
    /// Name complete, waiting for the opening delimiter
    ExpectOpenDelimiter { name: String },
    /// Collecting the payload; `content` starts with `open`
    ParseContent {
        name: String,
        open: u8,
        content: Vec<u8>,
    },
    /// Payload closed, waiting for `;`
    ExpectTerminator { name: String, content: Vec<u8> },
}

impl Default for LineState {
    fn default() -> Self {
        Self::new()
    }
}

impl LineState {
    /// The initial state, nothing matched
    pub fn new() -> Self {
        LineState::SeekKeyword { matched: 0 }
    }

    /// Whether the machine is between lines
    pub fn is_seeking(&self) -> bool {
        matches!(self, LineState::SeekKeyword { .. })
    }

    /// Advance by one byte
    pub fn step(self, byte: u8, limits: &Limits) -> (LineState, Option<Line>) {
        match self {
            LineState::SeekKeyword { matched } => (Self::seek(matched, byte, limits), None),

            LineState::ParseName { mut name, padded } => {
                if byte == ASSIGN {
                    if name.is_empty() {
                        return (Self::resync(byte, limits), None);
                    }
                    return (LineState::ExpectOpenDelimiter { name }, None);
                }
                if padded {
                    return (Self::resync(byte, limits), None);
                }
                if is_name_byte(byte) && name.len() < limits.name_cap {
                    name.push(char::from(byte));
                    (LineState::ParseName { name, padded }, None)
                } else if byte == NAME_PAD && !name.is_empty() {
                    (LineState::ParseName { name, padded: true }, None)
                } else {
                    (Self::resync(byte, limits), None)
                }
            }

            LineState::ExpectOpenDelimiter { name } => {
                if is_open_delimiter(byte) {
                    // The cap may come from a config file; never reserve past the default
                    let reserve = limits.content_cap.min(DEFAULT_CONTENT_CAP) + 2;
                    let mut content = Vec::with_capacity(reserve);
                    content.push(byte);
                    (
                        LineState::ParseContent {
                            name,
                            open: byte,
                            content,
                        },
                        None,
                    )
                } else {
                    (Self::resync(byte, limits), None)
                }
            }

            LineState::ParseContent {
                name,
                open,
                mut content,
            } => {
                if byte == closing_for(open) {
                    content.push(byte);
                    (LineState::ExpectTerminator { name, content }, None)
                } else if content.len() - 1 < limits.content_cap {
                    // content[0] is the opener, not payload
                    content.push(byte);
                    (
                        LineState::ParseContent {
                            name,
                            open,
                            content,
                        },
                        None,
                    )
                } else {
                    (Self::resync(byte, limits), None)
                }
            }

            LineState::ExpectTerminator { name, content } => {
                if byte == TERMINATOR {
                    (LineState::new(), Some(Line { name, content }))
                } else {
                    (Self::resync(byte, limits), None)
                }
            }
        }
    }

    /// Keyword matching from `matched` bytes in
    fn seek(matched: usize, byte: u8, limits: &Limits) -> LineState {
        if matches_keyword(matched, byte) {
            let matched = matched + 1;
            if matched == KEYWORD.len() {
                LineState::ParseName {
                    name: String::with_capacity(limits.name_cap),
                    padded: false,
                }
            } else {
                LineState::SeekKeyword { matched }
            }
        } else if matched > 0 {
            Self::seek(0, byte, limits)
        } else {
            LineState::new()
        }
    }

    /// Abandon the current line and retry `byte` as a keyword start
    fn resync(byte: u8, limits: &Limits) -> LineState {
        Self::seek(0, byte, limits)
    }
}
