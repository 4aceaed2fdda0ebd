//! Character classes of the variable protocol
//!
//! ```text
//! line    := "var " name "=" open content close ";"
//! name    := 1..10 of [A-Za-z0-9], optionally followed by one space
//! open    := '"' | '['
//! close   := '"' for '"', ']' for '['
//! ```

/// Keyword that starts every line, trailing space included
pub const KEYWORD: &[u8; 4] = b"var ";

/// Default maximum variable name length
pub const DEFAULT_NAME_CAP: usize = 10;

/// Default maximum content length, delimiters excluded
pub const DEFAULT_CONTENT_CAP: usize = 300;

/// Separates the name from the content
pub const ASSIGN: u8 = b'=';

/// Ends a line after the closing delimiter
pub const TERMINATOR: u8 = b';';

/// Single space allowed after the name
pub const NAME_PAD: u8 = b' ';

/// Whether `byte` may appear in a variable name
#[inline]
pub fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

/// Whether `byte` opens a content payload
#[inline]
pub fn is_open_delimiter(byte: u8) -> bool {
    byte == b'"' || byte == b'['
}

/// The delimiter that closes a payload opened with `open`
#[inline]
pub fn closing_for(open: u8) -> u8 {
    match open {
        b'[' => b']',
        other => other,
    }
}

/// Whether `byte` is the keyword byte at `position`
#[inline]
pub fn matches_keyword(position: usize, byte: u8) -> bool {
    KEYWORD.get(position) == Some(&byte)
}
