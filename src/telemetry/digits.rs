//! Base-91 digit runs
//!
//! Numbers in the `sbms` record are fixed-width runs of printable ASCII,
//! most significant digit first, where each byte is worth `byte - 35`
//! (`'#'` is zero).

/// Numeric base of the compression
pub const BASE: u32 = 91;

/// Byte that encodes digit zero
pub const ZERO: u8 = b'#';

/// Value of a single digit byte
///
/// Bytes below `'#'` wrap, matching unsigned arithmetic on the controller.
#[inline]
pub fn digit(byte: u8) -> u32 {
    u32::from(byte).wrapping_sub(u32::from(ZERO))
}

/// Cursor reading consecutive fields out of a record
#[derive(Debug, Clone)]
pub struct Digits<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Digits<'a> {
    pub fn new(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    /// Current position
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Decode the next `width` digits and move past them
    ///
    /// Positions past the end of the data read as digit zero.
    pub fn take(&mut self, width: usize) -> u32 {
        let start = self.offset;
        self.offset += width;
        (start..self.offset).fold(0u32, |value, i| {
            let byte = self.data.get(i).copied().unwrap_or(ZERO);
            value.wrapping_mul(BASE).wrapping_add(digit(byte))
        })
    }

    /// Read one raw byte
    pub fn byte(&mut self) -> u8 {
        let byte = self.data.get(self.offset).copied().unwrap_or(0);
        self.offset += 1;
        byte
    }

    /// Move past `count` bytes
    pub fn skip(&mut self, count: usize) {
        self.offset += count;
    }
}
