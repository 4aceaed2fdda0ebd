//! Streaming adapter around the line state machine

use std::mem;

use super::line::Line;
use super::state::{Limits, LineState};

/// Counters kept by [`LineParser`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Bytes fed
    pub bytes: u64,
    /// Lines completed
    pub commits: u64,
    /// Lines abandoned after the keyword was matched
    pub resets: u64,
}

/// The variable line parser
///
/// Owns one [`LineState`] and applies transitions to it. Feeding never
/// blocks and never fails; malformed input is dropped and the parser
/// resynchronizes on the next `var ` keyword.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    state: LineState,
    limits: Limits,
    stats: ParserStats,
}

impl LineParser {
    /// Create a parser with the default caps
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Create a parser with custom caps
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            state: LineState::new(),
            limits,
            stats: ParserStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> &LineState {
        &self.state
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.state = LineState::new();
    }

    /// Feed one byte, returning the line it completed, if any
    pub fn feed(&mut self, byte: u8) -> Option<Line> {
        self.stats.bytes += 1;

        let in_line = !self.state.is_seeking();
        let state = mem::take(&mut self.state);
        let (next, line) = state.step(byte, &self.limits);
        self.state = next;

        if let Some(line) = &line {
            self.stats.commits += 1;
            tracing::trace!(name = %line.name, len = line.content.len(), "line complete");
        } else if in_line && self.state.is_seeking() {
            self.stats.resets += 1;
            tracing::trace!(byte, "line abandoned");
        }

        line
    }

    /// Feed a chunk of bytes, collecting every completed line
    pub fn feed_slice(&mut self, data: &[u8]) -> Vec<Line> {
        data.iter().filter_map(|&byte| self.feed(byte)).collect()
    }
}
