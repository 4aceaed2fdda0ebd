//! Variable line parser
//!
//! A streaming parser that turns the controller's serial output into
//! completed `var <name>=<content>;` lines, one byte at a time.

pub mod grammar;
mod line;
mod state;
mod stream;

pub use line::{write_wire, Line};
pub use state::{Limits, LineState};
pub use stream::{LineParser, ParserStats};
