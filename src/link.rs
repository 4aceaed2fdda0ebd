//! Serial link
//!
//! Ties the line parser to the variable store. A [`Link`] lives in the
//! producer context and is fed every byte read from the controller; each
//! completed line is committed to the store with the current time and its
//! name is pushed onto the change queue. [`Readout`] is the read-only handle
//! given to consumers (web handlers, the telemetry publisher).

use std::io::{self, Read};
use std::sync::Arc;

use crate::app::Config;
use crate::clock::{Clock, MonotonicClock};
use crate::notify::Notifier;
use crate::parser::{Limits, Line, LineParser, ParserStats};
use crate::store::VariableStore;
use crate::telemetry::{decode_telemetry, DecodeError, TelemetryRecord, DEFAULT_VARIABLE};

/// Read size used by [`Link::pump`]
const READ_CHUNK: usize = 256;

/// Predicate selecting variables that bypass the store
pub type ExclusionRule = Box<dyn Fn(&str) -> bool + Send>;

/// Producer side: parser plus commit
pub struct Link {
    parser: LineParser,
    store: Arc<VariableStore>,
    clock: Arc<dyn Clock>,
    notifier: Option<Notifier>,
    excluded: Option<ExclusionRule>,
    transient: Option<Line>,
}

impl Link {
    /// Create a link committing into `store`, stamping with a monotonic clock
    pub fn new(store: Arc<VariableStore>) -> Self {
        Self {
            parser: LineParser::new(),
            store,
            clock: Arc::new(MonotonicClock::new()),
            notifier: None,
            excluded: None,
            transient: None,
        }
    }

    /// Create a link with the parser caps and exclusion prefixes of `config`
    pub fn from_config(config: &Config, store: Arc<VariableStore>) -> Self {
        let telemetry = config.telemetry.clone();
        Self::new(store)
            .with_limits(config.parser.limits())
            .with_exclusion(move |name| telemetry.is_excluded(name))
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.parser = LineParser::with_limits(limits);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Route variables matching `rule` around the store
    pub fn with_exclusion<F>(mut self, rule: F) -> Self
    where
        F: Fn(&str) -> bool + Send + 'static,
    {
        self.excluded = Some(Box::new(rule));
        self
    }

    pub fn store(&self) -> &Arc<VariableStore> {
        &self.store
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// A read handle on the same store and clock
    pub fn readout(&self, telemetry_variable: impl Into<String>) -> Readout {
        Readout::new(Arc::clone(&self.store), self.clock(), telemetry_variable)
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.parser.reset();
        self.transient = None;
    }

    /// The last excluded line, valid until the next `feed`
    pub fn transient(&self) -> Option<&Line> {
        self.transient.as_ref()
    }

    /// Feed one byte, returning the name of the variable it completed
    pub fn feed(&mut self, byte: u8) -> Option<String> {
        self.transient = None;
        let line = self.parser.feed(byte)?;
        Some(self.commit(line))
    }

    /// Feed a chunk, returning the names completed in order
    pub fn feed_slice(&mut self, data: &[u8]) -> Vec<String> {
        data.iter().filter_map(|&byte| self.feed(byte)).collect()
    }

    /// Feed everything `reader` yields until EOF
    ///
    /// Returns the number of bytes read.
    pub fn pump<R: Read>(&mut self, reader: R) -> io::Result<u64> {
        self.pump_with(reader, |_, _| {})
    }

    /// Like [`pump`](Self::pump), calling `on_commit` for every completed
    /// line with the transient line when the variable was excluded
    pub fn pump_with<R, F>(&mut self, mut reader: R, mut on_commit: F) -> io::Result<u64>
    where
        R: Read,
        F: FnMut(&str, Option<&Line>),
    {
        let mut buf = [0u8; READ_CHUNK];
        let mut total = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            total += n as u64;

            for &byte in &buf[..n] {
                if let Some(name) = self.feed(byte) {
                    on_commit(&name, self.transient.as_ref());
                }
            }
        }
    }

    fn commit(&mut self, line: Line) -> String {
        let name = line.name.clone();

        if self.excluded.as_ref().is_some_and(|rule| rule(name.as_str())) {
            tracing::trace!(name = %name, "excluded variable, not stored");
            self.transient = Some(line);
            return name;
        }

        let now = self.clock.now_ms();
        if self.store.upsert(&line.name, &line.content, now) {
            if let Some(notifier) = &self.notifier {
                notifier.notify(&name);
            }
        }
        name
    }
}

/// Read-only access for consumers
#[derive(Clone)]
pub struct Readout {
    store: Arc<VariableStore>,
    clock: Arc<dyn Clock>,
    telemetry_variable: String,
}

impl Readout {
    pub fn new(
        store: Arc<VariableStore>,
        clock: Arc<dyn Clock>,
        telemetry_variable: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            telemetry_variable: telemetry_variable.into(),
        }
    }

    /// A readout on the default `sbms` variable
    pub fn with_default_variable(store: Arc<VariableStore>, clock: Arc<dyn Clock>) -> Self {
        Self::new(store, clock, DEFAULT_VARIABLE)
    }

    pub fn telemetry_variable(&self) -> &str {
        &self.telemetry_variable
    }

    /// Content of `name` as text, empty if absent or the store is busy
    ///
    /// Bytes that are not valid UTF-8 are replaced; use
    /// [`get_var_bytes`](Self::get_var_bytes) for the stored bytes.
    pub fn get_var(&self, name: &str) -> String {
        String::from_utf8_lossy(&self.get_var_bytes(name)).into_owned()
    }

    /// Content of `name` exactly as received, empty if absent
    pub fn get_var_bytes(&self, name: &str) -> Vec<u8> {
        self.store.get(name).unwrap_or_default()
    }

    /// Byte-exact dump of every live variable, evicting stale ones
    pub fn dump_vars(&self) -> Vec<u8> {
        self.store.dump_all(self.clock.now_ms())
    }

    /// Decode the telemetry variable, if stored
    pub fn telemetry(&self) -> Option<Result<TelemetryRecord, DecodeError>> {
        self.store
            .get(&self.telemetry_variable)
            .map(decode_telemetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::change_channel;

    fn link_at(clock: &ManualClock) -> Link {
        Link::new(Arc::new(VariableStore::new())).with_clock(clock.clone())
    }

    #[test]
    fn test_link_commits_with_time() {
        let clock = ManualClock::new(1234);
        let mut link = link_at(&clock);

        let names = link.feed_slice(b"var soc=\"87\";");
        assert_eq!(names, vec!["soc".to_string()]);

        let entry = link.store().entry("soc").unwrap();
        assert_eq!(entry.content, b"\"87\"");
        assert_eq!(entry.write_time, 1234);
    }

    #[test]
    fn test_link_notifies_stored_names() {
        let (notifier, feed) = change_channel(8);
        let mut link = Link::new(Arc::new(VariableStore::new()))
            .with_notifier(notifier)
            .with_exclusion(|name| name.starts_with('h'));

        link.feed_slice(b"var a=\"1\";var hist=[1];var b=\"2\";");
        assert_eq!(feed.drain(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_link_excluded_is_transient() {
        let mut link =
            Link::new(Arc::new(VariableStore::new())).with_exclusion(|name| name.starts_with('h'));

        let input = b"var hist=[1,2];";
        let (last, rest) = input.split_last().unwrap();
        link.feed_slice(rest);
        assert!(link.transient().is_none());

        assert_eq!(link.feed(*last).as_deref(), Some("hist"));
        assert_eq!(link.transient(), Some(&Line::new("hist", "[1,2]")));
        assert_eq!(link.store().get("hist"), None);

        link.feed(b'\n');
        assert!(link.transient().is_none());
    }

    #[test]
    fn test_link_pump_with_transient() {
        let mut link =
            Link::new(Arc::new(VariableStore::new())).with_exclusion(|name| name.starts_with('h'));
        let input: &[u8] = b"var a=\"1\";\r\nvar h1=[9];\r\n";

        let mut seen = Vec::new();
        let read = link
            .pump_with(input, |name, transient| {
                seen.push((name.to_string(), transient.map(|line| line.content.clone())));
            })
            .unwrap();

        assert_eq!(read, input.len() as u64);
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), None),
                ("h1".to_string(), Some(b"[9]".to_vec())),
            ]
        );
    }

    #[test]
    fn test_link_from_config() {
        let mut config = Config::default();
        config.parser.content_cap = 2;

        let mut link = Link::from_config(&config, Arc::new(VariableStore::new()));
        link.feed_slice(b"var a=\"123\";var b=\"12\";var hx=\"1\";");

        assert_eq!(link.store().names(), vec!["b".to_string()]);
        assert_eq!(link.stats().commits, 2);
        assert_eq!(link.stats().resets, 1);
    }

    #[test]
    fn test_link_raw_bytes_round_trip() {
        let clock = ManualClock::new(0);
        let mut link = link_at(&clock);
        let readout = link.readout("sbms");

        let input = b"var a=\"\xff\xfe\";\r\n";
        link.feed_slice(input);

        assert_eq!(readout.dump_vars(), input.to_vec());
        assert_eq!(readout.get_var_bytes("a"), b"\"\xff\xfe\"".to_vec());
        assert_eq!(readout.get_var("a"), "\"\u{FFFD}\u{FFFD}\"");
    }

    #[test]
    fn test_readout() {
        let clock = ManualClock::new(0);
        let mut link = link_at(&clock);
        let readout = link.readout("sbms");

        link.feed_slice(b"var a=\"1\";");
        assert_eq!(readout.get_var("a"), "\"1\"");
        assert_eq!(readout.get_var("missing"), "");
        assert_eq!(readout.telemetry(), None);

        link.feed_slice(b"var sbms=\"short\";");
        assert!(matches!(
            readout.telemetry(),
            Some(Err(DecodeError::Truncated { .. }))
        ));

        clock.advance(6000);
        assert_eq!(readout.dump_vars(), b"");
        assert_eq!(readout.get_var("a"), "");
    }
}
