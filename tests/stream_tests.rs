//! End-to-end tests feeding byte streams through the link into the store

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use sbms_gateway::{change_channel, Line, LineParser, Link, ManualClock, VariableStore};

fn link_at(clock: &ManualClock) -> Link {
    Link::new(Arc::new(VariableStore::new())).with_clock(clock.clone())
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,10}"
}

/// Content with its delimiters, quoted or bracketed
fn content_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ !#-~]{0,40}".prop_map(|body| format!("\"{}\"", body)),
        "[ -\\\\^-~]{0,40}".prop_map(|body| format!("[{}]", body)),
    ]
}

fn wire(lines: &[(String, String)]) -> Vec<u8> {
    lines
        .iter()
        .flat_map(|(name, content)| format!("var {}={};\r\n", name, content).into_bytes())
        .collect()
}

proptest! {
    #[test]
    fn prop_dump_reconstructs_last_values(
        lines in proptest::collection::vec((name_strategy(), content_strategy()), 1..20)
    ) {
        let clock = ManualClock::new(0);
        let mut link = link_at(&clock);

        let names = link.feed_slice(&wire(&lines));
        prop_assert_eq!(names.len(), lines.len());

        let latest: BTreeMap<&str, &str> = lines
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
            .collect();
        let expected: String = latest
            .iter()
            .map(|(name, content)| format!("var {}={};\r\n", name, content))
            .collect();

        prop_assert_eq!(link.store().dump_all(0), expected.into_bytes());
    }

    #[test]
    fn prop_dump_keeps_raw_content_bytes(
        name in name_strategy(),
        body in proptest::collection::vec(any::<u8>().prop_filter("no closer", |b| *b != b']'), 0..300),
    ) {
        let mut content = vec![b'['];
        content.extend_from_slice(&body);
        content.push(b']');

        let mut input = Line::new(name, content).to_wire();
        input.extend_from_slice(b"\r\n");

        let clock = ManualClock::new(0);
        let mut link = link_at(&clock);
        link.feed_slice(&input);

        prop_assert_eq!(link.store().dump_all(0), input);
    }

    #[test]
    fn prop_resync_after_garbage(
        garbage in proptest::collection::vec(any::<u8>(), 0..64)
            .prop_filter("garbage must not contain the keyword", |g| {
                !g.windows(4).any(|w| w == b"var ")
            }),
        name in name_strategy(),
        content in content_strategy(),
    ) {
        let mut parser = LineParser::new();
        let mut input = garbage;
        input.extend_from_slice(format!("var {}={};", name, content).as_bytes());

        let lines = parser.feed_slice(&input);
        prop_assert_eq!(lines, vec![Line::new(name, content)]);
    }

    #[test]
    fn prop_chunking_does_not_matter(
        lines in proptest::collection::vec((name_strategy(), content_strategy()), 1..8),
        split in any::<prop::sample::Index>(),
    ) {
        let input = wire(&lines);
        let at = split.index(input.len());

        let mut whole = LineParser::new();
        let mut chunked = LineParser::new();
        let expected = whole.feed_slice(&input);
        let mut got = chunked.feed_slice(&input[..at]);
        got.extend(chunked.feed_slice(&input[at..]));

        prop_assert_eq!(got, expected);
    }
}

#[test]
fn test_same_name_keeps_one_entry() {
    let clock = ManualClock::new(100);
    let mut link = link_at(&clock);

    link.feed_slice(b"var soc=\"50\";");
    let first = link.store().entry("soc").unwrap();
    clock.advance(10);
    link.feed_slice(b"var soc=\"51\";");

    let second = link.store().entry("soc").unwrap();
    assert_eq!(link.store().len(), 1);
    assert_eq!(second.content, b"\"51\"");
    assert!(second.write_time >= first.write_time);
}

#[test]
fn test_eviction_is_permanent_until_recommitted() {
    let clock = ManualClock::new(0);
    let mut link = link_at(&clock);
    let readout = link.readout("sbms");

    link.feed_slice(b"var a=\"1\";");
    clock.set(2000);
    link.feed_slice(b"var b=\"2\";");

    clock.set(5500);
    assert_eq!(readout.dump_vars(), b"var b=\"2\";\r\n");

    // Winding the clock back does not bring it back
    clock.set(0);
    assert_eq!(readout.dump_vars(), b"var b=\"2\";\r\n");
    assert_eq!(readout.get_var("a"), "");

    clock.set(6000);
    link.feed_slice(b"var a=\"3\";");
    assert_eq!(readout.dump_vars(), b"var a=\"3\";\r\nvar b=\"2\";\r\n");
}

#[test]
fn test_slow_consumer_misses_notifications_not_values() {
    let (notifier, feed) = change_channel(1);
    let mut link = Link::new(Arc::new(VariableStore::new())).with_notifier(notifier.clone());

    link.feed_slice(b"var a=\"1\";var b=\"2\";var a=\"3\";");

    assert_eq!(feed.drain(), vec!["a".to_string()]);
    assert_eq!(notifier.dropped(), 2);
    assert_eq!(link.store().get("a").as_deref(), Some(&b"\"3\""[..]));
    assert_eq!(link.store().get("b").as_deref(), Some(&b"\"2\""[..]));
}

#[test]
fn test_producer_and_readers_concurrently() {
    const LINES: u32 = 2000;

    let store = Arc::new(VariableStore::new());
    let (notifier, feed) = change_channel(8);
    let mut link = Link::new(Arc::clone(&store)).with_notifier(notifier);

    let producer = thread::spawn(move || {
        for i in 0..LINES {
            let line = format!("var n{}=\"{}\";\r\n", i % 7, i);
            link.feed_slice(line.as_bytes());
        }
        link.stats()
    });

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..300 {
                    let dump = String::from_utf8(store.dump_all(0)).unwrap();
                    for line in dump.split_terminator("\r\n") {
                        assert!(line.starts_with("var n"));
                        assert!(line.ends_with("\";"));
                    }
                    if let Some(content) = store.get("n3") {
                        assert!(content.len() >= 3);
                    }
                }
            })
        })
        .collect();

    let mut notified = 0;
    while feed.next_timeout(Duration::from_millis(200)).is_some() {
        notified += 1;
    }

    let stats = producer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(stats.commits, u64::from(LINES));
    assert!(notified <= LINES);
    assert!(store.len() <= 7);
}
