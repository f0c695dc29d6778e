//! [`EventStream`] over `saphyr_parser::Parser`.
//!
//! Parser events become owned [`Ev`] values with source marks. Stream markers are hidden,
//! document boundaries are reported.
//!
//! Anchored nodes are recorded as they go by (a scalar is one event, a container everything
//! up to its matching end) and an alias replays the recording in place. Replays count
//! against [`AliasLimits`]:
//! - `max_total_replayed_events` across the document,
//! - `max_alias_expansions_per_anchor` per anchor,
//! - `max_replay_stack_depth` for aliases met while replaying.
//!
//! Anchors, recordings and counters are per document.
//!
//! `saphyr-parser` does not report comments, so this stream never yields comment events.

use std::collections::HashMap;

use saphyr_parser::{Event, Parser, StrInput};

use crate::error::Error;
use crate::events::{Ev, EventStream, NodeEvent, NodeKind};
use crate::location::{Mark, marks_from_span};
use crate::options::AliasLimits;

/// Anchored container being recorded.
#[derive(Debug)]
struct Capture {
    anchor: usize,
    /// Containers opened inside the capture (itself included) and not closed yet.
    open: usize,
    events: Vec<Ev>,
}

/// Records anchored subtrees while they stream past.
#[derive(Debug, Default)]
struct AnchorRecorder {
    captures: Vec<Capture>,
    recorded: HashMap<usize, Vec<Ev>>,
}

impl AnchorRecorder {
    fn clear(&mut self) {
        self.captures.clear();
        self.recorded.clear();
    }

    fn get(&self, anchor: usize) -> Option<&[Ev]> {
        self.recorded.get(&anchor).map(Vec::as_slice)
    }

    /// Feed one event. `anchor` is the node's anchor id (0 for none and for non-node events).
    fn observe(&mut self, ev: &Ev, anchor: usize) -> Result<(), Error> {
        for capture in &mut self.captures {
            capture.events.push(ev.clone());
        }
        match ev {
            Ev::Node(node) if node.is_scalar() => {
                if anchor != 0 {
                    self.recorded.insert(anchor, vec![ev.clone()]);
                }
            }
            Ev::Node(_) => {
                for capture in &mut self.captures {
                    capture.open += 1;
                }
                if anchor != 0 {
                    self.captures.push(Capture {
                        anchor,
                        open: 1,
                        events: vec![ev.clone()],
                    });
                }
            }
            Ev::SequenceEnd { start, end } | Ev::MappingEnd { start, end } => {
                for capture in &mut self.captures {
                    capture.open = capture
                        .open
                        .checked_sub(1)
                        .ok_or_else(|| Error::at(*start, *end, "container end with no start"))?;
                }
                while self.captures.last().is_some_and(|c| c.open == 0) {
                    if let Some(done) = self.captures.pop() {
                        self.recorded.insert(done.anchor, done.events);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Recorded events being served in place of an alias.
#[derive(Debug)]
struct Replay {
    events: Vec<Ev>,
    next: usize,
}

/// Live event source that wraps `saphyr_parser::Parser`.
pub struct LiveEvents<'a> {
    parser: Parser<'a, StrInput<'a>>,
    /// Peeked event not yet consumed.
    look: Option<Ev>,
    /// Innermost replay on top.
    replays: Vec<Replay>,
    recorder: AnchorRecorder,
    last_mark: Mark,

    limits: AliasLimits,
    replayed: usize,
    expansions: HashMap<usize, usize>,
}

impl<'a> LiveEvents<'a> {
    pub fn new(input: &'a str, limits: AliasLimits) -> Self {
        Self {
            parser: Parser::new_from_str(input),
            look: None,
            replays: Vec::new(),
            recorder: AnchorRecorder::default(),
            last_mark: Mark::EMPTY,
            limits,
            replayed: 0,
            expansions: HashMap::new(),
        }
    }

    fn pull(&mut self) -> Result<Option<Ev>, Error> {
        loop {
            if let Some(ev) = self.next_replayed()? {
                return Ok(Some(ev));
            }
            let Some(item) = self.parser.next() else {
                return Ok(None);
            };
            let (event, span) = item.map_err(Error::from_scan_error)?;
            let (start, end) = marks_from_span(&span);
            self.last_mark = start;

            let (ev, anchor) = match event {
                Event::StreamStart | Event::StreamEnd | Event::Nothing => continue,
                Event::DocumentStart(_) => {
                    self.start_document();
                    return Ok(Some(Ev::DocumentStart { start, end }));
                }
                Event::DocumentEnd => return Ok(Some(Ev::DocumentEnd { start, end })),
                Event::Alias(anchor) => {
                    self.expand_alias(anchor, start, end)?;
                    continue;
                }
                Event::Scalar(text, style, anchor, tag) => {
                    let mut node = NodeEvent::scalar(text.into_owned(), start, end).with_style(style);
                    node.tag = tag.map(|t| t.to_string());
                    node.anchor = anchor;
                    (Ev::Node(node), anchor)
                }
                Event::SequenceStart(anchor, tag) => {
                    let mut node = NodeEvent::sequence_start(start, end);
                    node.tag = tag.map(|t| t.to_string());
                    node.anchor = anchor;
                    (Ev::Node(node), anchor)
                }
                Event::MappingStart(anchor, tag) => {
                    let mut node = NodeEvent::mapping_start(start, end);
                    node.tag = tag.map(|t| t.to_string());
                    node.anchor = anchor;
                    (Ev::Node(node), anchor)
                }
                Event::SequenceEnd => (Ev::SequenceEnd { start, end }, 0),
                Event::MappingEnd => (Ev::MappingEnd { start, end }, 0),
            };
            self.recorder.observe(&ev, anchor)?;
            return Ok(Some(ev));
        }
    }

    /// Next event of the innermost unfinished replay, charged against the replay budget.
    fn next_replayed(&mut self) -> Result<Option<Ev>, Error> {
        while let Some(top) = self.replays.last_mut() {
            let Some(ev) = top.events.get(top.next).cloned() else {
                self.replays.pop();
                continue;
            };
            top.next += 1;
            self.replayed += 1;
            if self.replayed > self.limits.max_total_replayed_events {
                return Err(Error::at(
                    ev.start(),
                    ev.end(),
                    format!(
                        "alias replay limit exceeded: {} replayed events > {}",
                        self.replayed, self.limits.max_total_replayed_events
                    ),
                ));
            }
            // Replayed nodes belong to the enclosing recordings but never start new ones.
            self.recorder.observe(&ev, 0)?;
            self.last_mark = ev.start();
            return Ok(Some(ev));
        }
        Ok(None)
    }

    fn expand_alias(&mut self, anchor: usize, start: Mark, end: Mark) -> Result<(), Error> {
        let events = self
            .recorder
            .get(anchor)
            .ok_or_else(|| Error::at(start, end, format!("unknown anchor id {anchor}")))?
            .to_vec();

        let count = self.expansions.entry(anchor).or_insert(0);
        *count += 1;
        if *count > self.limits.max_alias_expansions_per_anchor {
            return Err(Error::at(
                start,
                end,
                format!(
                    "alias expansion limit exceeded for anchor id {anchor}: {count} > {}",
                    self.limits.max_alias_expansions_per_anchor
                ),
            ));
        }
        let depth = self.replays.len() + 1;
        if depth > self.limits.max_replay_stack_depth {
            return Err(Error::at(
                start,
                end,
                format!(
                    "alias replay stack depth exceeded: {depth} > {}",
                    self.limits.max_replay_stack_depth
                ),
            ));
        }
        self.replays.push(Replay { events, next: 0 });
        Ok(())
    }

    fn start_document(&mut self) {
        self.replays.clear();
        self.recorder.clear();
        self.expansions.clear();
        self.replayed = 0;
    }
}

impl EventStream for LiveEvents<'_> {
    fn peek(&mut self) -> Result<Option<&Ev>, Error> {
        if self.look.is_none() {
            self.look = self.pull()?;
        }
        Ok(self.look.as_ref())
    }

    fn next(&mut self) -> Result<Option<Ev>, Error> {
        match self.look.take() {
            Some(ev) => {
                self.last_mark = ev.start();
                Ok(Some(ev))
            }
            None => self.pull(),
        }
    }

    fn skips_comments(&self) -> bool {
        true
    }

    fn last_mark(&self) -> Mark {
        self.last_mark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str, limits: AliasLimits) -> Result<Vec<Ev>, Error> {
        let mut ev = LiveEvents::new(input, limits);
        let mut out = Vec::new();
        while let Some(e) = ev.next()? {
            out.push(e);
        }
        Ok(out)
    }

    fn scalars(events: &[Ev]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                Ev::Node(n) => n.as_scalar().map(|(v, _)| v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn exposes_documents_and_marks() {
        let events = collect("a: 1\n", AliasLimits::default()).unwrap();
        assert!(matches!(events.first(), Some(Ev::DocumentStart { .. })));
        assert!(matches!(events.last(), Some(Ev::DocumentEnd { .. })));
        let Ev::Node(key) = &events[2] else {
            panic!("expected key scalar, got {:?}", events[2]);
        };
        assert_eq!(key.as_scalar().map(|(v, _)| v), Some("a"));
        assert_eq!((key.start.line(), key.start.column()), (1, 1));
    }

    #[test]
    fn aliases_replay_anchored_subtrees() {
        let events = collect("base: &b [1, 2]\ncopy: *b\n", AliasLimits::default()).unwrap();
        assert_eq!(scalars(&events), ["base", "1", "2", "copy", "1", "2"]);
        let starts = events
            .iter()
            .filter(|e| matches!(e, Ev::Node(n) if n.kind == NodeKind::SequenceStart))
            .count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn recordings_include_replayed_aliases() {
        let yaml = "a: &a [x]\nb: &b [*a, y]\nc: *b\n";
        let events = collect(yaml, AliasLimits::default()).unwrap();
        assert_eq!(scalars(&events), ["a", "x", "b", "x", "y", "c", "x", "y"]);
    }

    #[test]
    fn tags_are_preserved() {
        let events = collect("!circle {r: 1}\n", AliasLimits::default()).unwrap();
        let Ev::Node(node) = &events[1] else {
            panic!("expected mapping start");
        };
        assert_eq!(node.tag(), Some("!circle"));
    }

    #[test]
    fn alias_limits_are_enforced() {
        let limits = crate::alias_limits! { max_alias_expansions_per_anchor: 1 };
        let err = collect("a: &x 1\nb: *x\nc: *x\n", limits).unwrap_err();
        assert!(err.to_string().contains("alias expansion limit exceeded"));
    }

    #[test]
    fn unknown_alias_is_an_error() {
        assert!(collect("a: *nope\n", AliasLimits::default()).is_err());
    }

    #[test]
    fn scan_errors_are_positioned() {
        let err = collect("a: [1, 2\n", AliasLimits::default()).unwrap_err();
        assert!(err.is_positioned());
    }
}
