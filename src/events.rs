//! Parse events consumed by the deserialization pipeline and the stream abstraction over them.
//!
//! The pipeline never talks to the YAML scanner directly. It reads [`Ev`] values through the
//! [`EventStream`] trait, which provides one-item lookahead (`peek`), consumption (`next`)
//! and a handful of helpers built on those two primitives:
//! - [`EventStream::accept_node`]: peek the pending event as a structural node event,
//! - [`EventStream::consume_node`]: advance past a pending node event,
//! - [`EventStream::skip_following_comments`]: skip a run of comment events,
//! - [`EventStream::pending_comment`]: introspect the pending event for comment kind,
//! - [`EventStream::skip_node`]: consume a whole subtree.
//!
//! Two sources are provided: [`crate::live_events::LiveEvents`] over `saphyr-parser`, and
//! [`EventBuffer`], an in-memory replay buffer that can also carry comment events.

use std::collections::VecDeque;

pub use saphyr_parser::ScalarStyle;

use crate::error::Error;
use crate::location::Mark;

/// Kind of a structural node event.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// A scalar with its raw text and presentation style.
    Scalar { value: String, style: ScalarStyle },
    /// Start of a sequence (`[` / `-`-list).
    SequenceStart,
    /// Start of a mapping (`{` or block mapping).
    MappingStart,
}

/// Marker for the start of a scalar, sequence or mapping node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeEvent {
    pub kind: NodeKind,
    /// Tag as written in the source (e.g. `!!int`, `!circle`), if any.
    pub tag: Option<String>,
    /// Numeric anchor id, 0 if none.
    pub anchor: usize,
    pub start: Mark,
    pub end: Mark,
}

impl NodeEvent {
    pub fn scalar(value: impl Into<String>, start: Mark, end: Mark) -> Self {
        Self {
            kind: NodeKind::Scalar {
                value: value.into(),
                style: ScalarStyle::Plain,
            },
            tag: None,
            anchor: 0,
            start,
            end,
        }
    }

    pub fn sequence_start(start: Mark, end: Mark) -> Self {
        Self {
            kind: NodeKind::SequenceStart,
            tag: None,
            anchor: 0,
            start,
            end,
        }
    }

    pub fn mapping_start(start: Mark, end: Mark) -> Self {
        Self {
            kind: NodeKind::MappingStart,
            tag: None,
            anchor: 0,
            start,
            end,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_style(mut self, new_style: ScalarStyle) -> Self {
        if let NodeKind::Scalar { style, .. } = &mut self.kind {
            *style = new_style;
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    /// Scalar text and style, if this is a scalar.
    pub fn as_scalar(&self) -> Option<(&str, ScalarStyle)> {
        match &self.kind {
            NodeKind::Scalar { value, style } => Some((value.as_str(), *style)),
            _ => None,
        }
    }
}

/// A comment event. Inline comments trail a node on the same line; standalone comments
/// occupy their own lines.
#[derive(Clone, Debug, PartialEq)]
pub struct Comment {
    pub value: String,
    pub inline: bool,
    pub start: Mark,
    pub end: Mark,
}

impl Comment {
    pub fn standalone(value: impl Into<String>, start: Mark, end: Mark) -> Self {
        Self {
            value: value.into(),
            inline: false,
            start,
            end,
        }
    }

    pub fn inline(value: impl Into<String>, start: Mark, end: Mark) -> Self {
        Self {
            value: value.into(),
            inline: true,
            start,
            end,
        }
    }
}

/// Owned event fed into the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Ev {
    /// Start of a scalar, sequence or mapping node.
    Node(NodeEvent),
    /// End of a sequence.
    SequenceEnd { start: Mark, end: Mark },
    /// End of a mapping.
    MappingEnd { start: Mark, end: Mark },
    /// Start of a YAML document (`---`, explicit or implicit).
    DocumentStart { start: Mark, end: Mark },
    /// End of a YAML document.
    DocumentEnd { start: Mark, end: Mark },
    Comment(Comment),
}

impl Ev {
    /// Start mark of this event.
    pub fn start(&self) -> Mark {
        match self {
            Ev::Node(node) => node.start,
            Ev::Comment(comment) => comment.start,
            Ev::SequenceEnd { start, .. }
            | Ev::MappingEnd { start, .. }
            | Ev::DocumentStart { start, .. }
            | Ev::DocumentEnd { start, .. } => *start,
        }
    }

    /// End mark of this event.
    pub fn end(&self) -> Mark {
        match self {
            Ev::Node(node) => node.end,
            Ev::Comment(comment) => comment.end,
            Ev::SequenceEnd { end, .. }
            | Ev::MappingEnd { end, .. }
            | Ev::DocumentStart { end, .. }
            | Ev::DocumentEnd { end, .. } => *end,
        }
    }

    /// Short human phrase used in "unexpected event" messages.
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Ev::Node(NodeEvent {
                kind: NodeKind::Scalar { .. },
                ..
            }) => "scalar",
            Ev::Node(NodeEvent {
                kind: NodeKind::SequenceStart,
                ..
            }) => "sequence start",
            Ev::Node(NodeEvent {
                kind: NodeKind::MappingStart,
                ..
            }) => "mapping start",
            Ev::SequenceEnd { .. } => "sequence end",
            Ev::MappingEnd { .. } => "mapping end",
            Ev::DocumentStart { .. } => "document start",
            Ev::DocumentEnd { .. } => "document end",
            Ev::Comment(_) => "comment",
        }
    }
}

/// Source of parse events for the deserialization pipeline.
///
/// At most one dispatch call reads a given stream at a time; nested calls are strictly
/// nested (the callee fully consumes its node before returning).
pub trait EventStream {
    /// Peek at the next event without consuming it.
    ///
    /// Returns `Ok(None)` at end of stream.
    fn peek(&mut self) -> Result<Option<&Ev>, Error>;

    /// Pull the next event from the stream.
    fn next(&mut self) -> Result<Option<Ev>, Error>;

    /// True if the source already drops comment events on its own.
    fn skips_comments(&self) -> bool;

    /// Last mark that `next` or `peek` has observed.
    fn last_mark(&self) -> Mark;

    /// The pending event as a structural node event, if it is one.
    fn accept_node(&mut self) -> Result<Option<NodeEvent>, Error> {
        match self.peek()? {
            Some(Ev::Node(node)) => Ok(Some(node.clone())),
            _ => Ok(None),
        }
    }

    /// Advance past a pending node event.
    fn consume_node(&mut self) -> Result<NodeEvent, Error> {
        match self.next()? {
            Some(Ev::Node(node)) => Ok(node),
            Some(other) => Err(Error::at(
                other.start(),
                other.end(),
                format!("unexpected event: expected a node, found {}", other.describe()),
            )),
            None => Err(eof(self.last_mark())),
        }
    }

    /// The pending event as a comment, if it is one.
    fn pending_comment(&mut self) -> Result<Option<&Comment>, Error> {
        match self.peek()? {
            Some(Ev::Comment(comment)) => Ok(Some(comment)),
            _ => Ok(None),
        }
    }

    /// Skip forward past a run of comment events (inline and standalone alike).
    fn skip_following_comments(&mut self) -> Result<(), Error> {
        while matches!(self.peek()?, Some(Ev::Comment(_))) {
            self.next()?;
        }
        Ok(())
    }

    /// Consume the pending end-of-sequence event if there is one.
    fn try_sequence_end(&mut self) -> Result<bool, Error> {
        if matches!(self.peek()?, Some(Ev::SequenceEnd { .. })) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume the pending end-of-mapping event if there is one.
    fn try_mapping_end(&mut self) -> Result<bool, Error> {
        if matches!(self.peek()?, Some(Ev::MappingEnd { .. })) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume one complete node (scalar or whole container subtree), including any
    /// comments inside it.
    fn skip_node(&mut self) -> Result<(), Error> {
        self.skip_following_comments()?;
        let mut depth = 0usize;
        loop {
            let Some(ev) = self.next()? else {
                return Err(eof(self.last_mark()));
            };
            match ev {
                Ev::Node(NodeEvent {
                    kind: NodeKind::SequenceStart | NodeKind::MappingStart,
                    ..
                }) => depth += 1,
                Ev::Node(_) | Ev::Comment(_) => {}
                Ev::SequenceEnd { start, end } | Ev::MappingEnd { start, end } => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::at(start, end, "list or mapping end with no start"))?;
                }
                Ev::DocumentStart { start, end } | Ev::DocumentEnd { start, end } => {
                    return Err(Error::at(start, end, "unexpected document boundary inside a node"));
                }
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }
}

/// Unexpected end-of-input error at the last observed mark.
pub(crate) fn eof(mark: Mark) -> Error {
    Error::at(mark, mark, "unexpected end of input")
}

/// Event source that replays a pre-recorded buffer.
///
/// Useful for feeding synthetic event sequences (including comments, which `saphyr-parser`
/// does not report) into the pipeline, and for replaying captured subtrees.
#[derive(Clone, Debug, Default)]
pub struct EventBuffer {
    buf: VecDeque<Ev>,
    skip_comments: bool,
    last_mark: Mark,
}

impl EventBuffer {
    /// Create a buffer that preserves comment events.
    pub fn new(events: impl IntoIterator<Item = Ev>) -> Self {
        Self {
            buf: events.into_iter().collect(),
            skip_comments: false,
            last_mark: Mark::EMPTY,
        }
    }

    /// Drop all comment events up front and report `skips_comments() == true`.
    pub fn without_comments(mut self) -> Self {
        self.buf.retain(|ev| !matches!(ev, Ev::Comment(_)));
        self.skip_comments = true;
        self
    }

    pub fn push(&mut self, ev: Ev) {
        self.buf.push_back(ev);
    }

    /// Number of events not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}

impl EventStream for EventBuffer {
    fn peek(&mut self) -> Result<Option<&Ev>, Error> {
        if let Some(ev) = self.buf.front() {
            self.last_mark = ev.start();
        }
        Ok(self.buf.front())
    }

    fn next(&mut self) -> Result<Option<Ev>, Error> {
        let ev = self.buf.pop_front();
        if let Some(ev) = &ev {
            self.last_mark = ev.end();
        }
        Ok(ev)
    }

    fn skips_comments(&self) -> bool {
        self.skip_comments
    }

    fn last_mark(&self) -> Mark {
        self.last_mark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(i: u64) -> Mark {
        Mark::new(i, 1, i as u32 + 1)
    }

    #[test]
    fn skip_node_consumes_nested_subtree() {
        let mut s = EventBuffer::new([
            Ev::Node(NodeEvent::mapping_start(m(0), m(0))),
            Ev::Node(NodeEvent::scalar("a", m(1), m(2))),
            Ev::Node(NodeEvent::sequence_start(m(3), m(3))),
            Ev::Node(NodeEvent::scalar("1", m(4), m(5))),
            Ev::SequenceEnd {
                start: m(6),
                end: m(6),
            },
            Ev::MappingEnd {
                start: m(7),
                end: m(7),
            },
            Ev::Node(NodeEvent::scalar("after", m(8), m(13))),
        ]);
        s.skip_node().unwrap();
        let next = s.accept_node().unwrap().expect("node");
        assert_eq!(next.as_scalar().map(|(v, _)| v), Some("after"));
    }

    #[test]
    fn without_comments_strips_them() {
        let s = EventBuffer::new([
            Ev::Comment(Comment::standalone("x", m(0), m(1))),
            Ev::Node(NodeEvent::scalar("v", m(2), m(3))),
        ])
        .without_comments();
        assert!(s.skips_comments());
        assert_eq!(s.remaining(), 1);
    }

    #[test]
    fn consume_node_rejects_structure_end() {
        let mut s = EventBuffer::new([Ev::SequenceEnd {
            start: m(0),
            end: m(0),
        }]);
        let err = s.consume_node().unwrap_err();
        assert!(err.to_string().contains("sequence end"));
    }
}
