//! Source marks attached to parse events and errors.

use saphyr_parser::{Marker, Span as ParserSpan};
use serde::{Deserialize, Serialize};

/// A position within the source YAML document.
///
/// `index` counts Unicode scalar values from the start of the input (this matches
/// `saphyr-parser`'s native reporting). `line` and `column` are 1-indexed.
///
/// [`Mark::EMPTY`] is the sentinel used when no position is known, for example when
/// a failure happens before any node event was seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Mark {
    pub(crate) index: u64,
    pub(crate) line: u32,
    pub(crate) column: u32,
}

impl Mark {
    /// Sentinel mark meaning "position unknown".
    pub const EMPTY: Self = Self {
        index: 0,
        line: 0,
        column: 0,
    };

    /// Create a new mark. `line` and `column` are 1-indexed.
    pub const fn new(index: u64, line: u32, column: u32) -> Self {
        Self {
            index,
            line,
            column,
        }
    }

    /// Character offset from the start of the input.
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// serde_yaml-compatible line information.
    #[inline]
    pub fn line(&self) -> u64 {
        self.line as u64
    }

    /// serde_yaml-compatible column information.
    #[inline]
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// Convert a `saphyr_parser::Marker` into a 1-indexed [`Mark`].
///
/// The parser reports 1-based lines and 0-based columns.
pub(crate) fn mark_from_marker(marker: &Marker) -> Mark {
    // 4 Gb lines are larger than any YAML document we can imagine, and this is
    // diagnostics only.
    Mark::new(
        marker.index() as u64,
        marker.line() as u32,
        (marker.col() + 1) as u32,
    )
}

/// Convert a parser span into a `(start, end)` pair of marks.
pub(crate) fn marks_from_span(span: &ParserSpan) -> (Mark, Mark) {
    (mark_from_marker(&span.start), mark_from_marker(&span.end))
}
