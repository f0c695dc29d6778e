//! `miette` integration.
//!
//! This module is feature-gated behind the `miette` feature.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

use crate::Error;

/// Convert a deserialization [`Error`] into a `miette::Report`.
///
/// # Example
///
/// ```rust,no_run
/// use saphyr_dispatch::{DeserializerBuilder, TypeRef};
///
/// let yaml = "definitely\n";
/// let err = DeserializerBuilder::new()
///     .build()
///     .from_str(yaml, &TypeRef::bool())
///     .expect_err("bool parse error expected");
/// let report = saphyr_dispatch::miette::to_miette_report(&err, yaml, "config.yaml");
/// eprintln!("{report:?}");
/// ```
///
/// The error never retains the input, so this helper owns a copy of `source`. Errors
/// without a position produce a report without labels.
pub fn to_miette_report(err: &Error, source: &str, file: &str) -> miette::Report {
    let src = Arc::new(NamedSource::new(file, source.to_owned()));
    miette::Report::new(build_diagnostic(err, source, src))
}

#[derive(Clone, Debug)]
struct ErrorDiagnostic {
    message: String,
    src: Arc<NamedSource<String>>,
    labels: Vec<LabeledSpan>,
}

impl fmt::Display for ErrorDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorDiagnostic {}

impl Diagnostic for ErrorDiagnostic {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Box::new(self.labels.iter().cloned()))
        }
    }
}

fn build_diagnostic(err: &Error, source: &str, src: Arc<NamedSource<String>>) -> ErrorDiagnostic {
    let err = match err {
        Error::WithSnippet { error, .. } => error.as_ref(),
        other => other,
    };
    let message = err.bare_message();
    let mut labels = Vec::new();
    if let Some(start) = err.start() {
        let end = err.end().unwrap_or(start);
        // Marks count characters; miette wants byte offsets.
        let byte_of = |index: u64| {
            usize::try_from(index)
                .ok()
                .and_then(|i| source.char_indices().nth(i).map(|(b, _)| b))
                .unwrap_or(source.len())
        };
        let from = byte_of(start.index());
        let to = byte_of(end.index()).max(from);
        labels.push(LabeledSpan::new_with_span(
            Some(message.clone()),
            SourceSpan::new(from.into(), to - from),
        ));
    }
    ErrorDiagnostic {
        message,
        src,
        labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Mark;

    #[test]
    fn labels_follow_marks() {
        let source = "héllo: wörld\n";
        let err = Error::at(Mark::new(7, 1, 8), Mark::new(12, 1, 13), "bad value");
        let diag = build_diagnostic(&err, source, Arc::new(NamedSource::new("t.yaml", source.to_owned())));
        let label = &diag.labels[0];
        assert_eq!(&source[label.offset()..label.offset() + label.len()], "wörld");
    }

    #[test]
    fn no_labels_without_position() {
        let diag = build_diagnostic(&Error::msg("x"), "", Arc::new(NamedSource::new("t", String::new())));
        assert!(diag.labels().is_none());
    }
}
