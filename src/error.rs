//! Defines the error type and its source positions.
use std::fmt;

use saphyr_parser::ScanError;
use serde::de;

use crate::location::{Mark, mark_from_marker};

/// Message used when a failure that carries no position is wrapped with the marks of the
/// node being deserialized.
pub(crate) const WRAPPED_FAILURE_MESSAGE: &str = "exception during deserialization";

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The instance factory could not produce an instance of the requested type.
    UnconstructibleType,
    /// No node deserializer in the chain accepted the resolved type.
    UnresolvedNode,
    /// The type converter could not coerce a produced value to the expected type.
    ConversionFailure,
    /// Any other failure, wrapped with a source position.
    WrappedFailure,
    /// The underlying YAML scanner rejected the input.
    Syntax,
    /// Free-form failure raised by a pipeline component.
    Message,
}

/// Error type for the whole deserialization pipeline.
///
/// Errors raised by components (factories, converters, resolvers, node deserializers) usually
/// carry no position. The value deserializer wraps them exactly once into
/// [`Error::Positioned`] using the marks of the node it was dispatching. Errors that already
/// carry a position pass through unchanged.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Free-form error without position.
    Message { msg: String },
    /// The requested type cannot be instantiated (abstract, `any`, or flagged non-constructible).
    Unconstructible { type_name: String, reason: String },
    /// A produced value could not be coerced into the target type.
    Conversion {
        value: String,
        target: String,
        reason: String,
    },
    /// No node deserializer was able to handle the resolved type.
    UnresolvedNode {
        type_name: String,
        start: Mark,
        end: Mark,
    },
    /// Failure with a known source span and an optional underlying cause.
    Positioned {
        msg: String,
        start: Mark,
        end: Mark,
        cause: Option<Box<Error>>,
    },
    /// Failure raised by foreign code (custom strategies), kept for diagnostics.
    External(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The YAML scanner rejected the input.
    Scan { msg: String, mark: Mark },
    /// Wrap an error with a pre-rendered source snippet (rustc-like).
    ///
    /// Only the cropped rendering is stored, never the full input.
    WithSnippet { text: String, error: Box<Error> },
}

impl Error {
    /// Construct a `Message` error with no known position.
    pub fn msg<S: Into<String>>(s: S) -> Self {
        Error::Message { msg: s.into() }
    }

    /// Construct an error that already knows where it happened.
    pub fn at<S: Into<String>>(start: Mark, end: Mark, msg: S) -> Self {
        Error::Positioned {
            msg: msg.into(),
            start,
            end,
            cause: None,
        }
    }

    /// Wrap a foreign error so that it can travel through the pipeline.
    pub fn external<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::External(Box::new(err))
    }

    pub(crate) fn unconstructible(type_name: &str, reason: impl Into<String>) -> Self {
        Error::Unconstructible {
            type_name: type_name.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn conversion(
        value: impl Into<String>,
        target: &str,
        reason: impl Into<String>,
    ) -> Self {
        Error::Conversion {
            value: value.into(),
            target: target.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(type_name: &str, start: Mark, end: Mark) -> Self {
        Error::UnresolvedNode {
            type_name: type_name.to_owned(),
            start,
            end,
        }
    }

    /// True if this error already carries source position context.
    pub fn is_positioned(&self) -> bool {
        matches!(
            self,
            Error::UnresolvedNode { .. }
                | Error::Positioned { .. }
                | Error::Scan { .. }
                | Error::WithSnippet { .. }
        )
    }

    /// Attach a source span unless the error already has one.
    ///
    /// Positioned errors are returned unchanged so that nested dispatch calls never
    /// double-wrap a failure.
    pub fn wrap_at(self, start: Mark, end: Mark) -> Self {
        if self.is_positioned() {
            self
        } else {
            Error::Positioned {
                msg: WRAPPED_FAILURE_MESSAGE.to_owned(),
                start,
                end,
                cause: Some(Box::new(self)),
            }
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Message { .. } | Error::External(_) => ErrorKind::Message,
            Error::Unconstructible { .. } => ErrorKind::UnconstructibleType,
            Error::Conversion { .. } => ErrorKind::ConversionFailure,
            Error::UnresolvedNode { .. } => ErrorKind::UnresolvedNode,
            Error::Positioned { .. } => ErrorKind::WrappedFailure,
            Error::Scan { .. } => ErrorKind::Syntax,
            Error::WithSnippet { error, .. } => error.kind(),
        }
    }

    /// Innermost error of a wrapping chain.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Positioned {
                cause: Some(cause), ..
            } => cause.root_cause(),
            Error::WithSnippet { error, .. } => error.root_cause(),
            other => other,
        }
    }

    /// Start mark of the span this error refers to, if known.
    pub fn start(&self) -> Option<Mark> {
        match self {
            Error::UnresolvedNode { start, .. } | Error::Positioned { start, .. } => {
                Some(*start).filter(|m| !m.is_empty())
            }
            Error::Scan { mark, .. } => Some(*mark).filter(|m| !m.is_empty()),
            Error::WithSnippet { error, .. } => error.start(),
            _ => None,
        }
    }

    /// End mark of the span this error refers to, if known.
    pub fn end(&self) -> Option<Mark> {
        match self {
            Error::UnresolvedNode { end, .. } | Error::Positioned { end, .. } => {
                Some(*end).filter(|m| !m.is_empty())
            }
            Error::Scan { mark, .. } => Some(*mark).filter(|m| !m.is_empty()),
            Error::WithSnippet { error, .. } => error.end(),
            _ => None,
        }
    }

    /// serde_yaml-compatible alias for [`Error::start`].
    pub fn location(&self) -> Option<Mark> {
        self.start()
    }

    /// Map a `saphyr_parser::ScanError` into our error type with position.
    pub(crate) fn from_scan_error(err: ScanError) -> Self {
        Error::Scan {
            msg: err.info().to_owned(),
            mark: mark_from_marker(err.marker()),
        }
    }

    /// Message without position suffix, used by snippet rendering.
    pub(crate) fn bare_message(&self) -> String {
        match self {
            Error::Message { msg } => msg.clone(),
            Error::Unconstructible { type_name, reason } => {
                format!("cannot construct an instance of type {type_name}: {reason}")
            }
            Error::Conversion {
                value,
                target,
                reason,
            } => format!("cannot convert {value} to {target}: {reason}"),
            Error::UnresolvedNode { type_name, .. } => format!(
                "no node deserializer was able to deserialize the node into type {type_name}"
            ),
            Error::Positioned { msg, cause, .. } => match cause {
                Some(cause) => format!("{msg}: {}", cause.bare_message()),
                None => msg.clone(),
            },
            Error::External(err) => err.to_string(),
            Error::Scan { msg, .. } => msg.clone(),
            Error::WithSnippet { error, .. } => error.bare_message(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WithSnippet { text, error } => {
                if text.is_empty() {
                    write!(f, "{error}")
                } else {
                    f.write_str(text)
                }
            }
            Error::Scan { mark, .. } => fmt_with_location(f, &self.bare_message(), mark),
            Error::UnresolvedNode { start, .. } | Error::Positioned { start, .. } => {
                fmt_with_location(f, &self.bare_message(), start)
            }
            _ => f.write_str(&self.bare_message()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Positioned {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            Error::External(err) => Some(err.as_ref()),
            Error::WithSnippet { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::msg(msg.to_string())
    }
}

/// Print a message optionally suffixed with "at line X, column Y".
fn fmt_with_location(f: &mut fmt::Formatter<'_>, msg: &str, mark: &Mark) -> fmt::Result {
    if !mark.is_empty() {
        write!(f, "{msg} at line {}, column {}", mark.line, mark.column)
    } else {
        write!(f, "{msg}")
    }
}
