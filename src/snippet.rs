//! Rustc-like source snippets for positioned errors, rendered with `annotate-snippets`.

use annotate_snippets::{
    AnnotationKind, Level, Renderer, Snippet as AnnotateSnippet, renderer::DecorStyle,
};

use crate::error::Error;
use crate::location::Mark;

/// Display path used in snippet headers for string input.
pub(crate) const INPUT_PATH: &str = "<input>";

impl Error {
    /// Attach a rendered snippet of `source` around this error's position.
    ///
    /// Errors without a position, and errors that already carry a snippet, are returned
    /// unchanged. Only the cropped rendering is kept, never the whole input.
    pub fn with_snippet(self, source: &str, crop_radius: usize) -> Self {
        if matches!(self, Error::WithSnippet { .. }) {
            return self;
        }
        let Some(start) = self.start() else {
            return self;
        };
        let end = self.end().unwrap_or(start);
        match render(source, INPUT_PATH, &self.bare_message(), start, end, crop_radius) {
            Some(text) => Error::WithSnippet {
                text,
                error: Box::new(self),
            },
            None => self,
        }
    }
}

/// Render `msg` against a window of two lines around `start`.
///
/// Lines longer than the crop window are cut horizontally to `crop_radius` characters on
/// each side of the annotated span; `0` disables horizontal cropping.
pub(crate) fn render(
    source: &str,
    path: &str,
    msg: &str,
    start: Mark,
    end: Mark,
    crop_radius: usize,
) -> Option<String> {
    // Parsers ignore a leading BOM; keep columns aligned with them.
    let text = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    let row = usize::try_from(start.line()).ok()?;
    if row == 0 || row > lines.len() {
        return None;
    }
    let col = usize::try_from(start.column()).ok()?.max(1);
    let span_chars = if end.line() == start.line() && end.column() > start.column() {
        usize::try_from(end.column() - start.column()).ok()?
    } else {
        1
    };

    let first = row.saturating_sub(2).max(1);
    let last = row.saturating_add(2).min(lines.len());
    let (left, width) = if crop_radius == 0 {
        (0, usize::MAX)
    } else {
        let left = (col - 1).saturating_sub(crop_radius);
        (left, (col - 1 - left) + span_chars + crop_radius)
    };

    let mut window = String::new();
    let mut span = 0..0;
    for (offset, line) in lines[first - 1..last].iter().enumerate() {
        // Context lines too short to reach the crop window stay intact.
        let (skipped, cropped): (usize, String) = if line.chars().count() > left {
            (left, line.chars().skip(left).take(width).collect())
        } else {
            (0, (*line).to_owned())
        };
        if first + offset == row {
            let len = cropped.chars().count();
            let s = (col - 1).saturating_sub(skipped).min(len);
            let e = (s + span_chars).min(len);
            let byte_at = |c: usize| cropped.char_indices().nth(c).map_or(cropped.len(), |(b, _)| b);
            span = window.len() + byte_at(s)..window.len() + byte_at(e);
        }
        window.push_str(&cropped);
        window.push('\n');
    }

    let report = &[Level::ERROR
        .primary_title(format!("line {row} column {col}: {msg}"))
        .element(
            AnnotateSnippet::source(&window)
                .line_start(first)
                .path(path)
                .fold(false)
                .annotation(AnnotationKind::Primary.span(span).label(msg)),
        )];

    // Plain ASCII output keeps error strings stable and free of escape sequences.
    let renderer = Renderer::plain().decor_style(DecorStyle::Ascii);
    Some(renderer.render(report).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_window_with_caret() {
        let yaml = "name: x\nport: abc\nhost: y\n";
        let err = Error::at(Mark::new(14, 2, 7), Mark::new(17, 2, 10), "not a number");
        let rendered = err.with_snippet(yaml, 64).to_string();
        assert!(rendered.contains("line 2 column 7: not a number"), "{rendered}");
        assert!(rendered.contains("port: abc"), "{rendered}");
        assert!(rendered.contains("^^^"), "{rendered}");
    }

    #[test]
    fn unpositioned_errors_are_untouched() {
        let err = Error::msg("plain").with_snippet("a: 1\n", 64);
        assert!(matches!(err, Error::Message { .. }));
    }

    #[test]
    fn long_lines_are_cropped() {
        let yaml = format!("key: {}X{}\n", "a".repeat(300), "b".repeat(300));
        let err = Error::at(Mark::new(305, 1, 306), Mark::new(306, 1, 307), "here");
        let rendered = err.with_snippet(&yaml, 10).to_string();
        assert!(rendered.contains('X'), "{rendered}");
        assert!(rendered.len() < 200, "{rendered}");
    }

    #[test]
    fn out_of_range_position_falls_back() {
        let err = Error::at(Mark::new(0, 9, 1), Mark::new(0, 9, 1), "gone");
        let err = err.with_snippet("a: 1\n", 64);
        assert_eq!(err.to_string(), "gone at line 9, column 1");
    }
}
