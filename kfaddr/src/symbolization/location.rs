//! Parsed `addr2line --pretty-print` records

use std::fmt;

use super::paths::{strip_annotations, PathNormalizer};

const INLINED_BY: &str = "(inlined by) ";
const UNKNOWN_LINE: &str = "?";

/// One frame of a resolved address: the innermost function, or one of the
/// callers it was inlined into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub function: String,
    pub file: String,
    /// `None` when the file is known but the line is printed as `?`
    pub line: Option<u32>,
    pub inlined: bool,
}

impl ResolvedLocation {
    /// Parse `func at path:line`, optionally preceded by `(inlined by)` and
    /// followed by annotations like `(discriminator 2)`
    ///
    /// Records without a usable file (`?? ??:0`, `func at ??:?`) give
    /// `None`. A known file with an unknown line (`func at x.c:?`) parses
    /// with no line number.
    #[must_use]
    pub fn parse(record: &str) -> Option<Self> {
        let trimmed = record.trim_start();
        let (inlined, rest) = match trimmed.strip_prefix(INLINED_BY) {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (function, location) = rest.split_once(" at ")?;
        let location = strip_annotations(location);
        let (file, line) = location.rsplit_once(':')?;
        let line = if line == UNKNOWN_LINE { None } else { Some(line.parse().ok()?) };
        if file.is_empty() || file == "??" || function.is_empty() {
            return None;
        }

        Some(Self { function: function.to_string(), file: file.to_string(), line, inlined })
    }

    /// Render with the path shortened by `paths`
    #[must_use]
    pub fn render(&self, paths: &PathNormalizer) -> String {
        let prefix = if self.inlined { " (inlined by) " } else { "" };
        format!(
            "{prefix}{} at {}:{}",
            self.function,
            paths.normalize(&self.file),
            LineNumber(self.line)
        )
    }
}

struct LineNumber(Option<u32>);

impl fmt::Display for LineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(line) => write!(f, "{line}"),
            None => f.write_str(UNKNOWN_LINE),
        }
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inlined {
            f.write_str(" (inlined by) ")?;
        }
        write!(f, "{} at {}:{}", self.function, self.file, LineNumber(self.line))
    }
}
