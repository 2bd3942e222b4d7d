use std::fmt;
use std::io::{self, Write};

use serde::Serialize;

/// One line of a validation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub label: String,
    pub value: String,
    pub invalid: bool,
}

impl ReportLine {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        ReportLine {
            label: label.into(),
            value: value.into(),
            invalid: false,
        }
    }

    /// A line that is flagged unless `valid` holds.
    pub fn checked(label: impl Into<String>, value: impl Into<String>, valid: bool) -> Self {
        ReportLine {
            invalid: !valid,
            ..ReportLine::new(label, value)
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)?;
        if self.invalid {
            f.write_str(" (INVALID)")?;
        }
        Ok(())
    }
}

/// Receives report lines as the validator produces them.
pub trait ReportOutput {
    fn emit(&mut self, line: ReportLine);
}

impl ReportOutput for Vec<ReportLine> {
    fn emit(&mut self, line: ReportLine) {
        self.push(line);
    }
}

/// Writes each line as text, one per line.
///
/// Emitting cannot fail; the first write error is kept and returned by [`TextOutput::finish`],
/// and later lines are dropped.
pub struct TextOutput<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> TextOutput<W> {
    pub fn with_writer(writer: W) -> Self {
        TextOutput {
            writer,
            error: None,
        }
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> ReportOutput for TextOutput<W> {
    fn emit(&mut self, line: ReportLine) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{line}") {
            self.error = Some(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ReportLine::new("Pause", "60 ticks").to_string(), "Pause: 60 ticks");
        assert_eq!(
            ReportLine::checked("Command", "sv_cheats 1", false).to_string(),
            "Command: sv_cheats 1 (INVALID)"
        );
    }

    #[test]
    fn test_text_output_writes_lines() {
        let mut output = TextOutput::with_writer(Vec::new());
        output.emit(ReportLine::new("A", "1"));
        output.emit(ReportLine::checked("B", "2", false));

        let written = output.finish().unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), "A: 1\nB: 2 (INVALID)\n");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_text_output_reports_first_error() {
        let mut output = TextOutput::with_writer(FailingWriter);
        output.emit(ReportLine::new("A", "1"));
        output.emit(ReportLine::new("B", "2"));
        assert!(output.finish().is_err());
    }
}
