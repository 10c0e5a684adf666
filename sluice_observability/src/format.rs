//! Compact, colored log lines: `[LEVEL] [MM-DD|hh:mm:ss.mmm] message key=value`.
use std::{fmt, io};

use nu_ansi_term::Color;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{Event, Level, Subscriber, field, span};
use tracing_subscriber::{
    field::{RecordFields, VisitFmt, VisitOutput},
    fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields, format::Writer},
    registry::LookupSpan,
};

const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[[[month]-[day]|[hour]:[minute]:[second].[subsecond digits:3]]"
);

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SluiceFormat;

impl<S, N> FormatEvent<S, N> for SluiceFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = event.metadata().level();
        write!(writer, "{} ", LevelLabel::new(level, writer.has_ansi_escapes()))?;

        if format_timestamp(&mut writer).is_err() {
            write!(writer, "[<unknown-timestamp>]")?;
        }
        writer.write_char(' ')?;

        ctx.format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

impl<'w> FormatFields<'w> for SluiceFormat {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'w>, fields: R) -> fmt::Result {
        let mut visitor = FieldVisitor::new(writer, true);
        fields.record(&mut visitor);
        visitor.finish()
    }

    fn add_fields(
        &self,
        current: &'w mut FormattedFields<Self>,
        fields: &span::Record<'_>,
    ) -> fmt::Result {
        let is_empty = current.is_empty();
        let mut visitor = FieldVisitor::new(current.as_writer(), is_empty);
        fields.record(&mut visitor);
        visitor.finish()
    }
}

fn format_timestamp(writer: &mut Writer<'_>) -> fmt::Result {
    let now = OffsetDateTime::now_utc();
    let mut adaptor = WriteAdaptor { inner: writer };
    now.format_into(&mut adaptor, TIME_FORMAT)
        .map_err(|_| fmt::Error)?;
    Ok(())
}

struct FieldVisitor<'a> {
    writer: Writer<'a>,
    is_empty: bool,
    result: fmt::Result,
}

impl<'a> FieldVisitor<'a> {
    fn new(writer: Writer<'a>, is_empty: bool) -> Self {
        Self {
            writer,
            is_empty,
            result: Ok(()),
        }
    }

    fn separator(&mut self) -> &'static str {
        if std::mem::take(&mut self.is_empty) {
            ""
        } else {
            " "
        }
    }
}

impl field::Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.record_debug(field, &format_args!("{value}"));
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        if self.result.is_err() {
            return;
        }

        let separator = self.separator();
        let name = field.name();
        self.result = if name == "message" {
            write!(self.writer, "{separator}{value:<40?}")
        } else if self.writer.has_ansi_escapes() {
            let color = if name == "error" { Color::Red } else { Color::Blue };
            let value = format!("{value:?}");
            write!(self.writer, "{separator}{name}={}", color.paint(value))
        } else {
            write!(self.writer, "{separator}{name}={value:?}")
        };
    }
}

impl VisitOutput<fmt::Result> for FieldVisitor<'_> {
    fn finish(self) -> fmt::Result {
        self.result
    }
}

impl VisitFmt for FieldVisitor<'_> {
    fn writer(&mut self) -> &mut dyn fmt::Write {
        &mut self.writer
    }
}

struct LevelLabel<'a> {
    level: &'a Level,
    ansi: bool,
}

impl<'a> LevelLabel<'a> {
    fn new(level: &'a Level, ansi: bool) -> Self {
        Self { level, ansi }
    }
}

impl fmt::Display for LevelLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, color) = match *self.level {
            Level::TRACE => ("TRACE", Color::Purple),
            Level::DEBUG => ("DEBUG", Color::Blue),
            Level::INFO => ("INFO", Color::Green),
            Level::WARN => ("WARN", Color::Yellow),
            Level::ERROR => ("ERROR", Color::Red),
        };

        if self.ansi {
            write!(f, "[{}]", color.paint(label))
        } else {
            write!(f, "[{label}]")
        }
    }
}

/// Lets `time` write into a `fmt::Write`.
struct WriteAdaptor<'a> {
    inner: &'a mut dyn fmt::Write,
}

impl io::Write for WriteAdaptor<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = std::str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.write_str(s).map_err(io::Error::other)?;
        Ok(s.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
