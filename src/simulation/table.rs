//! Console table for watching philosophers change state.
//!
//! Each event is one row with a column per seat; only the acting seat's cell is
//! filled, right-aligned, and every row is followed by a separator:
//!
//! ```text
//! |                        |              1 eating|                        |
//! +------------------------+------------------------+------------------------+
//! ```

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;

/// Formats state changes as table rows.
#[derive(Debug, Clone, Copy)]
pub struct TableFormatter {
    seats: usize,
    width: usize,
}

impl TableFormatter {
    /// A table of `seats` columns, each `width` characters including its right border.
    ///
    /// # Panics
    /// Panics if `width < 2`.
    pub fn new(seats: usize, width: usize) -> Self {
        assert!(width >= 2, "a column needs room for a border and a character");
        Self { seats, width }
    }

    /// Renders the row for `seat` followed by the separator line, both newline-terminated.
    pub fn row(&self, seat: usize, message: &str) -> String {
        let inner = self.width - 1;
        let mut out = String::with_capacity((self.seats * self.width + 2) * 2);
        out.push('|');
        for column in 0..self.seats {
            if column == seat {
                let cell = format!("{seat} {message}|");
                let _ = write!(out, "{cell:>width$}", width = self.width);
            } else {
                out.extend(std::iter::repeat(' ').take(inner));
                out.push('|');
            }
        }
        out.push('\n');
        for _ in 0..self.seats {
            out.push('+');
            out.extend(std::iter::repeat('-').take(inner));
        }
        out.push_str("+\n");
        out
    }
}

/// A shared output sink; rows from different threads never interleave.
pub struct TableLog {
    formatter: TableFormatter,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl TableLog {
    /// Writes rows formatted by `formatter` to `sink`.
    pub fn new(formatter: TableFormatter, sink: impl Write + Send + 'static) -> Self {
        Self {
            formatter,
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Appends one event.
    ///
    /// # Errors
    /// Propagates write errors from the sink.
    pub fn log(&self, seat: usize, message: &str) -> io::Result<()> {
        let row = self.formatter.row(seat, message);
        let mut sink = self.sink.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sink.write_all(row.as_bytes())?;
        sink.flush()
    }
}
