//! Run traces: the period-scoped, append-only diagnostic outputs.
//!
//! [`DebugTrace`] holds the debug XML stream for the whole run: one root
//! element, one block per period. It closes the root and flushes on
//! [`DebugTrace::finish`] or, failing that, on drop, so an aborted run still
//! leaves a well-formed document.
//!
//! [`SupplyDemandTrace`] is the CSV trace: a header row group per solved
//! period followed by one row per market.
//!
//! Write failures on either trace are logged and swallowed; diagnostics
//! never stop the run.

use std::io::{self, Write};

use tracing::warn;

use crate::market::Marketplace;
use crate::xml::XmlWriter;

/// Columns repeated across one header row of the supply/demand trace.
const SD_HEADER_GROUP: &str = "Market,Name,Price,Supply,Demand,";

/// Number of column groups in one header row.
const SD_HEADER_REPEATS: usize = 5;

/// Debug XML stream with a guaranteed root close.
pub struct DebugTrace {
    xml: XmlWriter<'static>,
    root_open: bool,
}

impl DebugTrace {
    /// Wrap an opened debug writer.
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            xml: XmlWriter::from_boxed(out),
            root_open: false,
        }
    }

    /// Whether the root element has been opened and not yet closed.
    pub const fn is_root_open(&self) -> bool {
        self.root_open
    }

    /// Write the declaration and the `<scenario>` root.
    pub fn open_root(&mut self, name: &str, date: &str) {
        let result = self.xml.declaration().and_then(|()| {
            self.xml
                .open("scenario", &[("name", name), ("date", date)])?;
            self.xml.element("summary", "Debugging output")
        });
        self.root_open = true;
        log_failure("debug trace", result);
    }

    /// Append one block produced by `write`.
    pub fn write_block(&mut self, write: impl FnOnce(&mut XmlWriter<'static>) -> io::Result<()>) {
        let result = write(&mut self.xml);
        log_failure("debug trace", result);
    }

    /// Close the root element if it is open.
    pub fn close_root(&mut self) {
        if !self.root_open {
            return;
        }
        self.root_open = false;
        let result = self.xml.close("scenario");
        log_failure("debug trace", result);
    }

    /// Close the root (if still open) and flush.
    pub fn finish(mut self) {
        self.close_and_flush();
    }

    fn close_and_flush(&mut self) {
        self.close_root();
        let result = self.xml.flush();
        log_failure("debug trace", result);
    }
}

impl Drop for DebugTrace {
    fn drop(&mut self) {
        if self.root_open {
            warn!("Debug trace dropped with its root open, closing it");
        }
        self.close_and_flush();
    }
}

/// CSV supply/demand trace.
pub struct SupplyDemandTrace {
    out: Box<dyn Write>,
}

impl SupplyDemandTrace {
    /// Wrap an opened trace writer.
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    /// Write `Period <p>: <year>` and the column header row.
    pub fn write_period_header(&mut self, period: usize, year: i32) {
        let result = writeln!(self.out, "Period {period}: {year}").and_then(|()| {
            for _ in 0..SD_HEADER_REPEATS {
                self.out.write_all(SD_HEADER_GROUP.as_bytes())?;
            }
            writeln!(self.out)
        });
        log_failure("supply/demand trace", result);
    }

    /// Write one row per market for `period`.
    pub fn write_markets(&mut self, marketplace: &Marketplace, period: usize) {
        let result = marketplace.write_supply_demand(period, &mut self.out);
        log_failure("supply/demand trace", result);
    }

    /// Flush the trace.
    pub fn finish(mut self) {
        let result = self.out.flush();
        log_failure("supply/demand trace", result);
    }
}

fn log_failure(sink: &str, result: io::Result<()>) {
    if let Err(e) = result {
        warn!(sink, error = %e, "Trace write failed");
    }
}
