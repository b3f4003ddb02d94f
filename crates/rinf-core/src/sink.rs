//! Result sink: one `<key>,<class>` line per classified record.

use std::io::Write;

use tracing::debug;

use crate::error::SinkError;
use crate::postprocess::format_line;
use crate::record::Keyed;
use crate::storage::ObjectStore;

/// Writes classified records to an output object.
pub struct ResultSink {
    locator: String,
    writer: Box<dyn Write + Send>,
    lines: usize,
}

impl ResultSink {
    /// Create (or truncate) the output object.
    pub fn open(store: &dyn ObjectStore, locator: &str) -> Result<Self, SinkError> {
        let writer = store.create(locator).map_err(|source| SinkError::Open {
            locator: locator.to_string(),
            source,
        })?;
        debug!("Writing predictions to {}", locator);

        Ok(Self {
            locator: locator.to_string(),
            writer,
            lines: 0,
        })
    }

    pub fn write(&mut self, record: &Keyed<usize>) -> Result<(), SinkError> {
        writeln!(self.writer, "{}", format_line(record))?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush buffered lines; returns how many were written.
    pub fn finish(mut self) -> Result<usize, SinkError> {
        self.writer.flush()?;
        debug!("Wrote {} lines to {}", self.lines, self.locator);
        Ok(self.lines)
    }
}
