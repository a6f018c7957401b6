//! Physical row sinks.

use std::io::Write;

use crate::error::CsvResult;

/// A writer of physical rows. Quoting and escaping are the sink's job.
pub trait RowSink {
    fn write_row(&mut self, cells: &[String]) -> CsvResult<()>;

    fn flush(&mut self) -> CsvResult<()>;
}

impl<W: Write> RowSink for csv::Writer<W> {
    fn write_row(&mut self, cells: &[String]) -> CsvResult<()> {
        self.write_record(cells)?;
        Ok(())
    }

    fn flush(&mut self) -> CsvResult<()> {
        csv::Writer::flush(self)?;
        Ok(())
    }
}

/// Rows collected in memory, for callers that post-process cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    pub rows: Vec<Vec<String>>,
}

impl RowSink for MemorySink {
    fn write_row(&mut self, cells: &[String]) -> CsvResult<()> {
        self.rows.push(cells.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> CsvResult<()> {
        Ok(())
    }
}
