//! Import stream controller.
//!
//! [`Import`] is a lazy, cancelable iterator over the rows of an input. The
//! header row is read and reconciled on the first step; every following step
//! reads one physical row, builds an [`ImportRow`] for it, runs the
//! registered hooks and yields the row unless it is skipped.
//!
//! Header mismatch, abort and end of input all end the iteration the same
//! way. Check [`Import::errors`] afterwards to tell them apart.
//!
//! # Example
//!
//! ```rust
//! use csvbuilder::prelude::*;
//!
//! let schema: Schema = Schema::new("UserRow")
//!     .column(Column::new("first_name").header("First Name"))?
//!     .column(Column::new("last_name").header("Last Name"))?;
//!
//! let mut import = Import::from_text("First name,Last name\nJohn,Doe\n", &schema, ImportOptions::default())?;
//! let rows: Vec<_> = import.by_ref().collect();
//!
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].attributes()["first_name"], "John");
//! assert!(import.errors().is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod row;
pub mod source;

pub use row::{ImportRow, RawRow, RowLayout};
pub use source::{CsvRowSource, MemoryRows, RowSource};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::mem;
use std::path::Path;
use std::rc::{Rc, Weak};

use crate::error::CsvResult;
use crate::header::{reconcile, HeaderMatch};
use crate::schema::Schema;
use crate::validation::Errors;
use crate::value::Context;

/// Options for reading an input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// How observed headers are compared with the schema's headers
    pub header_match: HeaderMatch,

    /// Cell delimiter; detected from the first line when absent
    pub delimiter: Option<char>,

    /// Skip rows whose cells are all blank
    pub skip_blank_rows: bool,

    /// Trim whitespace around every cell
    pub trim: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            header_match: HeaderMatch::default(),
            delimiter: None,
            skip_blank_rows: true,
            trim: false,
        }
    }
}

impl ImportOptions {
    pub fn with_header_match(mut self, mode: HeaderMatch) -> Self {
        self.header_match = mode;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }
}

/// What a stream hook sees of the controller.
pub struct ImportState<'a, S> {
    current: Option<&'a Rc<ImportRow<S>>>,
    previous: Option<&'a Rc<ImportRow<S>>>,
    header_row: Option<&'a [String]>,
    end_of_file: bool,
    errors: &'a mut Errors,
    aborted: &'a mut bool,
}

impl<'a, S> ImportState<'a, S> {
    pub fn current_row_model(&self) -> Option<&'a Rc<ImportRow<S>>> {
        self.current
    }

    pub fn previous_row_model(&self) -> Option<&'a Rc<ImportRow<S>>> {
        self.previous
    }

    /// True right after the first data row was read.
    pub fn is_header_boundary(&self) -> bool {
        self.current.is_some() && self.previous.is_none()
    }

    pub fn is_end_of_file(&self) -> bool {
        self.end_of_file
    }

    pub fn header_row(&self) -> Option<&'a [String]> {
        self.header_row
    }

    pub fn errors(&self) -> &Errors {
        &*self.errors
    }

    pub fn errors_mut(&mut self) -> &mut Errors {
        &mut *self.errors
    }

    /// End the stream before the next row is yielded.
    pub fn abort(&mut self) {
        *self.aborted = true;
    }
}

/// Hook run around every row read.
pub type StreamHook<S> = Box<dyn FnMut(&mut ImportState<'_, S>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    ReadingRows,
    Finished,
}

#[derive(Clone, Copy)]
enum HookPoint {
    BeforeNext,
    AfterNext,
}

/// Rows read from decoded text.
pub type TextSource = CsvRowSource<Cursor<Vec<u8>>>;

/// Lazy enumeration of the rows of one input.
pub struct Import<S = (), R = TextSource> {
    source: R,
    base_schema: Schema<S>,
    schema: Rc<Schema<S>>,
    context: Rc<Context>,
    options: ImportOptions,
    phase: Phase,
    layout: Rc<RowLayout>,
    header_row: Option<Vec<String>>,
    current: Option<Rc<ImportRow<S>>>,
    previous: Option<Rc<ImportRow<S>>>,
    errors: Errors,
    aborted: bool,
    end_of_file: bool,
    line: usize,
    before_next: Vec<StreamHook<S>>,
    after_next: Vec<StreamHook<S>>,
}

impl<S> Import<S> {
    /// Import CSV text.
    pub fn from_text(content: &str, schema: &Schema<S>, options: ImportOptions) -> CsvResult<Self> {
        let delimiter = options
            .delimiter
            .unwrap_or_else(|| source::detect_delimiter(content));
        let rows = CsvRowSource::from_text(content, delimiter, options.trim)?;
        Ok(Self::new(rows, schema, options))
    }

    /// Import raw bytes, detecting their encoding.
    pub fn from_bytes(bytes: &[u8], schema: &Schema<S>, options: ImportOptions) -> CsvResult<Self> {
        let input = source::decode_bytes(bytes, options.delimiter)?;
        let rows = CsvRowSource::from_text(&input.content, input.delimiter, options.trim)?;
        Ok(Self::new(rows, schema, options))
    }

    /// Import a file, detecting its encoding.
    pub fn from_path<P: AsRef<Path>>(path: P, schema: &Schema<S>, options: ImportOptions) -> CsvResult<Self> {
        info!("Importing {}", path.as_ref().display());
        let input = source::read_path(path, options.delimiter)?;
        let rows = CsvRowSource::from_text(&input.content, input.delimiter, options.trim)?;
        Ok(Self::new(rows, schema, options))
    }
}

impl<S, R: RowSource> Import<S, R> {
    pub fn new(source: R, schema: &Schema<S>, options: ImportOptions) -> Self {
        Self {
            source,
            base_schema: schema.clone(),
            schema: Rc::new(schema.clone()),
            context: Rc::new(Context::new()),
            options,
            phase: Phase::Start,
            layout: Rc::new(RowLayout::default()),
            header_row: None,
            current: None,
            previous: None,
            errors: Errors::new(),
            aborted: false,
            end_of_file: false,
            line: 0,
            before_next: Vec::new(),
            after_next: Vec::new(),
        }
    }

    /// Context handed to accessors, hooks and validations.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Rc::new(context);
        self
    }

    /// Run `hook` before each physical row is read.
    pub fn before_next<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut ImportState<'_, S>) + 'static,
    {
        self.before_next.push(Box::new(hook));
        self
    }

    /// Run `hook` after each row model is built, and once at end of input.
    pub fn after_next<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut ImportState<'_, S>) + 'static,
    {
        self.after_next.push(Box::new(hook));
        self
    }

    /// Controller-level errors: header mismatch, unreadable rows, hook errors.
    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    /// Stop the stream; the next step yields nothing.
    pub fn abort(&mut self) {
        if !self.aborted {
            debug!("Import aborted at line {}", self.line);
        }
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn is_end_of_file(&self) -> bool {
        self.end_of_file
    }

    /// The observed header row, once read.
    pub fn header_row(&self) -> Option<&[String]> {
        self.header_row.as_deref()
    }

    /// The schema rows are bound to; dynamic columns are bound once the
    /// header row has been read.
    pub fn schema(&self) -> &Schema<S> {
        &self.schema
    }

    pub fn headers(&self) -> Vec<String> {
        self.schema.headers(&self.context)
    }

    pub fn current_row_model(&self) -> Option<&Rc<ImportRow<S>>> {
        self.current.as_ref()
    }

    pub fn previous_row_model(&self) -> Option<&Rc<ImportRow<S>>> {
        self.previous.as_ref()
    }

    fn finish(&mut self) {
        if self.phase != Phase::Finished {
            info!(
                "Import finished after {} line(s) with {} error(s)",
                self.line,
                self.errors.len()
            );
        }
        self.phase = Phase::Finished;
    }

    fn run_hooks(&mut self, point: HookPoint) {
        let mut hooks = match point {
            HookPoint::BeforeNext => mem::take(&mut self.before_next),
            HookPoint::AfterNext => mem::take(&mut self.after_next),
        };
        {
            let mut state = ImportState {
                current: self.current.as_ref(),
                previous: self.previous.as_ref(),
                header_row: self.header_row.as_deref(),
                end_of_file: self.end_of_file,
                errors: &mut self.errors,
                aborted: &mut self.aborted,
            };
            for hook in hooks.iter_mut() {
                hook(&mut state);
            }
        }
        match point {
            HookPoint::BeforeNext => self.before_next = hooks,
            HookPoint::AfterNext => self.after_next = hooks,
        }
    }

    /// Read and reconcile the header row. Returns `false` when the stream
    /// cannot continue.
    fn read_header(&mut self) -> bool {
        self.phase = Phase::ReadingRows;

        let header = match self.source.read_row() {
            Ok(Some(header)) => header,
            Ok(None) => {
                debug!("Input has no header row");
                self.finish();
                return false;
            }
            Err(e) => {
                warn!("Unreadable header row: {}", e);
                self.errors.add_base(format!("Line 1: {}", e));
                self.finish();
                return false;
            }
        };
        self.line = self.source.line().unwrap_or(1);

        let mode = self.options.header_match;
        let bound = self
            .base_schema
            .bind_available(&self.context)
            .and_then(|s| s.bind_observed_headers(&header, mode, &self.context));
        let schema = match bound {
            Ok(schema) => schema,
            Err(e) => {
                warn!("Cannot bind dynamic columns: {}", e);
                self.errors.add_base(e.to_string());
                self.finish();
                return false;
            }
        };

        let report = reconcile(&schema.expected_headers(&self.context), &header, mode);
        if let Some(message) = report.error_message() {
            warn!("{}", message);
            self.errors.add_base(message);
            self.schema = Rc::new(schema);
            self.header_row = Some(header);
            self.finish();
            return false;
        }

        self.layout = Rc::new(RowLayout::new(header.clone(), report.positions));
        self.schema = Rc::new(schema);
        self.header_row = Some(header);
        true
    }
}

impl<S, R: RowSource> Iterator for Import<S, R> {
    type Item = Rc<ImportRow<S>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.aborted {
                self.finish();
                return None;
            }
            match self.phase {
                Phase::Finished => return None,
                Phase::Start => {
                    if !self.read_header() {
                        return None;
                    }
                    continue;
                }
                Phase::ReadingRows => {}
            }

            self.run_hooks(HookPoint::BeforeNext);
            if self.aborted {
                continue;
            }

            let cells = match self.source.read_row() {
                Ok(Some(cells)) => cells,
                Ok(None) => {
                    self.end_of_file = true;
                    self.run_hooks(HookPoint::AfterNext);
                    self.finish();
                    return None;
                }
                Err(e) => {
                    warn!("Unreadable row after line {}: {}", self.line, e);
                    self.errors.add_base(format!("Line {}: {}", self.line + 1, e));
                    self.finish();
                    return None;
                }
            };
            self.line = self.source.line().unwrap_or(self.line + 1);

            if self.options.skip_blank_rows && cells.iter().all(|c| c.trim().is_empty()) {
                debug!("Skipping blank line {}", self.line);
                continue;
            }

            let previous = self.current.take();
            let row = Rc::new(ImportRow::new(
                Rc::clone(&self.schema),
                Rc::clone(&self.layout),
                Rc::clone(&self.context),
                cells,
                self.line,
                previous.as_ref().map(Rc::downgrade).unwrap_or_else(Weak::new),
            ));
            self.previous = previous;
            self.current = Some(Rc::clone(&row));

            self.run_hooks(HookPoint::AfterNext);
            if self.aborted {
                continue;
            }
            if row.skip() {
                debug!("Skipping line {}", self.line);
                continue;
            }
            return Some(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowModel;
    use crate::schema::{Column, DynamicColumn};
    use crate::validation::Rule;
    use serde_json::json;
    use std::cell::Cell;

    fn schema() -> Schema {
        Schema::new("BasicRowModel")
            .column(Column::new("first_name").header("First Name").validate(Rule::presence()))
            .and_then(|s| s.column(Column::new("last_name").header("Last Name")))
            .unwrap()
    }

    fn rows(data: &[&[&str]]) -> MemoryRows {
        MemoryRows::new(data.iter().map(|r| r.to_vec()))
    }

    #[test]
    fn test_basic_import() {
        let mut import = Import::new(
            rows(&[&["First name", "Last name"], &["John", "Doe"]]),
            &schema(),
            ImportOptions::default(),
        );
        let row = import.next().unwrap();
        assert_eq!(row.attributes()["first_name"], json!("John"));
        assert_eq!(row.attributes()["last_name"], json!("Doe"));
        assert!(import.next().is_none());
        assert!(import.errors().is_empty());
        assert!(import.is_end_of_file());
    }

    #[test]
    fn test_header_mismatch_yields_nothing() {
        let mut import = Import::new(
            rows(&[&["First Name", "Nickname"], &["John", "JD"]]),
            &schema(),
            ImportOptions::default(),
        );
        assert!(import.next().is_none());
        assert_eq!(import.errors().len(), 1);
        let message = &import.errors().full_messages()[0];
        assert!(message.starts_with("Headers mismatch."));
        assert!(message.contains("Unrecognized headers (Nickname)"));
        assert!(message.contains("Missing headers (Last Name)"));
        // Stays terminal.
        assert!(import.next().is_none());
    }

    #[test]
    fn test_header_mismatch_keeps_bound_schema() {
        let schema: Schema = schema().dynamic_column(DynamicColumn::new("skills")).unwrap();
        let mut import = Import::new(
            rows(&[&["First Name", "Nickname", "Ruby"], &["John", "JD", "1"]]),
            &schema,
            ImportOptions::default(),
        )
        .with_context(json!({"skills": ["Ruby"]}).as_object().cloned().unwrap());

        assert!(import.next().is_none());
        assert_eq!(import.headers(), vec!["First Name", "Last Name", "Ruby"]);
        assert!(import.errors().full_messages()[0]
            .contains("Expected headers (First Name, Last Name, Ruby)"));
    }

    #[test]
    fn test_line_numbers_count_physical_lines() {
        let input = "First Name,Last Name\n\nJohn,Doe\n\"Ja\nne\",Roe\nJim,Poe\n";
        let lines: Vec<_> = Import::from_text(input, &schema(), ImportOptions::default())
            .unwrap()
            .map(|r| r.line_number())
            .collect();
        assert_eq!(lines, vec![3, 4, 6]);
    }

    #[test]
    fn test_before_next_abort_stops_reading() {
        let mut import = Import::new(
            rows(&[&["First Name", "Last Name"], &["John", "Doe"], &["Jane", "Roe"]]),
            &schema(),
            ImportOptions::default(),
        )
        .before_next(|state| {
            if state.current_row_model().is_some() {
                state.abort();
            }
        });

        let first = import.next().unwrap();
        assert_eq!(first.attributes()["first_name"], json!("John"));
        assert!(import.next().is_none());
        assert!(import.is_aborted());
        assert!(!import.is_end_of_file());
    }

    #[test]
    fn test_after_next_runs_once_at_end_of_input() {
        let calls = Rc::new(Cell::new(0));
        let at_end = Rc::new(Cell::new(0));
        let (seen_calls, seen_end) = (Rc::clone(&calls), Rc::clone(&at_end));

        let yielded = Import::new(
            rows(&[&["First Name", "Last Name"], &["John", "Doe"], &["Jane", "Roe"]]),
            &schema(),
            ImportOptions::default(),
        )
        .after_next(move |state| {
            seen_calls.set(seen_calls.get() + 1);
            if state.is_end_of_file() {
                seen_end.set(seen_end.get() + 1);
            }
        })
        .count();

        assert_eq!(yielded, 2);
        assert_eq!(calls.get(), 3);
        assert_eq!(at_end.get(), 1);
    }

    #[test]
    fn test_after_next_abort_on_later_row() {
        let mut import = Import::new(
            rows(&[
                &["First Name", "Last Name"],
                &["John", "Doe"],
                &["Jane", "Roe"],
                &["Jim", "Poe"],
            ]),
            &schema(),
            ImportOptions::default(),
        )
        .after_next(|state| {
            if state.current_row_model().map(|r| r.line_number()) == Some(3) {
                state.abort();
            }
        });

        assert_eq!(import.next().unwrap().line_number(), 2);
        assert!(import.next().is_none());
        assert!(import.is_aborted());
        assert!(import.next().is_none());
    }

    #[test]
    fn test_empty_input() {
        let mut import = Import::new(MemoryRows::default(), &schema(), ImportOptions::default());
        assert!(import.next().is_none());
        assert!(import.errors().is_empty());
    }

    #[test]
    fn test_invalid_rows_skipped_by_default() {
        let import = Import::new(
            rows(&[&["First Name", "Last Name"], &["", "Doe"], &["Jane", "Roe"]]),
            &schema(),
            ImportOptions::default(),
        );
        let yielded: Vec<_> = import.collect();
        assert_eq!(yielded.len(), 1);
        assert_eq!(yielded[0].line_number(), 3);
    }

    #[test]
    fn test_custom_skip_yields_invalid_rows() {
        let schema = schema().skip_if(|_| false);
        let yielded: Vec<_> = Import::new(
            rows(&[&["First Name", "Last Name"], &["", "Doe"]]),
            &schema,
            ImportOptions::default(),
        )
        .collect();
        assert_eq!(yielded.len(), 1);
        assert!(!yielded[0].is_valid());
    }

    #[test]
    fn test_blank_rows() {
        let data: &[&[&str]] = &[&["First Name", "Last Name"], &["", ""], &["John", "Doe"]];
        assert_eq!(Import::new(rows(data), &schema(), ImportOptions::default()).count(), 1);

        let keep_blank = ImportOptions {
            skip_blank_rows: false,
            ..Default::default()
        };
        let lines: Vec<_> = Import::new(rows(data), &schema().skip_if(|_| false), keep_blank)
            .map(|r| r.line_number())
            .collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn test_abort_from_caller() {
        let mut import = Import::new(
            rows(&[&["First Name", "Last Name"], &["John", "Doe"], &["Jane", "Roe"]]),
            &schema(),
            ImportOptions::default(),
        );
        assert!(import.next().is_some());
        import.abort();
        import.abort();
        assert!(import.is_aborted());
        assert!(import.next().is_none());
        assert!(import.errors().is_empty());
    }

    #[test]
    fn test_hooks_see_header_boundary_and_previous_row() {
        let boundaries = Rc::new(Cell::new(0));
        let seen = Rc::clone(&boundaries);
        let import = Import::new(
            rows(&[&["First Name", "Last Name"], &["John", "Doe"], &["Jane", "Roe"]]),
            &schema(),
            ImportOptions::default(),
        )
        .after_next(move |state| {
            if state.is_header_boundary() {
                seen.set(seen.get() + 1);
            }
        });

        let yielded: Vec<_> = import.collect();
        assert_eq!(boundaries.get(), 1);
        let previous = yielded[1].previous_row_model().unwrap();
        assert_eq!(previous.line_number(), 2);
    }

    #[test]
    fn test_after_next_records_errors_and_aborts() {
        let mut import = Import::new(
            rows(&[&["First Name", "Last Name"], &["John", "Doe"], &["Jane", "Roe"]]),
            &schema(),
            ImportOptions::default(),
        )
        .after_next(|state| {
            if let Some(row) = state.current_row_model() {
                if row.attributes()["first_name"] == json!("John") {
                    state.errors_mut().add_base("John is not allowed");
                    state.abort();
                }
            }
        });
        assert!(import.next().is_none());
        assert_eq!(import.errors().full_messages(), vec!["John is not allowed"]);
    }

    #[test]
    fn test_dynamic_columns_bound_from_headers() {
        let schema: Schema = schema()
            .dynamic_column(DynamicColumn::new("skills").import_with(|cell: &str, _: &str| json!(cell == "1")))
            .unwrap();
        let mut import = Import::new(
            rows(&[&["First Name", "Last Name", "Ruby", "Python"], &["John", "Doe", "1", "0"]]),
            &schema,
            ImportOptions::default(),
        );
        let row = import.next().unwrap();
        assert_eq!(row.attributes()["skills"], json!([true, false]));
        assert_eq!(row.dynamic_column_source_headers(), vec!["Ruby", "Python"]);
        assert_eq!(import.headers(), vec!["First Name", "Last Name", "Ruby", "Python"]);
    }

    #[test]
    fn test_dynamic_columns_bound_from_context() {
        let schema: Schema = schema().dynamic_column(DynamicColumn::new("skills")).unwrap();
        let context = json!({"skills": ["Ruby"]}).as_object().cloned().unwrap();
        let mut import = Import::new(
            rows(&[&["First Name", "Last Name", "Cobol"], &["John", "Doe", "1"]]),
            &schema,
            ImportOptions::default(),
        )
        .with_context(context);
        assert!(import.next().is_none());
        assert!(import.errors().full_messages()[0].contains("Unrecognized headers (Cobol)"));
    }

    #[test]
    fn test_from_text_detects_delimiter() {
        let rows: Vec<_> = Import::from_text("First Name;Last Name\nJohn;Doe\n", &schema(), ImportOptions::default())
            .unwrap()
            .collect();
        assert_eq!(rows[0].attributes()["last_name"], json!("Doe"));
    }
}
