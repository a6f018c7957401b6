//! Export stream controller.
//!
//! An [`Export`] binds the schema's dynamic templates from its context,
//! writes the header row, then appends one physical row per source model.
//!
//! # Example
//!
//! ```rust
//! use csvbuilder::prelude::*;
//! use serde_json::{json, Map};
//!
//! struct User {
//!     first_name: String,
//!     last_name: String,
//! }
//!
//! let schema = Schema::<User>::new("UserExport")
//!     .column(Column::new("first_name").header("First Name").export_with(|u: &User, _: &Context| json!(u.first_name)))?
//!     .column(Column::new("last_name").header("Last Name").export_with(|u: &User, _: &Context| json!(u.last_name)))?;
//!
//! let user = User { first_name: "John".into(), last_name: "Doe".into() };
//! let mut export = Export::new(&schema, Map::new())?;
//! export.append_model(&user, &Map::new())?;
//!
//! assert_eq!(export.to_csv_string()?, "First Name,Last Name\nJohn,Doe\n");
//! # Ok::<(), csvbuilder::ExportError>(())
//! ```

mod row;
pub mod sink;

pub use row::ExportRow;
pub use sink::{MemorySink, RowSink};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;

use crate::attribute::resolve;
use crate::error::{CsvError, ExportResult};
use crate::import::source::delimiter_byte;
use crate::schema::Schema;
use crate::value::{merge_context, Context};
use row::ModelSource;

/// Options for writing an output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Cell delimiter
    pub delimiter: char,

    /// Write the header row first
    pub write_headers: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            write_headers: true,
        }
    }
}

/// Accumulates row models into a sink.
pub struct Export<S = (), K = csv::Writer<Vec<u8>>> {
    schema: Rc<Schema<S>>,
    context: Context,
    sink: K,
    rows: usize,
}

impl<S> Export<S> {
    /// Export to an in-memory CSV buffer.
    pub fn new(schema: &Schema<S>, context: Context) -> ExportResult<Self> {
        Self::with_options(schema, context, ExportOptions::default())
    }

    pub fn with_options(schema: &Schema<S>, context: Context, options: ExportOptions) -> ExportResult<Self> {
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter_byte(options.delimiter)?)
            .from_writer(Vec::new());
        Self::to_sink(writer, schema, context, options)
    }

    /// The header row and every appended row, as CSV text.
    pub fn to_csv_string(&mut self) -> ExportResult<String> {
        RowSink::flush(&mut self.sink)?;
        let text = String::from_utf8(self.sink.get_ref().clone()).map_err(CsvError::from)?;
        Ok(text)
    }

    pub fn write_to_path<P: AsRef<Path>>(&mut self, path: P) -> ExportResult<()> {
        let text = self.to_csv_string()?;
        std::fs::write(path.as_ref(), text).map_err(CsvError::from)?;
        info!("Wrote {} row(s) to {}", self.rows, path.as_ref().display());
        Ok(())
    }
}

impl<S, K: RowSink> Export<S, K> {
    /// Export into any sink. Dynamic templates are bound from `context` here.
    pub fn to_sink(sink: K, schema: &Schema<S>, context: Context, options: ExportOptions) -> ExportResult<Self> {
        let schema = schema.bind_context(&context)?;
        let mut export = Self {
            schema: Rc::new(schema),
            context,
            sink,
            rows: 0,
        };
        if options.write_headers {
            let headers = export.headers();
            export.sink.write_row(&headers)?;
        }
        Ok(export)
    }

    pub fn headers(&self) -> Vec<String> {
        self.schema.headers(&self.context)
    }

    /// The bound schema.
    pub fn schema(&self) -> &Schema<S> {
        &self.schema
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Number of rows appended so far.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Hand the export to `build`, then flush the sink.
    pub fn generate<F>(&mut self, build: F) -> ExportResult<()>
    where
        F: FnOnce(&mut Self) -> ExportResult<()>,
    {
        build(self)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Resolve every attribute of `source` and append its row.
    ///
    /// `context` is merged over the export's own context for this row only.
    pub fn append_model<'m>(&mut self, source: &'m S, context: &Context) -> ExportResult<ExportRow<'m, S>> {
        let context = merge_context(&self.context, context);
        let values = ModelSource {
            schema: self.schema.as_ref(),
            model: source,
        };
        let attributes = resolve(self.schema.as_ref(), &values, &context)?;
        let row = ExportRow::new(Rc::clone(&self.schema), source, context, attributes);

        self.sink.write_row(row.cells())?;
        self.rows += 1;
        debug!("Appended row {} to {}", self.rows, self.schema.name());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::row::RowModel;
    use crate::schema::{Column, DynamicColumn};
    use serde_json::{json, Value};

    fn records_schema() -> Schema<Value> {
        Schema::<Value>::new("Records")
            .column(Column::new("first_name").header("First Name"))
            .and_then(|s| s.column(Column::new("last_name").header("Last Name")))
            .unwrap()
            .read_fields_with(|record: &Value, name: &str| record.get(name).cloned())
    }

    fn ctx(value: Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_export_with_field_reader() {
        let mut export = Export::new(&records_schema(), Context::new()).unwrap();
        let record = json!({"first_name": "John", "last_name": "Doe"});
        let row = export.append_model(&record, &Context::new()).unwrap();
        assert_eq!(row.cells(), &["John", "Doe"]);
        assert_eq!(row.source_model()["first_name"], json!("John"));
        assert_eq!(export.row_count(), 1);
        assert_eq!(export.to_csv_string().unwrap(), "First Name,Last Name\nJohn,Doe\n");
    }

    #[test]
    fn test_missing_accessor() {
        let schema = Schema::<Value>::new("Bare").column(Column::new("first_name")).unwrap();
        let mut export = Export::new(&schema, Context::new()).unwrap();
        let err = export.append_model(&json!({}), &Context::new()).unwrap_err();
        assert!(matches!(err, ExportError::MissingAccessor(name) if name == "first_name"));
    }

    #[test]
    fn test_dynamic_fields_from_list_and_object() {
        let schema = records_schema()
            .dynamic_column(DynamicColumn::new("skills"))
            .unwrap()
            .format_dynamic_column_cells(|cells, _, _| {
                cells
                    .iter()
                    .map(|c| match c {
                        Value::Bool(true) => json!("1"),
                        Value::Bool(false) => json!("0"),
                        other => other.clone(),
                    })
                    .collect()
            });
        let context = ctx(json!({"skills": ["Ruby", "Python", "Javascript"]}));
        let mut export = Export::new(&schema, context).unwrap();
        assert_eq!(
            export.headers(),
            vec!["First Name", "Last Name", "Ruby", "Python", "Javascript"]
        );

        let listed = json!({"first_name": "John", "last_name": "Doe", "skills": ["Ruby"]});
        let row = export.append_model(&listed, &Context::new()).unwrap();
        assert_eq!(row.cells(), &["John", "Doe", "1", "0", "0"]);
        assert_eq!(row.attributes()["skills"], json!(["1", "0", "0"]));

        let keyed = json!({"first_name": "Jane", "last_name": "Roe", "skills": {"Python": "expert"}});
        let row = export.append_model(&keyed, &Context::new()).unwrap();
        assert_eq!(row.cells(), &["Jane", "Roe", "", "expert", ""]);
    }

    #[test]
    fn test_invalid_collection_in_context() {
        let schema = records_schema().dynamic_column(DynamicColumn::new("skills")).unwrap();
        let result = Export::new(&schema, ctx(json!({"skills": "Ruby"})));
        assert!(matches!(result, Err(ExportError::Schema(_))));
    }

    #[test]
    fn test_memory_sink_without_headers() {
        let options = ExportOptions {
            write_headers: false,
            ..Default::default()
        };
        let mut export = Export::to_sink(MemorySink::default(), &records_schema(), Context::new(), options).unwrap();
        export
            .generate(|sink| {
                sink.append_model(&json!({"first_name": "John", "last_name": "Doe"}), &Context::new())?;
                sink.append_model(&json!({"first_name": "Jane"}), &Context::new())?;
                Ok(())
            })
            .unwrap();
        assert_eq!(
            export.sink().rows,
            vec![vec!["John".to_string(), "Doe".to_string()], vec!["Jane".to_string(), String::new()]]
        );
    }

    #[test]
    fn test_semicolon_delimiter() {
        let options = ExportOptions {
            delimiter: ';',
            ..Default::default()
        };
        let mut export = Export::with_options(&records_schema(), Context::new(), options).unwrap();
        export
            .append_model(&json!({"first_name": "John", "last_name": "Doe; Jr"}), &Context::new())
            .unwrap();
        assert_eq!(export.to_csv_string().unwrap(), "First Name;Last Name\nJohn;\"Doe; Jr\"\n");
    }
}
