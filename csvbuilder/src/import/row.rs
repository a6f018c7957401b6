//! Imported row models.

use once_cell::unsync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::attribute::{resolve, AttributeObjects, ValueSource};
use crate::row::RowModel;
use crate::schema::{Column, DynamicColumn, Schema};
use crate::validation::{validate_row, Errors};
use crate::value::Context;

/// Where each column's cell sits in the rows of one input.
#[derive(Debug, Clone, Default)]
pub struct RowLayout {
    pub(crate) header_row: Vec<String>,
    pub(crate) positions: HashMap<String, usize>,
}

impl RowLayout {
    pub fn new(header_row: Vec<String>, positions: HashMap<String, usize>) -> Self {
        Self { header_row, positions }
    }

    pub fn header_row(&self) -> &[String] {
        &self.header_row
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
}

/// The physical cells of one row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    layout: &'a RowLayout,
    cells: &'a [String],
}

impl<'a> RawRow<'a> {
    pub fn new(layout: &'a RowLayout, cells: &'a [String]) -> Self {
        Self { layout, cells }
    }

    /// Raw cell of `column`, if the input carries that column.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.layout
            .position(column)
            .and_then(|i| self.cells.get(i))
            .map(String::as_str)
    }

    pub fn cells(&self) -> &'a [String] {
        self.cells
    }
}

impl<S> ValueSource<S> for RawRow<'_> {
    type Error = Infallible;

    fn static_value(&self, column: &Column<S>, _: &Context) -> Result<Value, Infallible> {
        let cell = self.get(column.name());
        Ok(match column.import_accessor() {
            Some(accessor) => accessor(cell.unwrap_or_default(), self),
            None => cell.map(|c| Value::String(c.to_string())).unwrap_or(Value::Null),
        })
    }

    fn dynamic_value(
        &self,
        template: &DynamicColumn<S>,
        column: &Column<S>,
        header: &str,
        _: &Context,
    ) -> Result<Value, Infallible> {
        let cell = self.get(column.name());
        Ok(match template.import_accessor() {
            Some(accessor) => accessor(cell.unwrap_or_default(), header),
            None => cell.map(|c| Value::String(c.to_string())).unwrap_or(Value::Null),
        })
    }
}

/// A row model bound to one physical input row.
pub struct ImportRow<S = ()> {
    schema: Rc<Schema<S>>,
    layout: Rc<RowLayout>,
    context: Rc<Context>,
    cells: Vec<String>,
    line: usize,
    previous: Weak<ImportRow<S>>,
    attributes: OnceCell<AttributeObjects>,
    errors: OnceCell<Errors>,
}

impl<S> ImportRow<S> {
    pub(crate) fn new(
        schema: Rc<Schema<S>>,
        layout: Rc<RowLayout>,
        context: Rc<Context>,
        cells: Vec<String>,
        line: usize,
        previous: Weak<ImportRow<S>>,
    ) -> Self {
        Self {
            schema,
            layout,
            context,
            cells,
            line,
            previous,
            attributes: OnceCell::new(),
            errors: OnceCell::new(),
        }
    }

    /// 1-based line of this row in the input; the header is line 1.
    pub fn line_number(&self) -> usize {
        self.line
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn raw(&self) -> RawRow<'_> {
        RawRow::new(&self.layout, &self.cells)
    }

    /// The header row as observed on the input.
    pub fn source_headers(&self) -> &[String] {
        self.layout.header_row()
    }

    /// Observed headers of the dynamic columns, in column order.
    pub fn dynamic_column_source_headers(&self) -> Vec<String> {
        self.schema
            .columns()
            .filter(|c| c.is_dynamic())
            .filter_map(|c| self.layout.position(c.name()))
            .filter_map(|i| self.layout.header_row().get(i).cloned())
            .collect()
    }

    /// The row read before this one, while the caller still holds it.
    pub fn previous_row_model(&self) -> Option<Rc<ImportRow<S>>> {
        self.previous.upgrade()
    }

    /// Whether the import withholds this row (invalid rows by default).
    pub fn skip(&self) -> bool {
        self.schema.hooks().skip(self)
    }
}

impl<S> RowModel for ImportRow<S> {
    type Source = S;

    fn schema(&self) -> &Schema<S> {
        &self.schema
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn attribute_objects(&self) -> &AttributeObjects {
        self.attributes.get_or_init(|| {
            let raw = self.raw();
            match resolve(self.schema.as_ref(), &raw, &self.context) {
                Ok(objects) => objects,
                Err(never) => match never {},
            }
        })
    }

    fn errors(&self) -> &Errors {
        self.errors
            .get_or_init(|| validate_row(self.schema.as_ref(), self.attribute_objects(), &self.context))
    }
}

impl<S> fmt::Debug for ImportRow<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRow")
            .field("schema", &self.schema.name())
            .field("line", &self.line)
            .field("cells", &self.cells)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Rule;
    use serde_json::json;

    fn layout() -> Rc<RowLayout> {
        let header_row = vec!["First name".to_string(), "Last name".to_string(), "Ruby".to_string()];
        let positions = [("first_name", 0), ("last_name", 1), ("skills_0", 2)]
            .iter()
            .map(|(n, i)| (n.to_string(), *i))
            .collect();
        Rc::new(RowLayout::new(header_row, positions))
    }

    fn schema() -> Rc<Schema> {
        let schema = Schema::new("UserRow")
            .column(Column::new("first_name").validate(Rule::presence()))
            .and_then(|s| {
                s.column(Column::new("last_name").import_with(|cell: &str, row: &RawRow<'_>| {
                    json!(format!("{} {}", row.get("first_name").unwrap_or_default(), cell))
                }))
            })
            .and_then(|s| {
                s.dynamic_column(
                    DynamicColumn::new("skills").import_with(|cell: &str, header: &str| json!(format!("{}={}", header, cell))),
                )
            })
            .and_then(|s| s.expand("skills", vec![json!("Ruby")]))
            .unwrap();
        Rc::new(schema)
    }

    fn row(cells: &[&str]) -> ImportRow {
        ImportRow::new(
            schema(),
            layout(),
            Rc::new(Context::new()),
            cells.iter().map(|c| c.to_string()).collect(),
            2,
            Weak::new(),
        )
    }

    #[test]
    fn test_accessors_see_raw_row() {
        let row = row(&["John", "Doe", "1"]);
        let attributes = row.attributes();
        assert_eq!(attributes["first_name"], json!("John"));
        assert_eq!(attributes["last_name"], json!("John Doe"));
        assert_eq!(attributes["skills"], json!(["Ruby=1"]));
        assert!(!attributes.contains_key("skills_0"));
        assert!(row.is_valid());
    }

    #[test]
    fn test_missing_cells_resolve_null() {
        let row = row(&[""]);
        assert_eq!(row.attributes()["first_name"], json!(""));
        assert!(!row.is_valid());
        assert_eq!(row.errors().messages("first_name"), vec!["can't be blank"]);

        let short = ImportRow::new(schema(), layout(), Rc::new(Context::new()), vec![], 2, Weak::new());
        assert_eq!(short.source_attributes()["first_name"], Value::Null);
    }

    #[test]
    fn test_row_metadata() {
        let row = row(&["John", "Doe", "1"]);
        assert_eq!(row.line_number(), 2);
        assert_eq!(row.source_headers(), &["First name", "Last name", "Ruby"]);
        assert_eq!(row.dynamic_column_source_headers(), vec!["Ruby"]);
        assert!(row.previous_row_model().is_none());
        assert!(!row.skip());
    }
}
