//! Exported row models.

use once_cell::unsync::OnceCell;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use crate::attribute::{AttributeObjects, ValueSource};
use crate::error::ExportError;
use crate::row::RowModel;
use crate::schema::{Column, DynamicColumn, Schema};
use crate::validation::{validate_row, Errors};
use crate::value::{cell_text, entry_text, Context};

/// Reads source values off an exported source model.
pub(crate) struct ModelSource<'a, S> {
    pub(crate) schema: &'a Schema<S>,
    pub(crate) model: &'a S,
}

impl<S> ValueSource<S> for ModelSource<'_, S> {
    type Error = ExportError;

    fn static_value(&self, column: &Column<S>, context: &Context) -> Result<Value, ExportError> {
        if let Some(accessor) = column.export_accessor() {
            return Ok(accessor(self.model, context));
        }
        match self.schema.field_reader() {
            Some(read) => Ok(read(self.model, column.name()).unwrap_or(Value::Null)),
            None => Err(ExportError::MissingAccessor(column.name().to_string())),
        }
    }

    /// Without an accessor, the template's field is read: an object is
    /// looked up by the entry's header, a list answers whether it holds the
    /// entry.
    fn dynamic_value(
        &self,
        template: &DynamicColumn<S>,
        column: &Column<S>,
        _header: &str,
        context: &Context,
    ) -> Result<Value, ExportError> {
        let entry = column.entry().cloned().unwrap_or(Value::Null);
        if let Some(accessor) = template.export_accessor() {
            return Ok(accessor(self.model, &entry, context));
        }
        let read = self
            .schema
            .field_reader()
            .ok_or_else(|| ExportError::MissingAccessor(template.name().to_string()))?;

        let key = column
            .header_text()
            .map(String::from)
            .unwrap_or_else(|| entry_text(&entry));
        Ok(match read(self.model, template.name()) {
            Some(Value::Object(fields)) => fields.get(&key).cloned().unwrap_or(Value::Null),
            Some(Value::Array(items)) => Value::Bool(items.iter().any(|item| *item == entry || entry_text(item) == key)),
            Some(other) => other,
            None => Value::Null,
        })
    }
}

/// A row model bound to one exported source model.
pub struct ExportRow<'m, S = ()> {
    schema: Rc<Schema<S>>,
    source: &'m S,
    context: Context,
    attributes: AttributeObjects,
    cells: Vec<String>,
    errors: OnceCell<Errors>,
}

impl<'m, S> ExportRow<'m, S> {
    pub(crate) fn new(schema: Rc<Schema<S>>, source: &'m S, context: Context, attributes: AttributeObjects) -> Self {
        let cells = physical_cells(&schema, &attributes);
        Self {
            schema,
            source,
            context,
            attributes,
            cells,
            errors: OnceCell::new(),
        }
    }

    pub fn source_model(&self) -> &'m S {
        self.source
    }

    /// The cells written for this row, in column order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// Static cells carry their formatted value; each dynamic cell its slot in
/// the template's formatted sequence.
fn physical_cells<S>(schema: &Schema<S>, attributes: &AttributeObjects) -> Vec<String> {
    let mut cells: Vec<String> = schema
        .static_columns()
        .iter()
        .map(|c| {
            attributes
                .get(c.name())
                .map(|a| cell_text(&a.value()))
                .unwrap_or_default()
        })
        .collect();

    for (template, columns) in schema.families() {
        let values = attributes
            .get(template.name())
            .and_then(|a| a.as_dynamic())
            .map(|d| d.value().to_vec())
            .unwrap_or_default();
        for index in 0..columns.len() {
            cells.push(values.get(index).map(cell_text).unwrap_or_default());
        }
    }
    cells
}

impl<S> RowModel for ExportRow<'_, S> {
    type Source = S;

    fn schema(&self) -> &Schema<S> {
        &self.schema
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn attribute_objects(&self) -> &AttributeObjects {
        &self.attributes
    }

    fn errors(&self) -> &Errors {
        self.errors
            .get_or_init(|| validate_row(self.schema.as_ref(), &self.attributes, &self.context))
    }
}

impl<S> fmt::Debug for ExportRow<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportRow")
            .field("schema", &self.schema.name())
            .field("cells", &self.cells)
            .finish()
    }
}
