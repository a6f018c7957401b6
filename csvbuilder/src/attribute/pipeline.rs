//! Value resolution.
//!
//! Import and export differ only in where a column's source value comes
//! from; both then run the same hook chain:
//!
//! 1. static column: `source -> format_cell(source, column) -> formatted`
//! 2. dynamic template: one source value per expanded column, then
//!    `format_cell` per cell (display view) and
//!    `format_dynamic_column_cells` over the whole sequence (value)

use serde_json::Value;

use super::{Attribute, AttributeObject, AttributeObjects, DynamicColumnAttribute};
use crate::schema::{Column, DynamicColumn, Schema};
use crate::value::Context;

/// Where source values come from: the physical cells of an input row, or
/// accessors over an exported source model.
pub trait ValueSource<S> {
    type Error;

    fn static_value(&self, column: &Column<S>, context: &Context) -> Result<Value, Self::Error>;

    /// `header` is the formatted header of the expanded column.
    fn dynamic_value(
        &self,
        template: &DynamicColumn<S>,
        column: &Column<S>,
        header: &str,
        context: &Context,
    ) -> Result<Value, Self::Error>;
}

/// Resolve every attribute object of one row.
pub fn resolve<S, V>(schema: &Schema<S>, source: &V, context: &Context) -> Result<AttributeObjects, V::Error>
where
    V: ValueSource<S>,
{
    let hooks = schema.hooks();
    let mut objects = AttributeObjects::default();

    for column in schema.static_columns() {
        let source_value = source.static_value(column, context)?;
        let formatted_value = hooks.format_cell(&source_value, column.name(), context);
        objects.push(
            column.name(),
            AttributeObject::Attribute(Attribute::new(
                column.name(),
                column.kind().clone(),
                source_value,
                formatted_value,
            )),
        );
    }

    for (template, columns) in schema.families() {
        let mut names = Vec::with_capacity(columns.len());
        let mut headers = Vec::with_capacity(columns.len());
        let mut source_cells = Vec::with_capacity(columns.len());
        let mut formatted_cells = Vec::with_capacity(columns.len());

        for column in columns {
            let header = schema.header_for(column, context);
            let cell = source.dynamic_value(template, column, &header, context)?;
            formatted_cells.push(hooks.format_cell(&cell, template.name(), context));
            source_cells.push(cell);
            names.push(column.name().to_string());
            headers.push(header);
        }

        let value = hooks.format_dynamic_column_cells(&source_cells, template.name(), context);
        let expanded: Vec<(String, Attribute)> = columns
            .iter()
            .zip(source_cells.iter().zip(formatted_cells.iter()))
            .map(|(column, (cell, formatted))| {
                (
                    column.name().to_string(),
                    Attribute::new(column.name(), column.kind().clone(), cell.clone(), formatted.clone()),
                )
            })
            .collect();

        objects.push(
            template.name(),
            AttributeObject::Dynamic(DynamicColumnAttribute::new(
                template.name(),
                names,
                headers,
                source_cells,
                formatted_cells,
                value,
            )),
        );
        for (name, attribute) in expanded {
            objects.push(name, AttributeObject::Attribute(attribute));
        }
    }

    Ok(objects)
}
