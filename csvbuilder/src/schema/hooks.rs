//! Formatting and flow-control hooks.
//!
//! Every hook is optional; an absent hook behaves as identity (formatters)
//! or as "skip invalid rows" (`skip`).

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::import::ImportRow;
use crate::row::RowModel;
use crate::value::Context;

/// `(value, column_name, context) -> formatted value`
pub type CellFormatter = Arc<dyn Fn(&Value, &str, &Context) -> Value + Send + Sync>;

/// `(column_name, context) -> header`
pub type HeaderFormatter = Arc<dyn Fn(&str, &Context) -> String + Send + Sync>;

/// `(cells, template_name, context) -> formatted cells`
pub type CellsFormatter = Arc<dyn Fn(&[Value], &str, &Context) -> Vec<Value> + Send + Sync>;

/// `(header_model, template_name, context) -> header`
pub type DynamicHeaderFormatter = Arc<dyn Fn(&Value, &str, &Context) -> String + Send + Sync>;

/// Decides whether an imported row is withheld from the caller.
pub type SkipPredicate<S> = Arc<dyn Fn(&ImportRow<S>) -> bool + Send + Sync>;

/// The hook set of a schema.
pub struct Hooks<S = ()> {
    pub(crate) format_cell: Option<CellFormatter>,
    pub(crate) format_header: Option<HeaderFormatter>,
    pub(crate) format_dynamic_column_cells: Option<CellsFormatter>,
    pub(crate) format_dynamic_column_header: Option<DynamicHeaderFormatter>,
    pub(crate) skip: Option<SkipPredicate<S>>,
}

impl<S> Hooks<S> {
    pub fn format_cell(&self, value: &Value, column_name: &str, context: &Context) -> Value {
        match &self.format_cell {
            Some(format) => format(value, column_name, context),
            None => value.clone(),
        }
    }

    pub fn format_header(&self, column_name: &str, context: &Context) -> String {
        match &self.format_header {
            Some(format) => format(column_name, context),
            None => column_name.to_string(),
        }
    }

    pub fn format_dynamic_column_cells(&self, cells: &[Value], template_name: &str, context: &Context) -> Vec<Value> {
        match &self.format_dynamic_column_cells {
            Some(format) => format(cells, template_name, context),
            None => cells.to_vec(),
        }
    }

    pub fn format_dynamic_column_header(&self, header_model: &Value, template_name: &str, context: &Context) -> String {
        match &self.format_dynamic_column_header {
            Some(format) => format(header_model, template_name, context),
            None => crate::value::cell_text(header_model),
        }
    }

    /// Invalid rows are skipped unless a custom predicate says otherwise.
    pub fn skip(&self, row: &ImportRow<S>) -> bool {
        match &self.skip {
            Some(skip) => skip(row),
            None => !row.is_valid(),
        }
    }

    pub(crate) fn then_format_cell(&mut self, next: CellFormatter) {
        let composed: CellFormatter = match self.format_cell.take() {
            Some(first) => Arc::new(move |value: &Value, column: &str, context: &Context| {
                next(&first(value, column, context), column, context)
            }),
            None => next,
        };
        self.format_cell = Some(composed);
    }
}

impl<S> Default for Hooks<S> {
    fn default() -> Self {
        Self {
            format_cell: None,
            format_header: None,
            format_dynamic_column_cells: None,
            format_dynamic_column_header: None,
            skip: None,
        }
    }
}

impl<S> Clone for Hooks<S> {
    fn clone(&self) -> Self {
        Self {
            format_cell: self.format_cell.clone(),
            format_header: self.format_header.clone(),
            format_dynamic_column_cells: self.format_dynamic_column_cells.clone(),
            format_dynamic_column_header: self.format_dynamic_column_header.clone(),
            skip: self.skip.clone(),
        }
    }
}

impl<S> fmt::Debug for Hooks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("format_cell", &self.format_cell.is_some())
            .field("format_header", &self.format_header.is_some())
            .field("format_dynamic_column_cells", &self.format_dynamic_column_cells.is_some())
            .field("format_dynamic_column_header", &self.format_dynamic_column_header.is_some())
            .field("skip", &self.skip.is_some())
            .finish()
    }
}
