//! Column registry.
//!
//! A [`Schema`] is an ordered set of static [`Column`]s plus
//! [`DynamicColumn`] templates, together with the formatting [`Hooks`] row
//! models run their values through. Schemas are plain values: deriving a
//! subtype schema clones the base, and expanding a template returns a new
//! schema instead of mutating the original.
//!
//! # Column order
//!
//! Static columns come first, in declaration order. Expanded template
//! families follow in expansion order; templates that were never expanded
//! come last, in declaration order, and contribute no columns until bound.
//!
//! # Example
//!
//! ```rust
//! use csvbuilder::schema::{Column, DynamicColumn, Schema};
//! use serde_json::{json, Map};
//!
//! let schema: Schema = Schema::new("UserRow")
//!     .column(Column::new("first_name").header("Name"))?
//!     .column(Column::new("last_name").header("Surname"))?
//!     .dynamic_column(DynamicColumn::new("skills"))?
//!     .expand("skills", vec![json!("Ruby"), json!("Python")])?;
//!
//! assert_eq!(
//!     schema.headers(&Map::new()),
//!     vec!["Name", "Surname", "Ruby", "Python"]
//! );
//! # Ok::<(), csvbuilder::SchemaError>(())
//! ```

pub mod column;
pub mod dynamic;
pub mod hooks;

pub use column::{Column, ColumnKind, ExportFn, Header, HeaderFn, ImportFn};
pub use dynamic::{DynamicColumn, DynamicExportFn, DynamicImportFn, HeaderSource, RuleFactory};
pub use hooks::{CellFormatter, CellsFormatter, DynamicHeaderFormatter, HeaderFormatter, Hooks, SkipPredicate};

use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{SchemaError, SchemaResult};
use crate::header::{ExpectedHeader, HeaderMatch};
use crate::import::ImportRow;
use crate::value::Context;

/// Reads a named field off a source model when a column has no accessor.
pub type FieldReader<S> = Arc<dyn Fn(&S, &str) -> Option<Value> + Send + Sync>;

/// One template bound to a collection.
struct Expansion<S> {
    template: String,
    entries: Vec<Value>,
    columns: Vec<Column<S>>,
    /// Bound from the observed header row rather than by the caller.
    inferred: bool,
}

impl<S> Clone for Expansion<S> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            entries: self.entries.clone(),
            columns: self.columns.clone(),
            inferred: self.inferred,
        }
    }
}

/// Ordered column declarations for one row model type.
pub struct Schema<S = ()> {
    name: String,
    columns: Vec<Column<S>>,
    templates: Vec<DynamicColumn<S>>,
    expansions: Vec<Expansion<S>>,
    hooks: Hooks<S>,
    field_reader: Option<FieldReader<S>>,
}

impl<S> Schema<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            templates: Vec::new(),
            expansions: Vec::new(),
            hooks: Hooks::default(),
            field_reader: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a subtype schema: every declaration and hook of `self`, under a new name.
    pub fn derive(&self, name: impl Into<String>) -> Self {
        let mut derived = self.clone();
        derived.name = name.into();
        derived
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn is_taken(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name() == name)
            || self.templates.iter().any(|t| t.name() == name)
            || self
                .expansions
                .iter()
                .flat_map(|e| e.columns.iter())
                .any(|c| c.name() == name)
    }

    /// Register a static column. Names are unique across the whole schema.
    pub fn declare_column(&mut self, column: Column<S>) -> SchemaResult<()> {
        if self.is_taken(column.name()) {
            return Err(SchemaError::DuplicateColumn(column.name().to_string()));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Builder form of [`Schema::declare_column`].
    pub fn column(mut self, column: Column<S>) -> SchemaResult<Self> {
        self.declare_column(column)?;
        Ok(self)
    }

    /// Replace an inherited static column in place.
    pub fn override_column(mut self, column: Column<S>) -> SchemaResult<Self> {
        let slot = self
            .columns
            .iter_mut()
            .find(|c| c.name() == column.name())
            .ok_or_else(|| SchemaError::UnknownColumn(column.name().to_string()))?;
        *slot = column;
        Ok(self)
    }

    /// Register a dynamic column template. It yields no columns until bound.
    pub fn declare_dynamic_column_template(&mut self, template: DynamicColumn<S>) -> SchemaResult<()> {
        if self.is_taken(template.name()) {
            return Err(SchemaError::DuplicateColumn(template.name().to_string()));
        }
        self.templates.push(template);
        Ok(())
    }

    /// Builder form of [`Schema::declare_dynamic_column_template`].
    pub fn dynamic_column(mut self, template: DynamicColumn<S>) -> SchemaResult<Self> {
        self.declare_dynamic_column_template(template)?;
        Ok(self)
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    pub fn format_cell<F>(mut self, format: F) -> Self
    where
        F: Fn(&Value, &str, &Context) -> Value + Send + Sync + 'static,
    {
        self.hooks.format_cell = Some(Arc::new(format));
        self
    }

    /// Run `format` on the output of the current cell formatter.
    pub fn then_format_cell<F>(mut self, format: F) -> Self
    where
        F: Fn(&Value, &str, &Context) -> Value + Send + Sync + 'static,
    {
        self.hooks.then_format_cell(Arc::new(format));
        self
    }

    /// Header for static columns declared without one.
    pub fn format_header<F>(mut self, format: F) -> Self
    where
        F: Fn(&str, &Context) -> String + Send + Sync + 'static,
    {
        self.hooks.format_header = Some(Arc::new(format));
        self
    }

    pub fn format_dynamic_column_cells<F>(mut self, format: F) -> Self
    where
        F: Fn(&[Value], &str, &Context) -> Vec<Value> + Send + Sync + 'static,
    {
        self.hooks.format_dynamic_column_cells = Some(Arc::new(format));
        self
    }

    pub fn format_dynamic_column_header<F>(mut self, format: F) -> Self
    where
        F: Fn(&Value, &str, &Context) -> String + Send + Sync + 'static,
    {
        self.hooks.format_dynamic_column_header = Some(Arc::new(format));
        self
    }

    /// Replace the default "skip invalid rows" policy of imports.
    pub fn skip_if<F>(mut self, skip: F) -> Self
    where
        F: Fn(&ImportRow<S>) -> bool + Send + Sync + 'static,
    {
        self.hooks.skip = Some(Arc::new(skip));
        self
    }

    /// Fallback used on export for columns without an accessor.
    pub fn read_fields_with<F>(mut self, reader: F) -> Self
    where
        F: Fn(&S, &str) -> Option<Value> + Send + Sync + 'static,
    {
        self.field_reader = Some(Arc::new(reader));
        self
    }

    pub fn hooks(&self) -> &Hooks<S> {
        &self.hooks
    }

    pub(crate) fn field_reader(&self) -> Option<&FieldReader<S>> {
        self.field_reader.as_ref()
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    pub fn template(&self, name: &str) -> Option<&DynamicColumn<S>> {
        self.templates.iter().find(|t| t.name() == name)
    }

    pub fn templates(&self) -> &[DynamicColumn<S>] {
        &self.templates
    }

    pub fn is_expanded(&self, template: &str) -> bool {
        self.expansions.iter().any(|e| e.template == template)
    }

    /// Entries a template is currently bound to.
    pub fn entries(&self, template: &str) -> Option<&[Value]> {
        self.expansions
            .iter()
            .find(|e| e.template == template)
            .map(|e| e.entries.as_slice())
    }

    /// Bind `template` to `entries`, producing one column per entry.
    ///
    /// Re-expanding a template replaces its previous family in place; other
    /// templates' families are untouched.
    pub fn expand<I>(&self, template: &str, entries: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        self.expand_with(template, entries.into_iter().collect(), false)
    }

    fn expand_with(&self, template: &str, entries: Vec<Value>, inferred: bool) -> SchemaResult<Self> {
        let declared = self
            .template(template)
            .ok_or_else(|| SchemaError::UnknownDynamicTemplate(template.to_string()))?;
        let columns = declared.expand_columns(&entries);

        let mut expanded = self.clone();
        let slot = expanded.expansions.iter().position(|e| e.template == template);
        if let Some(index) = slot {
            expanded.expansions[index].columns.clear();
        }
        for column in &columns {
            if expanded.is_taken(column.name()) {
                return Err(SchemaError::DuplicateColumn(column.name().to_string()));
            }
        }

        let expansion = Expansion {
            template: template.to_string(),
            entries,
            columns,
            inferred,
        };
        debug!(
            "Expanded dynamic column '{}' of {} into {} column(s)",
            template,
            self.name,
            expansion.columns.len()
        );
        match slot {
            Some(index) => expanded.expansions[index] = expansion,
            None => expanded.expansions.push(expansion),
        }
        Ok(expanded)
    }

    /// Bind every unexpanded template to `context[alias or name]`.
    ///
    /// Templates without a context entry are bound to an empty collection.
    pub fn bind_context(&self, context: &Context) -> SchemaResult<Self> {
        let mut bound = self.bind_available(context)?;
        for template in &self.templates {
            if bound.is_expanded(template.name()) {
                continue;
            }
            warn!(
                "No '{}' collection in context for dynamic column '{}'",
                template.context_key(),
                template.name()
            );
            bound = bound.expand(template.name(), Vec::new())?;
        }
        Ok(bound)
    }

    /// Bind the unexpanded templates whose collection is present in `context`.
    pub(crate) fn bind_available(&self, context: &Context) -> SchemaResult<Self> {
        let mut bound = self.clone();
        for template in &self.templates {
            if self.is_expanded(template.name()) {
                continue;
            }
            match context.get(template.context_key()) {
                Some(Value::Array(items)) => {
                    bound = bound.expand(template.name(), items.clone())?;
                }
                Some(other) => {
                    return Err(SchemaError::InvalidDynamicCollection {
                        name: template.name().to_string(),
                        found: other.to_string(),
                    })
                }
                None => {}
            }
        }
        Ok(bound)
    }

    /// Bind unexpanded templates from an observed header row.
    ///
    /// Headers not claimed by a static or already expanded column become the
    /// entries of the first unexpanded template, in file order; any further
    /// unexpanded templates are bound to nothing.
    pub fn bind_observed_headers(&self, observed: &[String], mode: HeaderMatch, context: &Context) -> SchemaResult<Self> {
        let unexpanded: Vec<&str> = self
            .templates
            .iter()
            .filter(|t| !self.is_expanded(t.name()))
            .map(|t| t.name())
            .collect();
        if unexpanded.is_empty() {
            return Ok(self.clone());
        }

        let leftovers: Vec<Value> = match mode {
            HeaderMatch::Ignore => observed
                .iter()
                .skip(self.columns().count())
                .map(|h| Value::String(h.clone()))
                .collect(),
            _ => {
                let claimed: HashSet<String> = self
                    .headers(context)
                    .iter()
                    .map(|h| mode.normalize(h))
                    .collect();
                observed
                    .iter()
                    .filter(|h| !claimed.contains(&mode.normalize(h)))
                    .map(|h| Value::String(h.clone()))
                    .collect()
            }
        };

        let mut bound = self.clone();
        for (i, template) in unexpanded.iter().enumerate() {
            let entries = if i == 0 { leftovers.clone() } else { Vec::new() };
            info!(
                "Bound dynamic column '{}' to {} header(s) from input",
                template,
                entries.len()
            );
            bound = bound.expand_with(template, entries, true)?;
        }
        Ok(bound)
    }

    // =========================================================================
    // Columns and headers
    // =========================================================================

    pub fn static_columns(&self) -> &[Column<S>] {
        &self.columns
    }

    /// Templates with their expanded columns, in column order.
    pub fn families(&self) -> Vec<(&DynamicColumn<S>, &[Column<S>])> {
        let mut families: Vec<(&DynamicColumn<S>, &[Column<S>])> = self
            .expansions
            .iter()
            .filter_map(|e| self.template(&e.template).map(|t| (t, e.columns.as_slice())))
            .collect();
        for template in &self.templates {
            if !self.is_expanded(template.name()) {
                families.push((template, &[]));
            }
        }
        families
    }

    /// Every concrete column, static first.
    pub fn columns(&self) -> impl Iterator<Item = &Column<S>> + '_ {
        self.columns
            .iter()
            .chain(self.expansions.iter().flat_map(|e| e.columns.iter()))
    }

    pub fn find_column(&self, name: &str) -> Option<&Column<S>> {
        self.columns().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().map(|c| c.name().to_string()).collect()
    }

    /// Display header of one column.
    pub fn header_for(&self, column: &Column<S>, context: &Context) -> String {
        match column.kind() {
            ColumnKind::Static => match column.header_spec() {
                Header::Text(text) => text.clone(),
                Header::Computed(header) => {
                    let default = self.hooks.format_header(column.name(), context);
                    header(&default, column.name(), context)
                }
                Header::Default => self.hooks.format_header(column.name(), context),
            },
            ColumnKind::Dynamic { template, .. } => {
                let header_model = Value::String(column.header_text().unwrap_or_default().to_string());
                self.hooks
                    .format_dynamic_column_header(&header_model, template, context)
            }
        }
    }

    /// Headers of every concrete column, in column order.
    pub fn headers(&self, context: &Context) -> Vec<String> {
        self.columns().map(|c| self.header_for(c, context)).collect()
    }

    /// Formatted headers of the dynamic columns, binding templates from the
    /// context first when they are not expanded yet.
    pub fn dynamic_column_headers(&self, context: &Context) -> SchemaResult<Vec<String>> {
        let bound = self.bind_context(context)?;
        Ok(bound
            .columns()
            .filter(|c| c.is_dynamic())
            .map(|c| bound.header_for(c, context))
            .collect())
    }

    /// What an input header row is checked against.
    ///
    /// Columns bound from the input itself match by construction; they carry
    /// their raw header and are left out of the mismatch report.
    pub fn expected_headers(&self, context: &Context) -> Vec<ExpectedHeader> {
        let mut expected: Vec<ExpectedHeader> = self
            .columns
            .iter()
            .map(|c| ExpectedHeader::new(c.name(), self.header_for(c, context), c.is_required()))
            .collect();

        for expansion in &self.expansions {
            for column in &expansion.columns {
                expected.push(if expansion.inferred {
                    ExpectedHeader::inferred(column.name(), column.header_text().unwrap_or_default())
                } else {
                    ExpectedHeader::new(column.name(), self.header_for(column, context), column.is_required())
                });
            }
        }
        expected
    }
}

impl<S> Clone for Schema<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            templates: self.templates.clone(),
            expansions: self.expansions.clone(),
            hooks: self.hooks.clone(),
            field_reader: self.field_reader.clone(),
        }
    }
}

impl<S> fmt::Debug for Schema<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("columns", &self.column_names())
            .field(
                "templates",
                &self.templates.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("hooks", &self.hooks)
            .finish()
    }
}
