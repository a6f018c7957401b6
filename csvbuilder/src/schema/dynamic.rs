//! Dynamic column templates.
//!
//! A template declares a family of columns whose count and headers come from
//! a runtime collection of entries. Expanding it over `["Ruby", "Python"]`
//! yields the concrete columns `skills_0` ("Ruby") and `skills_1` ("Python").

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::column::{Column, ColumnKind};
use crate::validation::Rule;
use crate::value::{entry_text, Context};

/// Header text for one entry.
pub type HeaderSource = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Validation rules for the column expanded from one entry.
pub type RuleFactory = Arc<dyn Fn(&Value) -> Vec<Rule> + Send + Sync>;

/// Import accessor for a dynamic cell: `(raw_cell, entry_header)`.
pub type DynamicImportFn = Arc<dyn Fn(&str, &str) -> Value + Send + Sync>;

/// Export accessor for a dynamic cell: `(source_model, entry, context)`.
pub type DynamicExportFn<S> = Arc<dyn Fn(&S, &Value, &Context) -> Value + Send + Sync>;

/// Template for a runtime-sized family of columns.
pub struct DynamicColumn<S = ()> {
    name: String,
    alias: Option<String>,
    header_source: HeaderSource,
    required: bool,
    allow_blank: bool,
    rule_factory: Option<RuleFactory>,
    import: Option<DynamicImportFn>,
    export: Option<DynamicExportFn<S>>,
}

impl<S> DynamicColumn<S> {
    /// Optional, blank-tolerant template whose headers are the entries' text.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            header_source: Arc::new(entry_text),
            required: false,
            allow_blank: true,
            rule_factory: None,
            import: None,
            export: None,
        }
    }

    /// Context key the runtime collection is read from (`as:`).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn header_source<F>(mut self, source: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.header_source = Arc::new(source);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn allow_blank(mut self, allow: bool) -> Self {
        self.allow_blank = allow;
        self
    }

    /// Rules for each expanded column, parameterized by its entry.
    pub fn validate_with<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Value) -> Vec<Rule> + Send + Sync + 'static,
    {
        self.rule_factory = Some(Arc::new(factory));
        self
    }

    pub fn import_with<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&str, &str) -> Value + Send + Sync + 'static,
    {
        self.import = Some(Arc::new(accessor));
        self
    }

    pub fn export_with<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&S, &Value, &Context) -> Value + Send + Sync + 'static,
    {
        self.export = Some(Arc::new(accessor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Key under which the runtime collection is looked up in a context.
    pub fn context_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn allows_blank(&self) -> bool {
        self.allow_blank
    }

    /// Raw header for one entry.
    pub fn header_for(&self, entry: &Value) -> String {
        (self.header_source)(entry)
    }

    pub(crate) fn import_accessor(&self) -> Option<&DynamicImportFn> {
        self.import.as_ref()
    }

    pub(crate) fn export_accessor(&self) -> Option<&DynamicExportFn<S>> {
        self.export.as_ref()
    }

    /// One concrete column per entry, named `{name}_{index}`, in entry order.
    pub(crate) fn expand_columns(&self, entries: &[Value]) -> Vec<Column<S>> {
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let mut column = Column::expanded(
                    format!("{}_{}", self.name, index),
                    self.header_for(entry),
                    self.required,
                    ColumnKind::Dynamic {
                        template: self.name.clone(),
                        index,
                        entry: entry.clone(),
                    },
                );
                if let Some(factory) = &self.rule_factory {
                    for rule in factory(entry) {
                        let rule = if self.allow_blank { rule.allow_blank(true) } else { rule };
                        column.push_rule(rule);
                    }
                }
                column
            })
            .collect()
    }
}

impl<S> Clone for DynamicColumn<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            alias: self.alias.clone(),
            header_source: self.header_source.clone(),
            required: self.required,
            allow_blank: self.allow_blank,
            rule_factory: self.rule_factory.clone(),
            import: self.import.clone(),
            export: self.export.clone(),
        }
    }
}

impl<S> fmt::Debug for DynamicColumn<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicColumn")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("required", &self.required)
            .field("allow_blank", &self.allow_blank)
            .finish()
    }
}
