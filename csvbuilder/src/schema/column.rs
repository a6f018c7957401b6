//! Static column declarations.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::import::RawRow;
use crate::validation::Rule;
use crate::value::Context;

/// Computes a header from `(default_header, column_name, context)`.
pub type HeaderFn = Arc<dyn Fn(&str, &str, &Context) -> String + Send + Sync>;

/// Import accessor: turns the raw cell (with access to the rest of the row)
/// into the attribute's source value.
pub type ImportFn = Arc<dyn Fn(&str, &RawRow<'_>) -> Value + Send + Sync>;

/// Export accessor: reads the attribute's source value off the source model.
pub type ExportFn<S> = Arc<dyn Fn(&S, &Context) -> Value + Send + Sync>;

/// How a column's header is produced.
#[derive(Clone, Default)]
pub enum Header {
    /// Ask the schema's `format_header` hook (the column name by default).
    #[default]
    Default,
    /// Fixed text, used verbatim.
    Text(String),
    /// Computed per context, from the `format_header` default.
    Computed(HeaderFn),
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::Default => write!(f, "Default"),
            Header::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Header::Computed(_) => write!(f, "Computed(<fn>)"),
        }
    }
}

/// Whether a column was declared directly or expanded from a template.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Static,
    Dynamic {
        /// Name of the originating template.
        template: String,
        /// Position of the entry in the bound collection.
        index: usize,
        /// The entry itself.
        entry: Value,
    },
}

impl ColumnKind {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ColumnKind::Dynamic { .. })
    }
}

/// A concrete column of a schema.
pub struct Column<S = ()> {
    name: String,
    header: Header,
    required: bool,
    kind: ColumnKind,
    rules: Vec<Rule>,
    import: Option<ImportFn>,
    export: Option<ExportFn<S>>,
}

impl<S> Column<S> {
    /// A required static column with the default header.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header: Header::Default,
            required: true,
            kind: ColumnKind::Static,
            rules: Vec::new(),
            import: None,
            export: None,
        }
    }

    pub(crate) fn expanded(name: String, header: String, required: bool, kind: ColumnKind) -> Self {
        Self {
            name,
            header: Header::Text(header),
            required,
            kind,
            rules: Vec::new(),
            import: None,
            export: None,
        }
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Header::Text(header.into());
        self
    }

    pub fn header_with<F>(mut self, header: F) -> Self
    where
        F: Fn(&str, &str, &Context) -> String + Send + Sync + 'static,
    {
        self.header = Header::Computed(Arc::new(header));
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn validate(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn import_with<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&str, &RawRow<'_>) -> Value + Send + Sync + 'static,
    {
        self.import = Some(Arc::new(accessor));
        self
    }

    pub fn export_with<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&S, &Context) -> Value + Send + Sync + 'static,
    {
        self.export = Some(Arc::new(accessor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_spec(&self) -> &Header {
        &self.header
    }

    /// Raw header text, before any hook runs.
    pub fn header_text(&self) -> Option<&str> {
        match &self.header {
            Header::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind.is_dynamic()
    }

    /// Entry this column was expanded from.
    pub fn entry(&self) -> Option<&Value> {
        match &self.kind {
            ColumnKind::Dynamic { entry, .. } => Some(entry),
            ColumnKind::Static => None,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub(crate) fn import_accessor(&self) -> Option<&ImportFn> {
        self.import.as_ref()
    }

    pub(crate) fn export_accessor(&self) -> Option<&ExportFn<S>> {
        self.export.as_ref()
    }
}

impl<S> Clone for Column<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            header: self.header.clone(),
            required: self.required,
            kind: self.kind.clone(),
            rules: self.rules.clone(),
            import: self.import.clone(),
            export: self.export.clone(),
        }
    }
}

impl<S> fmt::Debug for Column<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("required", &self.required)
            .field("kind", &self.kind)
            .field("rules", &self.rules)
            .finish()
    }
}
