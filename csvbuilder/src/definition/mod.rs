//! Declarative schema definitions.
//!
//! A definition is a JSON document describing columns, dynamic templates,
//! validations and string-template formatting hooks. It compiles to a
//! `Schema<serde_json::Value>` whose export side reads fields of JSON
//! records.
//!
//! ```json
//! {
//!   "name": "UserRow",
//!   "columns": [
//!     { "name": "first_name", "header": "First Name",
//!       "validations": [{ "type": "presence" }] },
//!     { "name": "email", "operations": [{ "type": "trim" }, { "type": "lowercase" }] }
//!   ],
//!   "dynamic_columns": [
//!     { "name": "skills", "as": "abilities", "flags": { "yes": "1", "no": "0" } }
//!   ],
//!   "format": { "header": "{humanized}" }
//! }
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{DefinitionError, DefinitionResult};
use crate::schema::{Column, DynamicColumn, Schema};
use crate::validation::Rule;
use crate::value::{cell_text, humanize, Context};

/// A complete schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Version of the definition format
    #[serde(default = "default_version")]
    pub version: String,

    /// Schema name, used in logs
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Static columns, in order
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,

    /// Dynamic column templates, in order
    #[serde(default)]
    pub dynamic_columns: Vec<DynamicColumnSpec>,

    /// Formatting hooks
    #[serde(default)]
    pub format: FormatSpec,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

/// One static column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    /// Fixed header; the `format.header` template applies when absent
    #[serde(default)]
    pub header: Option<String>,

    #[serde(default = "default_true")]
    pub required: bool,

    /// Record field read on export (defaults to the column name)
    #[serde(default)]
    pub field: Option<String>,

    #[serde(default)]
    pub validations: Vec<RuleSpec>,

    /// Cleanup applied to the raw cell on import
    #[serde(default)]
    pub operations: Vec<CellOperation>,
}

/// One dynamic column template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicColumnSpec {
    pub name: String,

    /// Context key holding the runtime collection
    #[serde(rename = "as", default)]
    pub alias: Option<String>,

    /// Entries to expand over up front; bound at runtime when absent
    #[serde(default)]
    pub entries: Option<Vec<Value>>,

    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_true")]
    pub allow_blank: bool,

    /// Rules applied to every expanded column
    #[serde(default)]
    pub validations: Vec<RuleSpec>,

    /// Entry key listing the values allowed in that entry's column
    #[serde(default)]
    pub allowed_from_entry: Option<String>,

    /// Render boolean cells as these strings on export
    #[serde(default)]
    pub flags: Option<FlagSpec>,
}

/// Text written for boolean dynamic cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpec {
    pub yes: String,
    pub no: String,
}

/// String templates for the formatting hooks.
///
/// Placeholders: `{value}` and `{column}` for cells; `{column}` and
/// `{humanized}` for headers; `{header}` and `{column}` for dynamic headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatSpec {
    #[serde(default)]
    pub cell: Option<String>,

    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    pub dynamic_header: Option<String>,
}

/// A validation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub kind: RuleKindSpec,

    #[serde(default)]
    pub allow_blank: bool,

    /// Replaces the default message
    #[serde(default)]
    pub message: Option<String>,
}

/// Available rule types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKindSpec {
    Presence,

    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },

    Inclusion {
        values: Vec<String>,
    },

    /// Allowed values read from a context list at validation time
    InclusionFromContext {
        key: String,
    },

    Format {
        pattern: String,
    },
}

/// Cleanup operations on a raw cell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellOperation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },
}

enum Step {
    Trim,
    Uppercase,
    Lowercase,
    Replace(Regex, String),
}

impl Step {
    fn apply(&self, cell: String) -> String {
        match self {
            Step::Trim => cell.trim().to_string(),
            Step::Uppercase => cell.to_uppercase(),
            Step::Lowercase => cell.to_lowercase(),
            Step::Replace(re, replacement) => re.replace_all(&cell, replacement.as_str()).into_owned(),
        }
    }
}

fn compile_operations(column: &str, operations: &[CellOperation]) -> DefinitionResult<Vec<Step>> {
    operations
        .iter()
        .map(|op| match op {
            CellOperation::Trim => Ok(Step::Trim),
            CellOperation::Uppercase => Ok(Step::Uppercase),
            CellOperation::Lowercase => Ok(Step::Lowercase),
            CellOperation::Replace { pattern, value } => Regex::new(pattern)
                .map(|re| Step::Replace(re, value.clone()))
                .map_err(|e| DefinitionError::InvalidRule {
                    column: column.to_string(),
                    message: e.to_string(),
                }),
        })
        .collect()
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(cell_text).collect())
        .unwrap_or_default()
}

impl RuleSpec {
    /// Build the runtime rule.
    pub fn to_rule(&self, column: &str) -> DefinitionResult<Rule> {
        let rule = match &self.kind {
            RuleKindSpec::Presence => Rule::presence(),
            RuleKindSpec::Length { min, max } => Rule::length(*min, *max),
            RuleKindSpec::Inclusion { values } => Rule::inclusion(values.clone()),
            RuleKindSpec::InclusionFromContext { key } => {
                let key = key.clone();
                Rule::inclusion_with(move |context: &Context| strings(context.get(&key)))
            }
            RuleKindSpec::Format { pattern } => Rule::format(pattern).map_err(|e| DefinitionError::InvalidRule {
                column: column.to_string(),
                message: e.to_string(),
            })?,
        };
        let rule = rule.allow_blank(self.allow_blank);
        Ok(match &self.message {
            Some(message) => rule.with_message(message),
            None => rule,
        })
    }
}

impl SchemaDefinition {
    /// Parse a definition from JSON string
    pub fn from_json(json: &str) -> DefinitionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a definition file
    pub fn from_path<P: AsRef<Path>>(path: P) -> DefinitionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> DefinitionResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compile to a schema over JSON records.
    pub fn into_schema(&self) -> DefinitionResult<Schema<Value>> {
        let mut schema = Schema::<Value>::new(self.name.clone());

        for spec in &self.columns {
            let mut column = Column::new(spec.name.clone()).required(spec.required);
            if let Some(header) = &spec.header {
                column = column.header(header.clone());
            }
            for rule in &spec.validations {
                column = column.validate(rule.to_rule(&spec.name)?);
            }
            let steps = compile_operations(&spec.name, &spec.operations)?;
            if !steps.is_empty() {
                column = column.import_with(move |cell, _| {
                    Value::String(steps.iter().fold(cell.to_string(), |acc, step| step.apply(acc)))
                });
            }
            if let Some(field) = &spec.field {
                let field = field.clone();
                column = column.export_with(move |record: &Value, _| record.get(&field).cloned().unwrap_or(Value::Null));
            }
            schema.declare_column(column)?;
        }

        let mut flags: HashMap<String, FlagSpec> = HashMap::new();
        for spec in &self.dynamic_columns {
            let mut template = DynamicColumn::new(spec.name.clone())
                .required(spec.required)
                .allow_blank(spec.allow_blank);
            if let Some(alias) = &spec.alias {
                template = template.alias(alias.clone());
            }

            let rules = spec
                .validations
                .iter()
                .map(|r| r.to_rule(&spec.name))
                .collect::<DefinitionResult<Vec<Rule>>>()?;
            let allowed_key = spec.allowed_from_entry.clone();
            if !rules.is_empty() || allowed_key.is_some() {
                template = template.validate_with(move |entry| {
                    let mut entry_rules = rules.clone();
                    if let Some(key) = &allowed_key {
                        entry_rules.push(Rule::inclusion(strings(entry.get(key))));
                    }
                    entry_rules
                });
            }
            if let Some(flag) = &spec.flags {
                flags.insert(spec.name.clone(), flag.clone());
            }
            schema.declare_dynamic_column_template(template)?;
        }

        for spec in &self.dynamic_columns {
            if let Some(entries) = &spec.entries {
                schema = schema.expand(&spec.name, entries.clone())?;
            }
        }

        if let Some(template) = self.format.cell.clone() {
            schema = schema.format_cell(move |value, column, _| {
                Value::String(template.replace("{value}", &cell_text(value)).replace("{column}", column))
            });
        }
        if let Some(template) = self.format.header.clone() {
            schema = schema.format_header(move |column, _| {
                template.replace("{humanized}", &humanize(column)).replace("{column}", column)
            });
        }
        if let Some(template) = self.format.dynamic_header.clone() {
            schema = schema.format_dynamic_column_header(move |header, column, _| {
                template.replace("{header}", &cell_text(header)).replace("{column}", column)
            });
        }
        if !flags.is_empty() {
            schema = schema.format_dynamic_column_cells(move |cells, template, _| match flags.get(template) {
                Some(flag) => cells
                    .iter()
                    .map(|cell| match cell {
                        Value::Bool(true) => Value::String(flag.yes.clone()),
                        Value::Bool(false) => Value::String(flag.no.clone()),
                        other => other.clone(),
                    })
                    .collect(),
                None => cells.to_vec(),
            });
        }

        Ok(schema.read_fields_with(|record: &Value, name: &str| record.get(name).cloned()))
    }
}
