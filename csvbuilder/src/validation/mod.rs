//! Field-level validation for row models.
//!
//! Each column carries zero or more [`Rule`]s. Running them over a row's
//! resolved attributes fills an [`Errors`] collection keyed by field; a row
//! is valid iff the collection is empty afterwards.
//!
//! # Example
//!
//! ```rust
//! use csvbuilder::validation::{Errors, Rule};
//! use serde_json::{json, Map};
//!
//! let rule = Rule::length(Some(2), None);
//! let ctx = Map::new();
//! assert_eq!(
//!     rule.check(&json!("J"), &ctx).as_deref(),
//!     Some("is too short (minimum is 2 characters)")
//! );
//!
//! let mut errors = Errors::new();
//! errors.add("first_name", "can't be blank");
//! assert_eq!(errors.full_messages(), vec!["First name can't be blank"]);
//! ```

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::attribute::AttributeObjects;
use crate::schema::Schema;
use crate::value::{cell_text, humanize, is_blank, Context};

/// Field name used for errors that do not belong to a single column.
pub const BASE: &str = "base";

/// Predicate used by custom rules.
pub type Predicate = Arc<dyn Fn(&Value, &Context) -> bool + Send + Sync>;

/// Produces the allowed values of an inclusion rule at validation time.
pub type AllowedValues = Arc<dyn Fn(&Context) -> Vec<String> + Send + Sync>;

// =============================================================================
// Rules
// =============================================================================

/// The check a rule performs.
#[derive(Clone)]
pub enum RuleKind {
    /// Value must not be blank.
    Presence,
    /// Character count bounds on the cell text.
    Length { min: Option<usize>, max: Option<usize> },
    /// Cell text must be one of a fixed list.
    Inclusion(Vec<String>),
    /// Cell text must be one of a list computed from the context.
    InclusionWith(AllowedValues),
    /// Cell text must match a pattern.
    Format(Regex),
    /// Arbitrary predicate.
    Custom(Predicate),
}

/// A validation rule attached to a column.
#[derive(Clone)]
pub struct Rule {
    kind: RuleKind,
    allow_blank: bool,
    message: Option<String>,
}

impl Rule {
    fn of(kind: RuleKind) -> Self {
        Self {
            kind,
            allow_blank: false,
            message: None,
        }
    }

    pub fn presence() -> Self {
        Self::of(RuleKind::Presence)
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::of(RuleKind::Length { min, max })
    }

    pub fn inclusion<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::of(RuleKind::Inclusion(values.into_iter().map(Into::into).collect()))
    }

    pub fn inclusion_with<F>(allowed: F) -> Self
    where
        F: Fn(&Context) -> Vec<String> + Send + Sync + 'static,
    {
        Self::of(RuleKind::InclusionWith(Arc::new(allowed)))
    }

    pub fn format(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::of(RuleKind::Format(Regex::new(pattern)?)))
    }

    /// A custom predicate; `message` is reported when it returns false.
    pub fn custom<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &Context) -> bool + Send + Sync + 'static,
    {
        Self::of(RuleKind::Custom(Arc::new(check))).with_message(message)
    }

    /// Skip the rule when the value is blank.
    pub fn allow_blank(mut self, allow: bool) -> Self {
        self.allow_blank = allow;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    pub fn allows_blank(&self) -> bool {
        self.allow_blank
    }

    /// Run the rule; returns the error message on failure.
    pub fn check(&self, value: &Value, context: &Context) -> Option<String> {
        if self.allow_blank && is_blank(value) {
            return None;
        }

        let failure = match &self.kind {
            RuleKind::Presence => is_blank(value).then(|| "can't be blank".to_string()),
            RuleKind::Length { min, max } => {
                let len = cell_text(value).chars().count();
                match (min, max) {
                    (Some(min), _) if len < *min => Some(format!(
                        "is too short (minimum is {} {})",
                        min,
                        plural_characters(*min)
                    )),
                    (_, Some(max)) if len > *max => Some(format!(
                        "is too long (maximum is {} {})",
                        max,
                        plural_characters(*max)
                    )),
                    _ => None,
                }
            }
            RuleKind::Inclusion(allowed) => {
                let text = cell_text(value);
                (!allowed.iter().any(|a| *a == text))
                    .then(|| "is not included in the list".to_string())
            }
            RuleKind::InclusionWith(allowed) => {
                let text = cell_text(value);
                (!allowed(context).iter().any(|a| *a == text))
                    .then(|| "is not included in the list".to_string())
            }
            RuleKind::Format(re) => {
                (!re.is_match(&cell_text(value))).then(|| "is invalid".to_string())
            }
            RuleKind::Custom(check) => (!check(value, context)).then(|| "is invalid".to_string()),
        };

        failure.map(|default| self.message.clone().unwrap_or(default))
    }
}

fn plural_characters(n: usize) -> &'static str {
    if n == 1 {
        "character"
    } else {
        "characters"
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            RuleKind::Presence => "presence".to_string(),
            RuleKind::Length { min, max } => format!("length(min: {:?}, max: {:?})", min, max),
            RuleKind::Inclusion(values) => format!("inclusion({:?})", values),
            RuleKind::InclusionWith(_) => "inclusion(<fn>)".to_string(),
            RuleKind::Format(re) => format!("format(/{}/)", re.as_str()),
            RuleKind::Custom(_) => "custom(<fn>)".to_string(),
        };
        f.debug_struct("Rule")
            .field("kind", &kind)
            .field("allow_blank", &self.allow_blank)
            .finish()
    }
}

// =============================================================================
// Error collection
// =============================================================================

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Error collection keyed by field, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Errors {
    entries: Vec<FieldError>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.entries.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add an error not tied to a column.
    pub fn add_base(&mut self, message: impl Into<String>) {
        self.add(BASE, message);
    }

    /// Messages recorded for one field.
    pub fn messages(&self, field: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.entries.iter().any(|e| e.field == field)
    }

    /// `"First name is too short ..."`; base errors are reported bare.
    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                if e.field == BASE {
                    e.message.clone()
                } else {
                    format!("{} {}", humanize(&e.field), e.message)
                }
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Row validation
// =============================================================================

/// Run every column rule of `schema` against the resolved attributes.
///
/// Static columns are checked against their formatted value; expanded
/// dynamic columns against the accessor output for their cell.
pub fn validate_row<S>(schema: &Schema<S>, attributes: &AttributeObjects, context: &Context) -> Errors {
    let mut errors = Errors::new();

    for column in schema.columns() {
        if column.rules().is_empty() {
            continue;
        }
        let value = attributes
            .get(column.name())
            .map(|a| a.validation_value())
            .unwrap_or(Value::Null);

        for rule in column.rules() {
            if let Some(message) = rule.check(&value, context) {
                errors.add(column.name(), message);
            }
        }
    }

    errors
}
