//! Attribute objects.
//!
//! One [`AttributeObject`] is computed per column (or per dynamic template)
//! for every row model. Attribute objects are owned by the row that produced
//! them and are never mutated after construction.

mod pipeline;

pub use pipeline::{resolve, ValueSource};

use serde::Serialize;
use serde_json::Value;

use crate::schema::ColumnKind;

/// Resolved value of one concrete column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    column: String,
    #[serde(skip)]
    kind: ColumnKind,
    source_value: Value,
    formatted_value: Value,
}

impl Attribute {
    pub(crate) fn new(column: impl Into<String>, kind: ColumnKind, source_value: Value, formatted_value: Value) -> Self {
        Self {
            column: column.into(),
            kind,
            source_value,
            formatted_value,
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// The value consumers observe: the `format_cell` output.
    pub fn value(&self) -> &Value {
        &self.formatted_value
    }

    pub fn source_value(&self) -> &Value {
        &self.source_value
    }

    /// Alias of [`Attribute::source_value`].
    pub fn unformatted_value(&self) -> &Value {
        &self.source_value
    }

    pub fn formatted_value(&self) -> &Value {
        &self.formatted_value
    }
}

/// Resolved values of one dynamic template, across all its expanded columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicColumnAttribute {
    template: String,
    columns: Vec<String>,
    headers: Vec<String>,
    source_cells: Vec<Value>,
    formatted_cells: Vec<Value>,
    value: Vec<Value>,
}

impl DynamicColumnAttribute {
    pub(crate) fn new(
        template: impl Into<String>,
        columns: Vec<String>,
        headers: Vec<String>,
        source_cells: Vec<Value>,
        formatted_cells: Vec<Value>,
        value: Vec<Value>,
    ) -> Self {
        Self {
            template: template.into(),
            columns,
            headers,
            source_cells,
            formatted_cells,
            value,
        }
    }

    pub fn template_name(&self) -> &str {
        &self.template
    }

    /// Names of the expanded columns, in entry order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Formatted headers of the expanded columns.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Accessor output per expanded column, before any hook.
    pub fn source_cells(&self) -> &[Value] {
        &self.source_cells
    }

    /// Alias of [`DynamicColumnAttribute::source_cells`].
    pub fn unformatted_value(&self) -> &[Value] {
        &self.source_cells
    }

    /// Each cell through `format_cell`. Used for display only.
    pub fn formatted_cells(&self) -> &[Value] {
        &self.formatted_cells
    }

    /// The whole sequence through `format_dynamic_column_cells`.
    pub fn value(&self) -> &[Value] {
        &self.value
    }
}

/// Either a plain attribute or a dynamic template aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeObject {
    Attribute(Attribute),
    Dynamic(DynamicColumnAttribute),
}

impl AttributeObject {
    /// Consumer-facing value; a list for dynamic templates.
    pub fn value(&self) -> Value {
        match self {
            AttributeObject::Attribute(a) => a.value().clone(),
            AttributeObject::Dynamic(d) => Value::Array(d.value().to_vec()),
        }
    }

    pub fn source_value(&self) -> Value {
        match self {
            AttributeObject::Attribute(a) => a.source_value().clone(),
            AttributeObject::Dynamic(d) => Value::Array(d.source_cells().to_vec()),
        }
    }

    pub fn formatted_value(&self) -> Value {
        match self {
            AttributeObject::Attribute(a) => a.formatted_value().clone(),
            AttributeObject::Dynamic(d) => Value::Array(d.formatted_cells().to_vec()),
        }
    }

    /// What validation rules see.
    ///
    /// Static columns are checked after `format_cell`; expanded dynamic
    /// columns against the accessor output, which `format_cell` never touches
    /// on the consumer path.
    pub fn validation_value(&self) -> Value {
        match self {
            AttributeObject::Attribute(a) if matches!(a.kind(), ColumnKind::Dynamic { .. }) => a.source_value().clone(),
            AttributeObject::Attribute(a) => a.formatted_value().clone(),
            AttributeObject::Dynamic(d) => Value::Array(d.value().to_vec()),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, AttributeObject::Dynamic(_))
    }

    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            AttributeObject::Attribute(a) => Some(a),
            AttributeObject::Dynamic(_) => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicColumnAttribute> {
        match self {
            AttributeObject::Dynamic(d) => Some(d),
            AttributeObject::Attribute(_) => None,
        }
    }
}

/// Ordered `name -> AttributeObject` mapping of one row.
///
/// Static columns come first. Each dynamic template contributes its
/// aggregate under the template name followed by one entry per expanded
/// column (`skills_0`, `skills_1`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeObjects {
    entries: Vec<(String, AttributeObject)>,
}

impl AttributeObjects {
    pub(crate) fn push(&mut self, name: impl Into<String>, object: AttributeObject) {
        self.entries.push((name.into(), object));
    }

    pub fn get(&self, name: &str) -> Option<&AttributeObject> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeObject)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expanded_kind() -> ColumnKind {
        ColumnKind::Dynamic {
            template: "skills".into(),
            index: 0,
            entry: json!("Ruby"),
        }
    }

    #[test]
    fn test_validation_value_per_kind() {
        let plain = AttributeObject::Attribute(Attribute::new("first_name", ColumnKind::Static, json!("john"), json!("JOHN")));
        assert_eq!(plain.validation_value(), json!("JOHN"));

        let cell = AttributeObject::Attribute(Attribute::new("skills_0", expanded_kind(), json!("1"), json!("<1>")));
        assert_eq!(cell.validation_value(), json!("1"));
        assert_eq!(cell.value(), json!("<1>"));
    }

    #[test]
    fn test_dynamic_views_stay_separate() {
        let dynamic = AttributeObject::Dynamic(DynamicColumnAttribute::new(
            "skills",
            vec!["skills_0".into(), "skills_1".into()],
            vec!["Ruby".into(), "Python".into()],
            vec![json!(true), json!(false)],
            vec![json!("<true>"), json!("<false>")],
            vec![json!(1), json!(0)],
        ));
        assert_eq!(dynamic.value(), json!([1, 0]));
        assert_eq!(dynamic.source_value(), json!([true, false]));
        assert_eq!(dynamic.formatted_value(), json!(["<true>", "<false>"]));
        assert!(dynamic.is_dynamic());
    }

    #[test]
    fn test_attribute_objects_lookup_keeps_order() {
        let mut objects = AttributeObjects::default();
        objects.push("b", AttributeObject::Attribute(Attribute::new("b", ColumnKind::Static, json!(1), json!(1))));
        objects.push("a", AttributeObject::Attribute(Attribute::new("a", ColumnKind::Static, json!(2), json!(2))));
        assert_eq!(objects.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(objects.get("a").map(|o| o.value()), Some(json!(2)));
        assert!(objects.get("c").is_none());
    }
}
