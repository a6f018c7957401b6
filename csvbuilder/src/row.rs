//! The row model surface shared by imported and exported rows.

use serde_json::{Map, Value};

use crate::attribute::{AttributeObject, AttributeObjects};
use crate::schema::Schema;
use crate::validation::Errors;
use crate::value::Context;

/// One structured record bound to an input row or to an exported source model.
///
/// Attribute maps aggregate each dynamic template under its own name; the
/// expanded columns (`skills_0`, ...) are only addressable through
/// [`RowModel::attribute_objects`].
pub trait RowModel {
    /// Type of the exported source model (`()` for import-only schemas).
    type Source;

    fn schema(&self) -> &Schema<Self::Source>;

    fn context(&self) -> &Context;

    /// Attribute objects, resolved on first access.
    fn attribute_objects(&self) -> &AttributeObjects;

    /// Validation errors, computed on first access.
    fn errors(&self) -> &Errors;

    fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    /// Display headers of the bound schema.
    fn headers(&self) -> Vec<String> {
        self.schema().headers(self.context())
    }

    fn attribute(&self, name: &str) -> Option<&AttributeObject> {
        self.attribute_objects().get(name)
    }

    /// `name -> value`; templates map to their formatted sequence.
    fn attributes(&self) -> Map<String, Value> {
        collect_top_level(self.attribute_objects(), |o| o.value())
    }

    /// `name -> formatted value`; templates map to their per-cell display view.
    fn formatted_attributes(&self) -> Map<String, Value> {
        collect_top_level(self.attribute_objects(), |o| o.formatted_value())
    }

    fn original_attributes(&self) -> Map<String, Value> {
        self.formatted_attributes()
    }

    /// Source values of the static columns only.
    fn source_attributes(&self) -> Map<String, Value> {
        self.attribute_objects()
            .iter()
            .filter_map(|(name, object)| match object.as_attribute() {
                Some(a) if !a.kind().is_dynamic() => Some((name.to_string(), a.source_value().clone())),
                _ => None,
            })
            .collect()
    }
}

/// Static attributes and template aggregates, skipping expanded columns.
fn collect_top_level<F>(objects: &AttributeObjects, read: F) -> Map<String, Value>
where
    F: Fn(&AttributeObject) -> Value,
{
    objects
        .iter()
        .filter(|(_, object)| match object {
            AttributeObject::Attribute(a) => !a.kind().is_dynamic(),
            AttributeObject::Dynamic(_) => true,
        })
        .map(|(name, object)| (name.to_string(), read(object)))
        .collect()
}
