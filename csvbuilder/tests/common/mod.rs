#![allow(dead_code)]

use csvbuilder::prelude::*;
use serde_json::{json, Value};

/// Domain object exported by the scenario tests.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub skills: Vec<String>,
}

impl User {
    pub fn new(first_name: &str, last_name: &str, skills: &[&str]) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

pub fn skills() -> Vec<Value> {
    vec![json!("Ruby"), json!("Python"), json!("Javascript")]
}

pub fn context(value: Value) -> Context {
    value.as_object().cloned().unwrap_or_default()
}

/// `first_name` ("First Name") and `last_name` ("Last Name").
pub fn basic_schema() -> Schema<User> {
    Schema::<User>::new("BasicRowModel")
        .column(
            Column::new("first_name")
                .header("First Name")
                .validate(Rule::presence())
                .export_with(|u: &User, _: &Context| json!(u.first_name)),
        )
        .and_then(|s| {
            s.column(
                Column::new("last_name")
                    .header("Last Name")
                    .export_with(|u: &User, _: &Context| json!(u.last_name)),
            )
        })
        .unwrap()
}

/// `first_name` ("Name"), `last_name` ("Surname") and a `skills` template.
pub fn dynamic_schema() -> Schema<User> {
    Schema::<User>::new("DynamicColumnsRowModel")
        .column(Column::new("first_name").header("Name").export_with(|u: &User, _: &Context| json!(u.first_name)))
        .and_then(|s| s.column(Column::new("last_name").header("Surname").export_with(|u: &User, _: &Context| json!(u.last_name))))
        .and_then(|s| {
            s.dynamic_column(
                DynamicColumn::new("skills")
                    .import_with(|cell: &str, _: &str| json!(cell == "1"))
                    .export_with(|u: &User, skill: &Value, _: &Context| {
                        json!(u.skills.iter().any(|s| Some(s.as_str()) == skill.as_str()))
                    }),
            )
        })
        .unwrap()
        .format_dynamic_column_cells(|cells: &[Value], _: &str, _: &Context| {
            cells
                .iter()
                .map(|c| match c {
                    Value::Bool(true) => json!("1"),
                    Value::Bool(false) => json!("0"),
                    other => other.clone(),
                })
                .collect()
        })
}
