mod common;

use common::{basic_schema, context, dynamic_schema, skills, User};
use csvbuilder::prelude::*;
use csvbuilder::value::cell_text;
use csvbuilder::{HeaderMatch, ImportState, MemorySink};
use serde_json::{json, Value};
use std::io::Write;

// =============================================================================
// Import
// =============================================================================

#[test]
fn test_basic_import_matches_headers_case_insensitively() {
    let input = "first name,LAST NAME\nJohn,Doe\nJane,Roe\n";
    let rows: Vec<_> = Import::from_text(input, &basic_schema(), ImportOptions::default())
        .unwrap()
        .collect();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].attributes()["first_name"], json!("John"));
    assert_eq!(rows[0].attributes()["last_name"], json!("Doe"));
    assert_eq!(rows[1].line_number(), 3);
    assert_eq!(rows[1].headers(), vec!["First Name", "Last Name"]);
}

#[test]
fn test_exact_header_match_rejects_other_case() {
    let input = "first name,last name\nJohn,Doe\n";
    let options = ImportOptions::default().with_header_match(HeaderMatch::Exact);
    let mut import = Import::from_text(input, &basic_schema(), options).unwrap();

    assert!(import.next().is_none());
    assert!(import.errors().full_messages()[0].starts_with("Headers mismatch."));
}

#[test]
fn test_dynamic_columns_inferred_from_headers() {
    let schema = Schema::<User>::new("Skills")
        .column(Column::new("first_name").header("Name"))
        .and_then(|s| s.column(Column::new("last_name").header("Surname")))
        .and_then(|s| s.dynamic_column(DynamicColumn::new("skills").import_with(|cell: &str, _: &str| json!(cell == "1"))))
        .unwrap();

    let input = "Name,Surname,Ruby,Python,Javascript\nJohn,Doe,1,0,0\n";
    let mut import = Import::from_text(input, &schema, ImportOptions::default()).unwrap();
    let row = import.next().unwrap();

    assert_eq!(row.attributes()["skills"], json!([true, false, false]));
    assert_eq!(row.dynamic_column_source_headers(), vec!["Ruby", "Python", "Javascript"]);
    assert_eq!(import.schema().entries("skills").unwrap().len(), 3);
}

#[test]
fn test_invalid_headers_yield_no_rows() {
    let schema = dynamic_schema().expand("skills", skills()).unwrap();
    let input = "Name,Surname,Ruby,Python,Visual Basic\nJohn,Doe,1,0,0\n";
    let mut import = Import::from_text(input, &schema, ImportOptions::default()).unwrap();

    assert!(import.next().is_none());
    assert!(import.next().is_none());
    assert_eq!(
        import.errors().full_messages(),
        vec![
            "Headers mismatch. Given headers (Name, Surname, Ruby, Python, Visual Basic). \
             Expected headers (Name, Surname, Ruby, Python, Javascript). \
             Unrecognized headers (Visual Basic). Missing headers (Javascript)."
        ]
    );
}

#[test]
fn test_invalid_rows_are_skipped_and_collected() {
    let invalid = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = std::rc::Rc::clone(&invalid);

    let input = "First Name,Last Name\nJohn,Doe\n,Nobody\nJane,Roe\n";
    let rows: Vec<_> = Import::from_text(input, &basic_schema(), ImportOptions::default())
        .unwrap()
        .after_next(move |state: &mut ImportState<'_, User>| {
            if let Some(row) = state.current_row_model() {
                if !row.is_valid() {
                    seen.borrow_mut().push((row.line_number(), row.errors().full_messages()));
                }
            }
        })
        .collect();

    let names: Vec<Value> = rows.iter().map(|r| r.attributes()["first_name"].clone()).collect();
    assert_eq!(names, vec![json!("John"), json!("Jane")]);
    assert_eq!(
        *invalid.borrow(),
        vec![(3, vec!["First name can't be blank".to_string()])]
    );
}

#[test]
fn test_abort_on_unknown_skill_at_header_boundary() {
    let known = vec!["Ruby".to_string(), "Python".to_string()];
    let schema = Schema::<User>::new("Skills")
        .column(Column::new("first_name").header("Name"))
        .and_then(|s| s.dynamic_column(DynamicColumn::new("skills")))
        .unwrap();

    let input = "Name,Ruby,Cobol\nJohn,1,0\nJane,0,1\n";
    let mut import = Import::from_text(input, &schema, ImportOptions::default())
        .unwrap()
        .after_next(move |state: &mut ImportState<'_, User>| {
            if !state.is_header_boundary() {
                return;
            }
            let Some(row) = state.current_row_model() else { return };
            for header in row.dynamic_column_source_headers() {
                if !known.contains(&header) {
                    state.errors_mut().add("skills", format!("{} does not exist", header));
                    state.abort();
                }
            }
        });

    assert!(import.next().is_none());
    assert!(import.is_aborted());
    assert_eq!(import.errors().full_messages(), vec!["Skills Cobol does not exist"]);
}

#[test]
fn test_import_from_file_with_bom_and_semicolons() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all("\u{feff}First Name;Last Name\nZoé;Müller\nRené;Dupont\n".as_bytes())
        .unwrap();

    let rows: Vec<_> = Import::from_path(file.path(), &basic_schema(), ImportOptions::default())
        .unwrap()
        .collect();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].attributes()["first_name"], json!("Zoé"));
    assert_eq!(rows[0].attributes()["last_name"], json!("Müller"));
    assert_eq!(rows[1].source_headers(), &["First Name", "Last Name"]);
}

// =============================================================================
// Export
// =============================================================================

#[test]
fn test_basic_export_with_extra_column() {
    let schema = basic_schema()
        .column(Column::new("full_name").header("Full Name").export_with(|u: &User, _: &Context| json!(u.full_name())))
        .unwrap();

    let mut export = Export::new(&schema, Context::new()).unwrap();
    let user = User::new("John", "Doe", &[]);
    export
        .generate(|e| {
            e.append_model(&user, &Context::new())?;
            Ok(())
        })
        .unwrap();

    assert_eq!(
        export.to_csv_string().unwrap(),
        "First Name,Last Name,Full Name\nJohn,Doe,John Doe\n"
    );
}

#[test]
fn test_dynamic_export_from_context() {
    let mut export = Export::new(&dynamic_schema(), context(json!({ "skills": skills() }))).unwrap();
    let user = User::new("John", "Doe", &["Ruby"]);
    let row = export.append_model(&user, &Context::new()).unwrap();

    assert_eq!(row.cells(), &["John", "Doe", "1", "0", "0"]);
    assert_eq!(export.headers(), vec!["Name", "Surname", "Ruby", "Python", "Javascript"]);
    assert_eq!(
        export.to_csv_string().unwrap(),
        "Name,Surname,Ruby,Python,Javascript\nJohn,Doe,1,0,0\n"
    );
}

#[test]
fn test_dynamic_export_with_alias() {
    let schema = Schema::<User>::new("Aliased")
        .column(Column::new("first_name").header("Name").export_with(|u: &User, _: &Context| json!(u.first_name)))
        .and_then(|s| {
            s.dynamic_column(
                DynamicColumn::new("skills")
                    .alias("abilities")
                    .export_with(|u: &User, skill: &Value, _: &Context| {
                        json!(if u.skills.iter().any(|s| Some(s.as_str()) == skill.as_str()) { "yes" } else { "no" })
                    }),
            )
        })
        .unwrap();

    let ctx = context(json!({ "abilities": ["Ruby", "Go"] }));
    let mut export = Export::new(&schema, ctx).unwrap();
    export.append_model(&User::new("Ann", "Lee", &["Go"]), &Context::new()).unwrap();

    assert_eq!(export.to_csv_string().unwrap(), "Name,Ruby,Go\nAnn,no,yes\n");
}

#[test]
fn test_format_cell_decorates_statics_not_dynamic_value() {
    let schema = dynamic_schema().format_cell(|value: &Value, _: &str, _: &Context| {
        json!(format!("- || - {} - || -", cell_text(value)))
    });

    let mut export = Export::new(&schema, context(json!({ "skills": ["Ruby"] }))).unwrap();
    let user = User::new("John", "Doe", &["Ruby"]);
    let row = export.append_model(&user, &Context::new()).unwrap();

    assert_eq!(row.attributes()["first_name"], json!("- || - John - || -"));
    assert_eq!(row.attributes()["skills"], json!(["1"]));
    let skills = row.attribute("skills").and_then(|o| o.as_dynamic()).unwrap();
    assert_eq!(skills.formatted_cells(), &[json!("- || - true - || -")]);
}

#[test]
fn test_formatted_dynamic_headers() {
    let schema = dynamic_schema()
        .format_dynamic_column_header(|entry: &Value, template: &str, _: &Context| {
            format!("{}: [{}]", template, entry.as_str().unwrap_or_default())
        });

    let export = Export::new(&schema, context(json!({ "skills": ["Ruby", "Python"] }))).unwrap();
    assert_eq!(export.headers(), vec!["Name", "Surname", "skills: [Ruby]", "skills: [Python]"]);
}

#[test]
fn test_export_into_memory_sink() {
    let mut export = Export::to_sink(
        MemorySink::default(),
        &basic_schema(),
        Context::new(),
        ExportOptions::default(),
    )
    .unwrap();
    export.append_model(&User::new("John", "Doe", &[]), &Context::new()).unwrap();

    assert_eq!(
        export.sink().rows,
        vec![
            vec!["First Name".to_string(), "Last Name".to_string()],
            vec!["John".to_string(), "Doe".to_string()],
        ]
    );
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn test_export_then_import_round_trip() {
    let users = vec![
        User::new("John", "Doe", &["Ruby", "Javascript"]),
        User::new("Jane", "Roe", &["Python"]),
    ];

    let mut export = Export::new(&dynamic_schema(), context(json!({ "skills": skills() }))).unwrap();
    for user in &users {
        export.append_model(user, &Context::new()).unwrap();
    }
    let csv = export.to_csv_string().unwrap();

    let import_schema = Schema::<User>::new("Skills")
        .column(Column::new("first_name").header("Name"))
        .and_then(|s| s.column(Column::new("last_name").header("Surname")))
        .and_then(|s| s.dynamic_column(DynamicColumn::new("skills").import_with(|cell: &str, _: &str| json!(cell == "1"))))
        .unwrap();

    let imported: Vec<User> = Import::from_text(&csv, &import_schema, ImportOptions::default())
        .unwrap()
        .map(|row| {
            let attributes = row.attributes();
            let skills = row
                .dynamic_column_source_headers()
                .into_iter()
                .zip(attributes["skills"].as_array().cloned().unwrap_or_default())
                .filter(|(_, has)| has == &json!(true))
                .map(|(skill, _)| skill)
                .collect();
            User {
                first_name: attributes["first_name"].as_str().unwrap_or_default().to_string(),
                last_name: attributes["last_name"].as_str().unwrap_or_default().to_string(),
                skills,
            }
        })
        .collect();

    assert_eq!(imported, users);
}

#[test]
fn test_expanding_twice_keeps_one_family() {
    let schema = dynamic_schema()
        .expand("skills", skills())
        .and_then(|s| s.expand("skills", vec![json!("Go")]))
        .unwrap();

    assert_eq!(
        schema.column_names(),
        vec!["first_name", "last_name", "skills_0"]
    );
    assert_eq!(schema.headers(&Context::new()), vec!["Name", "Surname", "Go"]);
}
