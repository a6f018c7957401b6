//! # csvbuilder - CSV row models, import and export
//!
//! csvbuilder maps CSV rows to and from "row models": records with named,
//! ordered fields, described by a [`Schema`]. Schemas may declare dynamic
//! column templates whose columns are only known at runtime (one column per
//! skill, per tag area, ...).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Schema    │────▶│  Attribute  │────▶│  Row model  │────▶│ Import or   │
//! │ (+dynamic)  │     │  pipeline   │     │ (validated) │     │ Export      │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use csvbuilder::prelude::*;
//! use serde_json::json;
//!
//! let schema: Schema = Schema::new("DynamicColumnsRowModel")
//!     .column(Column::new("first_name").header("Name"))?
//!     .column(Column::new("last_name").header("Surname"))?
//!     .dynamic_column(DynamicColumn::new("skills").import_with(|cell: &str, _: &str| json!(cell == "1")))?;
//!
//! let input = "Name,Surname,Ruby,Python\nJohn,Doe,1,0\n";
//! let row = Import::from_text(input, &schema, ImportOptions::default())?
//!     .next()
//!     .ok_or("no row")?;
//!
//! assert_eq!(row.attributes()["skills"], json!([true, false]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`schema`] - Columns, dynamic templates and hooks
//! - [`attribute`] - Per-column value resolution
//! - [`row`] - The row model surface
//! - [`header`] - Header reconciliation
//! - [`import`] - Import stream controller and row sources
//! - [`export`] - Export stream controller and row sinks
//! - [`validation`] - Field rules and error collections
//! - [`definition`] - Declarative JSON schema definitions
//! - [`logs`] - Console logger for the command line tool

// Core modules
pub mod error;
pub mod value;

// Schema and values
pub mod schema;
pub mod attribute;
pub mod row;

// Validation
pub mod validation;

// Streams
pub mod header;
pub mod import;
pub mod export;

// Declarative definitions
pub mod definition;

// Console logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    SchemaError,
    SchemaResult,
    CsvError,
    CsvResult,
    ExportError,
    ExportResult,
    DefinitionError,
    DefinitionResult,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{
    Column,
    ColumnKind,
    DynamicColumn,
    Header,
    Hooks,
    Schema,
};

pub use value::Context;

// =============================================================================
// Re-exports - Row models
// =============================================================================

pub use attribute::{Attribute, AttributeObject, AttributeObjects, DynamicColumnAttribute};
pub use row::RowModel;

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{Errors, FieldError, Rule, RuleKind};

// =============================================================================
// Re-exports - Import / Export
// =============================================================================

pub use header::{reconcile, ExpectedHeader, HeaderMatch, HeaderReconciliation};

pub use import::{
    Import,
    ImportOptions,
    ImportRow,
    ImportState,
    MemoryRows,
    RawRow,
    RowSource,
};

pub use export::{Export, ExportOptions, ExportRow, MemorySink, RowSink};

// =============================================================================
// Re-exports - Definitions
// =============================================================================

pub use definition::SchemaDefinition;

/// Everything needed to declare a schema and run imports and exports.
pub mod prelude {
    pub use crate::{
        Column, Context, DynamicColumn, Export, ExportOptions, Import, ImportOptions, RawRow, RowModel, Rule,
        Schema,
    };
}
