//! Error types for csvbuilder.
//!
//! - [`SchemaError`] - Column declaration and expansion errors
//! - [`CsvError`] - Tabular reader/writer errors
//! - [`ExportError`] - Export pipeline errors
//! - [`DefinitionError`] - Declarative schema file errors
//!
//! Row validation failures and header mismatches are not errors in this
//! sense: they are collected as data in [`crate::validation::Errors`].

use thiserror::Error;

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors raised while declaring or expanding a schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A column (or template) with this name is already declared.
    #[error("Column '{0}' is already declared")]
    DuplicateColumn(String),

    /// No dynamic column template with this name.
    #[error("Unknown dynamic column template: {0}")]
    UnknownDynamicTemplate(String),

    /// No static column with this name (for overrides).
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// The context value bound to a dynamic template is not a list.
    #[error("Context value for dynamic column '{name}' must be an array, got {found}")]
    InvalidDynamicCollection { name: String, found: String },
}

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors from the tabular-text reader and writer.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read or write a file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV or writer failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Content could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Written bytes were not valid UTF-8.
    #[error("Output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Delimiters must be a single ASCII byte.
    #[error("Invalid delimiter '{0}': must be ASCII")]
    InvalidDelimiter(char),

    /// Input has no rows at all.
    #[error("CSV input is empty")]
    EmptyFile,
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while exporting row models.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Schema error while binding dynamic columns.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// A column has no export accessor and the schema has no field reader.
    #[error("No export accessor for column '{0}'")]
    MissingAccessor(String),
}

// =============================================================================
// Definition Errors
// =============================================================================

/// Errors while loading a declarative schema definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// JSON parse error.
    #[error("Definition JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read the definition file.
    #[error("Definition IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The declared columns do not form a valid schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A validation rule could not be built.
    #[error("Invalid rule on '{column}': {message}")]
    InvalidRule { column: String, message: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for reader/writer operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for definition loading.
pub type DefinitionResult<T> = Result<T, DefinitionError>;
