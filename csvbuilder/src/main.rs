//! csvbuilder CLI - check and produce CSV files against a schema definition
//!
//! ```bash
//! csvbuilder headers --schema users.json                 # Print expected headers
//! csvbuilder check users.csv --schema users.json         # Import and report rows/errors as JSON
//! csvbuilder export users.json --schema users.json -o out.csv
//! ```

use clap::{Parser, Subcommand};
use csvbuilder::import::source;
use csvbuilder::logs::{self, log_success};
use csvbuilder::{Context, Export, HeaderMatch, Import, ImportOptions, RowModel, SchemaDefinition};
use log::{info, warn, LevelFilter};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "csvbuilder")]
#[command(about = "Import and export CSV files described by a schema definition", long_about = None)]
struct Cli {
    /// Show per-row debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the headers a schema expects
    Headers {
        /// Schema definition (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Context JSON object (dynamic column collections)
        #[arg(short, long)]
        context: Option<PathBuf>,
    },

    /// Import a CSV file and report each row's attributes and errors
    Check {
        /// Input CSV file
        input: PathBuf,

        /// Schema definition (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Context JSON object
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Header matching: exact, case_insensitive or ignore
        #[arg(long, default_value = "case_insensitive")]
        header_match: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export a JSON array of records to CSV
    Export {
        /// Input JSON file (array of records)
        input: PathBuf,

        /// Schema definition (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Context JSON object
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(e) = logs::init(level) {
        eprintln!("Cannot install logger: {}", e);
    }

    let result = match cli.command {
        Commands::Headers { schema, context } => cmd_headers(&schema, context.as_deref()),

        Commands::Check {
            input,
            schema,
            context,
            delimiter,
            header_match,
            output,
        } => cmd_check(
            &input,
            &schema,
            context.as_deref(),
            delimiter,
            &header_match,
            output.as_deref(),
        ),

        Commands::Export {
            input,
            schema,
            context,
            output,
        } => cmd_export(&input, &schema, context.as_deref(), output.as_deref()),
    };

    if let Err(e) = result {
        log::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_context(path: Option<&Path>) -> Result<Context, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(context) => Ok(context),
                _ => Err(format!("Context file {} must hold a JSON object", p.display()).into()),
            }
        }
        None => Ok(Context::new()),
    }
}

fn cmd_headers(schema_path: &Path, context_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let schema = SchemaDefinition::from_path(schema_path)?.into_schema()?;
    let context = load_context(context_path)?;

    let bound = schema.bind_context(&context)?;
    for header in bound.headers(&context) {
        println!("{}", header);
    }
    Ok(())
}

fn cmd_check(
    input: &Path,
    schema_path: &Path,
    context_path: Option<&Path>,
    delimiter: Option<char>,
    header_match: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Checking: {}", input.display());

    let definition = SchemaDefinition::from_path(schema_path)?;
    // Report every row, valid or not.
    let schema = definition.into_schema()?.skip_if(|_| false);
    let context = load_context(context_path)?;

    let decoded = source::read_path(input, delimiter)?;
    info!("Encoding: {}", decoded.encoding);
    info!("Delimiter: '{}'", format_delimiter(decoded.delimiter));
    info!("Columns: {}", source::header_row(&decoded)?.join(", "));

    let options = ImportOptions {
        header_match: serde_json::from_value::<HeaderMatch>(json!(header_match))?,
        delimiter: Some(decoded.delimiter),
        ..Default::default()
    };
    let mut import = Import::from_text(&decoded.content, &schema, options)?.with_context(context);

    let mut rows = Vec::new();
    let mut invalid = 0;
    for row in import.by_ref() {
        if !row.is_valid() {
            invalid += 1;
            for message in row.errors().full_messages().iter().take(3) {
                warn!("Line {}: {}", row.line_number(), message);
            }
        }
        rows.push(json!({
            "line": row.line_number(),
            "valid": row.is_valid(),
            "attributes": row.attributes(),
            "errors": row.errors(),
        }));
    }

    for message in import.errors().full_messages() {
        warn!("{}", message);
    }
    if invalid == 0 && import.errors().is_empty() {
        log_success(format!("All {} rows valid", rows.len()));
    } else {
        info!("{} of {} rows invalid", invalid, rows.len());
    }

    let report = json!({
        "schema": definition.name,
        "headers": import.header_row(),
        "rows": rows,
        "errors": import.errors(),
    });
    write_output(&serde_json::to_string_pretty(&report)?, output)?;

    if invalid > 0 || !import.errors().is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_export(
    input: &Path,
    schema_path: &Path,
    context_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Exporting: {}", input.display());

    let schema = SchemaDefinition::from_path(schema_path)?.into_schema()?;
    let context = load_context(context_path)?;

    let content = fs::read_to_string(input)?;
    let records: Vec<Value> = serde_json::from_str(&content)?;

    let mut export = Export::new(&schema, context)?;
    export.generate(|sink| {
        for record in &records {
            sink.append_model(record, &Context::new())?;
        }
        Ok(())
    })?;
    log_success(format!("Exported {} rows", export.row_count()));

    match output {
        Some(path) => export.write_to_path(path)?,
        None => print!("{}", export.to_csv_string()?),
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            log_success(format!("Output written to: {}", p.display()));
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
