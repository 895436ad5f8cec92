// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//!
//! ctdl: compile CTDL query documents to PostgreSQL.
//!
//! Reads a query document from a file (or stdin), resolves properties
//! against a JSON-LD context and a column catalog, and prints either the
//! SQL statement or the compiled query as JSON.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use credreg_query::{ColumnCatalog, CompilerConfig, QueryCompiler, Schema, SchemaContext};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// What to print for a compiled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The rendered SQL statement.
    Sql,
    /// The compiled query tree.
    Json,
}

/// Compile CTDL JSON queries to PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "ctdl", version, about = "Compile CTDL query documents to PostgreSQL")]
struct Cli {
    /// JSON-LD context describing property types.
    #[arg(long, value_name = "FILE")]
    schema_context: PathBuf,

    /// Column catalog of the indexed resource table.
    #[arg(long, value_name = "FILE")]
    columns: PathBuf,

    /// Compiler configuration (JSON); defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Query document; `-` or absent reads stdin.
    query: Option<PathBuf>,

    /// Emit the COUNT statement instead of the data statement.
    #[arg(long, conflicts_with_all = ["skip", "take", "with_metadata"])]
    count: bool,

    /// Rows to skip.
    #[arg(long)]
    skip: Option<u64>,

    /// Page size.
    #[arg(long)]
    take: Option<u64>,

    /// Join envelope timestamps and owning/publishing organizations.
    #[arg(long)]
    with_metadata: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Sql)]
    format: OutputFormat,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = match &cli.config {
        Some(path) => serde_json::from_value(read_json(path)?)
            .with_context(|| format!("invalid compiler config {}", path.display()))?,
        None => CompilerConfig::default(),
    };
    config.validate()?;

    let schema = Schema::new(
        SchemaContext::from_json(&read_json(&cli.schema_context)?)?,
        ColumnCatalog::from_json(&read_json(&cli.columns)?)?,
    );
    debug!(
        context_entries = schema.context().len(),
        columns = schema.columns().len(),
        "Loaded schema"
    );

    let query = read_query(cli.query.as_deref())?;
    compile(cli, &schema, &config, &query)
}

fn compile(
    cli: &Cli,
    schema: &Schema,
    config: &CompilerConfig,
    query: &Value,
) -> anyhow::Result<String> {
    let compiler = QueryCompiler::new(schema, config);

    let compiled = if cli.count {
        compiler.count_query(query)?
    } else {
        compiler.data_query(
            query,
            cli.skip.unwrap_or(config.default_skip),
            cli.take.unwrap_or(config.default_take),
            cli.with_metadata,
        )?
    };

    match cli.format {
        OutputFormat::Sql => Ok(compiler.to_sql(&compiled)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&compiled)?),
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn read_query(path: Option<&Path>) -> anyhow::Result<Value> {
    match path {
        Some(path) if path != Path::new("-") => read_json(path),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("cannot read query from stdin")?;
            serde_json::from_str(&text).context("query is not valid JSON")
        }
    }
}
