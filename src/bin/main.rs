//! sqm CLI - compile object queries to SQL
//!
//! Usage:
//!   sqm compile <query> [--model <file.toml>] [--dialect <dialect>] [--count] [--format json]
//!   sqm check <query> [--model <file.toml>]
//!   sqm convert <from-unit> <to-unit>
//!   sqm dialects
//!
//! Examples:
//!   sqm compile "select p.name from Person p where p.age > :age" --model model.toml
//!   sqm compile "from Person p order by p.name" --model model.toml --dialect oracle --count
//!   sqm convert second nanosecond

use ariadne::{Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand, ValueEnum};
use sqm::config::Settings;
use sqm::hql::{self, ParseFailure, SyntaxError};
use sqm::sqm::ResultType;
use sqm::temporal::{convert_unit, TemporalUnit};
use sqm::{Dialect, QueryEngine, QueryError, SqlDialect, StaticDomainModel};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqm")]
#[command(about = "sqm - compile object queries to multi-dialect SQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $SQM_CONFIG, ./sqm.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query to SQL
    Compile {
        /// The query text
        query: String,

        /// SQL dialect to generate (overrides the settings file)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Path to the TOML domain model (overrides the settings file)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Render the row-counting variant of the query
        #[arg(long)]
        count: bool,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        format: OutputFormat,
    },

    /// Check a query for syntax errors, and for semantic errors when a model is available
    Check {
        query: String,

        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Print the expression that converts a duration between temporal units
    Convert { from: String, to: String },

    /// List supported dialects
    Dialects,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Ansi,
    Postgres,
    Mysql,
    Mariadb,
    Tsql,
    Oracle,
    H2,
    Db2,
    Teradata,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Ansi => Dialect::Ansi,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Mariadb => Dialect::MariaDb,
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Oracle => Dialect::Oracle,
            DialectArg::H2 => Dialect::H2,
            DialectArg::Db2 => Dialect::Db2,
            DialectArg::Teradata => Dialect::Teradata,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL and parameter bindings as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings, cli.verbose);

    match cli.command {
        Commands::Compile {
            query,
            dialect,
            model,
            count,
            format,
        } => cmd_compile(&settings, &query, dialect, model, count, format),
        Commands::Check { query, model } => cmd_check(&settings, &query, model),
        Commands::Convert { from, to } => cmd_convert(&from, &to),
        Commands::Dialects => cmd_dialects(),
    }
}

fn init_logging(settings: &Settings, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sqm=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_engine(
    settings: &Settings,
    dialect: Option<DialectArg>,
    model: Option<PathBuf>,
) -> Result<QueryEngine, String> {
    let dialect = match dialect {
        Some(arg) => Dialect::from(arg),
        None => settings.dialect().map_err(|e| e.to_string())?,
    };
    let domain = match model {
        Some(path) => StaticDomainModel::from_file(&path)
            .map_err(|e| format!("Error loading model '{}': {}", path.display(), e))?,
        None => settings.domain_model().map_err(|e| e.to_string())?,
    };
    Ok(QueryEngine::new(dialect, Arc::new(domain)).with_options(settings.creation_options()))
}

fn cmd_compile(
    settings: &Settings,
    query: &str,
    dialect: Option<DialectArg>,
    model: Option<PathBuf>,
    count: bool,
    format: OutputFormat,
) -> ExitCode {
    let engine = match build_engine(settings, dialect, model) {
        Ok(engine) => engine,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let result = if count {
        engine.count_query(query)
    } else {
        engine.compile(query)
    };

    match result {
        Ok(rendered) => {
            match format {
                OutputFormat::Sql => println!("{}", rendered.sql),
                OutputFormat::Json => match serde_json::to_string_pretty(&rendered) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing output: {}", e);
                        return ExitCode::FAILURE;
                    }
                },
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_query_error(&e, query),
    }
}

fn cmd_check(settings: &Settings, query: &str, model: Option<PathBuf>) -> ExitCode {
    let has_model = model.is_some() || settings.domain.path.is_some();
    if !has_model {
        return match hql::parse(query) {
            Ok(_) => {
                println!("OK: syntax is valid (no domain model, semantic checks skipped)");
                ExitCode::SUCCESS
            }
            Err(ParseFailure::Syntax(error)) => report_syntax_error(&error),
            Err(ParseFailure::Internal(message)) => {
                eprintln!("Internal parser error: {}", message);
                ExitCode::FAILURE
            }
        };
    }

    let engine = match build_engine(settings, None, model) {
        Ok(engine) => engine,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };
    match engine.translate(query, ResultType::Object) {
        Ok(statement) => {
            println!(
                "OK: query is valid ({} parameter(s))",
                statement.parameters().len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => report_query_error(&e, query),
    }
}

fn cmd_convert(from: &str, to: &str) -> ExitCode {
    let units = from
        .parse::<TemporalUnit>()
        .and_then(|from| to.parse::<TemporalUnit>().map(|to| (from, to)));
    let (from, to) = match units {
        Ok(units) => units,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match convert_unit(from, to) {
        Ok(expression) if expression.is_empty() => {
            println!("(identity)");
            ExitCode::SUCCESS
        }
        Ok(expression) => {
            println!("{}", expression);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_dialects() -> ExitCode {
    for dialect in Dialect::ALL {
        println!("{}", dialect.name());
    }
    ExitCode::SUCCESS
}

fn report_query_error(error: &QueryError, query: &str) -> ExitCode {
    match error.as_syntax() {
        Some(syntax) => report_syntax_error(syntax),
        None => {
            eprintln!("Error in query '{}': {}", query, error);
            ExitCode::FAILURE
        }
    }
}

fn report_syntax_error(error: &SyntaxError) -> ExitCode {
    let span = clamp_span(error);
    let printed = Report::build(ReportKind::Error, ("query", span.clone()))
        .with_message(&error.message)
        .with_label(Label::new(("query", span)).with_message("syntax error here"))
        .finish()
        .eprint(("query", Source::from(error.query.as_str())));
    if printed.is_err() {
        eprintln!("{}", error.message);
    }
    ExitCode::FAILURE
}

/// An end-of-input span points one past the text; keep it printable.
fn clamp_span(error: &SyntaxError) -> std::ops::Range<usize> {
    let len = error.query.len();
    let start = error.span.start.min(len);
    let end = error.span.end.clamp(start, len);
    if start == end && start == len && len > 0 {
        (len - 1)..len
    } else {
        start..end
    }
}
