//! cosql command-line interface
//!
//! Reads a JSON IR document and optional parameter values, and prints the
//! generated Cosmos NoSQL query.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cosql_ir::{ParameterValues, SelectExpression};
use cosql_query::{QueryError, QuerySqlGenerator};
use cosql_registry::TypeMappingSource;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

mod config;
mod logging;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "cosql", version, about = "Generate Cosmos NoSQL queries from cosql IR documents")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "COSQL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate query text and parameters
    Generate {
        /// IR document (JSON SelectExpression)
        #[arg(long)]
        query: PathBuf,

        /// Parameter values (JSON object keyed by parameter name)
        #[arg(long)]
        parameters: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the IR fingerprint used as a cache key
    Fingerprint {
        #[arg(long)]
        query: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Parameter lines, blank line, query text
    Text,
    /// `{ "query": ..., "parameters": [...] }`
    Json,
}

fn read_select(path: &Path) -> Result<SelectExpression> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read IR document {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid IR document {}", path.display()))
}

fn read_parameters(path: Option<&Path>) -> Result<ParameterValues> {
    let Some(path) = path else {
        return Ok(ParameterValues::new());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter values {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid parameter values {}", path.display()))
}

fn generate(config: &Config, query: &Path, parameters: Option<&Path>, format: OutputFormat) -> Result<String> {
    let select = read_select(query)?;
    let values = read_parameters(parameters)?;

    let type_mapping_source = TypeMappingSource::default();
    let generator = QuerySqlGenerator::with_options(&type_mapping_source, config.generator.clone());
    let generated = generator.generate(&select, &values)?;

    info!(fingerprint = %select.fingerprint(), "Query generated");

    match format {
        OutputFormat::Text => Ok(generated.to_string()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&generated)?),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::from_env()?,
    };
    config.apply_logging_env();
    logging::init();

    match cli.command {
        Command::Generate {
            query,
            parameters,
            format,
        } => {
            let output = generate(&config, &query, parameters.as_deref(), format)?;
            println!("{}", output);
        }
        Command::Fingerprint { query } => {
            println!("{}", read_select(&query)?.fingerprint());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<QueryError>() {
            Some(QueryError::User(user)) => {
                eprintln!("query error: {}", user);
                ExitCode::from(1)
            }
            Some(internal @ QueryError::Internal(_)) => {
                eprintln!("internal error: {}", internal);
                ExitCode::from(2)
            }
            None => {
                eprintln!("error: {:#}", err);
                ExitCode::from(1)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SELECT: &str = r#"{
        "projection": [
            {
                "expression": {"type": "ObjectReference", "name": "c"},
                "alias": "",
                "name": "c"
            }
        ],
        "uses_single_value_projection": true,
        "sources": [{"container": {"type": "ObjectReference", "name": "root"}, "alias": "c"}],
        "predicate": {
            "type": "Binary",
            "operator": "Equal",
            "left": {
                "type": "KeyAccess",
                "object": {"type": "ObjectReference", "name": "c"},
                "property_name": "id",
                "data_type": "String",
                "type_mapping": {"clr_type": "String", "kind": "Json"}
            },
            "right": {
                "type": "Parameter",
                "name": "__id_0",
                "data_type": "String",
                "type_mapping": {"clr_type": "String", "kind": "Json"}
            },
            "data_type": "Bool"
        }
    }"#;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["cosql", "generate", "--query", "ir.json", "--format", "json"]).unwrap();
        match cli.command {
            Command::Generate { query, parameters, format } => {
                assert_eq!(query, PathBuf::from("ir.json"));
                assert!(parameters.is_none());
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["cosql", "generate"]).is_err());
    }

    #[test]
    fn test_generate_text() {
        let query = write_temp("cosql_cli_text_ir.json", SELECT);
        let parameters = write_temp("cosql_cli_text_values.json", r#"{"__id_0": "42"}"#);

        let output = generate(&Config::default(), &query, Some(&parameters), OutputFormat::Text).unwrap();
        assert_eq!(
            output,
            "@__id_0='\"42\"'\n\nSELECT VALUE c\nFROM root c\nWHERE (c[\"id\"] = @__id_0)"
        );

        std::fs::remove_file(query).ok();
        std::fs::remove_file(parameters).ok();
    }

    #[test]
    fn test_generate_json() {
        let query = write_temp("cosql_cli_json_ir.json", SELECT);
        let parameters = write_temp("cosql_cli_json_values.json", r#"{"__id_0": "42"}"#);

        let output = generate(&Config::default(), &query, Some(&parameters), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["parameters"][0]["name"], "@__id_0");
        assert_eq!(parsed["parameters"][0]["value"], "42");

        std::fs::remove_file(query).ok();
        std::fs::remove_file(parameters).ok();
    }

    #[test]
    fn test_missing_parameter_is_query_error() {
        let query = write_temp("cosql_cli_missing_ir.json", SELECT);

        let err = generate(&Config::default(), &query, None, OutputFormat::Text).unwrap_err();
        let query_error = err.downcast_ref::<QueryError>().unwrap();
        assert!(query_error.is_user_error());

        std::fs::remove_file(query).ok();
    }
}
