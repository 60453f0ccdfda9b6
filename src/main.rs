//! ANTAQ SQL command line
//! Validate or normalize candidate SQL offline and check configuration files

use anyhow::{Context, Result};
use antaq_sql_agent::config::AgentConfig;
use antaq_sql_agent::formatting::format_sql_query;
use antaq_sql_agent::telemetry::init_tracing;
use antaq_sql_agent::validation::{normalize, SqlValidator};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Read;
use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();

    let config = load_config(matches.get_one::<String>("config"))?;
    init_tracing(&config.logging)?;

    match matches.subcommand() {
        Some(("validate", sub)) => run_validate(sub, &config),
        Some(("normalize", sub)) => run_normalize(sub),
        Some(("check-config", _)) => {
            info!("Configuration is valid");
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

fn cli() -> Command {
    let sql_arg = Arg::new("sql")
        .value_name("SQL")
        .help("SQL text, or '-' to read from stdin")
        .default_value("-");

    Command::new("antaq-sql")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Governed SQL validation for the ANTAQ cargo statistics view")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (defaults plus environment when omitted)")
                .global(true),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a candidate query and print the verdict")
                .arg(sql_arg.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the verdict as JSON")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("max-rows")
                        .long("max-rows")
                        .value_name("N")
                        .help("Row cap appended when LIMIT is missing")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                ),
        )
        .subcommand(
            Command::new("normalize")
                .about("Print the query after port-filter normalization")
                .arg(sql_arg),
        )
        .subcommand(Command::new("check-config").about("Validate configuration and print it"))
}

fn load_config(path: Option<&String>) -> Result<AgentConfig> {
    match path {
        Some(path) => {
            let mut config = AgentConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path))?;
            config.apply_env()?;
            config.validate().context("Configuration validation failed")?;
            Ok(config)
        }
        None => AgentConfig::from_env().context("Configuration validation failed"),
    }
}

fn read_sql(matches: &ArgMatches) -> Result<String> {
    let arg = matches
        .get_one::<String>("sql")
        .map(String::as_str)
        .unwrap_or("-");

    if arg != "-" {
        return Ok(arg.to_string());
    }

    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read SQL from stdin")?;
    Ok(buffer)
}

fn run_validate(matches: &ArgMatches, config: &AgentConfig) -> Result<ExitCode> {
    let sql = read_sql(matches)?;
    let max_rows = matches
        .get_one::<u32>("max-rows")
        .copied()
        .unwrap_or(config.validator.max_rows);

    let verdict = SqlValidator::new(max_rows).validate(&sql);
    debug!(valid = verdict.is_valid(), max_rows, "validated query");

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        println!("{}", if verdict.is_valid() { "VALID" } else { "INVALID" });
        for error in verdict.errors() {
            println!("error: {}", error);
        }
        for warning in verdict.warnings() {
            println!("warning: {}", warning);
        }
        if let Some(query) = verdict.sanitized_query() {
            println!("\n{}", format_sql_query(query));
        }
    }

    Ok(if verdict.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_normalize(matches: &ArgMatches) -> Result<ExitCode> {
    let sql = read_sql(matches)?;
    println!("{}", normalize(&sql));
    Ok(ExitCode::SUCCESS)
}
