use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use duplex_compare::{compare_values, Discrepancy, Schema, Value};
use duplex_core::{DuplexConfig, DEFAULT_ROLLUP_SECS};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("duplex")
        .version(duplex_core::VERSION)
        .about("Compare release-health results from two backends")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("diff")
                .about("Compare two JSON result documents")
                .arg(
                    Arg::new("primary")
                        .long("primary")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Result served by the primary backend"),
                )
                .arg(
                    Arg::new("secondary")
                        .long("secondary")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Result served by the secondary backend"),
                )
                .arg(
                    Arg::new("schema")
                        .long("schema")
                        .value_parser(value_parser!(PathBuf))
                        .help("Comparison schema in JSON notation (inferred when absent)"),
                )
                .arg(
                    Arg::new("rollup")
                        .long("rollup")
                        .default_value("3600")
                        .value_parser(value_parser!(i64))
                        .help("Allowed datetime drift in seconds"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Validate and print a proxy configuration")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn diff_files(
    primary: &Path,
    secondary: &Path,
    schema: Option<&Path>,
    rollup_secs: i64,
) -> Result<Vec<Discrepancy>> {
    let schema = match schema {
        Some(path) => Schema::from_json(&read_json(path)?)
            .with_context(|| format!("invalid schema in {}", path.display()))?,
        None => Schema::Infer,
    };
    let primary = Value::from(read_json(primary)?);
    let secondary = Value::from(read_json(secondary)?);
    tracing::debug!(?schema, rollup_secs, "comparing documents");
    Ok(compare_values(&primary, &secondary, &schema, rollup_secs))
}

fn render_text(discrepancies: &[Discrepancy]) -> String {
    if discrepancies.is_empty() {
        return "no discrepancies".to_string();
    }
    let mut out = String::new();
    for discrepancy in discrepancies {
        let path = if discrepancy.path.is_empty() {
            "<root>"
        } else {
            discrepancy.path.as_str()
        };
        out.push_str(&format!("{path}: {discrepancy}\n"));
    }
    out.push_str(&format!("{} discrepancies", discrepancies.len()));
    out
}

fn run_diff(args: &ArgMatches) -> Result<ExitCode> {
    let primary = args
        .get_one::<PathBuf>("primary")
        .context("--primary is required")?;
    let secondary = args
        .get_one::<PathBuf>("secondary")
        .context("--secondary is required")?;
    let schema = args.get_one::<PathBuf>("schema").map(PathBuf::as_path);
    let rollup_secs = args
        .get_one::<i64>("rollup")
        .copied()
        .unwrap_or(DEFAULT_ROLLUP_SECS);

    let discrepancies = diff_files(primary, secondary, schema, rollup_secs)?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&discrepancies)?);
    } else {
        println!("{}", render_text(&discrepancies));
    }

    tracing::info!(discrepancies = discrepancies.len(), "comparison finished");
    Ok(if discrepancies.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_config(args: &ArgMatches) -> Result<ExitCode> {
    let path = args
        .get_one::<PathBuf>("file")
        .context("configuration file is required")?;
    let config = DuplexConfig::from_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("diff", args)) => run_diff(args),
        Some(("config", args)) => run_config(args),
        _ => Ok(ExitCode::SUCCESS),
    }
}
