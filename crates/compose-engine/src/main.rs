//! `compose`: build, validate and inspect specifications from the command line

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use compose_engine::{BuildContext, CompositionFactory, FactoryConfig};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let root = Arg::new("root")
        .long("root")
        .global(true)
        .value_parser(value_parser!(PathBuf))
        .help("Specification root directory (overrides the config file)");
    let config = Arg::new("config")
        .long("config")
        .global(true)
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("compose")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build execution unit trees from declarative specifications")
        .subcommand_required(true)
        .arg(root)
        .arg(config)
        .subcommand(
            Command::new("build")
                .about("Build a unit and print its tree")
                .arg(Arg::new("name").required(true).help("Specification name or path"))
                .arg(
                    Arg::new("env")
                        .long("env")
                        .default_value("development")
                        .help("Deployment environment"),
                )
                .arg(
                    Arg::new("var")
                        .long("var")
                        .action(ArgAction::Append)
                        .help("Context variable as KEY=VALUE (VALUE parsed as JSON when possible)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Load and validate a specification")
                .arg(Arg::new("name").required(true).help("Specification name or path")),
        )
        .subcommand(Command::new("types").about("List supported unit types"))
}

fn load_config(matches: &ArgMatches) -> Result<FactoryConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => FactoryConfig::load(path)?,
        None => FactoryConfig::default(),
    };
    if let Some(root) = matches.get_one::<PathBuf>("root") {
        config.store.root.clone_from(root);
    }
    Ok(config)
}

fn parse_var(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("invalid --var '{raw}', expected KEY=VALUE");
    };
    if key.is_empty() {
        bail!("invalid --var '{raw}', empty key");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn build(factory: &CompositionFactory, matches: &ArgMatches) -> Result<()> {
    let name = matches
        .get_one::<String>("name")
        .context("missing specification name")?;
    let mut ctx = BuildContext::new();
    if let Some(env) = matches.get_one::<String>("env") {
        ctx = ctx.with_environment(env);
    }
    for raw in matches.get_many::<String>("var").into_iter().flatten() {
        let (key, value) = parse_var(raw)?;
        ctx = ctx.with_variable(key, value);
    }

    let unit = factory
        .build(name, &ctx)
        .with_context(|| format!("failed to build '{name}'"))?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&unit)?);
    } else {
        print!("{unit}");
    }
    Ok(())
}

fn validate(factory: &CompositionFactory, matches: &ArgMatches) -> Result<()> {
    let name = matches
        .get_one::<String>("name")
        .context("missing specification name")?;
    let report = factory
        .validate(name)
        .with_context(|| format!("'{name}' is invalid"))?;

    let spec = &report.specification;
    println!("{} ({}, {}): valid", spec.name(), spec.kind(), spec.unit_type().unwrap_or("-"));
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    let factory = CompositionFactory::new(config)?;

    match matches.subcommand() {
        Some(("build", sub)) => build(&factory, sub),
        Some(("validate", sub)) => validate(&factory, sub),
        Some(("types", _)) => {
            for tag in factory.list_supported_types() {
                println!("{tag}");
            }
            Ok(())
        }
        _ => bail!("no subcommand given"),
    }
}
