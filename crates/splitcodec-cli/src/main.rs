use anyhow::{anyhow, bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use splitcodec_cli::{run_simulator, SimulatorConfig};
use splitcodec_core::{CallMode, ModeRatio, SplitConfig};
use splitcodec_metrics::{JsonSink, MetricsSink, NAMESPACE};
use splitcodec_test_utils::reference_universe;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Command::new("splitcodec")
        .version(splitcodec_core::VERSION)
        .about("Gradual migration between two serialization engines")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a seeded workload through a legacy -> strict codec")
                .arg(
                    Arg::new("operations")
                        .long("ops")
                        .default_value("10000")
                        .value_parser(value_parser!(u64))
                        .help("Number of codec calls to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("TOML codec configuration; overrides the mode options"),
                )
                .arg(
                    Arg::new("mode1")
                        .long("mode1")
                        .default_value("only_old")
                        .value_parser(value_parser!(CallMode))
                        .help("Mode used with probability 1 - ratio"),
                )
                .arg(
                    Arg::new("mode2")
                        .long("mode2")
                        .default_value("both_prefer_old")
                        .value_parser(value_parser!(CallMode))
                        .help("Mode used with probability ratio"),
                )
                .arg(
                    Arg::new("ratio")
                        .long("ratio")
                        .default_value("0.1")
                        .value_parser(value_parser!(f64))
                        .help("Probability of mode2, within [0, 1]"),
                )
                .arg(
                    Arg::new("flag")
                        .long("flag")
                        .action(ArgAction::Append)
                        .help("Caller flag as name=true|false; repeatable"),
                )
                .arg(
                    Arg::new("no-auto-detect")
                        .long("no-auto-detect")
                        .action(ArgAction::SetTrue)
                        .help("Disable flag bisection on divergence"),
                )
                .arg(
                    Arg::new("clone-targets")
                        .long("clone-targets")
                        .action(ArgAction::SetTrue)
                        .help("Install a clone hook so merge decodes run both paths"),
                )
                .arg(
                    Arg::new("samples")
                        .long("samples")
                        .default_value("10")
                        .value_parser(value_parser!(usize))
                        .help("Divergences to include in the report"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the metrics export as JSON instead of the text report"),
                ),
        )
        .subcommand(Command::new("modes").about("List call modes"))
        .subcommand(
            Command::new("check-config")
                .about("Validate a TOML codec configuration")
                .arg(
                    Arg::new("path")
                        .long("path")
                        .required(true)
                        .help("Path to the configuration file"),
                ),
        );

    let matches = cli.get_matches();
    init_tracing(matches.get_flag("log-json"))?;

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = simulator_config(args)?;
            let json = args.get_flag("json");

            if !json {
                println!("Running splitcodec simulator...");
                println!("Operations: {}", config.total_operations);
                println!("Seed: {}", config.seed);
                println!();
            }

            let report = run_simulator(config);

            if json {
                JsonSink::new(std::io::stdout())
                    .publish(NAMESPACE, &report.snapshot)
                    .context("failed to write metrics export")?;
            } else {
                println!("{}", report.generate_text());
            }

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("modes", _)) => {
            for mode in CallMode::ALL {
                println!("{:>2}  {:<24} {}", mode.as_u16(), mode.as_str(), mode.description());
            }
        }
        Some(("check-config", args)) => {
            let path = args
                .get_one::<String>("path")
                .ok_or_else(|| anyhow!("--path is required"))?;
            let config = load_config(path)?;
            let (encode, decode) = config.ratios()?;
            let flags = config.caller_flags(&reference_universe())?;

            println!("Configuration OK: {path}");
            println!("  encode: {encode}");
            println!("  decode: {decode}");
            match config.auto_detect_flags {
                Some(enabled) => println!("  auto_detect_flags: {enabled}"),
                None => println!("  auto_detect_flags: (unchanged)"),
            }
            println!("  flags: {flags}");
        }
        _ => {}
    }
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!(e).context("failed to install tracing subscriber"))
}

fn load_config(path: &str) -> Result<SplitConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    SplitConfig::from_toml_str(&text).with_context(|| format!("invalid config file {path}"))
}

fn simulator_config(args: &ArgMatches) -> Result<SimulatorConfig> {
    let seed = *args
        .get_one::<u64>("seed")
        .ok_or_else(|| anyhow!("--seed is required"))?;
    let total_operations = *args
        .get_one::<u64>("operations")
        .ok_or_else(|| anyhow!("--ops is required"))?;
    let max_samples = args.get_one::<usize>("samples").copied().unwrap_or(10);

    let mut config = SimulatorConfig {
        seed,
        total_operations,
        auto_detect_flags: !args.get_flag("no-auto-detect"),
        clone_targets: args.get_flag("clone-targets"),
        max_samples,
        ..SimulatorConfig::default()
    };

    if let Some(path) = args.get_one::<String>("config") {
        let file = load_config(path)?;
        let (encode, decode) = file.ratios()?;
        config.encode_ratio = encode;
        config.decode_ratio = decode;
        if let Some(enabled) = file.auto_detect_flags {
            config.auto_detect_flags = enabled;
        }
        config.caller_flags = file.caller_flags(&reference_universe())?;
    } else {
        let mode1 = args.get_one::<CallMode>("mode1").copied().unwrap_or(CallMode::OnlyOld);
        let mode2 = args.get_one::<CallMode>("mode2").copied().unwrap_or(mode1);
        let ratio = args.get_one::<f64>("ratio").copied().unwrap_or(0.0);
        let mode_ratio = ModeRatio::new(mode1, mode2, ratio)?;
        config.encode_ratio = mode_ratio;
        config.decode_ratio = mode_ratio;
    }

    if let Some(values) = args.get_many::<String>("flag") {
        let mut flags = config.caller_flags.clone();
        for value in values {
            let (name, enabled) = parse_flag(value)?;
            flags.set(name, enabled);
        }
        reference_universe().check(&flags)?;
        config.caller_flags = flags;
    }

    Ok(config)
}

fn parse_flag(value: &str) -> Result<(&str, bool)> {
    let Some((name, enabled)) = value.split_once('=') else {
        return Ok((value, true));
    };
    match enabled {
        "true" | "1" | "on" => Ok((name, true)),
        "false" | "0" | "off" => Ok((name, false)),
        other => bail!("invalid value {other:?} for flag {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("escape_html").unwrap(), ("escape_html", true));
        assert_eq!(parse_flag("escape_html=off").unwrap(), ("escape_html", false));
        assert!(parse_flag("escape_html=maybe").is_err());
    }
}
