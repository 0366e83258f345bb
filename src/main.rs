//! oscsend - send typed OSC messages and fades from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use oscsend::{
    plan_float_ramp, plan_integer_ramp, tokenize, BoolOptions, CommandRequest, FloatOptions,
    IntOptions, LogSink, MultipleOptions, OscClient, OscConfig, PathOptions, RampPlan, Sink,
    StaticVariables, StringOptions, TokioTimer, UdpSink,
};
use oscsend::value::parse_float;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "oscsend")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Send typed OSC messages and fades", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "OSCSEND_CONFIG")]
    config: Option<PathBuf>,

    /// Target host (overrides the configuration file)
    #[arg(long)]
    host: Option<String>,

    /// Target port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Variable for $(name) substitution, as name=value (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,

    /// Log messages instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message without arguments
    Blank {
        /// OSC path
        path: String,
    },

    /// Send an integer, or fade between two integers
    #[command(allow_negative_numbers = true)]
    Int {
        /// OSC path
        path: String,

        /// Value to send when not fading
        #[arg(default_value = "1")]
        value: String,

        /// Fade start value (enables fading)
        #[arg(long, requires = "fade_to")]
        fade_from: Option<String>,

        /// Fade end value
        #[arg(long, requires = "fade_from")]
        fade_to: Option<String>,

        /// Fade time in milliseconds [default: from configuration]
        #[arg(long)]
        fade_ms: Option<String>,
    },

    /// Send a float, or fade between two floats
    #[command(allow_negative_numbers = true)]
    Float {
        /// OSC path
        path: String,

        /// Value to send when not fading
        #[arg(default_value = "1")]
        value: String,

        /// Fade start value (enables fading)
        #[arg(long, requires = "fade_to")]
        fade_from: Option<String>,

        /// Fade end value
        #[arg(long, requires = "fade_from")]
        fade_to: Option<String>,

        /// Fade time in milliseconds [default: from configuration]
        #[arg(long)]
        fade_ms: Option<String>,

        /// Decimal digits per fade step, 0-4 [default: from configuration]
        #[arg(short, long)]
        granularity: Option<String>,
    },

    /// Send a string
    String {
        /// OSC path
        path: String,

        /// Text to send
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Send several arguments parsed from one string
    Multi {
        /// OSC path
        path: String,

        /// Arguments, e.g. '1 "test" 2.5'
        #[arg(allow_hyphen_values = true)]
        arguments: String,
    },

    /// Send a boolean (type-only T/F argument)
    Bool {
        /// OSC path
        path: String,

        /// true or false
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },

    /// Show how an argument string is parsed, as JSON
    Tokenize {
        /// Arguments, e.g. '1 "test" 2.5'
        #[arg(allow_hyphen_values = true)]
        arguments: String,
    },

    /// Show the messages a fade would send
    #[command(allow_negative_numbers = true)]
    Plan {
        /// Start value
        #[arg(long, value_parser = finite_number)]
        from: f64,

        /// End value
        #[arg(long, value_parser = finite_number)]
        to: f64,

        /// Fade time in milliseconds
        #[arg(long, default_value_t = 1000)]
        fade_ms: i64,

        /// Plan a float fade with this many decimal digits (integer fade if absent)
        #[arg(short, long)]
        granularity: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    match &cli.command {
        Commands::Tokenize { arguments } => return show_tokens(arguments),
        Commands::Plan {
            from,
            to,
            fade_ms,
            granularity,
        } => {
            show_plan(*from, *to, *fade_ms, *granularity);
            return Ok(());
        }
        _ => {}
    }

    run_send(cli).await
}

fn finite_number(text: &str) -> Result<f64, String> {
    parse_float(text).ok_or_else(|| format!("`{}` is not a finite number", text))
}

fn load_config(cli: &Cli) -> Result<OscConfig> {
    let mut config = if let Some(path) = &cli.config {
        OscConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        OscConfig::default()
    };

    if let Some(host) = &cli.host {
        config.target.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.target.port = port;
    }

    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn build_request(command: Commands, config: &OscConfig) -> Result<CommandRequest> {
    let default_fade = config.fade.default_duration.as_millis().to_string();

    let request = match command {
        Commands::Blank { path } => CommandRequest::SendBlank(PathOptions { path }),
        Commands::Int {
            path,
            value,
            fade_from,
            fade_to,
            fade_ms,
        } => CommandRequest::SendInt(IntOptions {
            path,
            enable_fade: fade_from.is_some(),
            int: value,
            start: fade_from.unwrap_or_default(),
            end: fade_to.unwrap_or_default(),
            fade: fade_ms.unwrap_or(default_fade),
        }),
        Commands::Float {
            path,
            value,
            fade_from,
            fade_to,
            fade_ms,
            granularity,
        } => CommandRequest::SendFloat(FloatOptions {
            path,
            enable_fade: fade_from.is_some(),
            float: value,
            start: fade_from.unwrap_or_default(),
            end: fade_to.unwrap_or_default(),
            fade: fade_ms.unwrap_or(default_fade),
            granularity: granularity
                .unwrap_or_else(|| config.fade.default_granularity.to_string()),
        }),
        Commands::String { path, value } => CommandRequest::SendString(StringOptions {
            path,
            string: value,
        }),
        Commands::Multi { path, arguments } => {
            CommandRequest::SendMultiple(MultipleOptions { path, arguments })
        }
        Commands::Bool { path, value } => CommandRequest::SendBoolean(BoolOptions { path, value }),
        Commands::Tokenize { .. } | Commands::Plan { .. } => {
            anyhow::bail!("Not a send command")
        }
    };

    Ok(request)
}

async fn run_send(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let vars = cli
        .vars
        .iter()
        .map(|assignment| StaticVariables::parse_assignment(assignment))
        .collect::<Result<StaticVariables, _>>()?;

    let udp = if cli.dry_run {
        None
    } else {
        let sink = UdpSink::connect(config.bind, &config.target.host, config.target.port)
            .await
            .with_context(|| {
                format!(
                    "Failed to open socket to {}:{}",
                    config.target.host, config.target.port
                )
            })?;
        Some(Arc::new(sink))
    };
    let sink: Arc<dyn Sink> = match &udp {
        Some(udp) => udp.clone(),
        None => Arc::new(LogSink),
    };

    let timer = TokioTimer::new()?;
    let client = OscClient::new(config.clone(), sink, Arc::new(timer.clone()))
        .with_resolver(Arc::new(vars));

    let request = build_request(cli.command, &config)?;
    let horizon = client.execute(&request).context("Invalid command")?;

    if !horizon.is_zero() {
        info!("Fading for {}", humantime::format_duration(horizon));
    }

    // Scheduled messages die with the process, so wait them out
    timer.idle().await;
    if let Some(udp) = &udp {
        udp.flush().await;
    }
    tokio::time::sleep(config.fade.settle).await;

    Ok(())
}

fn show_tokens(arguments: &str) -> Result<()> {
    let args = tokenize(arguments);
    println!("{}", serde_json::to_string_pretty(&args)?);
    Ok(())
}

fn show_plan(from: f64, to: f64, fade_ms: i64, granularity: Option<u32>) {
    let plan: RampPlan = match granularity {
        Some(digits) => plan_float_ramp(from, to, fade_ms, digits),
        None => plan_integer_ramp(from.trunc() as i64, to.trunc() as i64, fade_ms),
    };

    println!("Fade Plan");
    println!("=========");
    println!("Steps: {}", plan.step_count());
    println!("Step size: {}", plan.step_size());
    println!("Step delay: {:.3}ms", plan.step_delay_ms());
    println!();

    for emission in plan.emissions() {
        let value = emission
            .payload
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:>12}  {}",
            humantime::format_duration(emission.delay).to_string(),
            value
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_rejects_non_finite_bounds() {
        for bound in ["inf", "-inf", "NaN"] {
            assert!(Cli::try_parse_from(["oscsend", "plan", "--from", bound, "--to", "1"]).is_err());
            assert!(Cli::try_parse_from(["oscsend", "plan", "--from", "0", "--to", bound]).is_err());
        }
    }

    #[test]
    fn test_plan_accepts_negative_bounds() {
        let cli = Cli::try_parse_from(["oscsend", "plan", "--from", "-1.5", "--to", "2"]).unwrap();
        match cli.command {
            Commands::Plan { from, to, .. } => {
                assert_eq!(from, -1.5);
                assert_eq!(to, 2.0);
            }
            _ => panic!("expected plan"),
        }
    }
}
