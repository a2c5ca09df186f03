//! Command-line surface: argument parsing, subcommand abbreviation and
//! dispatch of one subcommand onto a [`PowerSupply`].

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::instrument::PowerSupply;

/// Canonical subcommand names, in the order they are listed in `--help`.
pub const COMMANDS: &[&str] = &["id", "measure", "voltage", "current", "output", "ovp", "ocp"];

/// Global options that consume the following argument as their value.
const VALUE_OPTIONS: &[&str] = &["--ipaddr", "--timeout"];

#[derive(Debug, Parser)]
#[command(
    name = "kikusui",
    version,
    about = "Query and program a bench power supply over SCPI (TCP port 5025)"
)]
pub struct Cli {
    /// IP address to connect to. Read from config.yml when omitted.
    #[arg(long, value_name = "IP")]
    pub ipaddr: Option<String>,

    /// Connect and reply timeout.
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = parse_seconds,
        default_value = "5"
    )]
    pub timeout: Duration,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn io_timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print the instrument identification string.
    Id,
    /// Print output state, readings, setpoints and protection limits.
    Measure,
    /// Read or set the output voltage.
    Voltage {
        #[arg(short, long, value_name = "VALUE", value_parser = parse_finite, allow_negative_numbers = true)]
        set: Option<f64>,
    },
    /// Read the programmed current.
    Current,
    /// Read or switch the output (0 = off, 1 = on).
    Output {
        #[arg(short, long, value_name = "0|1", value_parser = clap::value_parser!(u8).range(0..=1))]
        set: Option<u8>,
    },
    /// Read or set the over-voltage protection threshold.
    Ovp {
        #[arg(short, long, value_name = "VALUE", value_parser = parse_finite, allow_negative_numbers = true)]
        set: Option<f64>,
    },
    /// Read or set the over-current protection threshold.
    Ocp {
        #[arg(short, long, value_name = "VALUE", value_parser = parse_finite, allow_negative_numbers = true)]
        set: Option<f64>,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("ambiguous command {input:?}, could be: {}", .candidates.join(", "))]
    Ambiguous {
        input: String,
        candidates: Vec<&'static str>,
    },
}

/// Map a possibly abbreviated subcommand onto its canonical name.
pub fn resolve_command(input: &str) -> Result<&'static str, ResolveError> {
    if let Some(exact) = COMMANDS.iter().copied().find(|name| *name == input) {
        return Ok(exact);
    }
    let mut candidates: Vec<&'static str> = COMMANDS
        .iter()
        .copied()
        .filter(|name| name.starts_with(input))
        .collect();
    match candidates.len() {
        0 => Err(ResolveError::Unknown(input.to_string())),
        1 => Ok(candidates[0]),
        _ => {
            candidates.sort_unstable();
            Err(ResolveError::Ambiguous {
                input: input.to_string(),
                candidates,
            })
        }
    }
}

/// Expand an abbreviated subcommand in `args` (program name first) so clap
/// only ever sees canonical names.
pub fn normalize_args<I>(args: I) -> Result<Vec<String>, ResolveError>
where
    I: IntoIterator<Item = String>,
{
    let mut args: Vec<String> = args.into_iter().collect();
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_OPTIONS.contains(&arg) {
            i += 2;
            continue;
        }
        if arg == "--" || matches!(arg, "-h" | "--help" | "-V" | "--version" | "help") {
            break;
        }
        if arg.starts_with('-') {
            i += 1;
            continue;
        }
        let canonical = resolve_command(arg)?;
        args[i] = canonical.to_string();
        break;
    }
    Ok(args)
}

/// Run `command` against the instrument and write its result lines to `out`.
///
/// Output is only written once the operation has fully succeeded.
pub async fn dispatch<S, W>(command: &Command, psu: &mut PowerSupply<S>, out: &mut W) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: Write,
{
    let report = match *command {
        Command::Id => Some(psu.identity().await?),
        Command::Measure => Some(psu.measure().await?.to_string()),
        Command::Voltage { set: Some(volts) } => {
            psu.set_voltage(volts).await?;
            None
        }
        Command::Voltage { set: None } => Some(psu.get_voltage().await?.to_string()),
        Command::Current => Some(psu.get_current().await?.to_string()),
        Command::Output { set: Some(state) } => {
            psu.set_output(state == 1).await?;
            None
        }
        Command::Output { set: None } => Some(u8::from(psu.get_output().await?).to_string()),
        Command::Ovp { set: Some(volts) } => {
            psu.set_ovp(volts).await?;
            None
        }
        Command::Ovp { set: None } => Some(psu.get_ovp().await?.to_string()),
        Command::Ocp { set: Some(amps) } => {
            psu.set_ocp(amps).await?;
            None
        }
        Command::Ocp { set: None } => Some(psu.get_ocp().await?.to_string()),
    };

    if let Some(report) = report {
        writeln!(out, "{report}").context("failed to write result")?;
    }
    Ok(())
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs = parse_finite(s)?;
    if secs <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {s}"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("timeout {s} is out of range: {e}"))
}

fn parse_finite(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{s:?} is not a finite number"))
    }
}
