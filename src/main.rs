use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, bail};
use clap::{ArgGroup, Parser};

use udperf::{
    DEFAULT_INTERFACE, DEFAULT_LOG_PATH, DEFAULT_PORT, Pacer, PacerConfig, Shutdown, Tracker,
    TrackerConfig,
    net_utils::{receiver_socket, resolve_ipv4, sender_socket},
    telemetry::default_provider,
};

/// Create loss and delay traces for a UDP path.
///
/// The sender sends for a certain period with a constant rate.
#[derive(Debug, Parser)]
#[command(name = "udperf", version)]
#[command(group(ArgGroup::new("mode").required(true).args(["server", "client"])))]
struct Cli {
    /// Receiver mode, runs until interrupted
    #[arg(short = 's')]
    server: bool,

    /// Sender mode
    #[arg(short = 'c', num_args = 3, value_names = ["HOST", "KBYTE_PER_S", "SECONDS"])]
    client: Option<Vec<String>>,

    /// UDP port to send to or listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds between statistic reports
    #[arg(long, default_value_t = 0.5)]
    interval: f64,

    /// Receiver trace file, recreated for every session
    #[arg(long, default_value = DEFAULT_LOG_PATH)]
    log: PathBuf,

    /// Interface whose link quality is logged
    #[arg(long, default_value = DEFAULT_INTERFACE)]
    iface: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("udperf: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let interval = seconds(cli.interval, "interval")?;

    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    ctrlc::set_handler(move || {
        if handle.trigger() {
            println!("Quitting.");
        }
    })
    .context("Could not install the interrupt handler")?;

    match cli.client {
        Some(args) => {
            let [host, rate, duration] = args.as_slice() else {
                bail!("-c takes <host> <kByte/s> <seconds>");
            };
            let rate: f64 = rate
                .parse()
                .with_context(|| format!("invalid rate {rate:?}"))?;
            let duration = seconds(
                duration
                    .parse()
                    .with_context(|| format!("invalid duration {duration:?}"))?,
                "duration",
            )?;

            let config = PacerConfig::from_kbytes(rate, duration).with_notify_interval(interval);
            let mut pacer = Pacer::new(config, shutdown)?;
            let dest = resolve_ipv4(host, cli.port)?;
            let sock = sender_socket()?;

            println!("Started udperf in sender mode...");
            pacer.run(&sock, dest)?;
        }
        None => {
            let config = TrackerConfig {
                port: cli.port,
                notify_interval: interval,
                log_path: cli.log,
                interface: cli.iface,
            };
            let mut tracker = Tracker::new(config, default_provider(), shutdown)?;
            let sock = receiver_socket(cli.port)?;

            println!("Started udperf in receiver mode...");
            tracker.run(&sock)?;
        }
    }
    Ok(())
}

fn seconds(value: f64, name: &str) -> anyhow::Result<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => bail!("{name} must be a positive number of seconds, got {value}"),
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
    fn test_receiver_mode() {
        let cli = Cli::try_parse_from(["udperf", "-s"]).unwrap();
        assert!(cli.server);
        assert!(cli.client.is_none());
        assert_eq!(cli.port, DEFAULT_PORT);
    }

    #[test]
    fn test_sender_mode() {
        let cli = Cli::try_parse_from(["udperf", "-c", "10.0.0.2", "100", "2.5"]).unwrap();
        assert_eq!(
            cli.client.unwrap(),
            vec!["10.0.0.2".to_string(), "100".to_string(), "2.5".to_string()]
        );
    }

    #[test]
    fn test_usage_errors() {
        assert!(Cli::try_parse_from(["udperf"]).is_err());
        assert!(Cli::try_parse_from(["udperf", "-c", "10.0.0.2", "100"]).is_err());
        assert!(Cli::try_parse_from(["udperf", "-s", "-c", "h", "1", "1"]).is_err());
        assert!(Cli::try_parse_from(["udperf", "-x"]).is_err());
    }

    #[test]
    fn test_seconds_must_be_positive() {
        assert_eq!(seconds(0.5, "interval").unwrap(), Duration::from_millis(500));
        assert!(seconds(0.0, "interval").is_err());
        assert!(seconds(-1.0, "duration").is_err());
        assert!(seconds(f64::NAN, "duration").is_err());
    }

    #[test]
    fn test_bad_interval_is_reported() {
        let cli = Cli::try_parse_from(["udperf", "-s", "--interval", "0"]).unwrap();
        let err = run(cli).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "interval must be a positive number of seconds, got 0"
        );
    }
}
