//! baudscan
//!
//! Finds the baud rate of an unknown target UART by walking a Hydrabus or
//! Bus Pirate adapter through the candidate rates and looking for text.

mod progress;
mod settings;
mod terminal;

use std::future::Future;

use anyhow::Context;
use bbio_detect::{
    CancelHandle, Cancellation, DetectionOrchestrator, DetectionResult, PortScanner, SerialLink,
};
use clap::{Args, Parser, Subcommand};
use settings::Settings;
use terminal::TerminalInteraction;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Process exit status for each outcome
mod exit_code {
    pub const FOUND: i32 = 0;
    pub const EXHAUSTED: i32 = 1;
    pub const FATAL: i32 = 2;
    pub const CANCELLED: i32 = 130;
}

#[derive(Parser, Debug)]
#[command(
    name = "baudscan",
    version,
    about = "Find the baud rate of a target UART through a Hydrabus or Bus Pirate adapter"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the candidate rates until the target speaks readable text
    Detect(DetectArgs),
    /// List serial ports, marking known adapters
    Ports,
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// Serial port of the adapter (default: saved port, then first adapter found)
    #[arg(short, long)]
    port: Option<String>,

    /// How long to wait for a byte at each rate, in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Send a line ending to targets that stay silent
    #[arg(long)]
    trigger: bool,

    /// Remember the port and options for later runs
    #[arg(long)]
    save: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "baudscan=info,bbio_protocol=info,bbio_detect=info,bbio_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            exit_code::FATAL
        }
    };

    // Exit right away: a pending stdin read would otherwise hold the runtime open
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Ports => {
            list_ports()?;
            Ok(exit_code::FOUND)
        }
        Command::Detect(args) => detect(args).await,
    }
}

fn list_ports() -> anyhow::Result<()> {
    let ports = PortScanner::new()
        .enumerate_ports()
        .context("Failed to list serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match port.adapter {
            Some(adapter) => println!("{:<20} {} (adapter)", port.port, adapter),
            None => println!(
                "{:<20} {}",
                port.port,
                port.product.as_deref().unwrap_or("")
            ),
        }
    }
    Ok(())
}

/// Apply command line overrides to the saved settings
fn merge_settings(mut settings: Settings, args: &DetectArgs) -> Settings {
    if let Some(port) = &args.port {
        settings.port = Some(port.clone());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.read_timeout_ms = timeout_ms;
    }
    if args.trigger {
        settings.trigger = true;
    }
    settings
}

async fn detect(args: DetectArgs) -> anyhow::Result<i32> {
    let mut settings = merge_settings(Settings::load(), &args);

    let port = match settings.port.clone() {
        Some(port) => port,
        None => PortScanner::new()
            .find_adapter()?
            .context("No adapter found, pass --port")?,
    };
    settings.port = Some(port.clone());

    if args.save {
        let path = settings.save()?;
        info!("Settings saved to {}", path.display());
    }

    let link = SerialLink::open(&port)?;

    let (cancel_handle, cancel) = Cancellation::new();
    tokio::spawn(async move {
        if handle_interrupts(tokio::signal::ctrl_c, cancel_handle).await {
            std::process::exit(exit_code::CANCELLED);
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(progress::print_events(rx));

    let mut orchestrator =
        DetectionOrchestrator::with_config(settings.detect_config(), TerminalInteraction::stdin())
            .with_cancellation(cancel)
            .with_events(tx);
    let result = orchestrator.run(link).await;

    // Closing the event channel lets the renderer finish
    drop(orchestrator);
    let _ = renderer.await;

    Ok(report(&result))
}

/// Cancel the run on the first interrupt
///
/// Returns `true` when a second interrupt arrives; the caller should quit
/// without waiting for the adapter reset.
async fn handle_interrupts<F, Fut>(mut interrupt: F, cancel: CancelHandle) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    warn!("Interrupted, stopping detection (press Ctrl+C again to quit at once)");
    cancel.cancel();

    if interrupt().await.is_err() {
        return false;
    }
    warn!("Interrupted again, adapter left as is");
    true
}

/// Print the outcome and pick the exit status
fn report(result: &DetectionResult) -> i32 {
    match result {
        DetectionResult::Found(rate) => {
            println!("Target baud rate: {}", rate);
            exit_code::FOUND
        }
        DetectionResult::Exhausted => {
            println!("No candidate rate produced readable text");
            exit_code::EXHAUSTED
        }
        DetectionResult::Cancelled => {
            println!("Detection cancelled");
            exit_code::CANCELLED
        }
        DetectionResult::Fatal(e) => {
            eprintln!("Adapter error: {}", e);
            exit_code::FATAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbio_protocol::ProtocolError;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_detect() {
        let cli = Cli::try_parse_from([
            "baudscan",
            "detect",
            "--port",
            "/dev/ttyACM0",
            "--timeout-ms",
            "500",
            "--trigger",
        ])
        .unwrap();

        let Command::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(args.timeout_ms, Some(500));
        assert!(args.trigger);
        assert!(!args.save);
    }

    #[test]
    fn test_parse_ports() {
        let cli = Cli::try_parse_from(["baudscan", "ports"]).unwrap();
        assert!(matches!(cli.command, Command::Ports));
    }

    #[test]
    fn test_parse_rejects_bad_timeout() {
        assert!(Cli::try_parse_from(["baudscan", "detect", "--timeout-ms", "soon"]).is_err());
        assert!(Cli::try_parse_from(["baudscan"]).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let saved = Settings {
            port: Some("/dev/ttyUSB0".to_string()),
            read_timeout_ms: 2000,
            trigger: false,
        };
        let args = DetectArgs {
            port: None,
            timeout_ms: Some(300),
            trigger: true,
            save: false,
        };

        let merged = merge_settings(saved, &args);
        assert_eq!(merged.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(merged.read_timeout_ms, 300);
        assert!(merged.trigger);
    }

    /// Interrupt source that fires `count` times, then never again
    fn interrupts(count: usize) -> impl FnMut() -> std::future::Ready<std::io::Result<()>> {
        let mut left = count;
        move || {
            if left == 0 {
                return std::future::ready(Err(std::io::Error::other("no more signals")));
            }
            left -= 1;
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_second_interrupt_quits() {
        let (handle, cancel) = Cancellation::new();
        assert!(handle_interrupts(interrupts(2), handle).await);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let (handle, cancel) = Cancellation::new();
        assert!(!handle_interrupts(interrupts(1), handle).await);
        assert!(cancel.is_cancelled());

        let (handle, cancel) = Cancellation::new();
        assert!(!handle_interrupts(interrupts(0), handle).await);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(&DetectionResult::Found(9600)), 0);
        assert_eq!(report(&DetectionResult::Exhausted), 1);
        assert_eq!(report(&DetectionResult::Cancelled), 130);
        assert_eq!(
            report(&DetectionResult::Fatal(ProtocolError::HandshakeFailed {
                attempts: 20
            })),
            2
        );
    }
}
