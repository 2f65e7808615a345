//! `upsmon` - print the capabilities and status of a USB-attached UPS.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ups_monitor::{write_report, DeviceSelector, MonitorResult, UpsSession, UsbTransport};

/// Query a USB-attached UPS
#[derive(Parser)]
#[command(name = "upsmon")]
#[command(version)]
#[command(about = "Print capabilities and status of a USB-attached UPS", long_about = None)]
struct Cli {
    /// Device as BUS:ADDRESS (see lsusb)
    device: DeviceSelector,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("upsmon: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> MonitorResult<()> {
    let transport = UsbTransport::open(&cli.device)?;
    let mut session = UpsSession::new(transport);

    if session.config().query_capabilities {
        session.capabilities()?;
    }
    let snapshot = session.snapshot()?;
    debug!(commands = %snapshot.commands, meters = %snapshot.meters, "poll complete");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_report(&mut out, session.descriptor(), &snapshot)?;
    out.flush()?;
    Ok(())
}
