use clap::{ArgAction, Parser, Subcommand};
use spcom_harness::config::{Config, ConfigLoader};
use spcom_harness::{
    logging, run_checks, BridgeOptions, CommandRunner, EchoBridge, HarnessResult, PortConfiguration,
    ToolProcess,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "spcom-harness",
    version,
    about = "Test harness for the spcom serial terminal.",
    long_about = "Emulates a serial device on one end of a virtual port pair, drives spcom against the other end, and checks spcom's exit-code conventions."
)]
struct Cli {
    /// Configuration file. Defaults to the standard search locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the device emulator until Ctrl+C or end of stdin.
    Echo {
        /// Device-side port (defaults to echo.port)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate (defaults to serial.baud)
        #[arg(short, long)]
        baud: Option<u32>,

        /// Write "spam N" after every read attempt, this many ms apart
        #[arg(long)]
        spam_interval_ms: Option<u64>,

        /// Echo whole lines instead of raw chunks
        #[arg(long)]
        line_buffered: bool,
    },

    /// Run the expectation table against the tool.
    Check {
        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Spawn the tool against the client port and send it lines.
    Drive {
        /// Client-side port (defaults to client.port)
        #[arg(short, long)]
        port: Option<String>,

        /// Line to send; repeat for several
        #[arg(short, long = "send", value_name = "TEXT")]
        send: Vec<String>,

        /// How long to wait for output after each line
        #[arg(long, default_value_t = 500)]
        wait_ms: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from(path),
        None => ConfigLoader::load(),
    };
    let mut config = match loaded {
        Ok(loader) => loader.into_config(),
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    logging::init(&config.logging);

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> HarnessResult<ExitCode> {
    match command {
        Command::Echo {
            port,
            baud,
            spam_interval_ms,
            line_buffered,
        } => {
            let port = port.unwrap_or_else(|| config.echo.port.clone());
            let baud = baud.unwrap_or(config.serial.baud);

            let mut options: BridgeOptions = config.echo.bridge_options();
            if line_buffered {
                options = options.line_buffered();
            }
            if let Some(ms) = spam_interval_ms {
                options = options.with_spam(Duration::from_millis(ms));
            }

            let port_config = options.port_configuration(baud, config.serial.timeout());
            echo(&port, &port_config, options)
        }
        Command::Check { json } => check(config, json),
        Command::Drive {
            port,
            send,
            wait_ms,
        } => {
            let port = port.unwrap_or_else(|| config.client.port.clone());
            drive(config, &port, &send, Duration::from_millis(wait_ms))
        }
    }
}

fn echo(
    port: &str,
    port_config: &PortConfiguration,
    options: BridgeOptions,
) -> HarnessResult<ExitCode> {
    let bridge = EchoBridge::connect_with(port, port_config, options)?;
    info!("echoing on {}, close stdin to stop", port);

    // Block until stdin closes. Ctrl+C ends the process directly.
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if line.is_err() || !bridge.is_connected() {
            break;
        }
    }

    let exit = bridge.shutdown(port_config.timeout * 2)?;
    info!(?exit, "echo bridge stopped");
    Ok(ExitCode::SUCCESS)
}

fn check(config: &Config, json: bool) -> HarnessResult<ExitCode> {
    let runner = CommandRunner::new(&config.tool.path);
    let report = run_checks(&runner, &config.expectation_table());

    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &report).map_err(std::io::Error::from)?;
        writeln!(stdout)?;
    } else {
        for outcome in &report.outcomes {
            match &outcome.failure {
                None => writeln!(stdout, "ok    {}", outcome.name)?,
                Some(message) => writeln!(stdout, "FAIL  {}: {}", outcome.name, message)?,
            }
        }
        writeln!(
            stdout,
            "{}/{} checks passed",
            report.passed(),
            report.outcomes.len()
        )?;
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn drive(config: &Config, port: &str, lines: &[String], wait: Duration) -> HarnessResult<ExitCode> {
    let command = config.tool.command().port(port).baud(config.serial.baud);
    let mut process = ToolProcess::spawn(&command)?;

    let mut stdout = std::io::stdout().lock();
    for line in lines {
        process.write(line)?;
        std::thread::sleep(wait);
        stdout.write_all(&process.drain_all())?;
        stdout.flush()?;
    }

    let exit = process.terminate()?;
    info!(?exit, state = ?process.state(), "tool stopped");
    Ok(ExitCode::SUCCESS)
}
