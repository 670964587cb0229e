//! Stand-in for the spcom binary.
//!
//! Follows spcom's observed exit-code conventions: unknown flags are ignored
//! and exit 0, `--help` prints usage and exits 1. In interactive mode every
//! stdin line is echoed to stdout and appended to the logfile.

use clap::Parser;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "spcom-stub",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Args {
    #[arg(long)]
    logfile: Option<PathBuf>,

    #[arg(long)]
    port: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    #[arg(long)]
    help: bool,

    #[arg(long)]
    version: bool,

    #[arg(long)]
    list: bool,

    /// Anything else, accepted and ignored.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    rest: Vec<String>,
}

const USAGE: &str = "usage: spcom [--port DEV] [--baud RATE] [--logfile FILE] [--list]";

fn main() -> ExitCode {
    let Ok(args) = Args::try_parse() else {
        // Unparseable arguments are tolerated, like unknown flags.
        return ExitCode::SUCCESS;
    };

    if args.help {
        eprintln!("{}", USAGE);
        return ExitCode::from(1);
    }
    if args.version {
        println!("spcom-stub {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    if args.list {
        println!("/dev/tnt0\n/dev/tnt1");
        return ExitCode::SUCCESS;
    }
    if args.port.is_none() {
        // One-shot invocation with nothing to do; unknown flags land here.
        return ExitCode::SUCCESS;
    }

    match interact(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("spcom-stub: {}", e);
            ExitCode::from(2)
        }
    }
}

fn interact(args: &Args) -> std::io::Result<()> {
    let mut log = match &args.logfile {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };

    let mut stdout = std::io::stdout().lock();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line == "quit" {
            break;
        }
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        if let Some(log) = log.as_mut() {
            writeln!(log, "> {}", line)?;
        }
    }
    Ok(())
}
