use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use yansi::Paint;

use crate::config::Config;
use crate::observability;
use crate::run::{self, Outcome};

/// Puts a cluster's control service under load and checks that it keeps up.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Version(VersionCommand),
}

/// run the configured scenario against the cluster
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// print the ctlbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    if let Command::Version(_) = args.command {
        println!("ctlbench {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("ctlbench-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let outcome = runtime.block_on(run::run(&config))?;
    report(&outcome)
}

fn report(outcome: &Outcome) -> Result<()> {
    match outcome {
        Outcome::Completed(duration) => {
            println!(
                "{} scenario maintained for {:?}",
                "PASSED".bold().green(),
                duration.bold()
            );
            Ok(())
        }
        Outcome::Interrupted => {
            println!("{} scenario interrupted", "ABORTED".bold().yellow());
            Ok(())
        }
        Outcome::RateTooLow(error) => {
            println!(
                "{} measured {:.2} requests/s, expected {}",
                "FAILED".bold().red(),
                error.actual.bold(),
                error.target.bold()
            );
            Err(error.clone()).context("scenario could not be maintained")
        }
    }
}
