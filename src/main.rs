use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use vinestrap_lib::{BinaryType, BootstrapResult, Bootstrapper, Dirs};

/// Command-line arguments for vinestrap.
#[derive(Debug, Parser)]
#[command(
    name = "vinestrap",
    version,
    about = "Keeps deployment builds installed and ready to launch"
)]
struct Cli {
    /// Keep cache, data and config below this directory.
    #[arg(long, value_name = "PATH", global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the current build if needed and print its launch plan as JSON.
    Prepare {
        /// `player` or `studio`.
        binary: BinaryType,
        /// Arguments for the binary; a player launch URI is decoded.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Remove cached packages and versions nothing refers to.
    Clean,
}

#[tokio::main]
async fn main() -> ExitCode {
    vinestrap_lib::init_logging();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> BootstrapResult<()> {
    let dirs = match &cli.root {
        Some(root) => Dirs::under(root),
        None => Dirs::from_user_dirs()?,
    };
    let mut bootstrapper = Bootstrapper::from_dirs(dirs)?;

    match cli.command {
        Command::Prepare { binary, args } => {
            let plan = bootstrapper.prepare(binary, args).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Clean => {
            let (packages, versions) = bootstrapper.collect_garbage().await?;
            info!(
                "Removed {} packages and {} versions ({} failures)",
                packages.removed,
                versions.removed,
                packages.failed + versions.failed
            );
        }
    }

    Ok(())
}
