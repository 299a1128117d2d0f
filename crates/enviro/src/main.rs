mod agent;
mod cli;
mod display;
mod error;

use std::io::Write;
use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigCommand};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let path = enviro_config::locate_config(cli.config.as_deref());

    match cli.command.unwrap_or(Command::Run) {
        Command::Config(ConfigCommand::Path) => {
            writeln!(std::io::stdout(), "{}", path.display())?;
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let config = enviro_config::load_config(&path)?;
            let text = config.redacted().to_toml()?;
            write!(std::io::stdout(), "{text}")?;
            Ok(())
        }
        Command::Run => {
            let config = enviro_config::load_config(&path)?;
            let serial = enviro_config::resolve_serial(&config, &cli.cpuinfo);
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            let agent = enviro_config::resolve(&config, &serial, base_dir)?;
            agent::run(&agent).await
        }
    }
}
