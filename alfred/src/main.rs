use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use alfred::{Engine, EngineError, build_index, shutdown_flag};
use alfred_config::AlfredConfig;
use dolphin_integrations::{Log, logger};

#[derive(Parser)]
#[command(name = "alfred")]
#[command(about = "Ingests Dolphin telemetry and drives offline replay playback")]
struct Args {
    #[arg(short, long, help = "Path to a TOML config file (defaults are used otherwise)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Scan the replay directory, write the accepted replays to this file, and exit")]
    build_index: Option<PathBuf>,
}

fn main() -> ExitCode {
    logger::init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,

        Err(error) if error.is_config_invalid() => {
            tracing::error!(target: Log::Engine, %error, "Invalid configuration, refusing to start");
            ExitCode::from(2)
        },

        Err(error) => {
            tracing::error!(target: Log::Engine, %error, "Fatal error");
            ExitCode::FAILURE
        },
    }
}

fn run(args: Args) -> Result<(), EngineError> {
    let config = AlfredConfig::load(args.config.as_deref())?;

    if let Some(index) = args.build_index {
        build_index(&config, &index)?;
        return Ok(());
    }

    let mut engine = Engine::new(&config)?;
    let should_run = shutdown_flag();

    engine.start()?;
    engine.run(should_run);

    Ok(())
}
