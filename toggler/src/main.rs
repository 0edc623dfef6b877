use std::{
    error::Error,
    fs::File,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use build_on_water::{session::DEFAULT_PROCESS_NAME, Hotkey, SessionConfig};
use clap::Parser;
use simplelog::{LevelFilter, SharedLogger};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct CliArgs {
    #[arg(
        long,
        env = "BOW_PROCESS",
        default_value = DEFAULT_PROCESS_NAME,
        help = "Executable name of the game process to attach to."
    )]
    process: String,

    #[arg(
        long,
        env = "BOW_HOTKEY",
        default_value = "F9",
        help = "Global hotkey toggling the patch, e.g. F9 or Ctrl+Shift+B."
    )]
    hotkey: Hotkey,

    #[arg(
        long,
        env = "BOW_POLL_MS",
        default_value_t = 1000,
        value_name = "MILLISECONDS",
        help = "How often to look for the game process."
    )]
    poll_ms: u64,

    #[arg(long, env = "BOW_LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,

    /// Also write a trace-level log to this file
    #[arg(long, env = "BOW_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn init_logging(args: &CliArgs) -> Result<(), Box<dyn Error>> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![simplelog::TermLogger::new(
        args.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stdout,
        simplelog::ColorChoice::Auto,
    )];

    if let Some(path) = &args.log_file {
        loggers.push(simplelog::WriteLogger::new(
            LevelFilter::Trace,
            simplelog::Config::default(),
            File::options()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?,
        ));
    }

    simplelog::CombinedLogger::init(loggers)?;
    Ok(())
}

#[cfg(windows)]
fn run(config: SessionConfig, shutdown: &AtomicBool) -> Result<(), Box<dyn Error>> {
    use build_on_water::{
        win::{RegisteredHotkey, WinProcessLocator},
        Session,
    };

    let mut hotkey = RegisteredHotkey::new(config.hotkey, 1);
    let mut session = Session::new(WinProcessLocator, config);

    match session.run(&mut hotkey, shutdown) {
        Err(build_on_water::Error::PatchNotFound) => {
            log::error!("Could not find the correct memory address.");
            log::error!(
                "This could happen if you're not running the latest Steam version or a new game update broke the mod."
            );
            log::error!("The mod might not work with the GamePass/Windows store version.");
            Err(build_on_water::Error::PatchNotFound.into())
        }
        other => Ok(other?),
    }
}

#[cfg(not(windows))]
fn run(_config: SessionConfig, _shutdown: &AtomicBool) -> Result<(), Box<dyn Error>> {
    Err("attaching to the game is only supported on Windows".into())
}

fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    init_logging(&args)?;

    let config = SessionConfig {
        process_name: args.process.clone(),
        hotkey: args.hotkey,
        poll_interval: Duration::from_millis(args.poll_ms),
        ..Default::default()
    };
    log::info!(
        "Target: {}, hotkey: {}, polling every {:?}",
        config.process_name,
        config.hotkey,
        config.poll_interval
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;

    run(config, &shutdown)?;
    log::info!("Exiting");
    Ok(())
}
