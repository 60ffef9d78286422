//! GpuWatch - run a command and stop it once it falls back to a software backend

mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::info;

use gpuwatch_core::application::{Supervisor, SupervisorConfig};
use gpuwatch_core::port::id_provider::UuidProvider;
use gpuwatch_core::port::time_provider::SystemTimeProvider;
use gpuwatch_core::port::CommandSource;
use gpuwatch_infra_system::console_sink::DEFAULT_STDOUT_PREFIX;
use gpuwatch_infra_system::{
    ArgsSource, ConsoleSink, LauncherConfig, NumberedFileSource, TokioProcessLauncher,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_COMMAND_NUMBER: u32 = 6;
const DEFAULT_COMMAND_DIR: &str = ".";

#[derive(Parser, Debug)]
#[command(name = "gpuwatch")]
#[command(
    about = "Run a command and kill it if it falls back to software rendering",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Number of the command file to read (<dir>/<num>-tmp.txt)
    #[arg(long, env = "GPUWATCH_NUM", default_value_t = DEFAULT_COMMAND_NUMBER)]
    num: u32,

    /// Directory holding the numbered command files
    #[arg(long, env = "GPUWATCH_DIR", default_value = DEFAULT_COMMAND_DIR)]
    dir: String,

    /// Prefix printed before each stdout line of the command
    #[arg(long, env = "GPUWATCH_STDOUT_PREFIX", default_value = DEFAULT_STDOUT_PREFIX)]
    stdout_prefix: String,

    /// Print the run result as JSON when done
    #[arg(long)]
    json: bool,

    /// Abort when the kill fails instead of waiting for the command to exit
    #[arg(long)]
    strict_kill: bool,

    /// Command to run instead of the numbered file (after `--`)
    #[arg(last = true)]
    command: Vec<String>,
}

impl Cli {
    fn command_source(&self) -> Box<dyn CommandSource> {
        if self.command.is_empty() {
            let dir = shellexpand::tilde(&self.dir).into_owned();
            info!(number = self.num, dir = %dir, "Using numbered command file");
            Box::new(NumberedFileSource::new(dir, self.num))
        } else {
            Box::new(ArgsSource::new(self.command.clone()))
        }
    }

    fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            fail_on_termination_error: self.strict_kill,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    info!("GpuWatch v{} starting...", VERSION);

    let command = cli
        .command_source()
        .load()
        .context("Failed to load command")?;

    // DI wiring
    let launcher = Arc::new(TokioProcessLauncher::new(LauncherConfig::default()));
    let sink = Arc::new(ConsoleSink::new(cli.stdout_prefix.clone()));
    let supervisor = Supervisor::new(
        launcher,
        sink,
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
        cli.supervisor_config(),
    );

    let result = supervisor
        .run(&command)
        .await
        .with_context(|| format!("Supervised run of '{}' failed", command))?;

    if cli.json {
        println!("{}", serde_json::to_string(&result)?);
    }

    Ok(())
}
