use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod checker;
mod cli;
mod core;
mod daemon;

use crate::core::models::JobType;
use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "navigator-poller")]
#[command(author, version, about = "Background status polling for Navigator report and task jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling daemon and resume unfinished jobs
    Daemon,

    /// Start polling a report or task job
    Start {
        #[arg(value_enum)]
        kind: JobKind,

        /// Report or task id to poll
        #[arg(long)]
        id: String,

        /// Extra job context as key=value (repeatable)
        #[arg(long = "context", short = 'c')]
        context: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop polling one job type, or all
    Stop {
        #[arg(value_enum)]
        target: StopTarget,
    },

    /// Show polling state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Read persisted state instead of asking the daemon
        #[arg(long)]
        offline: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum JobKind {
    Report,
    Task,
}

impl From<JobKind> for JobType {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Report => JobType::Report,
            JobKind::Task => JobType::Task,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StopTarget {
    Report,
    Task,
    All,
}

impl StopTarget {
    fn job_type(self) -> Option<JobType> {
        match self {
            StopTarget::Report => Some(JobType::Report),
            StopTarget::Task => Some(JobType::Task),
            StopTarget::All => None,
        }
    }
}

fn init_logging(debug: bool, journald: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let journald_layer = if journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer),
            Err(e) => {
                eprintln!("journald logging unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(journald_layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon => {
            let settings = Settings::load()?;
            let under_systemd = std::env::var_os("JOURNAL_STREAM").is_some();
            init_logging(settings.debug, under_systemd);
            daemon::run(settings).await
        }
        Commands::Start {
            kind,
            id,
            context,
            json,
        } => {
            init_logging(false, false);
            cli::start::run(kind.into(), id, context, json).await
        }
        Commands::Stop { target } => {
            init_logging(false, false);
            cli::stop::run(target.job_type()).await
        }
        Commands::Status { json, offline } => {
            init_logging(false, false);
            cli::status::run(json, offline).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
