use crate::demo::{run_demo, run_requirements, run_roster_report, RequirementsArgs, RosterArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use school_screening::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "School Screening Service",
    about = "Track mandated vision, hearing, acanthosis, and scoliosis screenings",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the screenings owed by a single student profile
    Requirements(RequirementsArgs),
    /// Print the screenings owed by every student in a roster CSV
    Roster(RosterArgs),
    /// Run a two-visit screening demo against in-memory storage
    Demo,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Roster CSV used to seed the student directory
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Requirements(args) => run_requirements(args),
        Command::Roster(args) => run_roster_report(args),
        Command::Demo => run_demo(),
    }
}
