use crate::demo::{run_demo, run_token, DemoArgs, TokenCommand};
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement_cell::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Cell",
    about = "Run the placement cell service or explore its workflows from the command line",
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
    /// Walk a demo student from signup through applying and withdrawing
    Demo(DemoArgs),
    /// Encode or decode the opaque session tokens used in URLs
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the demo catalog into the configured database if it is missing
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Token { command } => run_token(command),
    }
}
