use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Internship Placement Service",
    about = "Run the internship placement API or walk through a placement from the command line",
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
    /// Run one application from form review through the proctored assessment
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["placement-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn demo_flags_parse() {
        let cli = Cli::try_parse_from([
            "placement-api",
            "demo",
            "--focus-losses",
            "3",
            "--pass-mark",
            "60",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Demo(args)) => {
                assert_eq!(args.focus_losses, 3);
                assert_eq!(args.pass_mark, Some(60));
            }
            other => panic!("expected demo command, got {other:?}"),
        }
    }
}
