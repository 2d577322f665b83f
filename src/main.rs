use clap::Parser;
use keygate::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Verify(args) => cli::verify::run(args).await,
        Command::Hash(args) => cli::hash::run(args).await,
        Command::Generate(args) => cli::generate::run(args).await,
    }
}
