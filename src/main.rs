use anyhow::Result;
use clap::Parser;
use facemap::cli::SubCommandExtend;
use facemap::config::SubCommand;
use facemap::Opts;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Server(cmd) => cmd.run(&opts).await,
        SubCommand::Ingest(cmd) => cmd.run(&opts).await,
        SubCommand::Info(cmd) => cmd.run(&opts).await,
    }
}
