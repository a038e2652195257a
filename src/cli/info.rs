use clap::Parser;
use serde_json::json;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::corpus::StaticCorpus;

#[derive(Parser, Debug, Clone)]
pub struct InfoCommand {}

impl SubCommandExtend for InfoCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let corpus = StaticCorpus::load(&opts.data_dir)?;
        let info = json!({
            "total": corpus.total(),
            "ranges": corpus.ranges().as_map(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        Ok(())
    }
}
