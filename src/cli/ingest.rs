use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::ProgressBar;

use crate::cli::SubCommandExtend;
use crate::config::{MaterializeOptions, Opts, PipelineOptions};
use crate::pipeline::{FeaturePipeline, Ingestor};

#[derive(Parser, Debug, Clone)]
pub struct IngestCommand {
    /// 待摄取的压缩包路径
    pub archive: PathBuf,
    #[command(flatten)]
    pub pipeline: PipelineOptions,
    #[command(flatten)]
    pub materialize: MaterializeOptions,
}

impl SubCommandExtend for IngestCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let pipeline = FeaturePipeline::new(&self.pipeline);
        let ingestor =
            Ingestor { uploads_dir: opts.data_dir.uploads(), materialize: self.materialize.clone() };

        let pb = ProgressBar::new_spinner().with_message("正在摄取数据集");
        pb.enable_steady_tick(Duration::from_millis(100));
        let archive = self.archive.clone();
        let result = tokio::task::spawn_blocking(move || ingestor.ingest(&archive, &pipeline))
            .await?;
        pb.finish_and_clear();

        let (handle, workspace) = result?;
        println!("{handle}\t{}", workspace.root().display());
        Ok(())
    }
}
