pub mod cli;
pub mod config;
pub mod corpus;
pub mod embed;
pub mod gate;
pub mod intake;
pub mod pipeline;
pub mod range;
pub mod reduce;
pub mod registry;
mod server;
pub mod utils;
pub mod workspace;

pub use config::Opts;
pub use gate::BusyGate;
pub use pipeline::{FeaturePipeline, Ingestor};
pub use registry::DatasetRegistry;
