pub mod connectors;
pub mod feed;

pub use connectors::{CandleValidator, CsvFeed};
pub use feed::{DataFeed, MemoryFeed};

use std::sync::Arc;

use crate::config::DataConfig;

/// Resolve the configured source once, at startup.
pub fn build_feed(config: &DataConfig) -> Arc<dyn DataFeed> {
    match config {
        DataConfig::Csv { directory } => Arc::new(CsvFeed::new(directory.clone())),
        DataConfig::Memory => Arc::new(MemoryFeed::new()),
    }
}
