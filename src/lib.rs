pub mod cli;
pub mod collect;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod plugins;
pub mod report;
pub mod source;

pub use error::{Error, Result};
pub use pipeline::{run, ScanOptions, ScanOutcome};
