#![allow(clippy::missing_docs_in_private_items)]

pub mod pipeline;
pub mod progress;
pub mod source;

pub use pipeline::{IndexOutcome, IndexingConfig, IndexingPipeline};
pub use progress::{ProgressSink, TracingProgressSink};
pub use source::{DocumentSource, FsDocumentSource};
