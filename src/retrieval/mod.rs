pub mod pipeline;
pub mod window;

pub use pipeline::{run, PipelineError, RetrievalSettings, RunPlan, RunSummary};
pub use window::{plan, ChunkPlan, IntervalError, RetrievalInterval, TimeWindow};
