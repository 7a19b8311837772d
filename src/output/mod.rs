pub mod sink;

pub use sink::{output_path, OutputSink, RecordSink, SinkError, LINE_ENDING};
