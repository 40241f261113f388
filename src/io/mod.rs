// src/io/mod.rs

//! Application-facing ends of the pumps: sinks for child output and the
//! line decoder for line-oriented logging.

pub mod line_decoder;
pub mod sink;

pub use line_decoder::{LineDecoder, decode_ignoring_errors, tracing_lines};
pub use sink::{ByteSink, CollectSink, CollectedOutput, NoCloseSink, WriterSink, sink_from_writer};
