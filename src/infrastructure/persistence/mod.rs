//! Record sink implementations

mod file_sink;
mod in_memory_sink;

pub use file_sink::{render_markdown, sanitize_filename, FileRecordSink};
pub use in_memory_sink::{InMemoryRecordSink, SavedCollection};
