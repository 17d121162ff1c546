//! Progress hooks invoked by the query engine and KML writer.

use std::path::Path;

/// Receives progress events. Implementations must not affect control flow.
pub trait ProgressReporter: Send + Sync {
    /// A page of `count` features was fetched at `offset`.
    fn page_fetched(&self, layer_id: i64, offset: u32, count: usize);

    /// An output file holding `vertices` coordinate tokens was written.
    fn file_written(&self, path: &Path, vertices: usize);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn page_fetched(&self, _layer_id: i64, _offset: u32, _count: usize) {}

    fn file_written(&self, _path: &Path, _vertices: usize) {}
}

/// Emits one `info` log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn page_fetched(&self, layer_id: i64, offset: u32, count: usize) {
        tracing::info!(layer_id, offset, count, "fetched page");
    }

    fn file_written(&self, path: &Path, vertices: usize) {
        tracing::info!(path = %path.display(), vertices, "wrote file");
    }
}
