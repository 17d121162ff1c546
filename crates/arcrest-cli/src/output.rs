//! Output renderers for CLI commands.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, anyhow};
use arcrest_client::{KmlWriter, ProgressReporter, QueryResponse};
use serde::Serialize;

use crate::client::{CliError, CliResult};

/// Pretty-print `value` as JSON to `output`, or to stdout when absent.
pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))
                    .map_err(CliError::failure)?;
            }
            fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))
                .map_err(CliError::failure)?;
            tracing::info!(path = %path.display(), "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// Render query features as KML, or KMZ when `archive` is set, splitting
/// across files when the vertex ceiling is exceeded.
pub(crate) fn render_kml(
    response: &QueryResponse,
    display_field: Option<&str>,
    archive: bool,
    output: Option<&Path>,
    reporter: &dyn ProgressReporter,
) -> CliResult<()> {
    let writer = KmlWriter::new(reporter)
        .map_err(CliError::failure)?
        .with_archive(archive);
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let written = writer
        .write(
            &response.feature_collection(),
            display_field,
            output,
            &mut handle,
        )
        .map_err(CliError::failure)?;

    if written.len() > 1 {
        tracing::info!(files = written.len(), "output split across files");
    }
    Ok(())
}
