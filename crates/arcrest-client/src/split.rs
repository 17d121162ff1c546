//! Vertex-budget splitting of KML output, with optional KMZ archiving.
//!
//! # Design
//! - The vertex metric is the number of whitespace-separated tokens inside
//!   every `<coordinates>` block of the rendered markup.
//! - A document within the ceiling is written as-is. Otherwise features are
//!   batched in order into `<stem>_part<N>.kml` files under a directory named
//!   after the output stem; a batch is flushed before the feature that would
//!   push it over the ceiling. A single oversized feature gets its own part.
//! - KMZ archives always carry `doc.kml`: the document itself, or an index of
//!   network links when the output was split. An archive path without an
//!   extension puts its parts under `<stem>_parts` instead.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use regex::Regex;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{OutputError, OutputResult};
use crate::feature::{Feature, FeatureCollection};
use crate::kml::{KmlEncoder, escape_html};
use crate::progress::ProgressReporter;

/// Maximum coordinate tokens per KML file.
pub const VERTEX_CEILING: usize = 200_000;

/// Entry name of the root document inside a KMZ archive.
pub const INDEX_DOCUMENT_NAME: &str = "doc.kml";

/// Stem used for split output when no output path was given.
const DEFAULT_STEM: &str = "query";

const COORDINATES_PATTERN: &str = r"(?s)<coordinates>(.*?)</coordinates>";

/// Counts rendered vertices in KML markup.
#[derive(Debug, Clone)]
pub struct VertexCounter {
    pattern: Regex,
}

impl VertexCounter {
    /// Compile the coordinates pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> OutputResult<Self> {
        let pattern = Regex::new(COORDINATES_PATTERN)
            .map_err(|source| OutputError::Pattern { source })?;
        Ok(Self { pattern })
    }

    /// Coordinate tokens across all `<coordinates>` blocks of `kml`.
    #[must_use]
    pub fn count(&self, kml: &str) -> usize {
        self.pattern
            .captures_iter(kml)
            .filter_map(|captures| captures.get(1))
            .map(|block| block.as_str().split_whitespace().count())
            .sum()
    }
}

/// Count rendered vertices in `kml`.
///
/// # Errors
///
/// Returns an error if the pattern fails to compile.
pub fn count_vertices(kml: &str) -> OutputResult<usize> {
    Ok(VertexCounter::new()?.count(kml))
}

#[derive(Default)]
struct Batch<'f> {
    features: Vec<&'f Feature>,
    vertices: usize,
}

/// Writes feature collections as KML or KMZ within a vertex budget.
pub struct KmlWriter<'a> {
    ceiling: usize,
    archive: bool,
    counter: VertexCounter,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> KmlWriter<'a> {
    /// Plain KML writer using [`VERTEX_CEILING`].
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex pattern fails to compile.
    pub fn new(reporter: &'a dyn ProgressReporter) -> OutputResult<Self> {
        Ok(Self {
            ceiling: VERTEX_CEILING,
            archive: false,
            counter: VertexCounter::new()?,
            reporter,
        })
    }

    /// Override the vertex ceiling.
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Bundle output into a KMZ archive.
    #[must_use]
    pub fn with_archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    /// Render and write `collection`, returning every file written.
    ///
    /// Without an output path a document within the ceiling is printed to
    /// `stdout` and no path is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if archive output lacks a path or a file cannot be written.
    pub fn write(
        &self,
        collection: &FeatureCollection,
        display_field: Option<&str>,
        output: Option<&Path>,
        stdout: &mut dyn Write,
    ) -> OutputResult<Vec<PathBuf>> {
        if self.archive && output.is_none() {
            return Err(OutputError::ArchiveWithoutPath);
        }

        let encoder = KmlEncoder::new(display_field);
        let document = encoder.render(&collection.features);
        let total = self.counter.count(&document);

        if total <= self.ceiling {
            return self.write_single(&document, total, output, stdout);
        }

        let destination = output.map_or_else(
            || PathBuf::from(DEFAULT_STEM).with_extension("kml"),
            Path::to_path_buf,
        );
        let batches = self.partition(&encoder, &collection.features);
        tracing::info!(
            total,
            ceiling = self.ceiling,
            parts = batches.len(),
            "splitting kml output"
        );
        self.write_parts(&encoder, &batches, &destination)
    }

    fn write_single(
        &self,
        document: &str,
        vertices: usize,
        output: Option<&Path>,
        stdout: &mut dyn Write,
    ) -> OutputResult<Vec<PathBuf>> {
        let Some(path) = output else {
            writeln!(stdout, "{document}")
                .map_err(|source| OutputError::io("write_stdout", "<stdout>", source))?;
            return Ok(Vec::new());
        };

        if self.archive {
            write_archive(path, &[(INDEX_DOCUMENT_NAME.to_string(), document)])?;
        } else {
            write_file(path, document)?;
        }
        self.reporter.file_written(path, vertices);
        Ok(vec![path.to_path_buf()])
    }

    fn partition<'f>(&self, encoder: &KmlEncoder<'_>, features: &'f [Feature]) -> Vec<Batch<'f>> {
        let mut batches = Vec::new();
        let mut current = Batch::default();

        for feature in features {
            let vertices = encoder
                .placemark(feature)
                .map_or(0, |placemark| self.counter.count(&placemark));
            if !current.features.is_empty() && current.vertices + vertices > self.ceiling {
                batches.push(std::mem::take(&mut current));
            }
            current.features.push(feature);
            current.vertices += vertices;
        }

        if !current.features.is_empty() {
            batches.push(current);
        }
        batches
    }

    fn write_parts(
        &self,
        encoder: &KmlEncoder<'_>,
        batches: &[Batch<'_>],
        destination: &Path,
    ) -> OutputResult<Vec<PathBuf>> {
        let stem = destination
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or(DEFAULT_STEM);
        let directory = parts_directory(destination, stem, self.archive);
        fs::create_dir_all(&directory)
            .map_err(|source| OutputError::io("create_part_dir", &directory, source))?;

        let mut written = Vec::with_capacity(batches.len() + 2);
        let mut entries = Vec::with_capacity(batches.len() + 1);
        for (index, batch) in batches.iter().enumerate() {
            let name = format!("{stem}_part{}.kml", index + 1);
            let path = directory.join(&name);
            let document = encoder.render(batch.features.iter().copied());
            write_file(&path, &document)?;
            self.reporter.file_written(&path, batch.vertices);
            written.push(path);
            entries.push((name, document));
        }

        if self.archive {
            let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
            let index = network_link_index(&names);
            let index_path = directory.join(INDEX_DOCUMENT_NAME);
            write_file(&index_path, &index)?;
            written.push(index_path);

            let mut archive_entries = vec![(INDEX_DOCUMENT_NAME.to_string(), index.as_str())];
            archive_entries.extend(
                entries
                    .iter()
                    .map(|(name, document)| (name.clone(), document.as_str())),
            );
            write_archive(destination, &archive_entries)?;
            self.reporter.file_written(destination, 0);
            written.push(destination.to_path_buf());
        }

        Ok(written)
    }
}

/// Index document linking each part file by relative href.
#[must_use]
pub fn network_link_index(part_names: &[&str]) -> String {
    let mut lines = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#.to_string(),
        "<Document>".to_string(),
    ];
    for name in part_names {
        let name = escape_html(name);
        lines.push("<NetworkLink>".to_string());
        lines.push(format!("<name>{name}</name>"));
        lines.push(format!("<Link><href>{name}</href></Link>"));
        lines.push("</NetworkLink>".to_string());
    }
    lines.push("</Document>".to_string());
    lines.push("</kml>".to_string());
    lines.join("\n")
}

/// `<parent>/<stem>`, or `<parent>/<stem>_parts` when an archive would
/// otherwise be written over the directory itself.
fn parts_directory(destination: &Path, stem: &str, archive: bool) -> PathBuf {
    let parent = destination.parent().unwrap_or_else(|| Path::new(""));
    let directory = parent.join(stem);
    if archive && directory == destination {
        parent.join(format!("{stem}_parts"))
    } else {
        directory
    }
}

fn ensure_parent(path: &Path) -> OutputResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|source| OutputError::io("create_parent_dir", parent, source)),
        _ => Ok(()),
    }
}

fn write_file(path: &Path, contents: &str) -> OutputResult<()> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(|source| OutputError::io("write_kml", path, source))
}

fn write_archive(path: &Path, entries: &[(String, &str)]) -> OutputResult<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|source| OutputError::io("create_kmz", path, source))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|source| OutputError::zip("start_file", path, source))?;
        zip.write_all(contents.as_bytes())
            .map_err(|source| OutputError::io("kmz_write_entry", path, source))?;
    }
    zip.finish()
        .map_err(|source| OutputError::zip("finish", path, source))?;
    Ok(())
}
