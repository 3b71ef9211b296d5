// src/export/mod.rs
pub mod document;
pub mod html;
pub mod pdf;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::export::document::{Document, DocumentRenderer};
use crate::export::html::HtmlRenderer;
use crate::export::pdf::PdfRenderer;
use crate::report::Report;

pub const ARTIFACT_PREFIX: &str = "crypto_report_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Document,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Document => "document",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "document" | "doc" | "pdf" => Ok(ExportFormat::Document),
            other => anyhow::bail!("unsupported report format: {other}"),
        }
    }
}

/// Backend used for `ExportFormat::Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Pdf,
    Html,
}

impl DocumentKind {
    pub fn renderer(self) -> Box<dyn DocumentRenderer> {
        match self {
            DocumentKind::Pdf => Box::new(PdfRenderer),
            DocumentKind::Html => Box::new(HtmlRenderer),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serializing report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("rendering document: {0}")]
    Render(String),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `crypto_report_YYYYMMDD_HHMMSS.<ext>`, with `_<n>` before the extension
/// when `attempt > 0`.
pub fn artifact_name(generated_at: DateTime<Utc>, ext: &str, attempt: u32) -> String {
    let stamp = generated_at.format("%Y%m%d_%H%M%S");
    if attempt == 0 {
        format!("{ARTIFACT_PREFIX}{stamp}.{ext}")
    } else {
        format!("{ARTIFACT_PREFIX}{stamp}_{attempt}.{ext}")
    }
}

/// Writes reports into one directory. Never overwrites an existing file.
pub struct Exporter {
    out_dir: PathBuf,
    renderer: Box<dyn DocumentRenderer>,
}

impl Exporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            renderer: Box::new(PdfRenderer),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Consumes the report; returns the path written.
    pub fn export(&self, report: Report, format: ExportFormat) -> Result<PathBuf, ExportError> {
        let (bytes, ext) = match format {
            ExportFormat::Json => (to_json(&report)?, "json"),
            ExportFormat::Document => {
                let doc = Document::from_report(&report);
                let bytes = self
                    .renderer
                    .render(&doc)
                    .map_err(|e| ExportError::Render(format!("{e:#}")))?;
                (bytes, self.renderer.extension())
            }
        };

        fs::create_dir_all(&self.out_dir).map_err(io_err(&self.out_dir))?;
        let path = self.write_unique(report.generated_at, ext, |file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })?;

        tracing::info!(
            path = %path.display(),
            format = %format,
            degraded = report.is_degraded(),
            bytes = bytes.len(),
            "report exported"
        );
        Ok(path)
    }

    /// Creates the next free name and runs `write` on it. A failed write
    /// removes the file so no truncated artifact is left behind.
    fn write_unique(
        &self,
        at: DateTime<Utc>,
        ext: &str,
        write: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<PathBuf, ExportError> {
        let (path, mut file) = self.create_unique(at, ext)?;
        if let Err(e) = write(&mut file) {
            drop(file);
            if let Err(rm) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %rm, "could not remove partial artifact");
            }
            return Err(io_err(&path)(e));
        }
        Ok(path)
    }

    fn create_unique(&self, at: DateTime<Utc>, ext: &str) -> Result<(PathBuf, File), ExportError> {
        let mut attempt = 0u32;
        loop {
            let path = self.out_dir.join(artifact_name(at, ext, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => return Ok((path, f)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 10_000 => {
                    tracing::debug!(path = %path.display(), "artifact exists, trying next suffix");
                    attempt += 1;
                }
                Err(e) => return Err(io_err(&path)(e)),
            }
        }
    }
}

/// Pretty JSON with 4-space indentation.
pub fn to_json(report: &Report) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    report.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}
