//! Export DTOs.

use std::path::PathBuf;

use uuid::Uuid;

use crate::domain::entities::PackageFormat;

/// Chapter export request.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Chapter to export.
    pub chapter_id: Uuid,
    /// Package format.
    pub format: PackageFormat,
    /// Output file. Derived from the chapter title when unset.
    pub output: Option<PathBuf>,
}

impl ExportRequest {
    /// Creates new export request.
    #[must_use]
    pub const fn new(chapter_id: Uuid, format: PackageFormat) -> Self {
        Self {
            chapter_id,
            format,
            output: None,
        }
    }

    /// Sets the output file.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Export outcome.
#[derive(Debug, Clone)]
pub struct ExportResponse {
    /// Exported chapter.
    pub chapter_id: Uuid,
    /// Full chapter title, also used as the archive comment.
    pub title: String,
    /// Package format written.
    pub format: PackageFormat,
    /// Number of image entries written.
    pub images: usize,
    /// Written file, when exporting to a path.
    pub path: Option<PathBuf>,
}
