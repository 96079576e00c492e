//! Fixed prologue entries of each package format.

use crate::domain::entities::PackageFormat;
use crate::domain::errors::MdexResult;
use crate::domain::ports::{DocumentKind, DocumentRenderer, RenderContext};

/// Body of the `mimetype` entry that opens every EPUB.
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// A text entry written before any image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrologueEntry {
    /// Path inside the archive.
    pub name: String,
    /// Entry contents.
    pub body: String,
    /// Deflated when true, stored otherwise.
    pub compressed: bool,
}

impl PrologueEntry {
    fn stored(name: &str, body: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            body: body.into(),
            compressed: false,
        }
    }

    fn deflated(name: &str, body: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            body: body.into(),
            compressed: true,
        }
    }
}

/// Renders the prologue of `format` in archive order.
///
/// # Errors
/// Returns the renderer's error for the first document that fails.
pub fn prologue(
    format: PackageFormat,
    renderer: &dyn DocumentRenderer,
    ctx: &RenderContext,
) -> MdexResult<Vec<PrologueEntry>> {
    let comic_info = renderer.render(DocumentKind::ComicInfo, ctx)?;

    match format {
        PackageFormat::Cbz => Ok(vec![PrologueEntry::deflated("ComicInfo.xml", comic_info)]),
        PackageFormat::Epub => Ok(vec![
            PrologueEntry::stored("mimetype", EPUB_MIMETYPE),
            PrologueEntry::deflated("META-INF/container.xml", CONTAINER_XML),
            PrologueEntry::deflated("ComicInfo.xml", comic_info),
            PrologueEntry::deflated(
                "OEBPS/content.opf",
                renderer.render(DocumentKind::ContentOpf, ctx)?,
            ),
            PrologueEntry::deflated(
                "OEBPS/toc.ncx",
                renderer.render(DocumentKind::TocNcx, ctx)?,
            ),
            PrologueEntry::deflated(
                "OEBPS/Text/epub.xhtml",
                renderer.render(DocumentKind::PageXhtml, ctx)?,
            ),
        ]),
    }
}
