//! Port for rendering the text documents of a package.

use chrono::{DateTime, Utc};

use crate::domain::entities::{Chapter, ImageRef};
use crate::domain::errors::MdexResult;

/// Text documents that make up a package prologue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// `ComicInfo.xml` metadata.
    ComicInfo,
    /// EPUB package document (`content.opf`).
    ContentOpf,
    /// EPUB navigation (`toc.ncx`).
    TocNcx,
    /// EPUB page listing all images (`epub.xhtml`).
    PageXhtml,
}

/// Everything a renderer may substitute into a document.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Chapter id.
    pub id: String,
    /// Full chapter title.
    pub title: String,
    /// Series title.
    pub series: Option<String>,
    /// Volume number.
    pub volume: Option<String>,
    /// Chapter number.
    pub number: Option<String>,
    /// Chapter name without the series prefix.
    pub chapter_title: Option<String>,
    /// Language code.
    pub language: String,
    /// Scanlation group names.
    pub groups: Vec<String>,
    /// Publication time.
    pub published: Option<DateTime<Utc>>,
    /// Page images in archive order.
    pub images: Vec<ImageRef>,
}

impl RenderContext {
    /// Builds the context for a chapter and its resolved page list.
    #[must_use]
    pub fn from_chapter(chapter: &Chapter, images: &[ImageRef], language: &str) -> Self {
        let attrs = &chapter.attributes;
        Self {
            id: chapter.id.to_string(),
            title: chapter.full_title(language),
            series: chapter.manga_title(language),
            volume: attrs.volume.clone(),
            number: attrs.chapter.clone(),
            chapter_title: attrs.title.clone(),
            language: if attrs.translated_language.is_empty() {
                language.to_string()
            } else {
                attrs.translated_language.clone()
            },
            groups: chapter.scanlation_groups(),
            published: attrs.publish_at,
            images: images.to_vec(),
        }
    }
}

/// Renders one document from a context. Treated as an opaque
/// record-to-text service by the packaging pipeline.
pub trait DocumentRenderer: Send + Sync {
    /// Renders `kind` for `ctx`.
    ///
    /// # Errors
    /// Returns a render error if the document cannot be produced.
    fn render(&self, kind: DocumentKind, ctx: &RenderContext) -> MdexResult<String>;
}
