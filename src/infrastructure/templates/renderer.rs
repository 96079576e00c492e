//! Built-in package documents rendered from bundled tera templates.

use chrono::Datelike;
use serde::Serialize;
use tera::{Context, Tera};

use crate::domain::errors::MdexResult;
use crate::domain::ports::{DocumentKind, DocumentRenderer, RenderContext};

const TEMPLATES: [(&str, &str); 4] = [
    ("comic_info.xml", include_str!("comic_info.xml")),
    ("content.opf", include_str!("content.opf")),
    ("toc.ncx", include_str!("toc.ncx")),
    ("epub.xhtml", include_str!("epub.xhtml")),
];

const ESCAPED_SUFFIXES: [&str; 4] = [".xml", ".opf", ".ncx", ".xhtml"];

fn template_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::ComicInfo => "comic_info.xml",
        DocumentKind::ContentOpf => "content.opf",
        DocumentKind::TocNcx => "toc.ncx",
        DocumentKind::PageXhtml => "epub.xhtml",
    }
}

#[derive(Serialize)]
struct Published {
    year: i32,
    month: u32,
    day: u32,
    date: String,
}

#[derive(Serialize)]
struct Page<'a> {
    index: usize,
    number: usize,
    name: &'a str,
    media_type: &'static str,
}

/// Template view of a [`RenderContext`].
#[derive(Serialize)]
struct DocumentView<'a> {
    id: &'a str,
    title: &'a str,
    comic_title: &'a str,
    series: Option<&'a str>,
    volume: Option<&'a str>,
    number: Option<&'a str>,
    language: &'a str,
    groups: &'a [String],
    published: Option<Published>,
    pages: Vec<Page<'a>>,
}

impl<'a> DocumentView<'a> {
    fn new(ctx: &'a RenderContext) -> Self {
        let present = |value: &'a Option<String>| value.as_deref().filter(|v| !v.is_empty());

        Self {
            id: &ctx.id,
            title: &ctx.title,
            comic_title: present(&ctx.chapter_title).unwrap_or(&ctx.title),
            series: present(&ctx.series),
            volume: present(&ctx.volume),
            number: present(&ctx.number),
            language: &ctx.language,
            groups: &ctx.groups,
            published: ctx.published.map(|at| Published {
                year: at.year(),
                month: at.month(),
                day: at.day(),
                date: at.format("%Y-%m-%d").to_string(),
            }),
            pages: ctx
                .images
                .iter()
                .map(|image| Page {
                    index: image.index,
                    number: image.index + 1,
                    name: &image.name,
                    media_type: image.media_type(),
                })
                .collect(),
        }
    }
}

/// Renders ComicInfo, OPF, NCX, and XHTML documents. Substituted text is
/// escaped by the template engine.
#[derive(Debug, Clone)]
pub struct BuiltinRenderer {
    tera: Tera,
}

impl BuiltinRenderer {
    /// Loads the bundled templates.
    ///
    /// # Errors
    /// Returns a render error if a bundled template fails to parse.
    pub fn new() -> MdexResult<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(ESCAPED_SUFFIXES.to_vec());
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }
}

impl DocumentRenderer for BuiltinRenderer {
    fn render(&self, kind: DocumentKind, ctx: &RenderContext) -> MdexResult<String> {
        let context = Context::from_serialize(DocumentView::new(ctx))?;
        Ok(self.tera.render(template_name(kind), &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ImageRef;
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    fn context() -> RenderContext {
        RenderContext {
            id: "5e8bc984-5f3f-4fb2-b7ac-1d6d1c7c7e3d".to_string(),
            title: "Frieren Vol. 1 Ch. 3: Killing <Magic>".to_string(),
            series: Some("Frieren".to_string()),
            volume: Some("1".to_string()),
            number: Some("3".to_string()),
            chapter_title: Some("Killing <Magic>".to_string()),
            language: "en".to_string(),
            groups: vec!["A & B".to_string()],
            published: Some(Utc.with_ymd_and_hms(2023, 4, 5, 0, 0, 0).unwrap()),
            images: vec![
                ImageRef::new(0, "https://h/data/x/1-a.png"),
                ImageRef::new(1, "https://h/data/x/2-b.jpg"),
            ],
        }
    }

    fn render(kind: DocumentKind, ctx: &RenderContext) -> String {
        BuiltinRenderer::new().unwrap().render(kind, ctx).unwrap()
    }

    #[test_case(DocumentKind::ComicInfo ; "comic info")]
    #[test_case(DocumentKind::ContentOpf ; "content opf")]
    #[test_case(DocumentKind::TocNcx ; "toc ncx")]
    #[test_case(DocumentKind::PageXhtml ; "page xhtml")]
    fn test_markup_in_text_is_escaped(kind: DocumentKind) {
        let xml = render(kind, &context());

        assert!(!xml.contains("<Magic>"));
        assert!(xml.starts_with("<?xml"));
    }

    #[test]
    fn test_comic_info_fields() {
        let xml = render(DocumentKind::ComicInfo, &context());

        assert!(xml.contains("<Title>Killing &lt;Magic&gt;</Title>"));
        assert!(xml.contains("  <Series>Frieren</Series>\n  <Number>3</Number>\n"));
        assert!(xml.contains("<ScanInformation>A &amp; B</ScanInformation>"));
        assert!(xml.contains("<Year>2023</Year>"));
        assert!(xml.contains("<Month>4</Month>"));
        assert!(xml.contains("<PageCount>2</PageCount>"));
        assert!(xml.contains(
            "<Web>https://mangadex.org/chapter/5e8bc984-5f3f-4fb2-b7ac-1d6d1c7c7e3d</Web>"
        ));
    }

    #[test]
    fn test_comic_info_skips_missing_fields() {
        let ctx = RenderContext {
            chapter_title: None,
            series: Some(String::new()),
            groups: Vec::new(),
            published: None,
            ..context()
        };

        let xml = render(DocumentKind::ComicInfo, &ctx);

        assert!(xml.contains("<Title>Frieren Vol. 1 Ch. 3: Killing &lt;Magic&gt;</Title>"));
        assert!(!xml.contains("<Series>"));
        assert!(!xml.contains("<ScanInformation>"));
        assert!(!xml.contains("<Year>"));
    }

    #[test]
    fn test_content_opf_lists_images_with_media_types() {
        let opf = render(DocumentKind::ContentOpf, &context());

        assert!(opf.contains(r#"href="Images/1-a.png" media-type="image/png""#));
        assert!(opf.contains(r#"href="Images/2-b.jpg" media-type="image/jpeg""#));
        assert!(opf.contains(r#"<meta name="cover" content="image-0"/>"#));
        assert!(opf.contains("<dc:date>2023-04-05</dc:date>"));
        assert!(opf.contains("<dc:contributor>A &amp; B</dc:contributor>"));
    }

    #[test]
    fn test_page_xhtml_keeps_image_order() {
        let xhtml = render(DocumentKind::PageXhtml, &context());

        let first = xhtml.find("1-a.png").unwrap();
        let second = xhtml.find("2-b.jpg").unwrap();
        assert!(first < second);
        assert!(xhtml.contains(r#"alt="Page 2""#));
    }

    #[test]
    fn test_toc_ncx_title() {
        let ncx = render(DocumentKind::TocNcx, &context());
        assert!(ncx.contains(
            "<docTitle><text>Frieren Vol. 1 Ch. 3: Killing &lt;Magic&gt;</text></docTitle>"
        ));
    }
}
