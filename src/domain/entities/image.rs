//! Page image references and fetch results.

use bytes::Bytes;

use crate::domain::errors::MdexResult;

/// A page image within a chapter. The index is the only ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    /// Zero-based position in the chapter.
    pub index: usize,
    /// Absolute image url on the delivery node.
    pub url: String,
    /// Archive entry name.
    pub name: String,
}

impl ImageRef {
    /// Creates a reference whose entry name is the basename of the url path.
    #[must_use]
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        let url = url.into();
        let name = basename(&url).to_string();
        Self { index, url, name }
    }

    /// Media type of the image, derived from its file extension.
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        media_type_of(&self.name)
    }
}

/// Last path segment of a url, ignoring any query or fragment.
#[must_use]
pub fn basename(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Maps an image file name to its media type.
#[must_use]
pub fn media_type_of(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Outcome of fetching one [`ImageRef`]. Produced exactly once per reference.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Index of the fetched reference.
    pub index: usize,
    /// Entry name of the fetched reference.
    pub name: String,
    /// Image bytes, or the error that ended the fetch.
    pub payload: MdexResult<Bytes>,
}

impl FetchResult {
    /// Pairs a payload with the reference it was fetched for.
    #[must_use]
    pub fn new(image: &ImageRef, payload: MdexResult<Bytes>) -> Self {
        Self {
            index: image.index,
            name: image.name.clone(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://uploads.mangadex.org/data/abc/1-x.png", "1-x.png" ; "plain")]
    #[test_case("https://h.example/data-saver/abc/2-y.jpg?token=1", "2-y.jpg" ; "query")]
    #[test_case("3-z.webp", "3-z.webp" ; "bare")]
    fn test_basename(url: &str, expected: &str) {
        assert_eq!(basename(url), expected);
    }

    #[test_case("a.PNG", "image/png")]
    #[test_case("a.jpeg", "image/jpeg")]
    #[test_case("a.jpg", "image/jpeg")]
    #[test_case("a.gif", "image/gif")]
    #[test_case("a.webp", "image/webp")]
    #[test_case("noext", "image/png")]
    fn test_media_type(name: &str, expected: &str) {
        assert_eq!(media_type_of(name), expected);
    }

    #[test]
    fn test_image_ref_name() {
        let image = ImageRef::new(4, "https://h.example/data/hash/5-page.png");
        assert_eq!(image.index, 4);
        assert_eq!(image.name, "5-page.png");
        assert_eq!(image.media_type(), "image/png");
    }
}
