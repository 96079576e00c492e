//! Chapter entity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::image::ImageRef;
use super::manga::Manga;
use super::relationship::{Relationship, names_of};

/// A chapter record.
///
/// The page image list is resolved lazily on first use. Clones share the
/// same cell, so concurrent first access resolves it at most once.
#[derive(Debug, Clone, Deserialize)]
pub struct Chapter {
    /// Chapter id.
    pub id: Uuid,
    /// Chapter attributes.
    pub attributes: ChapterAttributes,
    /// Related records such as the manga and scanlation groups.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(skip)]
    images: Arc<OnceCell<Vec<ImageRef>>>,
}

/// Chapter attributes used for titles and package metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAttributes {
    /// Volume number as published, e.g. `1`.
    #[serde(default)]
    pub volume: Option<String>,
    /// Chapter number as published, e.g. `3` or `10.5`.
    #[serde(default)]
    pub chapter: Option<String>,
    /// Chapter name, when the group gave one.
    #[serde(default)]
    pub title: Option<String>,
    /// Language code of this translation.
    #[serde(default)]
    pub translated_language: String,
    /// Page count reported by the API.
    #[serde(default)]
    pub pages: u32,
    /// Publication time.
    #[serde(default)]
    pub publish_at: Option<DateTime<Utc>>,
}

impl Chapter {
    /// Creates a chapter whose image list is not resolved yet.
    #[must_use]
    pub fn new(id: Uuid, attributes: ChapterAttributes, relationships: Vec<Relationship>) -> Self {
        Self {
            id,
            attributes,
            relationships,
            images: Arc::default(),
        }
    }

    /// Title of the parent manga, present when `manga` was expanded.
    #[must_use]
    pub fn manga_title(&self, language: &str) -> Option<String> {
        self.relationships
            .iter()
            .find(|r| r.is("manga"))
            .and_then(|r| r.title(language))
    }

    /// Id of the parent manga.
    #[must_use]
    pub fn manga_id(&self) -> Option<Uuid> {
        self.relationships.iter().find(|r| r.is("manga")).map(|r| r.id)
    }

    /// Names of the expanded scanlation groups.
    #[must_use]
    pub fn scanlation_groups(&self) -> Vec<String> {
        names_of(&self.relationships, "scanlation_group")
    }

    /// Display title, e.g. `Frieren Vol. 1 Ch. 3: Killing Magic`.
    /// Missing parts are left out.
    #[must_use]
    pub fn full_title(&self, language: &str) -> String {
        let mut parts = Vec::new();
        if let Some(manga) = self.manga_title(language) {
            parts.push(manga);
        }
        if let Some(volume) = self.attributes.volume.as_deref().filter(|v| !v.is_empty()) {
            parts.push(format!("Vol. {volume}"));
        }
        if let Some(chapter) = self.attributes.chapter.as_deref().filter(|c| !c.is_empty()) {
            parts.push(format!("Ch. {chapter}"));
        }

        let head = if parts.is_empty() {
            self.id.to_string()
        } else {
            parts.join(" ")
        };

        match self.attributes.title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => format!("{head}: {title}"),
            None => head,
        }
    }

    /// Expands the `manga` relationship with the series titles, as feed
    /// responses only carry its id.
    pub fn attach_manga(&mut self, manga: &Manga) {
        let attributes = serde_json::json!({ "title": manga.merged_titles() });
        match self.relationships.iter_mut().find(|r| r.is("manga")) {
            Some(rel) => rel.attributes = Some(attributes),
            None => self.relationships.push(Relationship {
                id: manga.id,
                kind: "manga".to_string(),
                attributes: Some(attributes),
            }),
        }
    }

    /// Cell guarding the lazily resolved page list.
    #[must_use]
    pub fn image_cell(&self) -> &OnceCell<Vec<ImageRef>> {
        &self.images
    }

    /// Page list if it has already been resolved.
    #[must_use]
    pub fn cached_images(&self) -> Option<&[ImageRef]> {
        self.images.get().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chapter(value: serde_json::Value) -> Chapter {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_title_with_all_parts() {
        let c = chapter(json!({
            "id": "5e8bc984-5f3f-4fb2-b7ac-1d6d1c7c7e3d",
            "attributes": { "volume": "1", "chapter": "3", "title": "Killing Magic", "translatedLanguage": "en", "pages": 2 },
            "relationships": [
                { "id": "a96676e5-8ae2-425e-b549-7f15dd34a6d8", "type": "manga", "attributes": { "title": { "en": "Frieren" } } },
                { "id": "11111111-2222-4333-8444-555555555555", "type": "scanlation_group", "attributes": { "name": "Group" } }
            ]
        }));

        assert_eq!(c.full_title("en"), "Frieren Vol. 1 Ch. 3: Killing Magic");
        assert_eq!(c.scanlation_groups(), vec!["Group".to_string()]);
        assert_eq!(
            c.manga_id().map(|id| id.to_string()).as_deref(),
            Some("a96676e5-8ae2-425e-b549-7f15dd34a6d8")
        );
    }

    #[test]
    fn test_full_title_without_parts_uses_id() {
        let c = chapter(json!({
            "id": "5e8bc984-5f3f-4fb2-b7ac-1d6d1c7c7e3d",
            "attributes": { "chapter": "" }
        }));
        assert_eq!(c.full_title("en"), "5e8bc984-5f3f-4fb2-b7ac-1d6d1c7c7e3d");
    }

    #[test]
    fn test_attach_manga_fills_series_title() {
        let manga: Manga = serde_json::from_value(json!({
            "id": "a96676e5-8ae2-425e-b549-7f15dd34a6d8",
            "attributes": { "title": { "ja-ro": "Sousou no Frieren" }, "altTitles": [{ "en": "Frieren" }] }
        }))
        .unwrap();
        let mut c = chapter(json!({
            "id": "5e8bc984-5f3f-4fb2-b7ac-1d6d1c7c7e3d",
            "attributes": { "chapter": "1" },
            "relationships": [{ "id": "a96676e5-8ae2-425e-b549-7f15dd34a6d8", "type": "manga" }]
        }));

        c.attach_manga(&manga);

        assert_eq!(c.full_title("en"), "Frieren Ch. 1");
        assert_eq!(c.relationships.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_image_cell() {
        let c = Chapter::new(Uuid::nil(), ChapterAttributes::default(), Vec::new());
        let clone = c.clone();

        c.image_cell()
            .get_or_init(|| async { vec![ImageRef::new(0, "https://h/data/x/1.png")] })
            .await;

        assert_eq!(clone.cached_images().map(<[ImageRef]>::len), Some(1));
    }
}
