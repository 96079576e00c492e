//! Manga series entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::relationship::{LocalizedString, Relationship, names_of, pick_localized};

/// A manga series record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    /// Manga id.
    pub id: Uuid,
    /// Series attributes.
    pub attributes: MangaAttributes,
    /// Related records such as authors and cover art.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Series attributes. Only the fields used for packaging are typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaAttributes {
    /// Main title per language.
    #[serde(default)]
    pub title: LocalizedString,
    /// Alternative titles, one map per title.
    #[serde(default)]
    pub alt_titles: Vec<LocalizedString>,
    /// Description per language.
    #[serde(default)]
    pub description: LocalizedString,
    /// Language the series was first published in.
    #[serde(default)]
    pub original_language: Option<String>,
    /// Publication status, e.g. `ongoing`.
    #[serde(default)]
    pub status: Option<String>,
    /// Year of first publication.
    #[serde(default)]
    pub year: Option<u32>,
}

impl Manga {
    /// Main titles merged with alternative titles. Main titles win on conflict.
    #[must_use]
    pub fn merged_titles(&self) -> LocalizedString {
        let mut merged = LocalizedString::new();
        for alt in &self.attributes.alt_titles {
            for (lang, title) in alt {
                merged.entry(lang.clone()).or_insert_with(|| title.clone());
            }
        }
        merged.extend(
            self.attributes
                .title
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    /// Best title for the language.
    #[must_use]
    pub fn title(&self, language: &str) -> String {
        pick_localized(&self.merged_titles(), language)
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Best description for the language.
    #[must_use]
    pub fn description(&self, language: &str) -> Option<String> {
        pick_localized(&self.attributes.description, language)
    }

    /// Names of the expanded authors.
    #[must_use]
    pub fn authors(&self) -> Vec<String> {
        names_of(&self.relationships, "author")
    }

    /// Names of the expanded artists.
    #[must_use]
    pub fn artists(&self) -> Vec<String> {
        names_of(&self.relationships, "artist")
    }

    /// Cover file name, present when `cover_art` was expanded.
    #[must_use]
    pub fn cover_file_name(&self) -> Option<String> {
        self.relationships
            .iter()
            .find(|r| r.is("cover_art"))
            .and_then(Relationship::file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Manga {
        serde_json::from_value(json!({
            "id": "a96676e5-8ae2-425e-b549-7f15dd34a6d8",
            "attributes": {
                "title": { "ja-ro": "Sousou no Frieren" },
                "altTitles": [ { "en": "Frieren: Beyond Journey's End" }, { "ja-ro": "ignored" } ],
                "description": { "en": "An elf mage." }
            },
            "relationships": [
                { "id": "f5f1e1e6-7a3f-4d71-9e0b-9e84a5b2d7c1", "type": "author", "attributes": { "name": "Yamada Kanehito" } },
                { "id": "0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d", "type": "artist", "attributes": { "name": "Abe Tsukasa" } },
                { "id": "11111111-2222-4333-8444-555555555555", "type": "cover_art", "attributes": { "fileName": "cover.jpg" } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_merged_titles_prefer_main_title() {
        let manga = sample();
        let titles = manga.merged_titles();
        assert_eq!(titles["ja-ro"], "Sousou no Frieren");
        assert_eq!(titles["en"], "Frieren: Beyond Journey's End");
        assert_eq!(manga.title("en"), "Frieren: Beyond Journey's End");
    }

    #[test]
    fn test_expanded_relationships() {
        let manga = sample();
        assert_eq!(manga.authors(), vec!["Yamada Kanehito".to_string()]);
        assert_eq!(manga.artists(), vec!["Abe Tsukasa".to_string()]);
        assert_eq!(manga.cover_file_name().as_deref(), Some("cover.jpg"));
        assert_eq!(manga.description("en").as_deref(), Some("An elf mage."));
    }
}
