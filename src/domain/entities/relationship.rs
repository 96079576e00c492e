//! Reference-expanded relationships attached to API records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Language-keyed text as returned by the API (`{"en": "...", "ja-ro": "..."}`).
pub type LocalizedString = HashMap<String, String>;

/// Picks the best entry of a localized map: the requested language, then
/// English, then the alphabetically first available language.
#[must_use]
pub fn pick_localized(map: &LocalizedString, language: &str) -> Option<String> {
    map.get(language)
        .or_else(|| map.get("en"))
        .or_else(|| {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.first().and_then(|k| map.get(*k))
        })
        .cloned()
}

/// A related record. Attributes are only present when the request asked
/// for reference expansion of this relationship type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Id of the related record.
    pub id: Uuid,
    /// Relationship type, e.g. `manga` or `scanlation_group`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Attributes of the related record, when expanded.
    #[serde(default)]
    pub attributes: Option<Value>,
}

impl Relationship {
    /// Returns true if the relationship has the given type.
    #[must_use]
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    fn attribute_str(&self, key: &str) -> Option<String> {
        self.attributes
            .as_ref()?
            .get(key)?
            .as_str()
            .map(String::from)
    }

    /// Name of an expanded author, artist, or scanlation group.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.attribute_str("name")
    }

    /// File name of an expanded cover art record.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.attribute_str("fileName")
    }

    /// Title of an expanded manga record.
    #[must_use]
    pub fn title(&self, language: &str) -> Option<String> {
        let raw = self.attributes.as_ref()?.get("title")?;
        let map: LocalizedString = serde_json::from_value(raw.clone()).ok()?;
        pick_localized(&map, language)
    }
}

/// Collects the names of all expanded relationships of one type.
#[must_use]
pub fn names_of(relationships: &[Relationship], kind: &str) -> Vec<String> {
    relationships
        .iter()
        .filter(|r| r.is(kind))
        .filter_map(Relationship::name)
        .collect()
}
