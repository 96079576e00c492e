use serde::Deserialize;

/// Response envelope shared by entity and collection endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// `ok` on success.
    #[serde(default)]
    pub result: String,
    /// Entity or collection payload.
    pub data: T,
    /// Collection size, present on list endpoints.
    #[serde(default)]
    pub total: Option<usize>,
}

/// Response of `at-home/server/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeResponse {
    /// `ok` on success.
    #[serde(default)]
    pub result: String,
    /// Delivery node serving this chapter.
    pub base_url: String,
    /// Page file names.
    pub chapter: AtHomeChapter,
}

/// Page file names for both image qualities.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeChapter {
    /// Chapter hash used in image paths.
    pub hash: String,
    /// Full-quality file names.
    #[serde(default)]
    pub data: Vec<String>,
    /// Compressed file names.
    #[serde(default)]
    pub data_saver: Vec<String>,
}
