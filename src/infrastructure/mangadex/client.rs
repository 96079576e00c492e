//! Typed MangaDex endpoints.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::dto::{AtHomeResponse, Envelope};
use super::gateway::{ApiGateway, UPLOADS_URL};
use crate::domain::entities::{Chapter, ImageRef, Manga};
use crate::domain::errors::{MdexError, MdexResult};
use crate::infrastructure::cache::QueryParams;

const MANGA_INCLUDES: [&str; 3] = ["author", "artist", "cover_art"];
const CHAPTER_INCLUDES: [&str; 2] = ["scanlation_group", "manga"];
const FEED_PAGE_SIZE: usize = 100;

/// MangaDex API client built on the cache-fronted gateway.
#[derive(Debug, Clone)]
pub struct MangaDexClient {
    gateway: Arc<ApiGateway>,
    language: String,
    data_saver: bool,
    md_uploads: bool,
}

impl MangaDexClient {
    /// Creates a client preferring `language` for titles.
    #[must_use]
    pub fn new(gateway: Arc<ApiGateway>, language: impl Into<String>) -> Self {
        Self {
            gateway,
            language: language.into(),
            data_saver: false,
            md_uploads: false,
        }
    }

    /// Use the compressed image set.
    #[must_use]
    pub fn with_data_saver(mut self, data_saver: bool) -> Self {
        self.data_saver = data_saver;
        self
    }

    /// Serve images from [`UPLOADS_URL`] instead of the assigned node.
    #[must_use]
    pub fn with_md_uploads(mut self, md_uploads: bool) -> Self {
        self.md_uploads = md_uploads;
        self
    }

    /// Preferred language code.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    fn manga_params(params: &QueryParams) -> QueryParams {
        let mut params = params.clone();
        params.set("includes[]", MANGA_INCLUDES);
        params
    }

    fn chapter_params(&self, params: &QueryParams) -> QueryParams {
        let mut params = params.clone();
        params
            .set("includes[]", CHAPTER_INCLUDES)
            .set("translatedLanguage[]", [self.language.as_str()]);
        params
    }

    /// Fetches one manga with authors, artists, and cover expanded.
    ///
    /// # Errors
    /// Returns gateway errors.
    pub async fn fetch_manga(
        &self,
        id: Uuid,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> MdexResult<Manga> {
        let envelope: Envelope<Manga> = self
            .gateway
            .query(&format!("manga/{id}"), &Self::manga_params(params), cancel)
            .await?;
        Ok(envelope.data)
    }

    /// Searches manga, e.g. with `title=...`.
    ///
    /// # Errors
    /// Returns gateway errors.
    pub async fn search_manga(
        &self,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> MdexResult<Vec<Manga>> {
        let envelope: Envelope<Vec<Manga>> = self
            .gateway
            .query("manga", &Self::manga_params(params), cancel)
            .await?;
        Ok(envelope.data)
    }

    /// Lists every chapter of a manga in the configured language, in
    /// ascending chapter order. Pages through the whole feed unless the
    /// caller pins `offset`.
    ///
    /// # Errors
    /// Returns gateway errors.
    pub async fn manga_feed(
        &self,
        manga: &Manga,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> MdexResult<Vec<Chapter>> {
        let path = format!("manga/{}/feed", manga.id);
        let mut base = params.clone();
        base.set("order[chapter]", ["asc"])
            .set("translatedLanguage[]", [self.language.as_str()])
            .set("includeEmptyPages", ["0"]);

        let single_page = !base.get_all("offset").is_empty();
        let page_size = base
            .get_all("limit")
            .first()
            .and_then(|l| l.parse().ok())
            .unwrap_or(FEED_PAGE_SIZE);
        if base.get_all("limit").is_empty() {
            base.set("limit", [page_size.to_string()]);
        }

        let mut chapters = Vec::new();
        loop {
            let mut page = base.clone();
            if !single_page {
                page.set("offset", [chapters.len().to_string()]);
            }

            let envelope: Envelope<Vec<Chapter>> =
                self.gateway.query(&path, &page, cancel).await?;
            let received = envelope.data.len();
            chapters.extend(envelope.data);

            let total = envelope.total.unwrap_or(chapters.len());
            if single_page || received == 0 || received < page_size || chapters.len() >= total {
                break;
            }
        }

        for chapter in &mut chapters {
            chapter.attach_manga(manga);
        }
        debug!(manga = %manga.id, count = chapters.len(), "Loaded manga feed");
        Ok(chapters)
    }

    /// Fetches one chapter with its groups and manga expanded.
    ///
    /// # Errors
    /// Returns gateway errors.
    pub async fn fetch_chapter(
        &self,
        id: Uuid,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> MdexResult<Chapter> {
        let envelope: Envelope<Chapter> = self
            .gateway
            .query(&format!("chapter/{id}"), &self.chapter_params(params), cancel)
            .await?;
        Ok(envelope.data)
    }

    /// Page images of a chapter, resolved on first call and shared by every
    /// later caller, including concurrent ones.
    ///
    /// # Errors
    /// Returns gateway errors or [`MdexError::InvalidUrl`] if the image host
    /// is malformed. A failed resolution is retried by the next caller.
    pub async fn image_refs<'c>(
        &self,
        chapter: &'c Chapter,
        cancel: &CancellationToken,
    ) -> MdexResult<&'c [ImageRef]> {
        let images = chapter
            .image_cell()
            .get_or_try_init(|| self.resolve_images(chapter.id, cancel))
            .await?;
        Ok(images.as_slice())
    }

    async fn resolve_images(
        &self,
        chapter_id: Uuid,
        cancel: &CancellationToken,
    ) -> MdexResult<Vec<ImageRef>> {
        let at_home: AtHomeResponse = self
            .gateway
            .query_limited(
                &format!("at-home/server/{chapter_id}"),
                &QueryParams::new(),
                cancel,
            )
            .await?;

        let (dir, files) = if self.data_saver {
            ("data-saver", &at_home.chapter.data_saver)
        } else {
            ("data", &at_home.chapter.data)
        };
        let host = if self.md_uploads {
            UPLOADS_URL
        } else {
            at_home.base_url.as_str()
        };
        let host = host.trim_end_matches('/');
        let hash = &at_home.chapter.hash;

        let images = files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let url = format!("{host}/{dir}/{hash}/{file}");
                Url::parse(&url).map_err(|e| MdexError::invalid_url(format!("{url}: {e}")))?;
                Ok(ImageRef::new(index, url))
            })
            .collect::<MdexResult<Vec<_>>>()?;

        debug!(chapter = %chapter_id, count = images.len(), "Resolved page images");
        Ok(images)
    }
}
