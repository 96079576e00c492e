//! Chapter export use case.

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::dto::{ExportRequest, ExportResponse};
use crate::domain::entities::{Chapter, PackageFormat};
use crate::domain::errors::{MdexError, MdexResult};
use crate::domain::ports::{DocumentRenderer, RenderContext};
use crate::infrastructure::archive::{assemble, prologue};
use crate::infrastructure::cache::QueryParams;
use crate::infrastructure::image::ImageFetcher;
use crate::infrastructure::mangadex::MangaDexClient;

/// Fetches a chapter, downloads its images, and streams them into a package.
#[derive(Clone)]
pub struct ExportChapterUseCase {
    client: MangaDexClient,
    fetcher: ImageFetcher,
    renderer: Arc<dyn DocumentRenderer>,
}

impl std::fmt::Debug for ExportChapterUseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportChapterUseCase")
            .field("client", &self.client)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

impl ExportChapterUseCase {
    /// Creates new export use case.
    #[must_use]
    pub fn new(
        client: MangaDexClient,
        fetcher: ImageFetcher,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            client,
            fetcher,
            renderer,
        }
    }

    /// Exports the requested chapter into `sink`.
    ///
    /// # Errors
    /// Returns the first error of any stage. The sink content is invalid
    /// on error and must be discarded.
    pub async fn execute<W>(
        &self,
        request: &ExportRequest,
        sink: W,
        cancel: &CancellationToken,
    ) -> MdexResult<(W, ExportResponse)>
    where
        W: Write + Seek + Send + 'static,
    {
        let chapter = self
            .client
            .fetch_chapter(request.chapter_id, &QueryParams::new(), cancel)
            .await?;
        self.package(&chapter, request.format, sink, cancel).await
    }

    /// Exports the requested chapter to a file. The file only appears once
    /// the archive is complete.
    ///
    /// # Errors
    /// Returns the first error of any stage; no file is left behind.
    pub async fn export_to_path(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> MdexResult<ExportResponse> {
        let chapter = self
            .client
            .fetch_chapter(request.chapter_id, &QueryParams::new(), cancel)
            .await?;

        let path = request.output.clone().unwrap_or_else(|| {
            PathBuf::from(request.format.file_name(&chapter.full_title(self.client.language())))
        });
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(dir)?;

        let (temp, mut response) = self.package(&chapter, request.format, temp, cancel).await?;
        temp.persist(&path).map_err(|e| MdexError::from(e.error))?;

        info!(path = ?path, images = response.images, "Package written");
        response.path = Some(path);
        Ok(response)
    }

    /// Packages an already fetched chapter.
    ///
    /// # Errors
    /// Returns the first error of image resolution, download, rendering, or
    /// archive writing.
    pub async fn package<W>(
        &self,
        chapter: &Chapter,
        format: PackageFormat,
        sink: W,
        cancel: &CancellationToken,
    ) -> MdexResult<(W, ExportResponse)>
    where
        W: Write + Seek + Send + 'static,
    {
        let images = self.client.image_refs(chapter, cancel).await?.to_vec();
        let ctx = RenderContext::from_chapter(chapter, &images, self.client.language());
        let entries = prologue(format, self.renderer.as_ref(), &ctx)?;
        debug!(chapter = %chapter.id, images = images.len(), format = %format, "Packaging chapter");

        let batch = cancel.child_token();
        let (results, downloads) = self.fetcher.spawn_ordered(images.clone(), &batch);
        let assembled = assemble(
            sink,
            format,
            ctx.title.clone(),
            entries,
            images.len(),
            results,
        )
        .await;

        if assembled.is_err() {
            batch.cancel();
        }
        if let Err(e) = downloads.await {
            warn!(error = %e, "Image download task failed");
        }
        let sink = assembled?;

        let response = ExportResponse {
            chapter_id: chapter.id,
            title: ctx.title,
            format,
            images: images.len(),
            path: None,
        };
        Ok((sink, response))
    }
}
