//! The photo stream: newest photos first, walked page by page per installation.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, instrument};

use crate::application::conditional::{self, Conditional};
use crate::application::fingerprint::{canonical_photos, stream_fingerprint};
use crate::application::pagination::{
    Cursor, FeedError, PageResult, PageSource, Window, fetch_window,
};
use crate::application::repos::{PhotosRepo, RepoError};
use crate::application::session::SessionCache;
use crate::domain::entities::PhotoRecord;
use crate::domain::types::{FeedKind, InstallationId, PhotoId};

struct StreamSource<'a> {
    photos: &'a dyn PhotosRepo,
    installation: &'a InstallationId,
}

#[async_trait]
impl PageSource for StreamSource<'_> {
    async fn fetch(&self, before: PhotoId, limit: u32) -> Result<Vec<PhotoRecord>, RepoError> {
        self.photos
            .list_photos(self.installation, before, limit)
            .await
    }
}

#[derive(Clone)]
pub struct StreamService {
    photos: Arc<dyn PhotosRepo>,
    sessions: Arc<SessionCache>,
    page_size: NonZeroU32,
}

impl StreamService {
    pub fn new(
        photos: Arc<dyn PhotosRepo>,
        sessions: Arc<SessionCache>,
        page_size: NonZeroU32,
    ) -> Self {
        Self {
            photos,
            sessions,
            page_size,
        }
    }

    /// Restarts the stream for `installation` and returns page 1.
    #[instrument(skip_all, fields(installation = %installation))]
    pub async fn first_page(&self, installation: &InstallationId) -> Result<PageResult, FeedError> {
        let mut lease = self.sessions.lease(FeedKind::Stream, installation).await;
        lease.reset_first_page();
        let page = lease.read()?.page;

        let Window {
            photos,
            has_next_page,
            next_cursor,
        } = fetch_window(&self.source(installation), Cursor::Head, self.page_size).await?;

        // An empty first page pins the session so "more" stays empty instead of restarting.
        lease.advance(next_cursor.unwrap_or(Cursor::Exhausted))?;

        counter!("photostream_pages_served_total", "kind" => "stream").increment(1);
        debug!(page, count = photos.len(), has_next_page, "stream first page served");
        Ok(PageResult {
            photos,
            page,
            has_next_page,
        })
    }

    /// First page wrapped in a validator check against the client's copy.
    pub async fn first_page_conditional(
        &self,
        installation: &InstallationId,
        client_validator: Option<&str>,
    ) -> Result<Conditional<PageResult>, FeedError> {
        let page = self.first_page(installation).await?;
        let canonical = canonical_photos(&page.photos);
        let outcome = conditional::respond(page.clone(), &canonical, client_validator)?;
        Ok(outcome)
    }

    /// Continues the stream after the last page served to `installation`.
    #[instrument(skip_all, fields(installation = %installation))]
    pub async fn more_page(&self, installation: &InstallationId) -> Result<PageResult, FeedError> {
        let mut lease = self
            .sessions
            .lease_existing(FeedKind::Stream, installation)
            .await?;
        let entry = lease.read()?;

        let Window {
            photos,
            has_next_page,
            next_cursor,
        } = fetch_window(&self.source(installation), entry.cursor, self.page_size).await?;

        lease.advance(next_cursor.unwrap_or(entry.cursor))?;

        counter!("photostream_pages_served_total", "kind" => "stream").increment(1);
        debug!(
            page = entry.page,
            count = photos.len(),
            has_next_page,
            "stream page served"
        );
        Ok(PageResult {
            photos,
            page: entry.page,
            has_next_page,
        })
    }

    /// Fingerprint of the current first page for `installation`, leaving its session untouched.
    pub async fn first_page_fingerprint(
        &self,
        installation: &InstallationId,
    ) -> Result<String, FeedError> {
        let photos = self
            .photos
            .list_photos(installation, PhotoId::MAX, self.page_size.get())
            .await?;
        Ok(stream_fingerprint(&photos)?)
    }

    fn source<'a>(&'a self, installation: &'a InstallationId) -> StreamSource<'a> {
        StreamSource {
            photos: self.photos.as_ref(),
            installation,
        }
    }
}
