//! Keyword search over the photo collection, paginated like the stream.
//!
//! The query is fixed when a search begins; "more" always continues that query. The stored
//! page counter moves on every call, so repeated "more" calls after the results run out keep
//! returning empty pages with increasing page numbers.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, instrument};

use crate::application::pagination::{
    Cursor, FeedError, PageResult, PageSource, Window, fetch_window,
};
use crate::application::repos::{PhotosRepo, RepoError};
use crate::application::session::{SessionCache, SessionLease};
use crate::domain::entities::PhotoRecord;
use crate::domain::types::{FeedKind, InstallationId, PhotoId};

struct SearchSource<'a> {
    photos: &'a dyn PhotosRepo,
    installation: &'a InstallationId,
    query: &'a str,
}

#[async_trait]
impl PageSource for SearchSource<'_> {
    async fn fetch(&self, before: PhotoId, limit: u32) -> Result<Vec<PhotoRecord>, RepoError> {
        self.photos
            .search_photos(self.installation, self.query, before, limit)
            .await
    }
}

#[derive(Clone)]
pub struct SearchService {
    photos: Arc<dyn PhotosRepo>,
    sessions: Arc<SessionCache>,
    page_size: NonZeroU32,
}

impl SearchService {
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

    /// Starts a new search, discarding any previous search continuation for `installation`.
    #[instrument(skip_all, fields(installation = %installation))]
    pub async fn first_page(
        &self,
        installation: &InstallationId,
        query: Option<&str>,
    ) -> Result<PageResult, FeedError> {
        let query = query
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .ok_or(FeedError::MissingQuery)?;

        let mut lease = self.sessions.lease(FeedKind::Search, installation).await;
        lease.begin_search(query);
        let entry = lease.read()?;

        self.serve(&mut lease, installation, query, entry.page, Cursor::Head, Cursor::Exhausted)
            .await
    }

    /// Continues the running search for `installation`.
    #[instrument(skip_all, fields(installation = %installation))]
    pub async fn more_page(&self, installation: &InstallationId) -> Result<PageResult, FeedError> {
        let mut lease = self
            .sessions
            .lease_existing(FeedKind::Search, installation)
            .await?;
        let entry = lease.read()?;
        // Search entries are always created with a query.
        let query = entry.query.clone().unwrap_or_default();

        self.serve(&mut lease, installation, &query, entry.page, entry.cursor, entry.cursor)
            .await
    }

    async fn serve(
        &self,
        lease: &mut SessionLease,
        installation: &InstallationId,
        query: &str,
        page: u32,
        cursor: Cursor,
        cursor_when_empty: Cursor,
    ) -> Result<PageResult, FeedError> {
        let source = SearchSource {
            photos: self.photos.as_ref(),
            installation,
            query,
        };
        let Window {
            photos,
            has_next_page,
            next_cursor,
        } = fetch_window(&source, cursor, self.page_size).await?;

        lease.advance(next_cursor.unwrap_or(cursor_when_empty))?;

        counter!("photostream_pages_served_total", "kind" => "search").increment(1);
        debug!(page, count = photos.len(), has_next_page, "search page served");
        Ok(PageResult {
            photos,
            page,
            has_next_page,
        })
    }
}
