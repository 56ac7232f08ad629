//! Shared cursor pagination helpers.
//!
//! Feeds are ordered by descending photo id. A [`Cursor`] is the exclusive upper bound of the
//! next fetch, so consecutive pages never overlap and never skip a row as long as new photos
//! only ever receive higher ids than everything served so far.

use std::num::NonZeroU32;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::application::fingerprint::FingerprintError;
use crate::application::repos::RepoError;
use crate::application::session::SessionError;
use crate::domain::entities::PhotoRecord;
use crate::domain::types::PhotoId;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Newest photo onwards.
    Head,
    /// Photos strictly older than the given id.
    Before(PhotoId),
    /// Nothing left to serve; fetches short-circuit to an empty page.
    Exhausted,
}

impl Cursor {
    pub fn upper_bound(self) -> Option<PhotoId> {
        match self {
            Cursor::Head => Some(PhotoId::MAX),
            Cursor::Before(id) => Some(id),
            Cursor::Exhausted => None,
        }
    }
}

/// One page of a feed as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub photos: Vec<PhotoRecord>,
    pub page: u32,
    pub has_next_page: bool,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("missing or invalid parameter: q")]
    MissingQuery,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

/// Anything that can list photos below an id bound.
#[async_trait]
pub(crate) trait PageSource: Send + Sync {
    async fn fetch(&self, before: PhotoId, limit: u32) -> Result<Vec<PhotoRecord>, RepoError>;
}

/// A fetched page plus what the lookahead learned about the rest of the feed.
#[derive(Debug)]
pub(crate) struct Window {
    pub photos: Vec<PhotoRecord>,
    pub has_next_page: bool,
    /// Cursor after the last served photo; `None` when the page came back empty.
    pub next_cursor: Option<Cursor>,
}

impl Window {
    fn empty() -> Self {
        Self {
            photos: Vec::new(),
            has_next_page: false,
            next_cursor: None,
        }
    }
}

/// Fetches one page from `cursor` and probes one row past it to compute `has_next_page`.
pub(crate) async fn fetch_window<S>(
    source: &S,
    cursor: Cursor,
    page_size: NonZeroU32,
) -> Result<Window, RepoError>
where
    S: PageSource + ?Sized,
{
    let Some(before) = cursor.upper_bound() else {
        return Ok(Window::empty());
    };

    let photos = source.fetch(before, page_size.get()).await?;
    let Some(last_id) = photos.last().map(|photo| photo.photo_id) else {
        return Ok(Window::empty());
    };

    let lookahead = source.fetch(last_id, 1).await?;
    Ok(Window {
        photos,
        has_next_page: !lookahead.is_empty(),
        next_cursor: Some(Cursor::Before(last_id)),
    })
}
