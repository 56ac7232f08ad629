//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::entities::{CommentRecord, PhotoRecord, PhotoUpload};
use crate::domain::types::{CommentId, InstallationId, PhotoId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read side of the photo collection.
///
/// Listings return photos with `photo_id < before`, newest first, at most `limit` rows.
/// Per-viewer fields are computed for `installation`.
#[async_trait]
pub trait PhotosRepo: Send + Sync {
    async fn list_photos(
        &self,
        installation: &InstallationId,
        before: PhotoId,
        limit: u32,
    ) -> Result<Vec<PhotoRecord>, RepoError>;

    /// Case-insensitive substring match on the title.
    async fn search_photos(
        &self,
        installation: &InstallationId,
        query: &str,
        before: PhotoId,
        limit: u32,
    ) -> Result<Vec<PhotoRecord>, RepoError>;

    async fn find_photo(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<Option<PhotoRecord>, RepoError>;

    async fn photo_exists(&self, photo_id: PhotoId) -> Result<bool, RepoError>;

    async fn photo_content(&self, photo_id: PhotoId) -> Result<Option<Bytes>, RepoError>;
}

#[async_trait]
pub trait PhotosWriteRepo: Send + Sync {
    async fn insert_photo(
        &self,
        installation: &InstallationId,
        upload: PhotoUpload,
    ) -> Result<PhotoId, RepoError>;

    /// Deletes a photo owned by `installation`; returns whether a row was removed.
    async fn delete_photo(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<bool, RepoError>;

    async fn set_favorite(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        favorite: bool,
    ) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_comments(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn comment_count(&self, photo_id: PhotoId) -> Result<i64, RepoError>;

    /// Fails with [`RepoError::NotFound`] when the photo does not exist.
    async fn insert_comment(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        message: &str,
    ) -> Result<CommentRecord, RepoError>;

    /// Deletes a comment owned by `installation`, returning the photo it belonged to.
    async fn delete_comment(
        &self,
        installation: &InstallationId,
        comment_id: CommentId,
    ) -> Result<Option<PhotoId>, RepoError>;
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
