//! Photo, comment and reaction operations that sit beside the paginated feeds.
//!
//! Every successful write is followed by best-effort push notifications; nothing here fails
//! because a notification could not be delivered.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::conditional::{self, Conditional};
use crate::application::fingerprint::FingerprintError;
use crate::application::notifier::MutationNotifier;
use crate::application::repos::{CommentsRepo, PhotosRepo, PhotosWriteRepo, RepoError};
use crate::application::stream::StreamService;
use crate::domain::entities::{CommentRecord, FavoriteRecord, NewComment, NewPhoto, PhotoRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{CommentId, InstallationId, PhotoId};

pub const DEFAULT_MAX_COMMENT_LENGTH: usize = 150;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid photo id")]
    InvalidPhoto(PhotoId),
    #[error("photo not found")]
    PhotoNotFound(PhotoId),
    #[error("comment not found")]
    CommentNotFound(CommentId),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

/// Comments of one photo, in the shape clients receive and validate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentList {
    pub photo_id: PhotoId,
    pub comments: Vec<CommentRecord>,
}

/// A freshly stored photo plus the requester's new first-page validator.
#[derive(Debug, Clone)]
pub struct CreatedPhoto {
    pub photo: PhotoRecord,
    /// `None` when the fingerprint could not be recomputed; the photo is stored regardless.
    pub etag: Option<String>,
}

#[derive(Clone)]
pub struct PhotoService {
    photos: Arc<dyn PhotosRepo>,
    writer: Arc<dyn PhotosWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    stream: StreamService,
    notifier: MutationNotifier,
    max_comment_length: usize,
}

impl PhotoService {
    pub fn new(
        photos: Arc<dyn PhotosRepo>,
        writer: Arc<dyn PhotosWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        stream: StreamService,
        notifier: MutationNotifier,
        max_comment_length: usize,
    ) -> Self {
        Self {
            photos,
            writer,
            comments,
            stream,
            notifier,
            max_comment_length,
        }
    }

    #[instrument(skip_all, fields(installation = %installation))]
    pub async fn create_photo(
        &self,
        installation: &InstallationId,
        command: NewPhoto,
    ) -> Result<CreatedPhoto, PhotoError> {
        let upload = command.into_upload()?;
        let photo_id = self.writer.insert_photo(installation, upload).await?;

        let photo = self
            .photos
            .find_photo(installation, photo_id)
            .await?
            .ok_or_else(|| {
                RepoError::Persistence(format!("photo {photo_id} missing after insert"))
            })?;

        let etag = match self.stream.first_page_fingerprint(installation).await {
            Ok(etag) => Some(etag),
            Err(error) => {
                warn!(photo_id, error = %error, "failed to recompute stream fingerprint");
                None
            }
        };

        self.notifier.photo_created(installation, &photo).await;
        info!(photo_id, "photo created");
        Ok(CreatedPhoto { photo, etag })
    }

    #[instrument(skip_all, fields(installation = %installation, photo_id = photo_id))]
    pub async fn delete_photo(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<PhotoId, PhotoError> {
        if !self.writer.delete_photo(installation, photo_id).await? {
            return Err(PhotoError::PhotoNotFound(photo_id));
        }

        self.notifier.photo_deleted(installation, photo_id).await;
        info!("photo deleted");
        Ok(photo_id)
    }

    #[instrument(skip_all, fields(installation = %installation, photo_id = photo_id))]
    pub async fn add_comment(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        command: NewComment,
    ) -> Result<CommentRecord, PhotoError> {
        let message = command.validate(self.max_comment_length)?;

        let comment = self
            .comments
            .insert_comment(installation, photo_id, &message)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => PhotoError::InvalidPhoto(photo_id),
                other => PhotoError::Repo(other),
            })?;

        self.notifier.comment_created(installation, &comment).await;
        self.broadcast_comment_count(photo_id).await;
        Ok(comment)
    }

    #[instrument(skip_all, fields(installation = %installation, comment_id = comment_id))]
    pub async fn delete_comment(
        &self,
        installation: &InstallationId,
        comment_id: CommentId,
    ) -> Result<CommentId, PhotoError> {
        let photo_id = self
            .comments
            .delete_comment(installation, comment_id)
            .await?
            .ok_or(PhotoError::CommentNotFound(comment_id))?;

        self.notifier.comment_deleted(installation, comment_id).await;
        self.broadcast_comment_count(photo_id).await;
        Ok(comment_id)
    }

    /// Comment list for `photo_id`, or `NotModified` when the client already holds it.
    pub async fn comments(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        client_validator: Option<&str>,
    ) -> Result<Conditional<CommentList>, PhotoError> {
        if !self.photos.photo_exists(photo_id).await? {
            return Err(PhotoError::InvalidPhoto(photo_id));
        }

        let comments = self.comments.list_comments(installation, photo_id).await?;
        let list = CommentList { photo_id, comments };
        Ok(conditional::respond(list.clone(), &list, client_validator)?)
    }

    #[instrument(skip_all, fields(installation = %installation, photo_id = photo_id, favorite = favorite))]
    pub async fn set_favorite(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        favorite: bool,
    ) -> Result<FavoriteRecord, PhotoError> {
        if !self.photos.photo_exists(photo_id).await? {
            return Err(PhotoError::InvalidPhoto(photo_id));
        }

        self.writer
            .set_favorite(installation, photo_id, favorite)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => PhotoError::InvalidPhoto(photo_id),
                other => PhotoError::Repo(other),
            })?;

        Ok(FavoriteRecord { photo_id, favorite })
    }

    pub async fn content(&self, photo_id: PhotoId) -> Result<Bytes, PhotoError> {
        self.photos
            .photo_content(photo_id)
            .await?
            .ok_or(PhotoError::InvalidPhoto(photo_id))
    }

    async fn broadcast_comment_count(&self, photo_id: PhotoId) {
        match self.comments.comment_count(photo_id).await {
            Ok(count) => self.notifier.comment_count_changed(photo_id, count).await,
            Err(error) => {
                warn!(photo_id, error = %error, "comment count unavailable; broadcast skipped");
            }
        }
    }
}
