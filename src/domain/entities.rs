//! Domain entities mirrored from persistent storage, plus the write commands that create them.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::error::DomainError;
use crate::domain::types::{CommentId, PhotoId};

/// A photo as seen by one installation.
///
/// `favorite` and `deleteable` are computed for the viewing installation; `comment_count`
/// changes whenever anyone comments. None of the three take part in stream fingerprints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    pub photo_id: PhotoId,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub comment_count: i64,
    pub favorite: bool,
    pub deleteable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub comment_id: CommentId,
    pub photo_id: PhotoId,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub deleteable: bool,
}

/// Outcome of a like/dislike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FavoriteRecord {
    pub photo_id: PhotoId,
    pub favorite: bool,
}

/// Request body for a new photo: a title and base64 encoded image bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPhoto {
    pub title: String,
    pub image: String,
}

/// A validated photo ready for persistence.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub title: String,
    pub content: Bytes,
}

impl NewPhoto {
    pub fn into_upload(self) -> Result<PhotoUpload, DomainError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("photo title must not be empty"));
        }

        let content = STANDARD
            .decode(self.image.trim())
            .map_err(|err| DomainError::validation(format!("image is not valid base64: {err}")))?;
        if content.is_empty() {
            return Err(DomainError::validation("image must not be empty"));
        }

        Ok(PhotoUpload {
            title: title.to_string(),
            content: Bytes::from(content),
        })
    }
}

/// Request body for a new comment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub message: String,
}

impl NewComment {
    /// Returns the trimmed message when it is non-empty and at most `max_chars` characters.
    pub fn validate(&self, max_chars: usize) -> Result<String, DomainError> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("comment must not be empty"));
        }
        if message.chars().count() > max_chars {
            return Err(DomainError::validation(format!(
                "comment size of {max_chars} characters exceeded"
            )));
        }
        Ok(message.to_string())
    }
}
