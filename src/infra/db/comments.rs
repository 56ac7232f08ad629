use async_trait::async_trait;
use sqlx::{query_as, query_scalar};
use time::OffsetDateTime;

use crate::application::repos::{CommentsRepo, RepoError};
use crate::domain::entities::CommentRecord;
use crate::domain::types::{CommentId, InstallationId, PhotoId};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    comment_id: i64,
    photo_id: i64,
    message: String,
    created_at: OffsetDateTime,
    deleteable: bool,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            comment_id: row.comment_id,
            photo_id: row.photo_id,
            message: row.message,
            created_at: row.created_at,
            deleteable: row.deleteable,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_comments(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = query_as::<_, CommentRow>(
            r#"
            SELECT comment_id, photo_id, message, created_at,
                   installation_id = $2 AS deleteable
            FROM comments
            WHERE photo_id = $1
            ORDER BY comment_id ASC
            "#,
        )
        .bind(photo_id)
        .bind(installation.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn comment_count(&self, photo_id: PhotoId) -> Result<i64, RepoError> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE photo_id = $1")
            .bind(photo_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_comment(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        message: &str,
    ) -> Result<CommentRecord, RepoError> {
        // An unknown photo trips the foreign key, which maps to `NotFound`.
        let row = query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (photo_id, installation_id, message)
            VALUES ($1, $2, $3)
            RETURNING comment_id, photo_id, message, created_at, TRUE AS deleteable
            "#,
        )
        .bind(photo_id)
        .bind(installation.as_str())
        .bind(message)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_comment(
        &self,
        installation: &InstallationId,
        comment_id: CommentId,
    ) -> Result<Option<PhotoId>, RepoError> {
        query_scalar::<_, i64>(
            "DELETE FROM comments WHERE comment_id = $1 AND installation_id = $2 RETURNING photo_id",
        )
        .bind(comment_id)
        .bind(installation.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
