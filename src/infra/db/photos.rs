use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{query, query_as, query_scalar};
use time::OffsetDateTime;

use crate::application::repos::{PhotosRepo, PhotosWriteRepo, RepoError};
use crate::domain::entities::{PhotoRecord, PhotoUpload};
use crate::domain::types::{InstallationId, PhotoId};

use super::PostgresRepositories;
use super::util::{contains_pattern, map_sqlx_error};

/// Columns of a photo as seen by the installation bound to `$1`.
const PHOTO_COLUMNS: &str = r#"
    p.photo_id,
    p.title,
    p.created_at,
    (SELECT COUNT(*) FROM comments c WHERE c.photo_id = p.photo_id) AS comment_count,
    EXISTS (
        SELECT 1 FROM likes l WHERE l.photo_id = p.photo_id AND l.installation_id = $1
    ) AS favorite,
    p.installation_id = $1 AS deleteable
"#;

#[derive(Debug, sqlx::FromRow)]
struct PhotoRow {
    photo_id: i64,
    title: String,
    created_at: OffsetDateTime,
    comment_count: i64,
    favorite: bool,
    deleteable: bool,
}

impl From<PhotoRow> for PhotoRecord {
    fn from(row: PhotoRow) -> Self {
        Self {
            photo_id: row.photo_id,
            title: row.title,
            created_at: row.created_at,
            comment_count: row.comment_count,
            favorite: row.favorite,
            deleteable: row.deleteable,
        }
    }
}

#[async_trait]
impl PhotosRepo for PostgresRepositories {
    async fn list_photos(
        &self,
        installation: &InstallationId,
        before: PhotoId,
        limit: u32,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos p \
             WHERE p.photo_id < $2 \
             ORDER BY p.photo_id DESC \
             LIMIT $3"
        );
        let rows = query_as::<_, PhotoRow>(&sql)
            .bind(installation.as_str())
            .bind(before)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PhotoRecord::from).collect())
    }

    async fn search_photos(
        &self,
        installation: &InstallationId,
        search: &str,
        before: PhotoId,
        limit: u32,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos p \
             WHERE p.photo_id < $2 AND p.title ILIKE $4 ESCAPE '\\' \
             ORDER BY p.photo_id DESC \
             LIMIT $3"
        );
        let rows = query_as::<_, PhotoRow>(&sql)
            .bind(installation.as_str())
            .bind(before)
            .bind(i64::from(limit))
            .bind(contains_pattern(search))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PhotoRecord::from).collect())
    }

    async fn find_photo(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<Option<PhotoRecord>, RepoError> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.photo_id = $2");
        let row = query_as::<_, PhotoRow>(&sql)
            .bind(installation.as_str())
            .bind(photo_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PhotoRecord::from))
    }

    async fn photo_exists(&self, photo_id: PhotoId) -> Result<bool, RepoError> {
        query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM photos WHERE photo_id = $1)")
            .bind(photo_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn photo_content(&self, photo_id: PhotoId) -> Result<Option<Bytes>, RepoError> {
        let content = query_scalar::<_, Vec<u8>>("SELECT content FROM photos WHERE photo_id = $1")
            .bind(photo_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(content.map(Bytes::from))
    }
}

#[async_trait]
impl PhotosWriteRepo for PostgresRepositories {
    async fn insert_photo(
        &self,
        installation: &InstallationId,
        upload: PhotoUpload,
    ) -> Result<PhotoId, RepoError> {
        query_scalar::<_, i64>(
            r#"
            INSERT INTO photos (installation_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING photo_id
            "#,
        )
        .bind(installation.as_str())
        .bind(&upload.title)
        .bind(upload.content.as_ref())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete_photo(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<bool, RepoError> {
        let result = query("DELETE FROM photos WHERE photo_id = $1 AND installation_id = $2")
            .bind(photo_id)
            .bind(installation.as_str())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_favorite(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        favorite: bool,
    ) -> Result<(), RepoError> {
        let sql = if favorite {
            "INSERT INTO likes (photo_id, installation_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        } else {
            "DELETE FROM likes WHERE photo_id = $1 AND installation_id = $2"
        };

        query(sql)
            .bind(photo_id)
            .bind(installation.as_str())
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
