//! In-process store implementing the same repository contract as Postgres.
//!
//! Used when no database is configured and by the router tests. Ids are handed out from
//! monotonically increasing counters, so new photos always sort ahead of everything served.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::repos::{
    CommentsRepo, PhotosRepo, PhotosWriteRepo, RepoError, StoreHealth,
};
use crate::domain::entities::{CommentRecord, PhotoRecord, PhotoUpload};
use crate::domain::types::{CommentId, InstallationId, PhotoId};

#[derive(Debug, Clone)]
struct StoredPhoto {
    owner: InstallationId,
    title: String,
    content: Bytes,
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct StoredComment {
    photo_id: PhotoId,
    owner: InstallationId,
    message: String,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct State {
    next_photo_id: PhotoId,
    next_comment_id: CommentId,
    photos: BTreeMap<PhotoId, StoredPhoto>,
    comments: BTreeMap<CommentId, StoredComment>,
    likes: BTreeSet<(PhotoId, InstallationId)>,
}

impl State {
    fn comment_count(&self, photo_id: PhotoId) -> i64 {
        self.comments
            .values()
            .filter(|comment| comment.photo_id == photo_id)
            .count() as i64
    }

    fn view(&self, photo_id: PhotoId, photo: &StoredPhoto, viewer: &InstallationId) -> PhotoRecord {
        PhotoRecord {
            photo_id,
            title: photo.title.clone(),
            created_at: photo.created_at,
            comment_count: self.comment_count(photo_id),
            favorite: self.likes.contains(&(photo_id, viewer.clone())),
            deleteable: &photo.owner == viewer,
        }
    }

    fn page<F>(
        &self,
        viewer: &InstallationId,
        before: PhotoId,
        limit: u32,
        mut matches: F,
    ) -> Vec<PhotoRecord>
    where
        F: FnMut(&StoredPhoto) -> bool,
    {
        self.photos
            .range(..before)
            .rev()
            .filter(|(_, photo)| matches(photo))
            .take(limit as usize)
            .map(|(id, photo)| self.view(*id, photo, viewer))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepositories {
    state: RwLock<State>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhotosRepo for InMemoryRepositories {
    async fn list_photos(
        &self,
        installation: &InstallationId,
        before: PhotoId,
        limit: u32,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.page(installation, before, limit, |_| true))
    }

    async fn search_photos(
        &self,
        installation: &InstallationId,
        query: &str,
        before: PhotoId,
        limit: u32,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        Ok(state.page(installation, before, limit, |photo| {
            photo.title.to_lowercase().contains(&needle)
        }))
    }

    async fn find_photo(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<Option<PhotoRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .photos
            .get(&photo_id)
            .map(|photo| state.view(photo_id, photo, installation)))
    }

    async fn photo_exists(&self, photo_id: PhotoId) -> Result<bool, RepoError> {
        Ok(self.state.read().await.photos.contains_key(&photo_id))
    }

    async fn photo_content(&self, photo_id: PhotoId) -> Result<Option<Bytes>, RepoError> {
        Ok(self
            .state
            .read()
            .await
            .photos
            .get(&photo_id)
            .map(|photo| photo.content.clone()))
    }
}

#[async_trait]
impl PhotosWriteRepo for InMemoryRepositories {
    async fn insert_photo(
        &self,
        installation: &InstallationId,
        upload: PhotoUpload,
    ) -> Result<PhotoId, RepoError> {
        let mut state = self.state.write().await;
        state.next_photo_id += 1;
        let photo_id = state.next_photo_id;
        state.photos.insert(
            photo_id,
            StoredPhoto {
                owner: installation.clone(),
                title: upload.title,
                content: upload.content,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(photo_id)
    }

    async fn delete_photo(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        let owned = state
            .photos
            .get(&photo_id)
            .is_some_and(|photo| &photo.owner == installation);
        if !owned {
            return Ok(false);
        }

        state.photos.remove(&photo_id);
        state.comments.retain(|_, comment| comment.photo_id != photo_id);
        state.likes.retain(|(liked, _)| *liked != photo_id);
        Ok(true)
    }

    async fn set_favorite(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        favorite: bool,
    ) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if !state.photos.contains_key(&photo_id) {
            return Err(RepoError::NotFound);
        }

        let key = (photo_id, installation.clone());
        if favorite {
            state.likes.insert(key);
        } else {
            state.likes.remove(&key);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepositories {
    async fn list_comments(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|(_, comment)| comment.photo_id == photo_id)
            .map(|(id, comment)| CommentRecord {
                comment_id: *id,
                photo_id,
                message: comment.message.clone(),
                created_at: comment.created_at,
                deleteable: &comment.owner == installation,
            })
            .collect())
    }

    async fn comment_count(&self, photo_id: PhotoId) -> Result<i64, RepoError> {
        Ok(self.state.read().await.comment_count(photo_id))
    }

    async fn insert_comment(
        &self,
        installation: &InstallationId,
        photo_id: PhotoId,
        message: &str,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.photos.contains_key(&photo_id) {
            return Err(RepoError::NotFound);
        }

        state.next_comment_id += 1;
        let comment_id = state.next_comment_id;
        let created_at = OffsetDateTime::now_utc();
        state.comments.insert(
            comment_id,
            StoredComment {
                photo_id,
                owner: installation.clone(),
                message: message.to_string(),
                created_at,
            },
        );

        Ok(CommentRecord {
            comment_id,
            photo_id,
            message: message.to_string(),
            created_at,
            deleteable: true,
        })
    }

    async fn delete_comment(
        &self,
        installation: &InstallationId,
        comment_id: CommentId,
    ) -> Result<Option<PhotoId>, RepoError> {
        let mut state = self.state.write().await;
        let photo_id = match state.comments.get(&comment_id) {
            Some(comment) if &comment.owner == installation => comment.photo_id,
            _ => return Ok(None),
        };
        state.comments.remove(&comment_id);
        Ok(Some(photo_id))
    }
}

#[async_trait]
impl StoreHealth for InMemoryRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installation(raw: &str) -> InstallationId {
        InstallationId::parse(raw).unwrap()
    }

    fn upload(title: &str) -> PhotoUpload {
        PhotoUpload {
            title: title.to_string(),
            content: Bytes::from_static(b"img"),
        }
    }

    #[tokio::test]
    async fn listing_is_newest_first_below_bound() {
        let store = InMemoryRepositories::new();
        let inst = installation("inst1");
        for n in 1..=5 {
            store.insert_photo(&inst, upload(&format!("p{n}"))).await.unwrap();
        }

        let page = store.list_photos(&inst, 4, 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|photo| photo.photo_id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(page.iter().all(|photo| photo.deleteable));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_literal() {
        let store = InMemoryRepositories::new();
        let inst = installation("inst1");
        store.insert_photo(&inst, upload("Sunset Beach")).await.unwrap();
        store.insert_photo(&inst, upload("Mountains")).await.unwrap();
        store.insert_photo(&inst, upload("100% sunny")).await.unwrap();

        let hits = store
            .search_photos(&inst, "SUN", PhotoId::MAX, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let literal = store
            .search_photos(&inst, "0%", PhotoId::MAX, 10)
            .await
            .unwrap();
        assert_eq!(literal.len(), 1);
        assert_eq!(literal[0].title, "100% sunny");
    }

    #[tokio::test]
    async fn viewer_fields_follow_the_viewer() {
        let store = InMemoryRepositories::new();
        let owner = installation("owner");
        let other = installation("other");
        let id = store.insert_photo(&owner, upload("Lake")).await.unwrap();
        store.set_favorite(&other, id, true).await.unwrap();
        store.insert_comment(&other, id, "nice").await.unwrap();

        let for_owner = store.find_photo(&owner, id).await.unwrap().unwrap();
        let for_other = store.find_photo(&other, id).await.unwrap().unwrap();
        assert!(for_owner.deleteable && !for_owner.favorite);
        assert!(!for_other.deleteable && for_other.favorite);
        assert_eq!(for_owner.comment_count, 1);
    }

    #[tokio::test]
    async fn deleting_a_photo_drops_its_comments() {
        let store = InMemoryRepositories::new();
        let inst = installation("inst1");
        let id = store.insert_photo(&inst, upload("Tmp")).await.unwrap();
        store.insert_comment(&inst, id, "bye").await.unwrap();

        assert!(!store.delete_photo(&installation("other"), id).await.unwrap());
        assert!(store.delete_photo(&inst, id).await.unwrap());
        assert_eq!(store.comment_count(id).await.unwrap(), 0);
        assert!(matches!(
            store.insert_comment(&inst, id, "late").await,
            Err(RepoError::NotFound)
        ));
    }
}
