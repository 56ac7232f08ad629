//! Real-time push events emitted after successful writes.
//!
//! Publishing is best-effort: the write has already been committed by the time an event is
//! published, so a publish failure is logged and counted but never reaches the client.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::entities::{CommentRecord, PhotoRecord};
use crate::domain::types::{CommentId, InstallationId, PhotoId};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Photo as pushed to clients: no viewer-dependent fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoEvent {
    pub photo_id: PhotoId,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub comment_count: i64,
}

impl From<&PhotoRecord> for PhotoEvent {
    fn from(photo: &PhotoRecord) -> Self {
        Self {
            photo_id: photo.photo_id,
            title: photo.title.clone(),
            created_at: photo.created_at,
            comment_count: photo.comment_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentEvent {
    pub comment_id: CommentId,
    pub photo_id: PhotoId,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&CommentRecord> for CommentEvent {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            comment_id: comment.comment_id,
            photo_id: comment.photo_id,
            message: comment.message.clone(),
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommentCount {
    pub photo_id: PhotoId,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NewPhoto(PhotoEvent),
    NewComment(CommentEvent),
    CommentDeleted(CommentId),
    PhotoDeleted(PhotoId),
    NewCommentCount(CommentCount),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::NewPhoto(_) => "new_photo",
            PushEvent::NewComment(_) => "new_comment",
            PushEvent::CommentDeleted(_) => "comment_deleted",
            PushEvent::PhotoDeleted(_) => "photo_deleted",
            PushEvent::NewCommentCount(_) => "new_comment_count",
        }
    }

    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            PushEvent::NewPhoto(photo) => serde_json::to_value(photo),
            PushEvent::NewComment(comment) => serde_json::to_value(comment),
            PushEvent::CommentDeleted(id) | PushEvent::PhotoDeleted(id) => {
                serde_json::to_value(id)
            }
            PushEvent::NewCommentCount(count) => serde_json::to_value(count),
        }
    }
}

/// An event plus its audience: one installation, or everyone when `target` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: Option<InstallationId>,
    pub event: PushEvent,
}

impl Envelope {
    pub fn targeted(installation: &InstallationId, event: PushEvent) -> Self {
        Self {
            target: Some(installation.clone()),
            event,
        }
    }

    pub fn broadcast(event: PushEvent) -> Self {
        Self {
            target: None,
            event,
        }
    }

    pub fn is_visible_to(&self, installation: &InstallationId) -> bool {
        self.target
            .as_ref()
            .is_none_or(|target| target == installation)
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no subscribers are listening")]
    NoSubscribers,
}

/// The push transport.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: Envelope) -> Result<(), PublishError>;
}

/// In-process fan-out over a bounded broadcast channel.
///
/// Receivers that fall more than `capacity` events behind skip the oldest ones.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<Arc<Envelope>>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, envelope: Envelope) -> Result<(), PublishError> {
        self.sender
            .send(Arc::new(envelope))
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers)
    }
}

#[derive(Clone)]
pub struct MutationNotifier {
    publisher: Arc<dyn EventPublisher>,
}

impl MutationNotifier {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub async fn photo_created(&self, installation: &InstallationId, photo: &PhotoRecord) {
        let event = PushEvent::NewPhoto(PhotoEvent::from(photo));
        self.publish(Envelope::targeted(installation, event)).await;
    }

    pub async fn photo_deleted(&self, installation: &InstallationId, photo_id: PhotoId) {
        let event = PushEvent::PhotoDeleted(photo_id);
        self.publish(Envelope::targeted(installation, event)).await;
    }

    pub async fn comment_created(&self, installation: &InstallationId, comment: &CommentRecord) {
        let event = PushEvent::NewComment(CommentEvent::from(comment));
        self.publish(Envelope::targeted(installation, event)).await;
    }

    pub async fn comment_deleted(&self, installation: &InstallationId, comment_id: CommentId) {
        let event = PushEvent::CommentDeleted(comment_id);
        self.publish(Envelope::targeted(installation, event)).await;
    }

    /// Everyone sees the same count, so this one goes to all subscribers.
    pub async fn comment_count_changed(&self, photo_id: PhotoId, comment_count: i64) {
        let event = PushEvent::NewCommentCount(CommentCount {
            photo_id,
            comment_count,
        });
        self.publish(Envelope::broadcast(event)).await;
    }

    async fn publish(&self, envelope: Envelope) {
        let name = envelope.event.name();
        let target = envelope
            .target
            .as_ref()
            .map(|target| target.to_string())
            .unwrap_or_default();

        match self.publisher.publish(envelope).await {
            Ok(()) => {
                counter!("photostream_push_published_total", "event" => name).increment(1);
                debug!(event = name, target = %target, "push event published");
            }
            Err(PublishError::NoSubscribers) => {
                counter!(
                    "photostream_push_failed_total",
                    "event" => name,
                    "reason" => "no_subscribers"
                )
                .increment(1);
                debug!(event = name, target = %target, "no push subscribers; event dropped");
            }
        }
    }
}
