use std::sync::Arc;

use crate::application::notifier::BroadcastPublisher;
use crate::application::photos::PhotoService;
use crate::application::repos::StoreHealth;
use crate::application::search::SearchService;
use crate::application::stream::StreamService;

#[derive(Clone)]
pub struct ApiState {
    pub stream: Arc<StreamService>,
    pub search: Arc<SearchService>,
    pub photos: Arc<PhotoService>,
    pub events: Arc<BroadcastPublisher>,
    pub store: Arc<dyn StoreHealth>,
}
