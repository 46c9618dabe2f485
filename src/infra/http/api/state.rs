use std::sync::Arc;

use crate::application::cache::CacheGateway;
use crate::application::channels::ChannelService;
use crate::application::jobs::CollectorContext;
use crate::application::rankings::RankingsService;
use crate::application::repos::HealthRepo;
use crate::application::trending::TrendingService;

#[derive(Clone)]
pub struct ApiState {
    pub trending: Arc<TrendingService>,
    pub channels: Arc<ChannelService>,
    pub rankings: Arc<RankingsService>,
    pub collector: Arc<CollectorContext>,
    pub cache: CacheGateway,
    pub health: Arc<dyn HealthRepo>,
}
