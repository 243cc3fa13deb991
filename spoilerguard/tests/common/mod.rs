//! Shared in-memory media library for integration tests.

#![allow(dead_code, unreachable_pub)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use spoilerguard::{
    ContainerId, EpisodeInfo, EpisodeListingProvider, GuardConfig, ItemId, ItemMetadata,
    ItemMetadataProvider, MemoryStore, ScanPipeline, SpoilerError, SpoilerGuard, SpoilerResult,
    WatchState,
};

/// Media library fake with call counters, latency and failure switches.
#[derive(Default)]
pub struct FakeLibrary {
    items: Mutex<HashMap<ItemId, ItemMetadata>>,
    episodes: Mutex<HashMap<ContainerId, Vec<EpisodeInfo>>>,
    pub metadata_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
    pub fail_metadata: AtomicBool,
    pub fail_listing: AtomicBool,
    latency: Mutex<Duration>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Id used for the episode `(season, episode)` of `series`.
    pub fn episode_id(series: &str, season: u32, episode: u32) -> ItemId {
        ItemId::new(format!("{series}-s{season}e{episode}"))
    }

    /// Adds an episode to both the listing and the per-item metadata.
    pub fn add_episode(&self, series: &str, season: u32, episode: u32, watch_state: WatchState) {
        let id = Self::episode_id(series, season, episode);
        let container_id = ContainerId::new(series);
        self.episodes
            .lock()
            .unwrap()
            .entry(container_id.clone())
            .or_default()
            .push(EpisodeInfo {
                id: id.clone(),
                season_number: season,
                episode_number: Some(episode),
                watch_state,
            });
        self.items.lock().unwrap().insert(
            id,
            ItemMetadata {
                container_id: Some(container_id),
                season_number: Some(season),
                episode_number: Some(episode),
                watch_state,
                tags: Vec::new(),
            },
        );
    }

    /// Adds a series whose first `watched` episodes of season 1 are played.
    pub fn add_series(&self, series: &str, episodes: u32, watched: u32) {
        for episode in 1..=episodes {
            let state = if episode <= watched {
                WatchState::played()
            } else {
                WatchState::default()
            };
            self.add_episode(series, 1, episode, state);
        }
    }

    pub fn add_item(&self, id: &str, metadata: ItemMetadata) {
        self.items.lock().unwrap().insert(ItemId::new(id), metadata);
    }

    /// Marks an episode played in both views.
    pub fn mark_played(&self, series: &str, season: u32, episode: u32) {
        let id = Self::episode_id(series, season, episode);
        if let Some(list) = self.episodes.lock().unwrap().get_mut(&ContainerId::new(series)) {
            for info in list.iter_mut().filter(|info| info.id == id) {
                info.watch_state = WatchState::played();
            }
        }
        if let Some(meta) = self.items.lock().unwrap().get_mut(&id) {
            meta.watch_state = WatchState::played();
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ItemMetadataProvider for FakeLibrary {
    async fn item_metadata(&self, item_id: &ItemId) -> SpoilerResult<ItemMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(SpoilerError::Provider("metadata service offline".into()));
        }
        let found = self.items.lock().unwrap().get(item_id).cloned();
        found.ok_or_else(|| SpoilerError::NotFound(item_id.to_string()))
    }
}

#[async_trait]
impl EpisodeListingProvider for FakeLibrary {
    async fn episodes(&self, container_id: &ContainerId) -> SpoilerResult<Vec<EpisodeInfo>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(SpoilerError::Provider("listing service offline".into()));
        }
        let found = self.episodes.lock().unwrap().get(container_id).cloned();
        Ok(found.unwrap_or_default())
    }
}

/// Builds a guard over `library` with an in-memory store.
pub async fn guard(library: &Arc<FakeLibrary>) -> (SpoilerGuard, ScanPipeline, Arc<MemoryStore>) {
    guard_with(library, GuardConfig::default()).await
}

pub async fn guard_with(
    library: &Arc<FakeLibrary>,
    config: GuardConfig,
) -> (SpoilerGuard, ScanPipeline, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let (guard, pipeline) = SpoilerGuard::init(
        config,
        Arc::clone(library) as Arc<dyn ItemMetadataProvider>,
        Arc::clone(library) as Arc<dyn EpisodeListingProvider>,
        Arc::clone(&store) as Arc<dyn spoilerguard::SettingsStore>,
    )
    .await
    .unwrap();
    (guard, pipeline, store)
}
