//! The assembled guard: one context owning every component.
//!
//! [`SpoilerGuard::init`] loads the persisted document, wires registry,
//! governor, caches, resolver, decision engine and reveal controller together,
//! and hands back the [`ScanPipeline`] for the host to drive. Mutations that
//! change what should be hidden persist the document and request a rescan.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{
    boundary::{Boundary, BoundaryResolver, EpisodeList, should_redact_leaf},
    cache::{DEFAULT_CAPACITY, EPISODE_CACHE_TTL, LookupCache},
    calendar::CalendarEvent,
    decision::{Decision, ItemDescriptor, ParentCache, RedactionEngine},
    error::SpoilerResult,
    governor::{DEFAULT_MAX_IN_FLIGHT, RequestGovernor},
    label::LabelPolicy,
    provider::{ContainerId, EpisodeListingProvider, ItemMetadataProvider, WatchState},
    registry::{ContainerMeta, ProtectionRule, RuleRegistry},
    reveal::{REVEAL_ALL_DURATION, REVEAL_HOLD_THRESHOLD, RevealController},
    scan::{ChangeFeed, ScanPipeline},
    settings::{Settings, SettingsOverrides, SettingsStore, Surface},
};

/// Limits, lifetimes and labels of a [`SpoilerGuard`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardConfig {
    pub max_in_flight: usize,
    pub cache_capacity: usize,
    pub episode_ttl: Option<Duration>,
    pub parent_ttl: Option<Duration>,
    pub hold_threshold: Duration,
    pub reveal_all_duration: Duration,
    pub label_policy: LabelPolicy,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            cache_capacity: DEFAULT_CAPACITY,
            episode_ttl: Some(EPISODE_CACHE_TTL),
            parent_ttl: None,
            hold_threshold: REVEAL_HOLD_THRESHOLD,
            reveal_all_duration: REVEAL_ALL_DURATION,
            label_policy: LabelPolicy::default(),
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_episode_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.episode_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_parent_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.parent_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_hold_threshold(mut self, threshold: Duration) -> Self {
        self.hold_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_reveal_all_duration(mut self, duration: Duration) -> Self {
        self.reveal_all_duration = duration;
        self
    }

    #[must_use]
    pub fn with_label_policy(mut self, policy: LabelPolicy) -> Self {
        self.label_policy = policy;
        self
    }
}

// =============================================================================
// SpoilerGuard
// =============================================================================

/// Owns every component for the lifetime of a session.
pub struct SpoilerGuard {
    config: GuardConfig,
    registry: Arc<RuleRegistry>,
    governor: Arc<RequestGovernor>,
    resolver: Arc<BoundaryResolver>,
    engine: Arc<RedactionEngine>,
    reveal: Arc<RevealController>,
    feed: ChangeFeed,
    store: Arc<dyn SettingsStore>,
}

impl SpoilerGuard {
    /// Loads the persisted document from `store` and builds every component.
    ///
    /// The returned pipeline must be driven (usually spawned with
    /// [`ScanPipeline::run`]) for page changes to be acted on.
    pub async fn init(
        config: GuardConfig,
        metadata: Arc<dyn ItemMetadataProvider>,
        listing: Arc<dyn EpisodeListingProvider>,
        store: Arc<dyn SettingsStore>,
    ) -> SpoilerResult<(Self, ScanPipeline)> {
        let document = store.load().await?.unwrap_or_default();
        let registry = Arc::new(RuleRegistry::from_document(document));
        let governor = Arc::new(RequestGovernor::new(config.max_in_flight));

        let episodes: Arc<LookupCache<ContainerId, EpisodeList>> = Arc::new(LookupCache::new(
            "episodes",
            config.episode_ttl,
            config.cache_capacity,
            Arc::clone(&governor),
        ));
        let parents: Arc<ParentCache> = Arc::new(LookupCache::new(
            "parents",
            config.parent_ttl,
            config.cache_capacity,
            Arc::clone(&governor),
        ));
        let resolver = Arc::new(BoundaryResolver::new(episodes, listing));
        let engine = Arc::new(RedactionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&resolver),
            parents,
            metadata,
            Arc::clone(&governor),
        ));

        let (feed, events) = ChangeFeed::channel();
        let reveal_duration =
            Duration::from_millis(registry.resolve_settings().reveal_duration_ms);
        let reveal = Arc::new(RevealController::new(
            feed.clone(),
            config.hold_threshold,
            config.reveal_all_duration,
            reveal_duration,
        ));
        let pipeline = ScanPipeline::new(
            Arc::clone(&engine),
            Arc::clone(&reveal),
            events,
            config.label_policy.clone(),
        );

        tracing::info!(
            protected = registry.protected_count(),
            max_in_flight = governor.limit(),
            "spoiler guard initialized"
        );
        let guard = Self {
            config,
            registry,
            governor,
            resolver,
            engine,
            reveal,
            feed,
            store,
        };
        Ok((guard, pipeline))
    }

    /// Stops the pipeline, cancels reveal-all, closes the governor and
    /// persists the document.
    pub async fn teardown(self) -> SpoilerResult<()> {
        // Shutdown is queued ahead of the rescan reveal-all's end requests.
        self.feed.shutdown();
        self.reveal.deactivate_reveal_all();
        self.governor.close();
        let result = self.persist().await;
        tracing::info!("spoiler guard torn down");
        result
    }

    // ── Rules ──

    pub fn is_protected(&self, container_id: &ContainerId) -> bool {
        self.registry.is_protected(container_id)
    }

    pub fn get_rule(&self, container_id: &ContainerId) -> Option<ProtectionRule> {
        self.registry.get_rule(container_id)
    }

    pub fn rules(&self) -> Vec<ProtectionRule> {
        self.registry.rules()
    }

    /// Stores `rule` as is, e.g. after editing its preset or boundary override.
    pub async fn set_rule(&self, rule: ProtectionRule) -> SpoilerResult<()> {
        let container_id = rule.container_id.clone();
        self.registry.set_rule(rule);
        self.resolver.invalidate(&container_id);
        self.changed().await
    }

    pub async fn enable(
        &self,
        container_id: ContainerId,
        meta: ContainerMeta,
    ) -> SpoilerResult<ProtectionRule> {
        let rule = self.registry.enable(container_id, meta);
        self.changed().await?;
        Ok(rule)
    }

    /// Stops protecting `container_id` and drops its cached episode list, so
    /// protecting it again recomputes the boundary.
    pub async fn disable(&self, container_id: &ContainerId) -> SpoilerResult<bool> {
        let was_protected = self.registry.disable(container_id);
        self.resolver.invalidate(container_id);
        self.changed().await?;
        Ok(was_protected)
    }

    pub async fn remove(
        &self,
        container_id: &ContainerId,
    ) -> SpoilerResult<Option<ProtectionRule>> {
        let removed = self.registry.remove(container_id);
        self.resolver.invalidate(container_id);
        self.changed().await?;
        Ok(removed)
    }

    /// Protects the container when one of `tags` is on the auto-enable list.
    pub async fn auto_enable_for_tags(
        &self,
        container_id: &ContainerId,
        meta: ContainerMeta,
        tags: &[String],
    ) -> SpoilerResult<bool> {
        let enabled = self.registry.auto_enable_for_tags(container_id, meta, tags);
        if enabled {
            self.changed().await?;
        }
        Ok(enabled)
    }

    /// Reports playback of an item of `container_id`.
    ///
    /// The container's watch state moved, so its episode list is refetched
    /// on next use. With auto-enable on first play, an unruled container
    /// becomes protected. Returns whether protection was enabled.
    pub async fn on_item_played(
        &self,
        container_id: &ContainerId,
        meta: ContainerMeta,
    ) -> SpoilerResult<bool> {
        self.resolver.invalidate(container_id);
        let enabled = self.registry.note_first_play(container_id, meta);
        if enabled {
            self.changed().await?;
        } else {
            self.feed.request_rescan();
        }
        Ok(enabled)
    }

    // ── Settings ──

    /// Effective global settings.
    pub fn settings(&self) -> Settings {
        self.registry.resolve_settings()
    }

    /// Merges `partial` into the stored overrides, persists them and returns
    /// the new effective settings.
    pub async fn update_settings(&self, partial: SettingsOverrides) -> SpoilerResult<Settings> {
        let settings = self.registry.update_settings(partial);
        self.reveal
            .set_reveal_duration(Duration::from_millis(settings.reveal_duration_ms));
        self.changed().await?;
        Ok(settings)
    }

    // ── Boundaries and decisions ──

    /// The container's boundary: the rule's override, else the computed one.
    pub async fn compute_boundary(&self, container_id: &ContainerId) -> Option<Boundary> {
        if let Some(boundary) = self
            .registry
            .get_rule(container_id)
            .and_then(|rule| rule.boundary_override)
        {
            return Some(boundary);
        }
        let threshold = self
            .registry
            .resolve_settings_for(container_id)
            .watched_threshold;
        self.resolver.compute_boundary(container_id, threshold).await
    }

    pub async fn is_past_boundary(
        &self,
        container_id: &ContainerId,
        season: u32,
        episode: u32,
    ) -> Option<bool> {
        let threshold = self
            .registry
            .resolve_settings_for(container_id)
            .watched_threshold;
        self.engine
            .is_past_rule_boundary(container_id, season, episode, threshold)
            .await
    }

    /// Leaf check under the global watched threshold.
    pub fn should_redact_leaf(&self, watch_state: &WatchState) -> bool {
        should_redact_leaf(watch_state, self.settings().watched_threshold)
    }

    pub fn redacted_title(&self, item: &ItemDescriptor) -> String {
        item.redacted_title(&self.config.label_policy)
    }

    pub async fn decide(&self, item: &ItemDescriptor, surface: Surface) -> Decision {
        self.engine.decide(item, surface).await
    }

    pub async fn filter_calendar(&self, events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
        self.engine
            .filter_calendar(events, &self.config.label_policy)
            .await
    }

    // ── Reveal ──

    /// Starts the timed reveal-all. Returns `false` if it already runs.
    pub fn activate_reveal_all(&self) -> bool {
        self.reveal.activate_reveal_all()
    }

    pub fn deactivate_reveal_all(&self) -> bool {
        self.reveal.deactivate_reveal_all()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<Option<u64>> {
        self.reveal.subscribe_countdown()
    }

    pub fn subscribe_armed(&self) -> watch::Receiver<bool> {
        self.registry.subscribe_armed()
    }

    // ── Plumbing ──

    /// Requests a full re-decision of every tracked item.
    pub fn rescan(&self) -> bool {
        self.feed.request_rescan()
    }

    /// A sender for page changes.
    pub fn change_feed(&self) -> ChangeFeed {
        self.feed.clone()
    }

    /// Saves the current document to the store.
    pub async fn persist(&self) -> SpoilerResult<()> {
        let document = self.registry.to_document();
        self.store.save(&document).await.inspect_err(|err| {
            tracing::warn!(error = %err, "failed to persist spoiler settings");
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn governor(&self) -> &Arc<RequestGovernor> {
        &self.governor
    }

    pub fn engine(&self) -> &Arc<RedactionEngine> {
        &self.engine
    }

    pub fn reveal(&self) -> &Arc<RevealController> {
        &self.reveal
    }

    /// Persists, then requests a rescan even when persisting failed.
    async fn changed(&self) -> SpoilerResult<()> {
        let persisted = self.persist().await;
        self.feed.request_rescan();
        persisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_limits() {
        let config = GuardConfig::default();
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.cache_capacity, 50);
        assert_eq!(config.episode_ttl, Some(Duration::from_secs(300)));
        assert_eq!(config.parent_ttl, None);
        assert_eq!(config.hold_threshold, Duration::from_millis(300));
        assert_eq!(config.reveal_all_duration, Duration::from_secs(30));
    }

    #[test]
    fn builders_override_fields() {
        let config = GuardConfig::default()
            .with_max_in_flight(2)
            .with_cache_capacity(8)
            .with_episode_ttl(None)
            .with_label_policy(LabelPolicy::mask());
        assert_eq!(config.max_in_flight, 2);
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.episode_ttl, None);
        assert_eq!(config.label_policy, LabelPolicy::mask());
    }
}
