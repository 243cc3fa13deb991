//! Per-item redaction decisions.
//!
//! [`RedactionEngine::decide`] combines the rule registry, the boundary
//! resolver and the parent cache into a single redact/allow answer:
//!
//! 1. Containers are never redacted themselves, only their children.
//! 2. Leaves resolve their container (hint, else parent cache). Unknown or
//!    unprotected containers are allowed.
//! 3. Surfaces switched off in the container's effective settings are left
//!    alone (detail pages never are).
//! 4. Known `(season, episode)` is compared against the boundary. Specials,
//!    and items whose coordinates stay unknown, are judged on their own watch
//!    state after a metadata fetch.
//!
//! Failing to fetch an item's own metadata redacts: an extra click is cheaper
//! than a leaked spoiler.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    boundary::{BoundaryResolver, is_past, should_redact_leaf},
    cache::LookupCache,
    error::SpoilerResult,
    governor::RequestGovernor,
    label::LabelPolicy,
    provider::{ContainerId, ItemId, ItemKind, ItemMetadata, ItemMetadataProvider},
    registry::RuleRegistry,
    settings::{Surface, WatchedThreshold},
};

/// Cache of item → container. `None` records "no container" (or a failed lookup).
pub type ParentCache = LookupCache<ItemId, Option<ContainerId>>;

/// What the host knows about a rendered item up front.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDescriptor {
    pub item_id: ItemId,
    pub kind: ItemKind,
    #[serde(default)]
    pub title: String,
    /// Container id when the host already knows it, skipping the parent lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_hint: Option<ContainerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
}

impl ItemDescriptor {
    pub fn new(item_id: impl Into<ItemId>, kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
            title: title.into(),
            container_hint: None,
            season_number: None,
            episode_number: None,
        }
    }

    /// An episode with nothing known beyond its id and title.
    pub fn episode(item_id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self::new(item_id, ItemKind::Episode, title)
    }

    #[must_use]
    pub fn with_container(mut self, container_id: impl Into<ContainerId>) -> Self {
        self.container_hint = Some(container_id.into());
        self
    }

    #[must_use]
    pub fn with_coordinates(mut self, season: u32, episode: u32) -> Self {
        self.season_number = Some(season);
        self.episode_number = Some(episode);
        self
    }

    /// The label shown while this item is redacted.
    pub fn redacted_title(&self, policy: &LabelPolicy) -> String {
        policy.apply_to(&self.title, self.season_number, self.episode_number)
    }
}

/// Outcome of a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Redact,
    Allow,
}

impl Decision {
    pub fn redact_if(redact: bool) -> Self {
        if redact { Self::Redact } else { Self::Allow }
    }

    pub fn is_redact(self) -> bool {
        self == Self::Redact
    }
}

// =============================================================================
// RedactionEngine
// =============================================================================

/// Decides, per item, whether its title and artwork must be hidden.
pub struct RedactionEngine {
    registry: Arc<RuleRegistry>,
    resolver: Arc<BoundaryResolver>,
    parents: Arc<ParentCache>,
    metadata: Arc<dyn ItemMetadataProvider>,
    governor: Arc<RequestGovernor>,
}

impl RedactionEngine {
    pub fn new(
        registry: Arc<RuleRegistry>,
        resolver: Arc<BoundaryResolver>,
        parents: Arc<ParentCache>,
        metadata: Arc<dyn ItemMetadataProvider>,
        governor: Arc<RequestGovernor>,
    ) -> Self {
        Self {
            registry,
            resolver,
            parents,
            metadata,
            governor,
        }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<BoundaryResolver> {
        &self.resolver
    }

    /// Whether the governor was closed, i.e. the guard is being torn down.
    pub fn is_closed(&self) -> bool {
        self.governor.is_closed()
    }

    /// Decides whether `item`, rendered on `surface`, must be redacted.
    pub async fn decide(&self, item: &ItemDescriptor, surface: Surface) -> Decision {
        if item.kind.is_container() {
            return Decision::Allow;
        }
        let Some(container_id) = self.container_of(item).await else {
            return Decision::Allow;
        };
        if !self.registry.is_protected(&container_id) {
            return Decision::Allow;
        }

        // The container's own preset decides which surfaces it is hidden on.
        let settings = self.registry.resolve_settings_for(&container_id);
        if !settings.surfaces.covers(surface) {
            return Decision::Allow;
        }
        let decision = self
            .decide_protected(item, &container_id, settings.watched_threshold)
            .await;
        tracing::debug!(
            item = %item.item_id,
            container = %container_id,
            ?surface,
            ?decision,
            "redaction decided"
        );
        decision
    }

    /// Resolves the item's container: the descriptor's hint, else the parent cache.
    pub async fn container_of(&self, item: &ItemDescriptor) -> Option<ContainerId> {
        if let Some(hint) = &item.container_hint {
            return Some(hint.clone());
        }

        let metadata = Arc::clone(&self.metadata);
        let item_id = item.item_id.clone();
        let lookup = self
            .parents
            .get_or_compute(item.item_id.clone(), move || async move {
                match metadata.item_metadata(&item_id).await {
                    Ok(meta) => Ok(meta.container_id),
                    Err(err) => {
                        // Stored as "no container".
                        tracing::warn!(item = %item_id, error = %err, "parent lookup failed");
                        Ok(None)
                    }
                }
            })
            .await;
        lookup.unwrap_or_else(|err| {
            tracing::warn!(item = %item.item_id, error = %err, "parent lookup unavailable");
            None
        })
    }

    async fn decide_protected(
        &self,
        item: &ItemDescriptor,
        container_id: &ContainerId,
        threshold: WatchedThreshold,
    ) -> Decision {
        let mut fetched = None;
        let (season, episode) = if let (Some(season), Some(episode)) =
            (item.season_number, item.episode_number)
        {
            (season, episode)
        } else {
            let Ok(meta) = self.fetch_metadata(&item.item_id).await else {
                return Decision::Redact;
            };
            let season = meta.season_number.or(item.season_number);
            let episode = meta.episode_number.or(item.episode_number);
            let (Some(season), Some(episode)) = (season, episode) else {
                return Decision::redact_if(should_redact_leaf(&meta.watch_state, threshold));
            };
            fetched = Some(meta);
            (season, episode)
        };

        match self
            .is_past_rule_boundary(container_id, season, episode, threshold)
            .await
        {
            Some(past) => Decision::redact_if(past),
            // Specials sit outside the boundary order.
            None => {
                let meta = match fetched {
                    Some(meta) => meta,
                    None => match self.fetch_metadata(&item.item_id).await {
                        Ok(meta) => meta,
                        Err(_) => return Decision::Redact,
                    },
                };
                Decision::redact_if(should_redact_leaf(&meta.watch_state, threshold))
            }
        }
    }

    /// Like [`BoundaryResolver::is_past_boundary`], but a rule's boundary
    /// override replaces the computed boundary.
    pub async fn is_past_rule_boundary(
        &self,
        container_id: &ContainerId,
        season: u32,
        episode: u32,
        threshold: WatchedThreshold,
    ) -> Option<bool> {
        let boundary_override = self
            .registry
            .get_rule(container_id)
            .and_then(|rule| rule.boundary_override);
        match boundary_override {
            Some(boundary) => is_past(Some(&boundary), season, episode),
            None => {
                self.resolver
                    .is_past_boundary(container_id, season, episode, threshold)
                    .await
            }
        }
    }

    /// Fetches one item's metadata behind the governor.
    pub async fn fetch_metadata(&self, item_id: &ItemId) -> SpoilerResult<ItemMetadata> {
        let result = match self.governor.acquire().await {
            Ok(_permit) => self.metadata.item_metadata(item_id).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            tracing::warn!(item = %item_id, error = %err, "metadata fetch failed, redacting");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::LabelPolicy;

    #[test]
    fn descriptor_builders_fill_coordinates() {
        let item = ItemDescriptor::episode("e1", "Pilot")
            .with_container("s1")
            .with_coordinates(1, 1);
        assert_eq!(item.container_hint, Some(ContainerId::new("s1")));
        assert_eq!((item.season_number, item.episode_number), (Some(1), Some(1)));
        assert_eq!(
            item.redacted_title(&LabelPolicy::default()),
            "S01E01 - Title hidden"
        );
    }

    #[test]
    fn decision_helpers() {
        assert_eq!(Decision::redact_if(true), Decision::Redact);
        assert!(!Decision::redact_if(false).is_redact());
    }

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let item: ItemDescriptor =
            serde_json::from_str(r#"{"itemId":"e9","kind":"episode"}"#).unwrap();
        assert_eq!(item.item_id, ItemId::new("e9"));
        assert!(item.title.is_empty());
        assert_eq!(item.season_number, None);
    }
}
