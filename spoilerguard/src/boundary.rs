//! Watch boundaries: how far into a container the user has watched.
//!
//! A [`Boundary`] is the latest watched regular-season episode of a container,
//! compared lexicographically on `(season, episode)`. Anything strictly after
//! it is a spoiler. Specials (season 0) have no place in that order and are
//! judged on their own watch state with [`should_redact_leaf`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    cache::LookupCache,
    error::SpoilerResult,
    provider::{ContainerId, EpisodeInfo, EpisodeListingProvider, ItemId, WatchState},
    settings::WatchedThreshold,
};

/// Season number used for specials.
pub const SPECIALS_SEASON: u32 = 0;

/// Episode list of a container, shared between cache and callers.
pub type EpisodeList = Arc<[EpisodeInfo]>;

/// The `(season, episode)` coordinate of the last watched regular-season episode.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    pub season_number: u32,
    pub episode_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<ItemId>,
}

impl Boundary {
    pub fn new(season_number: u32, episode_number: u32, episode_id: Option<ItemId>) -> Self {
        Self {
            season_number,
            episode_number,
            episode_id,
        }
    }

    /// The comparison key: season first, then episode.
    pub fn coordinate(&self) -> (u32, u32) {
        (self.season_number, self.episode_number)
    }
}

/// Compares `(season, episode)` against `boundary`.
///
/// Returns `None` for specials, `Some(true)` when the coordinate is strictly
/// after the boundary or there is no boundary, and `Some(false)` otherwise.
pub fn is_past(boundary: Option<&Boundary>, season: u32, episode: u32) -> Option<bool> {
    if season == SPECIALS_SEASON {
        return None;
    }
    Some(boundary.is_none_or(|boundary| (season, episode) > boundary.coordinate()))
}

/// Picks the boundary out of a full episode list.
///
/// Only regular seasons take part. A missing episode number counts as 0.
pub fn boundary_from_episodes(
    episodes: &[EpisodeInfo],
    threshold: WatchedThreshold,
) -> Option<Boundary> {
    episodes
        .iter()
        .filter(|episode| episode.season_number != SPECIALS_SEASON)
        .filter(|episode| threshold.is_watched(&episode.watch_state))
        .max_by_key(|episode| (episode.season_number, episode.episode_number.unwrap_or(0)))
        .map(|episode| {
            Boundary::new(
                episode.season_number,
                episode.episode_number.unwrap_or(0),
                Some(episode.id.clone()),
            )
        })
}

/// Redacts unless the item itself is watched under `threshold`.
pub fn should_redact_leaf(watch_state: &WatchState, threshold: WatchedThreshold) -> bool {
    !threshold.is_watched(watch_state)
}

// =============================================================================
// BoundaryResolver
// =============================================================================

/// Resolves boundaries through the episode-list cache.
pub struct BoundaryResolver {
    episodes: Arc<LookupCache<ContainerId, EpisodeList>>,
    listing: Arc<dyn EpisodeListingProvider>,
}

impl BoundaryResolver {
    pub fn new(
        episodes: Arc<LookupCache<ContainerId, EpisodeList>>,
        listing: Arc<dyn EpisodeListingProvider>,
    ) -> Self {
        Self { episodes, listing }
    }

    /// Fetches (or reuses) the container's full episode list.
    pub async fn episodes(&self, container_id: &ContainerId) -> SpoilerResult<EpisodeList> {
        let listing = Arc::clone(&self.listing);
        let id = container_id.clone();
        self.episodes
            .get_or_compute(container_id.clone(), move || async move {
                let episodes = listing.episodes(&id).await?;
                Ok(EpisodeList::from(episodes))
            })
            .await
    }

    /// Computes the container's boundary. A failed lookup counts as "nothing watched".
    pub async fn compute_boundary(
        &self,
        container_id: &ContainerId,
        threshold: WatchedThreshold,
    ) -> Option<Boundary> {
        match self.episodes(container_id).await {
            Ok(episodes) => boundary_from_episodes(&episodes, threshold),
            Err(err) => {
                tracing::warn!(
                    container = %container_id,
                    error = %err,
                    "episode listing failed, treating container as unwatched"
                );
                None
            }
        }
    }

    /// Whether `(season, episode)` lies past the container's current boundary.
    ///
    /// `None` exactly when `season` is the specials season; callers then fall
    /// back to [`should_redact_leaf`].
    pub async fn is_past_boundary(
        &self,
        container_id: &ContainerId,
        season: u32,
        episode: u32,
        threshold: WatchedThreshold,
    ) -> Option<bool> {
        if season == SPECIALS_SEASON {
            return None;
        }
        let boundary = self.compute_boundary(container_id, threshold).await;
        is_past(boundary.as_ref(), season, episode)
    }

    /// Drops the cached episode list so the next lookup refetches it.
    pub fn invalidate(&self, container_id: &ContainerId) {
        self.episodes.invalidate(container_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(season: u32, number: Option<u32>, watch_state: WatchState) -> EpisodeInfo {
        EpisodeInfo {
            id: ItemId::new(format!("s{season}e{}", number.unwrap_or(0))),
            season_number: season,
            episode_number: number,
            watch_state,
        }
    }

    #[test]
    fn boundary_is_the_latest_watched_episode() {
        let episodes = vec![
            episode(1, Some(1), WatchState::played()),
            episode(1, Some(2), WatchState::played()),
            episode(1, Some(3), WatchState::default()),
        ];
        let boundary = boundary_from_episodes(&episodes, WatchedThreshold::Played).unwrap();
        assert_eq!(boundary.coordinate(), (1, 2));
        assert_eq!(boundary.episode_id, Some(ItemId::new("s1e2")));
    }

    #[test]
    fn season_orders_before_episode() {
        let episodes = vec![
            episode(2, Some(1), WatchState::played()),
            episode(1, Some(12), WatchState::played()),
        ];
        let boundary = boundary_from_episodes(&episodes, WatchedThreshold::Played).unwrap();
        assert_eq!(boundary.coordinate(), (2, 1));
    }

    #[test]
    fn specials_never_form_the_boundary() {
        let episodes = vec![episode(0, Some(5), WatchState::played())];
        assert_eq!(
            boundary_from_episodes(&episodes, WatchedThreshold::Played),
            None
        );
    }

    #[test]
    fn missing_episode_number_counts_as_zero() {
        let episodes = vec![
            episode(3, None, WatchState::played()),
            episode(2, Some(8), WatchState::played()),
        ];
        let boundary = boundary_from_episodes(&episodes, WatchedThreshold::Played).unwrap();
        assert_eq!(boundary.coordinate(), (3, 0));
    }

    #[test]
    fn threshold_decides_what_counts_as_watched() {
        let episodes = vec![
            episode(1, Some(1), WatchState::played()),
            episode(1, Some(2), WatchState::progress(95.0)),
        ];
        assert_eq!(
            boundary_from_episodes(&episodes, WatchedThreshold::Played)
                .unwrap()
                .coordinate(),
            (1, 1)
        );
        assert_eq!(
            boundary_from_episodes(&episodes, WatchedThreshold::NinetyPercent)
                .unwrap()
                .coordinate(),
            (1, 2)
        );
    }

    #[test]
    fn is_past_compares_lexicographically() {
        let boundary = Boundary::new(1, 2, None);
        assert_eq!(is_past(Some(&boundary), 1, 3), Some(true));
        assert_eq!(is_past(Some(&boundary), 1, 2), Some(false));
        assert_eq!(is_past(Some(&boundary), 1, 1), Some(false));
        assert_eq!(is_past(Some(&boundary), 2, 0), Some(true));
        assert_eq!(is_past(Some(&boundary), 0, 1), None);
    }

    #[test]
    fn no_boundary_means_everything_is_past() {
        assert_eq!(is_past(None, 1, 1), Some(true));
        assert_eq!(is_past(None, 0, 1), None);
    }

    #[test]
    fn leaf_redaction_follows_own_watch_state() {
        assert!(should_redact_leaf(
            &WatchState::default(),
            WatchedThreshold::Played
        ));
        assert!(!should_redact_leaf(
            &WatchState::played(),
            WatchedThreshold::Played
        ));
        assert!(!should_redact_leaf(
            &WatchState::progress(91.0),
            WatchedThreshold::NinetyPercent
        ));
    }
}
