//! Identifiers, library data shapes and the provider traits the engine consumes.
//!
//! The engine never talks to a media server directly. It is handed:
//!
//! - an [`ItemMetadataProvider`], which answers "what is this item?"
//! - an [`EpisodeListingProvider`], which answers "what episodes does this container have?"
//!
//! Both are `async` and object-safe so the host can plug in an HTTP client,
//! an in-memory fixture, or anything in between.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SpoilerResult;

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id! {
    /// Identifier of a container (a series or a movie).
    ContainerId
}

string_id! {
    /// Identifier of any displayable item.
    ItemId
}

// =============================================================================
// Library data
// =============================================================================

/// Kind of a displayed item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Series,
    Movie,
    Season,
    Episode,
    Other,
}

impl ItemKind {
    /// Containers hold protection rules and are never redacted themselves.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Series | Self::Movie)
    }
}

/// Kind of a protected container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerKind {
    Series,
    Movie,
}

/// The user's watch progress on one item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchState {
    /// Explicit "played" flag set by the media server.
    pub played: bool,
    /// Playback progress in percent, when the server reports one.
    pub played_percentage: Option<f64>,
}

impl WatchState {
    /// Fully played.
    pub fn played() -> Self {
        Self {
            played: true,
            played_percentage: Some(100.0),
        }
    }

    /// Partially played, without the played flag.
    pub fn progress(percentage: f64) -> Self {
        Self {
            played: false,
            played_percentage: Some(percentage),
        }
    }
}

/// One episode of a container, as returned by the episode listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeInfo {
    pub id: ItemId,
    pub season_number: u32,
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub watch_state: WatchState,
}

/// Metadata of a single item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    /// Container (series or movie) this item belongs to, if any.
    pub container_id: Option<ContainerId>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub watch_state: WatchState,
    #[serde(default)]
    pub tags: Vec<String>,
}

// =============================================================================
// Provider traits
// =============================================================================

/// Resolves metadata for a single item.
#[async_trait]
pub trait ItemMetadataProvider: Send + Sync {
    async fn item_metadata(&self, item_id: &ItemId) -> SpoilerResult<ItemMetadata>;
}

/// Lists every episode of a container with its watch state.
#[async_trait]
pub trait EpisodeListingProvider: Send + Sync {
    async fn episodes(&self, container_id: &ContainerId) -> SpoilerResult<Vec<EpisodeInfo>>;
}
